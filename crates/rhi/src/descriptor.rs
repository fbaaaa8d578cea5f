//! Descriptor set management for shader resource binding.
//!
//! This module provides the per-frame descriptor machinery:
//! - [`DescriptorSetLayout`] defines an immutable binding-slot schema
//! - [`DescriptorPool`] is a fixed-capacity allocator with explicit budget
//!   tracking
//! - [`FrameDescriptorSets`] holds one set per frame slot with typed bind
//!   helpers
//! - [`DescriptorWriter`] batches binding updates into one flush per set
//!
//! # Per-frame sets
//!
//! Each frame slot gets its own descriptor set, written independently, so
//! that frame `k`'s in-flight GPU read of slot `k`'s resources is never
//! disturbed by frame `k+1`'s host-side write to slot `k+1`. The typed
//! bind helpers therefore take one resource per slot and reject any list
//! whose length differs from the slot count — silently binding a subset
//! would leave some slots reading stale or unbound resources.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use frameloop_rhi::buffer::{Buffer, BufferUsage};
//! use frameloop_rhi::descriptor::{
//!     BindingKind, DescriptorPool, DescriptorSetLayout, FrameDescriptorSets,
//! };
//! use frameloop_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), frameloop_rhi::RhiError> {
//! let layout = DescriptorSetLayout::per_frame_uniform(device.clone())?;
//! let mut pool = DescriptorPool::new(
//!     device.clone(),
//!     2,
//!     &[(BindingKind::UniformBuffer, 2)],
//! )?;
//!
//! let sets = FrameDescriptorSets::allocate(device.clone(), &mut pool, &layout, 2)?;
//!
//! let ubos = [
//!     Buffer::new(device.clone(), BufferUsage::Uniform, 64)?,
//!     Buffer::new(device.clone(), BufferUsage::Uniform, 64)?,
//! ];
//! sets.bind_uniform_buffers(0, &[&ubos[0], &ubos[1]])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::Buffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// The kind of resource a binding slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// A uniform buffer.
    UniformBuffer,
    /// A storage buffer.
    StorageBuffer,
    /// A sampled image paired with its sampler.
    CombinedImageSampler,
}

impl BindingKind {
    /// Converts to the Vulkan descriptor type.
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            BindingKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            BindingKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// One slot in a descriptor set layout.
#[derive(Clone, Copy, Debug)]
pub struct LayoutBinding {
    /// Binding index referenced by the shader.
    pub binding: u32,
    /// Resource kind bound at this slot.
    pub kind: BindingKind,
    /// Array count (1 for non-array bindings).
    pub count: u32,
    /// Shader stages that may read this binding.
    pub stages: vk::ShaderStageFlags,
}

impl LayoutBinding {
    /// Converts to the Vulkan layout binding description.
    pub fn to_vk(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.kind.to_vk())
            .descriptor_count(self.count)
            .stage_flags(self.stages)
    }
}

/// Descriptor set layout wrapper.
///
/// An immutable binding-slot schema built from an ordered list of
/// [`LayoutBinding`]s.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a new descriptor set layout.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `bindings` - Ordered binding descriptions
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(device: Arc<Device>, bindings: &[LayoutBinding]) -> RhiResult<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> =
            bindings.iter().map(LayoutBinding::to_vk).collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// The conventional per-frame layout: one uniform buffer at binding 0,
    /// visible to the vertex stage.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn per_frame_uniform(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(device, &Self::per_frame_uniform_bindings())
    }

    /// The binding list used by [`per_frame_uniform`](Self::per_frame_uniform).
    pub fn per_frame_uniform_bindings() -> [LayoutBinding; 1] {
        [LayoutBinding {
            binding: 0,
            kind: BindingKind::UniformBuffer,
            count: 1,
            stages: vk::ShaderStageFlags::VERTEX,
        }]
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Allocation budget of a descriptor pool.
///
/// Kept separate from the Vulkan handle so the accounting is plain data:
/// the pool charges it on allocation and zeroes it on reset.
#[derive(Clone, Copy, Debug)]
pub struct PoolBudget {
    /// Maximum number of sets the pool was created for.
    max_sets: u32,
    /// Number of sets currently allocated.
    allocated: u32,
}

impl PoolBudget {
    /// Creates a budget for `max_sets` sets.
    pub fn new(max_sets: u32) -> Self {
        Self {
            max_sets,
            allocated: 0,
        }
    }

    /// Whether `count` more sets fit in the budget.
    #[inline]
    pub fn can_allocate(&self, count: u32) -> bool {
        self.allocated + count <= self.max_sets
    }

    /// Charges `count` sets against the budget.
    ///
    /// Returns false (and charges nothing) if the budget would be
    /// exceeded.
    pub fn charge(&mut self, count: u32) -> bool {
        if !self.can_allocate(count) {
            return false;
        }
        self.allocated += count;
        true
    }

    /// Returns the budget to empty.
    pub fn reset(&mut self) {
        self.allocated = 0;
    }

    /// Number of sets currently allocated.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Maximum number of sets.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

/// Descriptor pool with explicit capacity tracking.
///
/// A fixed-capacity allocator sized from a declarative count-per-binding-
/// kind request. Allocation past the budget fails loudly instead of
/// relying on the driver's out-of-pool error. [`reset`](Self::reset)
/// invalidates every set previously allocated from the pool; the caller
/// must not reuse stale handles afterwards.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor pool handle.
    pool: vk::DescriptorPool,
    /// Allocation accounting.
    budget: PoolBudget,
}

impl DescriptorPool {
    /// Creates a new descriptor pool.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `max_sets` - Maximum number of descriptor sets
    /// * `counts` - Descriptor capacity per binding kind
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        counts: &[(BindingKind, u32)],
    ) -> RhiResult<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = counts
            .iter()
            .map(|&(kind, count)| {
                vk::DescriptorPoolSize::default()
                    .ty(kind.to_vk())
                    .descriptor_count(count)
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, {} pool size(s)",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            budget: PoolBudget::new(max_sets),
        })
    }

    /// Allocates one descriptor set per layout handle.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PoolExhausted`] if the request exceeds the
    /// pool's budget, or a Vulkan error if allocation fails.
    pub fn allocate(
        &mut self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let requested = layouts.len() as u32;
        if !self.budget.can_allocate(requested) {
            return Err(RhiError::PoolExhausted {
                allocated: self.budget.allocated(),
                max_sets: self.budget.max_sets(),
                requested,
            });
        }

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        self.budget.charge(requested);

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    /// Whether `count` more sets fit in the pool's budget.
    #[inline]
    pub fn can_allocate(&self, count: u32) -> bool {
        self.budget.can_allocate(count)
    }

    /// Resets the pool, returning all allocated sets to it.
    ///
    /// Every set handle previously returned by
    /// [`allocate`](Self::allocate) becomes invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    ///
    /// # Safety contract
    ///
    /// The caller must ensure no set from this pool is referenced by
    /// in-flight GPU work.
    pub fn reset(&mut self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        self.budget.reset();

        debug!("Reset descriptor pool");

        Ok(())
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the pool's allocation budget.
    #[inline]
    pub fn budget(&self) -> &PoolBudget {
        &self.budget
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Checks that a per-frame resource list covers every frame slot.
///
/// A mismatch means the caller would leave some slots unbound or bind a
/// subset silently; both are programmer errors.
fn check_per_frame_len(expected: usize, actual: usize) -> RhiResult<()> {
    if expected != actual {
        return Err(RhiError::DescriptorMismatch { expected, actual });
    }
    Ok(())
}

/// One descriptor set per frame slot, plus typed bind helpers.
///
/// The helpers each take exactly one resource per slot and write slot
/// `i`'s resource into set `i`. List lengths are validated against the
/// slot count before any write happens.
pub struct FrameDescriptorSets {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// One set per frame slot.
    sets: Vec<vk::DescriptorSet>,
}

impl FrameDescriptorSets {
    /// Allocates one set per frame slot from the pool.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `pool` - Pool to allocate from
    /// * `layout` - Layout shared by all per-frame sets
    /// * `frame_count` - Number of frame slots
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot satisfy the request.
    pub fn allocate(
        device: Arc<Device>,
        pool: &mut DescriptorPool,
        layout: &DescriptorSetLayout,
        frame_count: usize,
    ) -> RhiResult<Self> {
        let layouts = vec![layout.handle(); frame_count];
        let sets = pool.allocate(&layouts)?;

        debug!("Allocated {} per-frame descriptor set(s)", sets.len());

        Ok(Self { device, sets })
    }

    /// Returns the set for a frame slot.
    ///
    /// # Panics
    ///
    /// Panics if `frame_slot` is out of bounds.
    #[inline]
    pub fn set(&self, frame_slot: usize) -> vk::DescriptorSet {
        self.sets[frame_slot]
    }

    /// Number of frame slots covered.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.sets.len()
    }

    /// Binds one uniform buffer per frame slot at `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorMismatch`] if `buffers` does not
    /// contain exactly one buffer per frame slot.
    pub fn bind_uniform_buffers(&self, binding: u32, buffers: &[&Buffer]) -> RhiResult<()> {
        self.bind_buffers(binding, BindingKind::UniformBuffer, buffers)
    }

    /// Binds one storage buffer per frame slot at `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorMismatch`] if `buffers` does not
    /// contain exactly one buffer per frame slot.
    pub fn bind_storage_buffers(&self, binding: u32, buffers: &[&Buffer]) -> RhiResult<()> {
        self.bind_buffers(binding, BindingKind::StorageBuffer, buffers)
    }

    fn bind_buffers(
        &self,
        binding: u32,
        kind: BindingKind,
        buffers: &[&Buffer],
    ) -> RhiResult<()> {
        check_per_frame_len(self.sets.len(), buffers.len())?;

        let mut writer = DescriptorWriter::new();
        for (set, buffer) in self.sets.iter().zip(buffers) {
            writer.write_buffer(
                binding,
                kind,
                buffer.handle(),
                0,
                vk::WHOLE_SIZE,
            );
            writer.flush(&self.device, *set);
            writer.clear();
        }

        Ok(())
    }

    /// Binds one sampled image (view + sampler) per frame slot at
    /// `binding`.
    ///
    /// The images are expected in SHADER_READ_ONLY_OPTIMAL layout at draw
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorMismatch`] if `images` does not
    /// contain exactly one entry per frame slot.
    pub fn bind_image_samplers(
        &self,
        binding: u32,
        images: &[(vk::ImageView, vk::Sampler)],
    ) -> RhiResult<()> {
        check_per_frame_len(self.sets.len(), images.len())?;

        let mut writer = DescriptorWriter::new();
        for (set, &(view, sampler)) in self.sets.iter().zip(images) {
            writer.write_image(
                binding,
                view,
                sampler,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            writer.flush(&self.device, *set);
            writer.clear();
        }

        Ok(())
    }
}

/// Where a pending write's info lives in the writer's storage.
#[derive(Clone, Copy, Debug)]
enum InfoSlot {
    Buffer(usize),
    Image(usize),
}

/// A recorded write, resolved against the owned info storage at flush.
#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: InfoSlot,
}

/// Batches descriptor writes into a single update call per set.
///
/// The writer owns its `DescriptorBufferInfo`/`DescriptorImageInfo`
/// storage and records writes by index into it, so composed writes stay
/// valid until [`flush`](Self::flush) issues one atomic
/// `vkUpdateDescriptorSets` call. [`clear`](Self::clear) must be called
/// between logically distinct batches; reusing a writer without clearing
/// would replay stale writes against freed info storage indices.
#[derive(Default)]
pub struct DescriptorWriter {
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    pending: Vec<PendingWrite>,
}

impl DescriptorWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a buffer binding write.
    pub fn write_buffer(
        &mut self,
        binding: u32,
        kind: BindingKind,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> &mut Self {
        let index = self.buffer_infos.len();
        self.buffer_infos.push(
            vk::DescriptorBufferInfo::default()
                .buffer(buffer)
                .offset(offset)
                .range(range),
        );
        self.pending.push(PendingWrite {
            binding,
            descriptor_type: kind.to_vk(),
            info: InfoSlot::Buffer(index),
        });
        self
    }

    /// Records a combined image sampler binding write.
    pub fn write_image(
        &mut self,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> &mut Self {
        let index = self.image_infos.len();
        self.image_infos.push(
            vk::DescriptorImageInfo::default()
                .sampler(sampler)
                .image_view(view)
                .image_layout(layout),
        );
        self.pending.push(PendingWrite {
            binding,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            info: InfoSlot::Image(index),
        });
        self
    }

    /// Number of writes recorded since the last [`clear`](Self::clear).
    #[inline]
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Builds the Vulkan write structures against the given set.
    ///
    /// The returned writes borrow this writer's info storage.
    fn build_writes(&self, set: vk::DescriptorSet) -> Vec<vk::WriteDescriptorSet<'_>> {
        self.pending
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(write.descriptor_type);

                match write.info {
                    InfoSlot::Buffer(i) => {
                        base.buffer_info(std::slice::from_ref(&self.buffer_infos[i]))
                    }
                    InfoSlot::Image(i) => {
                        base.image_info(std::slice::from_ref(&self.image_infos[i]))
                    }
                }
            })
            .collect()
    }

    /// Applies every recorded write to `set` in one update call.
    ///
    /// Does nothing if no writes are pending.
    pub fn flush(&self, device: &Device, set: vk::DescriptorSet) {
        if self.pending.is_empty() {
            return;
        }

        let writes = self.build_writes(set);
        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }

        debug!("Flushed {} descriptor write(s)", writes.len());
    }

    /// Discards all recorded writes and their info storage.
    ///
    /// Call between batches; the writer may then be reused for another
    /// set.
    pub fn clear(&mut self) {
        self.buffer_infos.clear();
        self.image_infos.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_kind_to_vk() {
        assert_eq!(
            BindingKind::UniformBuffer.to_vk(),
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(
            BindingKind::StorageBuffer.to_vk(),
            vk::DescriptorType::STORAGE_BUFFER
        );
        assert_eq!(
            BindingKind::CombinedImageSampler.to_vk(),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
    }

    #[test]
    fn test_layout_binding_to_vk() {
        let binding = LayoutBinding {
            binding: 2,
            kind: BindingKind::UniformBuffer,
            count: 1,
            stages: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        };
        let vk_binding = binding.to_vk();
        assert_eq!(vk_binding.binding, 2);
        assert_eq!(vk_binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(vk_binding.descriptor_count, 1);
        assert!(vk_binding.stage_flags.contains(vk::ShaderStageFlags::VERTEX));
        assert!(
            vk_binding
                .stage_flags
                .contains(vk::ShaderStageFlags::FRAGMENT)
        );
    }

    #[test]
    fn test_per_frame_uniform_bindings() {
        let bindings = DescriptorSetLayout::per_frame_uniform_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].kind, BindingKind::UniformBuffer);
        assert_eq!(bindings[0].stages, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_pool_budget_accounting() {
        let mut budget = PoolBudget::new(4);
        assert!(budget.can_allocate(4));
        assert!(!budget.can_allocate(5));

        assert!(budget.charge(3));
        assert_eq!(budget.allocated(), 3);
        assert!(budget.can_allocate(1));
        assert!(!budget.can_allocate(2));

        // Over-budget charge is rejected and charges nothing
        assert!(!budget.charge(2));
        assert_eq!(budget.allocated(), 3);

        assert!(budget.charge(1));
        assert_eq!(budget.allocated(), 4);
        assert!(!budget.can_allocate(1));

        budget.reset();
        assert_eq!(budget.allocated(), 0);
        assert!(budget.can_allocate(4));
    }

    #[test]
    fn test_check_per_frame_len() {
        assert!(check_per_frame_len(2, 2).is_ok());
        assert!(matches!(
            check_per_frame_len(2, 1),
            Err(RhiError::DescriptorMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            check_per_frame_len(2, 3),
            Err(RhiError::DescriptorMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_writer_records_and_clears() {
        let mut writer = DescriptorWriter::new();
        assert_eq!(writer.pending_writes(), 0);

        writer.write_buffer(
            0,
            BindingKind::UniformBuffer,
            vk::Buffer::null(),
            0,
            vk::WHOLE_SIZE,
        );
        writer.write_image(
            1,
            vk::ImageView::null(),
            vk::Sampler::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(writer.pending_writes(), 2);

        let writes = writer.build_writes(vk::DescriptorSet::null());
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].dst_binding, 0);
        assert_eq!(writes[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(writes[0].descriptor_count, 1);
        assert_eq!(writes[1].dst_binding, 1);
        assert_eq!(
            writes[1].descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );

        writer.clear();
        assert_eq!(writer.pending_writes(), 0);
        assert!(writer.build_writes(vk::DescriptorSet::null()).is_empty());
    }

    #[test]
    fn test_writer_batches_multiple_buffers() {
        let mut writer = DescriptorWriter::new();
        for binding in 0..3 {
            writer.write_buffer(
                binding,
                BindingKind::StorageBuffer,
                vk::Buffer::null(),
                0,
                vk::WHOLE_SIZE,
            );
        }

        let writes = writer.build_writes(vk::DescriptorSet::null());
        assert_eq!(writes.len(), 3);
        for (i, write) in writes.iter().enumerate() {
            assert_eq!(write.dst_binding, i as u32);
            assert_eq!(write.descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
        }
    }
}
