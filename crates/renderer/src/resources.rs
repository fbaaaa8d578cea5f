//! Name-keyed GPU resource registry.
//!
//! The [`ResourceManager`] owns the lifetime of the buffers and
//! framebuffers the renderer and the descriptor layer pull from. Names are
//! unique per resource kind; replacing a name destroys the prior owner's
//! GPU resources before the new ones are constructed, so there is no
//! window in which both allocations exist.
//!
//! Registered resources are mutated only from the render thread between
//! frames. Per-slot uniform sets exist precisely so a write for frame `k`
//! lands in slot `k`'s private buffer, never in memory an earlier
//! in-flight frame may still be reading.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::debug;

use frameloop_rhi::buffer::{Buffer, BufferUsage};
use frameloop_rhi::device::Device;
use frameloop_rhi::framebuffer::Framebuffer;
use frameloop_rhi::{RhiError, RhiResult};

/// A registered vertex/index buffer pair.
pub struct Geometry {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl Geometry {
    fn new(device: Arc<Device>, vertices: &[u8], indices: &[u32]) -> RhiResult<Self> {
        let vertex_buffer = Buffer::new_with_data(device.clone(), BufferUsage::Vertex, vertices)?;
        let index_buffer = Buffer::new_with_data(
            device,
            BufferUsage::Index,
            bytemuck::cast_slice(indices),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// The vertex buffer.
    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    /// The index buffer (u32 indices).
    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Number of indices in the index buffer.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// One uniform buffer per frame slot, all of the same payload size.
struct UniformSet {
    buffers: Vec<Buffer>,
}

/// Replaces a map entry, dropping the old value before building the new.
///
/// `BTreeMap::insert` would drop the displaced value only after the new
/// one was constructed; removing first keeps the old GPU memory from
/// coexisting with its replacement.
fn replace_with<V, E>(
    map: &mut BTreeMap<String, V>,
    name: &str,
    build: impl FnOnce() -> Result<V, E>,
) -> Result<(), E> {
    map.remove(name);
    let value = build()?;
    map.insert(name.to_string(), value);
    Ok(())
}

/// Name-keyed registry owning buffers and framebuffers.
pub struct ResourceManager {
    device: Arc<Device>,
    frame_count: usize,
    geometries: BTreeMap<String, Geometry>,
    uniforms: BTreeMap<String, UniformSet>,
    framebuffers: BTreeMap<String, Vec<Framebuffer>>,
}

impl ResourceManager {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device resources are created against
    /// * `frame_count` - Number of frame slots; per-slot uniform sets are
    ///   sized to this
    pub fn new(device: Arc<Device>, frame_count: usize) -> Self {
        Self {
            device,
            frame_count,
            geometries: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            framebuffers: BTreeMap::new(),
        }
    }

    /// Number of frame slots uniform sets are sized for.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Registers a vertex/index buffer pair under `name`.
    ///
    /// `vertices` is raw vertex data in whatever layout the bound pipeline
    /// expects; this registry does not interpret it. An existing geometry
    /// with the same name is destroyed first.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or upload fails.
    pub fn create_geometry(
        &mut self,
        name: &str,
        vertices: &[u8],
        indices: &[u32],
    ) -> RhiResult<()> {
        let device = self.device.clone();
        replace_with(&mut self.geometries, name, || {
            Geometry::new(device, vertices, indices)
        })?;

        debug!(
            "Registered geometry '{}': {} vertex bytes, {} indices",
            name,
            vertices.len(),
            indices.len()
        );

        Ok(())
    }

    /// Looks up a geometry by name.
    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries.get(name)
    }

    /// Replaces the data of a registered geometry.
    ///
    /// Buffer sizes may change, so the buffers are rebuilt rather than
    /// written in place. The caller must ensure no in-flight frame still
    /// reads the old buffers (in the steady-state loop this holds because
    /// updates happen between frames while the slot fences bound the
    /// overlap).
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not registered or creation fails.
    pub fn update_geometry(
        &mut self,
        name: &str,
        vertices: &[u8],
        indices: &[u32],
    ) -> RhiResult<()> {
        if !self.geometries.contains_key(name) {
            return Err(RhiError::Buffer(format!(
                "No geometry named '{}' to update",
                name
            )));
        }
        self.create_geometry(name, vertices, indices)
    }

    /// Destroys a geometry, freeing its GPU buffers.
    ///
    /// Returns whether the name was registered.
    pub fn destroy_geometry(&mut self, name: &str) -> bool {
        let removed = self.geometries.remove(name).is_some();
        if removed {
            debug!("Destroyed geometry '{}'", name);
        }
        removed
    }

    /// Iterates all registered geometries in name order.
    pub fn geometries(&self) -> impl Iterator<Item = (&str, &Geometry)> {
        self.geometries.iter().map(|(name, geo)| (name.as_str(), geo))
    }

    /// Number of registered geometries.
    #[inline]
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    // =========================================================================
    // Per-slot uniform sets
    // =========================================================================

    /// Creates one uniform buffer per frame slot sized for payload `T`.
    ///
    /// An existing set with the same name is destroyed first.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation fails.
    pub fn create_uniforms<T: Pod>(&mut self, name: &str) -> RhiResult<()> {
        let device = self.device.clone();
        let frame_count = self.frame_count;
        let size = std::mem::size_of::<T>() as u64;

        replace_with(&mut self.uniforms, name, || {
            let mut buffers = Vec::with_capacity(frame_count);
            for _ in 0..frame_count {
                buffers.push(Buffer::new(device.clone(), BufferUsage::Uniform, size)?);
            }
            Ok::<_, RhiError>(UniformSet { buffers })
        })?;

        debug!(
            "Registered uniform set '{}': {} slot(s) x {} bytes",
            name, frame_count, size
        );

        Ok(())
    }

    /// Writes a payload into one slot's uniform buffer.
    ///
    /// Only the given slot's private memory is touched; buffers belonging
    /// to other (possibly in-flight) slots are left alone. The payload
    /// size must match the size the set was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown, `frame_slot` is out of
    /// range, or the payload size mismatches.
    pub fn write_uniform<T: Pod>(
        &self,
        name: &str,
        frame_slot: usize,
        value: &T,
    ) -> RhiResult<()> {
        let set = self.uniforms.get(name).ok_or_else(|| {
            RhiError::Buffer(format!("No uniform set named '{}'", name))
        })?;

        let buffer = set.buffers.get(frame_slot).ok_or_else(|| {
            RhiError::Buffer(format!(
                "Frame slot {} out of range for uniform set '{}' ({} slots)",
                frame_slot,
                name,
                set.buffers.len()
            ))
        })?;

        buffer.write_pod(value)
    }

    /// Returns the per-slot buffers of a uniform set, in slot order.
    ///
    /// The returned list's length equals the frame-slot count, matching
    /// what the descriptor layer's bind helpers expect.
    pub fn uniform_buffers(&self, name: &str) -> Option<Vec<&Buffer>> {
        self.uniforms
            .get(name)
            .map(|set| set.buffers.iter().collect())
    }

    /// Destroys a uniform set, freeing its per-slot buffers.
    ///
    /// Returns whether the name was registered.
    pub fn destroy_uniforms(&mut self, name: &str) -> bool {
        let removed = self.uniforms.remove(name).is_some();
        if removed {
            debug!("Destroyed uniform set '{}'", name);
        }
        removed
    }

    // =========================================================================
    // Framebuffers
    // =========================================================================

    /// Registers a framebuffer set under `name`.
    ///
    /// An existing set with the same name is destroyed first. The renderer
    /// stores its per-swapchain-image framebuffers here and replaces them
    /// on every recreation.
    pub fn insert_framebuffers(&mut self, name: &str, framebuffers: Vec<Framebuffer>) {
        self.framebuffers.remove(name);
        debug!(
            "Registered framebuffer set '{}' ({} framebuffer(s))",
            name,
            framebuffers.len()
        );
        self.framebuffers.insert(name.to_string(), framebuffers);
    }

    /// Looks up a framebuffer set by name.
    pub fn framebuffers(&self, name: &str) -> Option<&[Framebuffer]> {
        self.framebuffers.get(name).map(|fbs| fbs.as_slice())
    }

    /// Destroys a framebuffer set.
    ///
    /// Returns whether the name was registered.
    pub fn remove_framebuffers(&mut self, name: &str) -> bool {
        let removed = self.framebuffers.remove(name).is_some();
        if removed {
            debug!("Destroyed framebuffer set '{}'", name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records its construction and destruction into a shared log.
    struct Tracked {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Tracked {
        fn new(log: Rc<RefCell<Vec<&'static str>>>) -> Self {
            log.borrow_mut().push("build");
            Self { log }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.borrow_mut().push("drop");
        }
    }

    #[test]
    fn test_replace_drops_old_before_building_new() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map: BTreeMap<String, Tracked> = BTreeMap::new();

        replace_with(&mut map, "a", || {
            Ok::<_, ()>(Tracked::new(log.clone()))
        })
        .unwrap();
        assert_eq!(*log.borrow(), vec!["build"]);

        // Replacing must drop the old owner before the new one is built
        replace_with(&mut map, "a", || {
            Ok::<_, ()>(Tracked::new(log.clone()))
        })
        .unwrap();
        assert_eq!(*log.borrow(), vec!["build", "drop", "build"]);

        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_replace_failed_build_leaves_name_unregistered() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map: BTreeMap<String, Tracked> = BTreeMap::new();

        replace_with(&mut map, "a", || {
            Ok::<_, ()>(Tracked::new(log.clone()))
        })
        .unwrap();

        // The old entry is gone even when the rebuild fails; a name never
        // refers to a half-built resource
        let result = replace_with(&mut map, "a", || Err::<Tracked, _>(()));
        assert!(result.is_err());
        assert!(map.is_empty());
        assert_eq!(*log.borrow(), vec!["build", "drop"]);
    }
}
