//! The dirty-renderables queue and the `RenderableChanged` change
//! notification. Grounded on `m_DirtyRenderables`/`m_DirtyRenderablesMutex`
//! and `RenderableChanged` in the original.

use crate::handle::RenderHandle;
use crate::leaf_system::renderable::{RenderFlags, RenderableInfo};
use parking_lot::Mutex;

/// Guarded by a single mutex, exactly as the original guards
/// `m_DirtyRenderables` -- `RenderableChanged` and the recompute pass's
/// drain both acquire it.
pub struct DirtyQueue {
    queue: Mutex<Vec<RenderHandle>>,
}

impl DirtyQueue {
    pub fn new() -> Self {
        DirtyQueue {
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, handle: RenderHandle) {
        self.queue.lock().push(handle);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: RenderHandle) -> bool {
        self.queue.lock().contains(&handle)
    }

    /// Remove and return the first `n` entries (FIFO), leaving any entries
    /// appended during processing at the front of what remains.
    pub fn drain_front(&self, n: usize) -> Vec<RenderHandle> {
        let mut guard = self.queue.lock();
        let n = n.min(guard.len());
        guard.drain(0..n).collect()
    }

    /// `RemoveRenderable`'s linear-search removal of a single handle that's
    /// going away before the dirty loop ever gets to it.
    pub fn remove(&self, handle: RenderHandle) {
        self.queue.lock().retain(|&h| h != handle);
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

impl Default for DirtyQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// `RenderableChanged(h)`. `currently_processing` is the set of handles the
/// main thread is mid-recompute for in this call stack; a renderable
/// changing itself (or another handle) while already marked dirty and while
/// a recompute pass is underway is logged, not corrected -- correcting it
/// would require undoing work already committed this pass.
pub fn renderable_changed(
    info: &mut RenderableInfo,
    handle: RenderHandle,
    queue: &DirtyQueue,
    recompute_in_progress: bool,
) {
    if !info.flags.contains(RenderFlags::HAS_CHANGED) {
        info.flags.remove(RenderFlags::BOUNDS_VALID);
        info.flags.insert(RenderFlags::HAS_CHANGED);
        queue.push(handle);
    } else if recompute_in_progress {
        log::warn!(
            "re-entrant RenderableChanged({:?}) during RecomputeRenderableLeaves",
            handle
        );
    } else {
        debug_assert!(queue.contains(handle), "HasChanged set but handle missing from dirty queue");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{ModelKind, RenderableCaps};
    use crate::handle::DomainKey;
    use crate::leaf_system::renderable::RenderGroup;
    use cgmath::Vector3;
    use std::sync::Arc;

    struct StubCaps;
    impl RenderableCaps for StubCaps {
        fn render_bounds(&self) -> (Vector3<f32>, Vector3<f32>) {
            (Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        }
        fn render_bounds_worldspace(&self) -> (Vector3<f32>, Vector3<f32>) {
            (Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        }
        fn render_origin(&self) -> Vector3<f32> {
            Vector3::new(0.0, 0.0, 0.0)
        }
        fn render_angles(&self) -> Vector3<f32> {
            Vector3::new(0.0, 0.0, 0.0)
        }
        fn is_transparent(&self) -> bool {
            false
        }
        fn is_two_pass(&self) -> bool {
            false
        }
        fn model_kind(&self) -> ModelKind {
            ModelKind::None
        }
        fn fx_blend(&self) -> u8 {
            255
        }
        fn compute_fx_blend(&self) -> u8 {
            255
        }
        fn should_receive_projected_textures(&self, _flags_mask: u32) -> bool {
            false
        }
        fn is_static_prop(&self) -> bool {
            false
        }
    }

    #[test]
    fn two_consecutive_changes_produce_one_dirty_entry() {
        let queue = DirtyQueue::new();
        let mut info = RenderableInfo::new(Arc::new(StubCaps), RenderGroup::OpaqueEntity);
        let handle = RenderHandle::from_index(0);

        renderable_changed(&mut info, handle, &queue, false);
        renderable_changed(&mut info, handle, &queue, false);

        assert_eq!(queue.len(), 1);
        assert!(info.flags.contains(RenderFlags::HAS_CHANGED));
        assert!(!info.flags.contains(RenderFlags::BOUNDS_VALID));
    }
}
