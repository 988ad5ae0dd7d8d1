//! BSP leaf enumeration for a renderable's bloated AABB, and the deferred
//! list a worker thread hands back to the main thread when enumeration
//! happens off the main thread.
//!
//! Grounded on `InsertIntoTree`/`EnumerateLeaf` and the
//! `CTSList<EnumResultList_t> m_DeferredInserts` member in the original.
//! The original builds a singly-linked list of `EnumResult_t` nodes per
//! call and pushes the whole list onto a lock-free stack; this translation
//! collects a `Vec<usize>` instead (no reason to hand-roll a linked list in
//! Rust) and pushes that onto a `crossbeam_queue::SegQueue`.

use crate::external::BspQuery;
use crate::handle::RenderHandle;
use cgmath::Vector3;

/// One renderable's freshly-enumerated leaf list, queued by a worker thread
/// for the main thread to drain and attach serially.
pub struct DeferredInsert {
    pub handle: RenderHandle,
    pub leaves: Vec<usize>,
}

/// Enumerate every leaf intersecting `[min, max]`. Used both for immediate
/// (main-thread) attachment and for the parallel re-insertion path, where
/// the caller defers attachment instead of doing it inline.
pub fn collect_leaves_in_box(bsp: &dyn BspQuery, min: Vector3<f32>, max: Vector3<f32>) -> Vec<usize> {
    let mut leaves = Vec::new();
    bsp.enumerate_leaves_in_box(min, max, &mut |leaf| leaves.push(leaf));
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLeaves(Vec<usize>);

    impl BspQuery for FixedLeaves {
        fn enumerate_leaves_in_box(&self, _min: Vector3<f32>, _max: Vector3<f32>, visit: &mut dyn FnMut(usize)) {
            for &leaf in &self.0 {
                visit(leaf);
            }
        }
    }

    #[test]
    fn collects_in_visitor_order() {
        let bsp = FixedLeaves(vec![3, 5, 7]);
        let leaves = collect_leaves_in_box(&bsp, Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(leaves, vec![3, 5, 7]);
    }
}
