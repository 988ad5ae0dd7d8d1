//! The per-leaf record: a `ClientLeaf_t` translation. Leaf membership itself
//! (renderables-in-leaf, shadows-in-leaf) lives in the orchestrator's
//! `BidirectionalSet`s, keyed directly by leaf index; this struct only
//! carries what doesn't fit that shape -- the detail-prop slice and the
//! leaf's small per-subsystem extension-point map.

use std::any::Any;

/// Number of opaque per-subsystem data slots a leaf can carry. The original
/// sizes this to the number of registered `IClientLeafSystem` consumers;
/// this crate has no consumer registry, so a small fixed count stands in.
pub const N_LEAF_SUBSYSTEMS: usize = 2;

/// The subsystem slot the detail-object system uses to flag a leaf as
/// populated even when its detail-prop count is currently zero.
pub const DETAIL_OBJECTS_SUBSYSTEM_SLOT: usize = 0;

#[derive(Default)]
pub struct DetailSlice {
    pub first: i32,
    pub count: i32,
    /// The detail-build frame this slice was populated for. The render-list
    /// builder only folds detail props in when this matches the current
    /// build frame.
    pub last_render_frame: u32,
}

pub struct LeafRecord {
    pub detail: DetailSlice,
    subsystem_data: [Option<Box<dyn Any + Send + Sync>>; N_LEAF_SUBSYSTEMS],
}

impl LeafRecord {
    pub fn new() -> Self {
        LeafRecord {
            detail: DetailSlice::default(),
            subsystem_data: Default::default(),
        }
    }

    pub fn set_subsystem_data<T: Any + Send + Sync>(&mut self, slot: usize, data: T) {
        self.subsystem_data[slot] = Some(Box::new(data));
    }

    pub fn clear_subsystem_data(&mut self, slot: usize) {
        self.subsystem_data[slot] = None;
    }

    pub fn subsystem_data<T: Any + Send + Sync>(&self, slot: usize) -> Option<&T> {
        self.subsystem_data[slot]
            .as_ref()
            .and_then(|data| data.downcast_ref::<T>())
    }

    pub fn has_subsystem_data(&self, slot: usize) -> bool {
        self.subsystem_data[slot].is_some()
    }

    /// `SetDetailObjectsInLeaf`: populates the slice. Does not by itself
    /// make the leaf eligible for folding into a render list -- that also
    /// needs a `draw_detail_objects` stamp for the current build frame.
    pub fn set_detail_objects(&mut self, first: i32, count: i32) {
        self.detail.first = first;
        self.detail.count = count;
    }

    /// `GetDetailObjectsInLeaf`.
    pub fn detail_objects(&self) -> (i32, i32) {
        (self.detail.first, self.detail.count)
    }

    /// `DrawDetailObjectsInLeaf`: stamps this leaf as considered for the
    /// given build frame and hands back its current slice.
    pub fn draw_detail_objects(&mut self, frame_number: u32) -> (i32, i32) {
        self.detail.last_render_frame = frame_number;
        self.detail_objects()
    }
}

impl Default for LeafRecord {
    fn default() -> Self {
        Self::new()
    }
}
