//! `AddShadow`/`ProjectShadow`/`ProjectFlashlight`/`AddShadowToLeaf`/
//! `AddShadowToRenderable`/`EnumerateShadowsInLeaves`: attaching and
//! detaching projected shadows across the leaves they touch, with the
//! at-most-once-per-receiver guarantee enforced by the shadow enum counter.
//!
//! Grounded on the identically-named methods in the original.

use crate::bidir_set::BidirectionalSet;
use crate::external::ShadowManager;
use crate::handle::{HandleTable, RenderHandle, ShadowHandle};
use crate::leaf_system::renderable::RenderableInfo;
use crate::leaf_system::shadow::ShadowInfo;

/// `AddShadowToRenderable(r, s)`. Rejects renderables whose model kind
/// can't receive shadows or that don't accept this shadow's projection-type
/// flags; otherwise records the attachment and notifies the shadow manager.
pub fn add_shadow_to_renderable(
    shadow_handle: ShadowHandle,
    shadow_flags_bits: u32,
    external_shadow_id: u32,
    renderable_handle: RenderHandle,
    renderable_info: &RenderableInfo,
    shadows_on_renderable: &mut BidirectionalSet<RenderHandle, ShadowHandle>,
    shadow_manager: &dyn ShadowManager,
) -> bool {
    let receiver_kind = match renderable_info.receiver_kind() {
        Some(kind) => kind,
        None => return false,
    };
    if !renderable_info.caps.should_receive_projected_textures(shadow_flags_bits) {
        return false;
    }

    shadows_on_renderable.add_element_to_bucket(renderable_handle, shadow_handle);
    shadow_manager.add_shadow_to_receiver(external_shadow_id, renderable_info.caps.clone(), receiver_kind);
    true
}

/// `AddShadowToLeaf(leaf, s)`. Inserts `s` into the leaf, then walks every
/// renderable currently in the leaf, attaching the shadow to each one that
/// hasn't already been stamped with the current enum value.
pub fn add_shadow_to_leaf(
    leaf: usize,
    shadow_handle: ShadowHandle,
    shadow_enum: u64,
    shadows_in_leaf: &mut BidirectionalSet<usize, ShadowHandle>,
    renderables_in_leaf: &BidirectionalSet<usize, RenderHandle>,
    shadows: &HandleTable<ShadowHandle, ShadowInfo>,
    renderables: &mut HandleTable<RenderHandle, RenderableInfo>,
    shadows_on_renderable: &mut BidirectionalSet<RenderHandle, ShadowHandle>,
    shadow_manager: &dyn ShadowManager,
) {
    shadows_in_leaf.add_element_to_bucket(leaf, shadow_handle);

    let shadow_info = match shadows.get(shadow_handle) {
        Some(info) => info,
        None => return,
    };
    let flags_bits = shadow_info.flags.bits();
    let external_id = shadow_info.external_id;

    let renderable_handles: Vec<RenderHandle> = renderables_in_leaf.elements_in_bucket(leaf).collect();
    for renderable_handle in renderable_handles {
        let info = match renderables.get_mut(renderable_handle) {
            Some(info) => info,
            None => continue,
        };
        if info.enum_count != shadow_enum {
            add_shadow_to_renderable(
                shadow_handle,
                flags_bits,
                external_id,
                renderable_handle,
                info,
                shadows_on_renderable,
                shadow_manager,
            );
            info.enum_count = shadow_enum;
        }
    }
}

/// `EnumerateShadowsInLeaves(leafList, visitor)`. Bumps the enum counter
/// once for the whole call, then yields each distinct shadow across all
/// listed leaves exactly once.
pub fn enumerate_shadows_in_leaves(
    leaves: &[usize],
    next_shadow_enum: u64,
    shadows_in_leaf: &BidirectionalSet<usize, ShadowHandle>,
    shadows: &mut HandleTable<ShadowHandle, ShadowInfo>,
    mut visit: impl FnMut(ShadowHandle),
) {
    if leaves.is_empty() {
        return;
    }
    for &leaf in leaves {
        let shadow_handles: Vec<ShadowHandle> = shadows_in_leaf.elements_in_bucket(leaf).collect();
        for shadow_handle in shadow_handles {
            if let Some(info) = shadows.get_mut(shadow_handle) {
                if info.enum_count != next_shadow_enum {
                    info.enum_count = next_shadow_enum;
                    visit(shadow_handle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{ModelKind, ReceiverKind, RenderableCaps};
    use crate::leaf_system::renderable::RenderGroup;
    use crate::leaf_system::shadow::ShadowFlags;
    use cgmath::Vector3;
    use std::sync::{Arc, Mutex};

    struct BrushCaps;
    impl RenderableCaps for BrushCaps {
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
            ModelKind::Brush
        }
        fn fx_blend(&self) -> u8 {
            255
        }
        fn compute_fx_blend(&self) -> u8 {
            255
        }
        fn should_receive_projected_textures(&self, _flags_mask: u32) -> bool {
            true
        }
        fn is_static_prop(&self) -> bool {
            false
        }
    }

    struct RecordingShadowManager {
        calls: Mutex<Vec<(u32, ReceiverKind)>>,
    }

    impl ShadowManager for RecordingShadowManager {
        fn add_shadow_to_receiver(&self, shadow: u32, _renderable: Arc<dyn RenderableCaps>, receiver_kind: ReceiverKind) {
            self.calls.lock().unwrap().push((shadow, receiver_kind));
        }
        fn remove_all_shadows_from_receiver(&self, _renderable: Arc<dyn RenderableCaps>, _receiver_kind: ReceiverKind) {}
    }

    #[test]
    fn receiver_straddling_two_leaves_is_attached_once() {
        let mut renderables_in_leaf: BidirectionalSet<usize, RenderHandle> = BidirectionalSet::new();
        let mut shadows_in_leaf: BidirectionalSet<usize, ShadowHandle> = BidirectionalSet::new();
        let mut shadows_on_renderable: BidirectionalSet<RenderHandle, ShadowHandle> = BidirectionalSet::new();
        let mut renderables: HandleTable<RenderHandle, RenderableInfo> = HandleTable::new();
        let mut shadows: HandleTable<ShadowHandle, ShadowInfo> = HandleTable::new();
        let manager = RecordingShadowManager { calls: Mutex::new(Vec::new()) };

        let r = renderables.insert(RenderableInfo::new(Arc::new(BrushCaps), RenderGroup::OpaqueEntity));
        let s = shadows.insert(ShadowInfo::new(42, ShadowFlags::SHADOW));

        renderables_in_leaf.add_element_to_bucket(3, r);
        renderables_in_leaf.add_element_to_bucket(5, r);

        let shadow_enum = 1;
        for leaf in [3usize, 5] {
            add_shadow_to_leaf(
                leaf,
                s,
                shadow_enum,
                &mut shadows_in_leaf,
                &renderables_in_leaf,
                &shadows,
                &mut renderables,
                &mut shadows_on_renderable,
                &manager,
            );
        }

        let receivers: Vec<_> = shadows_on_renderable.elements_in_bucket(r).collect();
        assert_eq!(receivers, vec![s]);
        assert_eq!(manager.calls.lock().unwrap().len(), 1);
    }
}
