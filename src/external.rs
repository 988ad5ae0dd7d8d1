//! Trait boundaries standing in for the abstract collaborators named in
//! spec.md §6: BSP construction/visibility, the renderer's frustum and
//! occlusion tests, model loading, and the shadow manager. The leaf system
//! only ever calls through these traits; it never constructs a BSP tree or
//! projects a shadow itself.

use cgmath::Vector3;
use std::sync::Arc;

/// What kind of model a renderable wraps. Drives the tagged-variant
/// dispatch spec.md §9 calls for instead of an inheritance hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    None,
    Brush,
    Studio,
    Sprite,
}

impl ModelKind {
    /// Brush, studio and static-prop renderables are the only valid shadow
    /// receivers (`AddShadowToRenderable`, `RemoveFromTree`).
    pub fn can_receive_shadows(self) -> bool {
        matches!(self, ModelKind::Brush | ModelKind::Studio)
    }
}

/// Drives BSP leaf enumeration for a world-space AABB. The only BSP
/// capability the leaf system needs.
pub trait BspQuery: Send + Sync {
    /// Invoke `visit` once per leaf whose volume intersects `[min, max]`.
    fn enumerate_leaves_in_box(
        &self,
        min: Vector3<f32>,
        max: Vector3<f32>,
        visit: &mut dyn FnMut(usize),
    );
}

/// Renderer-side queries: frustum/occlusion/area tests and level metadata.
pub trait EngineQueries: Send + Sync {
    fn leaf_count(&self) -> usize;
    fn cull_box(&self, min: Vector3<f32>, max: Vector3<f32>) -> bool;
    fn is_occluded(&self, min: Vector3<f32>, max: Vector3<f32>) -> bool;
    fn does_box_touch_area_frustum(&self, min: Vector3<f32>, max: Vector3<f32>, area: i32) -> bool;
    /// `-1` if the leaves span more than one area.
    fn get_leaves_area(&self, leaves: &[usize]) -> i32;
    fn are_any_leaves_visible(&self, leaves: &[usize]) -> bool;
}

/// Per-object capability surface. Stored as `Arc<dyn RenderableCaps>` so the
/// handle table can share ownership across the rayon fork-join batches used
/// by bounds recomputation -- see DESIGN.md's Open Question on ownership.
pub trait RenderableCaps: Send + Sync {
    /// Local-space render bounds.
    fn render_bounds(&self) -> (Vector3<f32>, Vector3<f32>);
    /// World-space render bounds, already accounting for origin/angles.
    fn render_bounds_worldspace(&self) -> (Vector3<f32>, Vector3<f32>);
    fn render_origin(&self) -> Vector3<f32>;
    fn render_angles(&self) -> Vector3<f32>;
    fn is_transparent(&self) -> bool;
    fn is_two_pass(&self) -> bool;
    fn model_kind(&self) -> ModelKind;
    /// Cached alpha from the most recent `compute_fx_blend`.
    fn fx_blend(&self) -> u8;
    /// Recompute and cache alpha for the current view; returns the new value.
    fn compute_fx_blend(&self) -> u8;
    /// Whether this renderable accepts shadows carrying `flags_mask`.
    fn should_receive_projected_textures(&self, flags_mask: u32) -> bool;
    /// Whether this renderable is a static prop (affects bounds-eager-compute
    /// and `DrawStaticProps` filtering).
    fn is_static_prop(&self) -> bool;
}

/// Distinguishes the three shadow-eligible receiver kinds. Separate from
/// `ModelKind` because a static prop is a studio model with a flag, not a
/// distinct model type, but the shadow manager treats it as its own
/// receiver kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverKind {
    Brush,
    Studio,
    StaticProp,
}

/// Per-receiver-kind shadow attachment, delegated entirely to the shadow
/// manager -- the leaf system only decides *which* receivers are eligible.
pub trait ShadowManager: Send + Sync {
    fn add_shadow_to_receiver(&self, shadow: u32, renderable: Arc<dyn RenderableCaps>, receiver_kind: ReceiverKind);
    fn remove_all_shadows_from_receiver(&self, renderable: Arc<dyn RenderableCaps>, receiver_kind: ReceiverKind);
}

/// The detail-object sub-system's storage, referenced only to resolve the
/// sentinel detail-prop handles folded into a leaf's render entries.
pub trait DetailObjectSystem: Send + Sync {
    fn get_detail_model(&self, index: u32) -> Option<Arc<dyn RenderableCaps>>;
}
