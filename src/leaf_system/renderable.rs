//! The per-renderable record and its render-group/flag vocabulary.
//!
//! Grounded on `RenderableInfo_t` in the original, with the flag bitset
//! following `richter::server::world::entity::EntityFlags`'s binary-literal
//! `bitflags!` style.

use crate::external::{ReceiverKind, RenderableCaps};
use cgmath::Vector3;
use std::sync::Arc;

bitflags::bitflags! {
    #[derive(Default)]
    pub struct RenderFlags: u16 {
        const TWO_PASS          = 0b0000_0000_0000_0001;
        const STATIC_PROP       = 0b0000_0000_0000_0010;
        const BRUSH_MODEL       = 0b0000_0000_0000_0100;
        const STUDIO_MODEL      = 0b0000_0000_0000_1000;
        const HAS_CHANGED       = 0b0000_0000_0001_0000;
        const ALTERNATE_SORTING = 0b0000_0000_0010_0000;
        const BLOAT_BOUNDS      = 0b0000_0000_0100_0000;
        const BOUNDS_VALID      = 0b0000_0000_1000_0000;
        const DISABLE_RENDERING = 0b0000_0001_0000_0000;
    }
}

/// The internal render-group vocabulary. Size-bucketed opaque variants are
/// interleaved at a stride of two between the static and entity families so
/// `DetectBucketedRenderGroup`'s `base - (N_BUCKETS - 1 - index) * 2`
/// arithmetic lands on the right variant for either family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum RenderGroup {
    OpaqueStaticHuge = 0,
    OpaqueEntityHuge = 1,
    OpaqueStaticLarge = 2,
    OpaqueEntityLarge = 3,
    OpaqueStaticMedium = 4,
    OpaqueEntityMedium = 5,
    OpaqueStatic = 6,
    OpaqueEntity = 7,
    TranslucentEntity = 8,
    ViewModelOpaque = 9,
    ViewModelTranslucent = 10,
}

pub const RENDER_GROUP_COUNT: usize = 11;

impl RenderGroup {
    pub fn index(self) -> usize {
        self as i32 as usize
    }

    fn from_index(index: i32) -> RenderGroup {
        match index {
            0 => RenderGroup::OpaqueStaticHuge,
            1 => RenderGroup::OpaqueEntityHuge,
            2 => RenderGroup::OpaqueStaticLarge,
            3 => RenderGroup::OpaqueEntityLarge,
            4 => RenderGroup::OpaqueStaticMedium,
            5 => RenderGroup::OpaqueEntityMedium,
            6 => RenderGroup::OpaqueStatic,
            7 => RenderGroup::OpaqueEntity,
            8 => RenderGroup::TranslucentEntity,
            9 => RenderGroup::ViewModelOpaque,
            10 => RenderGroup::ViewModelTranslucent,
            other => panic!("invalid render group index {}", other),
        }
    }

    pub fn is_opaque(self) -> bool {
        !matches!(self, RenderGroup::TranslucentEntity | RenderGroup::ViewModelTranslucent)
    }

    pub fn is_translucent(self) -> bool {
        !self.is_opaque()
    }

    pub fn is_static(self) -> bool {
        matches!(
            self,
            RenderGroup::OpaqueStaticHuge
                | RenderGroup::OpaqueStaticLarge
                | RenderGroup::OpaqueStaticMedium
                | RenderGroup::OpaqueStatic
        )
    }

    pub fn is_view_model(self) -> bool {
        matches!(self, RenderGroup::ViewModelOpaque | RenderGroup::ViewModelTranslucent)
    }

    /// `base` must be `OpaqueStatic` or `OpaqueEntity`. `bucket_index` is
    /// `0` (huge) through `N_BUCKETS - 1` (smallest/unbucketed).
    pub fn bucketed(base: RenderGroup, bucket_index: usize, n_buckets: usize) -> RenderGroup {
        debug_assert!(matches!(base, RenderGroup::OpaqueStatic | RenderGroup::OpaqueEntity));
        let shift = ((n_buckets - 1 - bucket_index) as i32) * 2;
        RenderGroup::from_index(base as i32 - shift)
    }
}

/// What a caller asks for when first registering a renderable. `TwoPass` is
/// a virtual request: the original remaps it to `TranslucentEntity` plus the
/// `TwoPass` flag immediately, rather than storing it as a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderGroupRequest {
    OpaqueStatic,
    OpaqueEntity,
    TranslucentEntity,
    TwoPass,
    ViewModelOpaque,
    ViewModelTranslucent,
}

impl RenderGroupRequest {
    pub fn resolve(self) -> (RenderGroup, bool) {
        match self {
            RenderGroupRequest::OpaqueStatic => (RenderGroup::OpaqueStatic, false),
            RenderGroupRequest::OpaqueEntity => (RenderGroup::OpaqueEntity, false),
            RenderGroupRequest::TranslucentEntity => (RenderGroup::TranslucentEntity, false),
            RenderGroupRequest::TwoPass => (RenderGroup::TranslucentEntity, true),
            RenderGroupRequest::ViewModelOpaque => (RenderGroup::ViewModelOpaque, false),
            RenderGroupRequest::ViewModelTranslucent => (RenderGroup::ViewModelTranslucent, false),
        }
    }
}

pub struct RenderableInfo {
    pub caps: Arc<dyn RenderableCaps>,

    pub render_frame: u32,
    pub render_frame2: u32,
    pub enum_count: u64,
    pub translucency_calculated_frame: u32,
    pub translucency_calculated_view: u32,
    pub cached_fx_blend: u8,

    pub flags: RenderFlags,
    pub render_group: RenderGroup,

    /// BSP area index, or `-1` if the renderable's leaves span more than one.
    pub area: i32,

    pub abs_mins: Vector3<f32>,
    pub abs_maxs: Vector3<f32>,
    pub bloated_abs_mins: Vector3<f32>,
    pub bloated_abs_maxs: Vector3<f32>,
    pub pending_bloated_abs_mins: Vector3<f32>,
    pub pending_bloated_abs_maxs: Vector3<f32>,

    /// The leaf chosen for translucent sorting this frame, or `None` if the
    /// renderable has no leaf membership.
    pub render_leaf: Option<usize>,
}

impl RenderableInfo {
    pub fn new(caps: Arc<dyn RenderableCaps>, render_group: RenderGroup) -> Self {
        let mut flags = RenderFlags::empty();
        match caps.model_kind() {
            crate::external::ModelKind::Brush => flags |= RenderFlags::BRUSH_MODEL,
            crate::external::ModelKind::Studio => flags |= RenderFlags::STUDIO_MODEL,
            _ => {}
        }
        if caps.is_static_prop() {
            flags |= RenderFlags::STATIC_PROP;
        }

        RenderableInfo {
            caps,
            render_frame: 0,
            render_frame2: 0,
            enum_count: 0,
            translucency_calculated_frame: 0,
            translucency_calculated_view: 0,
            cached_fx_blend: 255,
            flags,
            render_group,
            area: -1,
            abs_mins: Vector3::new(0.0, 0.0, 0.0),
            abs_maxs: Vector3::new(0.0, 0.0, 0.0),
            bloated_abs_mins: Vector3::new(0.0, 0.0, 0.0),
            bloated_abs_maxs: Vector3::new(0.0, 0.0, 0.0),
            pending_bloated_abs_mins: Vector3::new(0.0, 0.0, 0.0),
            pending_bloated_abs_maxs: Vector3::new(0.0, 0.0, 0.0),
            render_leaf: None,
        }
    }

    pub fn can_receive_shadows(&self) -> bool {
        self.receiver_kind().is_some()
    }

    /// Brush is checked before static-prop, before plain studio: a static
    /// prop's underlying model is always a studio model, so the more
    /// specific flag has to win or every static prop would classify as a
    /// generic studio receiver.
    pub fn receiver_kind(&self) -> Option<ReceiverKind> {
        if self.flags.contains(RenderFlags::BRUSH_MODEL) {
            Some(ReceiverKind::Brush)
        } else if self.flags.contains(RenderFlags::STATIC_PROP) {
            Some(ReceiverKind::StaticProp)
        } else if self.flags.contains(RenderFlags::STUDIO_MODEL) {
            Some(ReceiverKind::Studio)
        } else {
            None
        }
    }

    pub fn world_dimension(&self) -> f32 {
        let delta = self.abs_maxs - self.abs_mins;
        delta.x.abs().max(delta.y.abs()).max(delta.z.abs())
    }
}
