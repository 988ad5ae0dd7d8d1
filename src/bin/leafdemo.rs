//! A minimal end-to-end exercise of the leaf system: a toy BSP that buckets
//! space into 32-unit grid cells as "leaves", a handful of renderables, and
//! one full register -> compute-bounds -> recompute -> build-list cycle.

use cgmath::{InnerSpace, Vector3};
use leafsys::{
    BspQuery, ClientLeafSystem, DetailObjectSystem, EngineQueries, ModelKind, ReceiverKind, RenderGroupRequest, RenderableCaps,
    SetupRenderInfo, ShadowManager,
};
use std::sync::{Arc, Mutex};

/// Buckets world space into a flat grid of 32-unit cells, each one a leaf.
struct GridBsp {
    cell_size: f32,
    cells_per_axis: usize,
}

impl GridBsp {
    fn leaf_for_cell(&self, x: i64, y: i64, z: i64) -> usize {
        let wrap = |v: i64| v.rem_euclid(self.cells_per_axis as i64) as usize;
        (wrap(z) * self.cells_per_axis + wrap(y)) * self.cells_per_axis + wrap(x)
    }
}

impl BspQuery for GridBsp {
    fn enumerate_leaves_in_box(&self, min: Vector3<f32>, max: Vector3<f32>, visit: &mut dyn FnMut(usize)) {
        let to_cell = |v: f32| (v / self.cell_size).floor() as i64;
        for z in to_cell(min.z)..=to_cell(max.z) {
            for y in to_cell(min.y)..=to_cell(max.y) {
                for x in to_cell(min.x)..=to_cell(max.x) {
                    visit(self.leaf_for_cell(x, y, z));
                }
            }
        }
    }
}

struct DemoEngine {
    leaf_count: usize,
}

impl EngineQueries for DemoEngine {
    fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    fn cull_box(&self, _min: Vector3<f32>, _max: Vector3<f32>) -> bool {
        false
    }

    fn is_occluded(&self, _min: Vector3<f32>, _max: Vector3<f32>) -> bool {
        false
    }

    fn does_box_touch_area_frustum(&self, _min: Vector3<f32>, _max: Vector3<f32>, _area: i32) -> bool {
        true
    }

    fn get_leaves_area(&self, leaves: &[usize]) -> i32 {
        if leaves.len() == 1 {
            leaves[0] as i32
        } else {
            -1
        }
    }

    fn are_any_leaves_visible(&self, leaves: &[usize]) -> bool {
        !leaves.is_empty()
    }
}

struct NullShadowManager {
    attachments: Mutex<usize>,
}

impl ShadowManager for NullShadowManager {
    fn add_shadow_to_receiver(&self, _shadow: u32, _renderable: Arc<dyn RenderableCaps>, _receiver_kind: ReceiverKind) {
        *self.attachments.lock().unwrap() += 1;
    }

    fn remove_all_shadows_from_receiver(&self, _renderable: Arc<dyn RenderableCaps>, _receiver_kind: ReceiverKind) {}
}

struct NoDetailObjects;

impl DetailObjectSystem for NoDetailObjects {
    fn get_detail_model(&self, _index: u32) -> Option<Arc<dyn RenderableCaps>> {
        None
    }
}

struct Prop {
    origin: Vector3<f32>,
    half_extent: f32,
    translucent: bool,
}

impl RenderableCaps for Prop {
    fn render_bounds(&self) -> (Vector3<f32>, Vector3<f32>) {
        let h = Vector3::new(self.half_extent, self.half_extent, self.half_extent);
        (-h, h)
    }

    fn render_bounds_worldspace(&self) -> (Vector3<f32>, Vector3<f32>) {
        let (min, max) = self.render_bounds();
        (min + self.origin, max + self.origin)
    }

    fn render_origin(&self) -> Vector3<f32> {
        self.origin
    }

    fn render_angles(&self) -> Vector3<f32> {
        Vector3::new(0.0, 0.0, 0.0)
    }

    fn is_transparent(&self) -> bool {
        self.translucent
    }

    fn is_two_pass(&self) -> bool {
        false
    }

    fn model_kind(&self) -> ModelKind {
        ModelKind::Studio
    }

    fn fx_blend(&self) -> u8 {
        if self.translucent {
            180
        } else {
            255
        }
    }

    fn compute_fx_blend(&self) -> u8 {
        self.fx_blend()
    }

    fn should_receive_projected_textures(&self, _flags_mask: u32) -> bool {
        true
    }

    fn is_static_prop(&self) -> bool {
        false
    }
}

fn main() {
    env_logger::init();

    let bsp = Arc::new(GridBsp {
        cell_size: 32.0,
        cells_per_axis: 16,
    });
    let engine = Arc::new(DemoEngine { leaf_count: 16 * 16 * 16 });
    let shadow_manager = Arc::new(NullShadowManager { attachments: Mutex::new(0) });
    let detail_objects = Arc::new(NoDetailObjects);

    let mut leafsys = ClientLeafSystem::new(bsp, engine, shadow_manager.clone(), detail_objects);
    leafsys.level_init_pre_entity();

    let opaque = Arc::new(Prop {
        origin: Vector3::new(10.0, 10.0, 10.0),
        half_extent: 8.0,
        translucent: false,
    });
    let glass = Arc::new(Prop {
        origin: Vector3::new(12.0, 10.0, 10.0),
        half_extent: 4.0,
        translucent: true,
    });

    let opaque_handle = leafsys.add_renderable(opaque, RenderGroupRequest::OpaqueEntity);
    let _glass_handle = leafsys.add_renderable(glass, RenderGroupRequest::TranslucentEntity);

    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    let leaves = leafsys.get_renderable_leaves(opaque_handle).unwrap_or_default();
    println!("opaque prop occupies {} leaf cell(s)", leaves.len());

    leafsys.begin_frame();
    leafsys.compute_translucent_render_leaf(&leaves, 1, 0);

    let info = SetupRenderInfo {
        visible_leaves: &leaves,
        render_origin: Vector3::new(0.0, 0.0, 0.0),
        render_forward: Vector3::new(1.0, 0.0, 0.0).normalize(),
        render_frame: 1,
        detail_build_frame: 1,
        draw_translucent: true,
        draw_detail: true,
        draw_static_props: leafsys.draw_static_props_enabled(),
        portal_test_ents: false,
    };

    let mut lists = leafsys.new_render_lists();
    leafsys.build_renderables_list(&info, &mut lists);

    println!(
        "opaque entities: {}, translucent entities: {}",
        lists.group(leafsys::RenderGroup::OpaqueEntity).len(),
        lists.group(leafsys::RenderGroup::TranslucentEntity).len(),
    );
}
