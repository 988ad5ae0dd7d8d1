//! End-to-end scenarios against the public `ClientLeafSystem` surface: one
//! test per literal scenario.

use cgmath::Vector3;
use leafsys::{
    BspQuery, ClientLeafSystem, DetailObjectSystem, EngineQueries, ModelKind, ReceiverKind, RenderFlags, RenderGroup, RenderGroupRequest,
    RenderableCaps, SetupRenderInfo, ShadowFlags, ShadowManager,
};
use std::sync::{Arc, Mutex};

/// A fixed table of named leaf boxes; `enumerate_leaves_in_box` reports
/// every leaf whose box overlaps the query.
struct LeafTable {
    boxes: Vec<(usize, Vector3<f32>, Vector3<f32>)>,
}

impl BspQuery for LeafTable {
    fn enumerate_leaves_in_box(&self, min: Vector3<f32>, max: Vector3<f32>, visit: &mut dyn FnMut(usize)) {
        for &(leaf, lmin, lmax) in &self.boxes {
            let overlaps = min.x <= lmax.x && max.x >= lmin.x && min.y <= lmax.y && max.y >= lmin.y && min.z <= lmax.z && max.z >= lmin.z;
            if overlaps {
                visit(leaf);
            }
        }
    }
}

struct TestEngine {
    leaf_count: usize,
}

impl EngineQueries for TestEngine {
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

struct RecordingShadowManager {
    calls: Mutex<Vec<(u32, ReceiverKind)>>,
}

impl RecordingShadowManager {
    fn new() -> Self {
        RecordingShadowManager { calls: Mutex::new(Vec::new()) }
    }
}

impl ShadowManager for RecordingShadowManager {
    fn add_shadow_to_receiver(&self, shadow: u32, _renderable: Arc<dyn RenderableCaps>, receiver_kind: ReceiverKind) {
        self.calls.lock().unwrap().push((shadow, receiver_kind));
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
    origin: Mutex<Vector3<f32>>,
    half_extent: f32,
    transparent: bool,
    two_pass: bool,
    alpha: Mutex<u8>,
    static_prop: bool,
}

impl Prop {
    fn at(origin: Vector3<f32>, half_extent: f32) -> Self {
        Prop {
            origin: Mutex::new(origin),
            half_extent,
            transparent: false,
            two_pass: false,
            alpha: Mutex::new(255),
            static_prop: false,
        }
    }

    fn move_by(&self, delta: Vector3<f32>) {
        *self.origin.lock().unwrap() += delta;
    }
}

impl RenderableCaps for Prop {
    fn render_bounds(&self) -> (Vector3<f32>, Vector3<f32>) {
        let h = Vector3::new(self.half_extent, self.half_extent, self.half_extent);
        (-h, h)
    }
    fn render_bounds_worldspace(&self) -> (Vector3<f32>, Vector3<f32>) {
        let (min, max) = self.render_bounds();
        let origin = *self.origin.lock().unwrap();
        (min + origin, max + origin)
    }
    fn render_origin(&self) -> Vector3<f32> {
        *self.origin.lock().unwrap()
    }
    fn render_angles(&self) -> Vector3<f32> {
        Vector3::new(0.0, 0.0, 0.0)
    }
    fn is_transparent(&self) -> bool {
        self.transparent
    }
    fn is_two_pass(&self) -> bool {
        self.two_pass
    }
    fn model_kind(&self) -> ModelKind {
        ModelKind::Studio
    }
    fn fx_blend(&self) -> u8 {
        *self.alpha.lock().unwrap()
    }
    fn compute_fx_blend(&self) -> u8 {
        self.fx_blend()
    }
    fn should_receive_projected_textures(&self, _flags_mask: u32) -> bool {
        true
    }
    fn is_static_prop(&self) -> bool {
        self.static_prop
    }
}

fn harness(boxes: Vec<(usize, Vector3<f32>, Vector3<f32>)>, leaf_count: usize) -> (ClientLeafSystem, Arc<RecordingShadowManager>) {
    let bsp = Arc::new(LeafTable { boxes });
    let engine = Arc::new(TestEngine { leaf_count });
    let shadow_manager = Arc::new(RecordingShadowManager::new());
    let detail_objects = Arc::new(NoDetailObjects);

    let mut leafsys = ClientLeafSystem::new(bsp, engine, shadow_manager.clone(), detail_objects);
    leafsys.level_init_pre_entity();
    (leafsys, shadow_manager)
}

#[test]
fn static_prop_in_one_leaf() {
    let (mut leafsys, _manager) = harness(vec![(7, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0))], 8);

    let prop = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let handle = leafsys.create_renderable_handle(prop, true);
    leafsys.renderable_changed(handle);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    let leaves = leafsys.get_renderable_leaves(handle).unwrap();
    assert_eq!(leaves, vec![7]);
}

#[test]
fn moving_object_crosses_a_portal() {
    let (mut leafsys, manager) = harness(
        vec![
            (3, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(40.0, 1000.0, 1000.0)),
            (5, Vector3::new(40.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0)),
        ],
        8,
    );

    let prop = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let handle = leafsys.add_renderable(prop.clone(), RenderGroupRequest::OpaqueEntity);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();
    assert_eq!(leafsys.get_renderable_leaves(handle).unwrap(), vec![3]);

    let shadow = leafsys.add_shadow(99, ShadowFlags::SHADOW);
    leafsys.project_shadow(shadow, &[3, 5]);
    assert_eq!(manager.calls.lock().unwrap().len(), 1);

    prop.move_by(Vector3::new(64.0, 0.0, 0.0));
    leafsys.renderable_changed(handle);
    leafsys.recompute_renderable_leaves();

    let mut leaves = leafsys.get_renderable_leaves(handle).unwrap();
    leaves.sort();
    assert_eq!(leaves, vec![3, 5]);

    leafsys.project_shadow(shadow, &leaves);
    assert_eq!(manager.calls.lock().unwrap().len(), 2);
}

#[test]
fn translucent_on_leaf_boundary_with_alternate_sorting() {
    let (mut leafsys, _manager) = harness(
        vec![
            (3, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0)),
            (5, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0)),
            (7, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0)),
        ],
        8,
    );

    let mut prop = Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0);
    prop.transparent = true;
    let prop = Arc::new(prop);
    let handle = leafsys.add_renderable(prop, RenderGroupRequest::TranslucentEntity);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    let visible = vec![3usize, 5, 7];
    let info = SetupRenderInfo {
        visible_leaves: &visible,
        render_origin: Vector3::new(0.0, 0.0, 0.0),
        render_forward: Vector3::new(1.0, 0.0, 0.0),
        render_frame: 1,
        detail_build_frame: 1,
        draw_translucent: true,
        draw_detail: false,
        draw_static_props: true,
        portal_test_ents: false,
    };

    leafsys.compute_translucent_render_leaf(&visible, 1, 0);
    let mut lists = leafsys.new_render_lists();
    leafsys.build_renderables_list(&info, &mut lists);
    let translucent: Vec<_> = lists.group(RenderGroup::TranslucentEntity).iter().filter(|e| e.handle == Some(handle)).collect();
    assert_eq!(translucent.len(), 1);
    assert_eq!(translucent[0].world_list_leaf_index, 0); // leaf 3, default sorting

    leafsys.enable_alternate_sorting(handle, true);
    leafsys.compute_translucent_render_leaf(&visible, 2, 0);
    let mut lists = leafsys.new_render_lists();
    let info = SetupRenderInfo { render_frame: 2, ..info };
    leafsys.build_renderables_list(&info, &mut lists);
    let translucent: Vec<_> = lists.group(RenderGroup::TranslucentEntity).iter().filter(|e| e.handle == Some(handle)).collect();
    assert_eq!(translucent.len(), 1);
    assert_eq!(translucent[0].world_list_leaf_index, 2); // leaf 7, alternate sorting
}

#[test]
fn two_pass_translucent_static_prop_alpha_255() {
    let (mut leafsys, _manager) = harness(vec![(7, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0))], 8);

    let mut prop = Prop::at(Vector3::new(0.0, 0.0, 0.0), 110.0);
    prop.transparent = true;
    prop.two_pass = true;
    prop.static_prop = true;
    let prop = Arc::new(prop);
    let handle = leafsys.create_renderable_handle(prop, true);
    leafsys.renderable_changed(handle);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    let visible = vec![7usize];
    let info = SetupRenderInfo {
        visible_leaves: &visible,
        render_origin: Vector3::new(0.0, 0.0, 0.0),
        render_forward: Vector3::new(1.0, 0.0, 0.0),
        render_frame: 1,
        detail_build_frame: 1,
        draw_translucent: true,
        draw_detail: false,
        draw_static_props: true,
        portal_test_ents: false,
    };
    leafsys.compute_translucent_render_leaf(&visible, 1, 0);
    let mut lists = leafsys.new_render_lists();
    leafsys.build_renderables_list(&info, &mut lists);

    let translucent_hits = lists.group(RenderGroup::TranslucentEntity).iter().filter(|e| e.handle == Some(handle)).count();
    assert_eq!(translucent_hits, 1);

    let huge_hits = lists.group(RenderGroup::OpaqueStaticHuge).iter().filter(|e| e.handle == Some(handle)).count();
    assert_eq!(huge_hits, 1);
}

#[test]
fn shadow_projected_onto_three_leaves_receiver_straddles_two() {
    let (mut leafsys, manager) = harness(
        vec![
            (3, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(0.0, 1000.0, 1000.0)),
            (5, Vector3::new(0.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0)),
            (7, Vector3::new(2000.0, -1000.0, -1000.0), Vector3::new(3000.0, 1000.0, 1000.0)),
        ],
        8,
    );

    let prop = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let handle = leafsys.add_renderable(prop, RenderGroupRequest::OpaqueEntity);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    let mut leaves = leafsys.get_renderable_leaves(handle).unwrap();
    leaves.sort();
    assert_eq!(leaves, vec![3, 5]);

    let shadow = leafsys.add_shadow(7, ShadowFlags::SHADOW);
    leafsys.project_shadow(shadow, &[3, 5, 7]);

    assert_eq!(manager.calls.lock().unwrap().len(), 1);
    assert_eq!(manager.calls.lock().unwrap()[0].0, 7);
}

#[test]
fn renderable_entering_leaf_with_two_distinct_shadows_receives_both() {
    let (mut leafsys, manager) = harness(vec![(3, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0))], 8);

    let shadow_a = leafsys.add_shadow(1, ShadowFlags::SHADOW);
    let shadow_b = leafsys.add_shadow(2, ShadowFlags::SHADOW);
    leafsys.project_shadow(shadow_a, &[3]);
    leafsys.project_shadow(shadow_b, &[3]);
    assert_eq!(manager.calls.lock().unwrap().len(), 0); // no receivers in the leaf yet

    let prop = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let handle = leafsys.add_renderable(prop, RenderGroupRequest::OpaqueEntity);
    leafsys.compute_all_bounds();
    leafsys.recompute_renderable_leaves();

    assert_eq!(leafsys.get_renderable_leaves(handle).unwrap(), vec![3]);

    let mut ids: Vec<u32> = manager.calls.lock().unwrap().iter().map(|&(id, _)| id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn dirty_loop_convergence() {
    let (mut leafsys, _manager) = harness(vec![(3, Vector3::new(-1000.0, -1000.0, -1000.0), Vector3::new(1000.0, 1000.0, 1000.0))], 8);

    let a = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let b = Arc::new(Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0));
    let handle_a = leafsys.add_renderable(a, RenderGroupRequest::OpaqueEntity);
    let handle_b = leafsys.add_renderable(b, RenderGroupRequest::OpaqueEntity);

    leafsys.compute_all_bounds();
    leafsys.renderable_changed(handle_b);
    leafsys.recompute_renderable_leaves();

    assert!(leafsys.get_renderable_leaves(handle_a).is_some());
    assert!(leafsys.get_renderable_leaves(handle_b).is_some());
}

#[test]
fn renderable_flags_track_model_kind() {
    let prop = Prop::at(Vector3::new(0.0, 0.0, 0.0), 10.0);
    assert_eq!(prop.model_kind(), ModelKind::Studio);
    assert!(!RenderFlags::BRUSH_MODEL.contains(RenderFlags::STUDIO_MODEL));
}
