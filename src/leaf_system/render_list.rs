//! Per-view render-list assembly: translucent leaf assignment, culling,
//! occlusion, size bucketing, two-pass emission, detail-prop folding and
//! back-to-front sort.
//!
//! Grounded on `ComputeTranslucentRenderLeaf`, `CollateRenderablesInLeaf`,
//! `BuildRenderablesList`, `SortEntities`, `DetectBucketedRenderGroup` and
//! `CollateViewModelRenderables` in the original.

use crate::bidir_set::BidirectionalSet;
use crate::config::{LeafSystemConfig, N_BUCKETS};
use crate::external::{DetailObjectSystem, EngineQueries, RenderableCaps};
use crate::handle::{HandleTable, RenderHandle};
use crate::leaf_system::leaf::{LeafRecord, DETAIL_OBJECTS_SUBSYSTEM_SLOT};
use crate::leaf_system::renderable::{RenderFlags, RenderGroup, RenderableInfo, RENDER_GROUP_COUNT};
use cgmath::{InnerSpace, Vector3};
use std::sync::Arc;

/// One emitted render entry. Unlike the original's `CEntry`, which looks a
/// renderable's bounds back up through `m_RenderHandle` at sort time (a
/// sentinel handle for detail props that never round-trips through the
/// handle table), this denormalises the bounds needed for back-to-front
/// sorting directly into the entry -- see DESIGN.md.
#[derive(Clone)]
pub struct CEntry {
    /// `None` for the two per-leaf marker entries.
    pub renderable: Option<Arc<dyn RenderableCaps>>,
    pub world_list_leaf_index: usize,
    pub two_pass: bool,
    pub handle: Option<RenderHandle>,
    pub abs_mins: Vector3<f32>,
    pub abs_maxs: Vector3<f32>,
}

impl CEntry {
    fn marker(world_list_leaf_index: usize) -> Self {
        CEntry {
            renderable: None,
            world_list_leaf_index,
            two_pass: false,
            handle: None,
            abs_mins: Vector3::new(0.0, 0.0, 0.0),
            abs_maxs: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

/// The `RENDER_GROUP_COUNT` typed render-group buckets a view's
/// `BuildRenderablesList` pass emits into.
pub struct RenderLists {
    groups: Vec<Vec<CEntry>>,
    max_group_entities: usize,
}

impl RenderLists {
    pub fn new(max_group_entities: usize) -> Self {
        RenderLists {
            groups: (0..RENDER_GROUP_COUNT).map(|_| Vec::new()).collect(),
            max_group_entities,
        }
    }

    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.clear();
        }
    }

    pub fn group(&self, group: RenderGroup) -> &[CEntry] {
        &self.groups[group.index()]
    }

    fn push(&mut self, group: RenderGroup, entry: CEntry) {
        let bucket = &mut self.groups[group.index()];
        if bucket.len() < self.max_group_entities {
            bucket.push(entry);
        } else {
            log::warn!("overflowed render group {:?}", group.index());
        }
    }

    fn group_mut(&mut self, group: RenderGroup) -> &mut Vec<CEntry> {
        &mut self.groups[group.index()]
    }
}

/// Bucket index (0 = huge ... N_BUCKETS-1 = smallest/unbucketed) for a
/// world-space dimension against descending thresholds.
fn bucket_index_for_dimension(dimension: f32, thresholds: &[f32]) -> usize {
    for (i, &threshold) in thresholds.iter().enumerate() {
        if dimension >= threshold {
            return i;
        }
    }
    thresholds.len()
}

fn bucketed_opaque_group(base: RenderGroup, abs_mins: Vector3<f32>, abs_maxs: Vector3<f32>, config: &LeafSystemConfig) -> RenderGroup {
    let dims = abs_maxs - abs_mins;
    let dimension = dims.x.abs().max(dims.y.abs()).max(dims.z.abs());
    let index = bucket_index_for_dimension(dimension, &config.bucket_thresholds);
    RenderGroup::bucketed(base, index, N_BUCKETS)
}

/// `ComputeTranslucentRenderLeaf`. `visible_leaves` is already ordered
/// front-to-back. Assigns `render_leaf` on every translucent renderable
/// seen, and evaluates alpha (`compute_fx_blend`) once per
/// `(renderable, view, frame)`.
pub fn compute_translucent_render_leaf(
    visible_leaves: &[usize],
    renderables_in_leaf: &BidirectionalSet<usize, RenderHandle>,
    renderables: &mut HandleTable<RenderHandle, RenderableInfo>,
    frame_number: u32,
    view_id: u32,
) {
    for &leaf in visible_leaves {
        let handles: Vec<RenderHandle> = renderables_in_leaf.elements_in_bucket(leaf).collect();
        for handle in handles {
            let info = match renderables.get_mut(handle) {
                Some(info) => info,
                None => continue,
            };

            if info.translucency_calculated_frame != frame_number || info.translucency_calculated_view != view_id {
                info.cached_fx_blend = info.caps.compute_fx_blend();
                info.translucency_calculated_frame = frame_number;
                info.translucency_calculated_view = view_id;
            }

            if info.render_frame != frame_number {
                if info.render_group == RenderGroup::TranslucentEntity {
                    info.render_leaf = Some(leaf);
                }
                info.render_frame = frame_number;
            } else if info.flags.contains(RenderFlags::ALTERNATE_SORTING) && info.render_group == RenderGroup::TranslucentEntity {
                info.render_leaf = Some(leaf);
            }
        }
    }
}

pub struct SetupRenderInfo<'a> {
    pub visible_leaves: &'a [usize],
    pub render_origin: Vector3<f32>,
    pub render_forward: Vector3<f32>,
    pub render_frame: u32,
    pub detail_build_frame: u32,
    pub draw_translucent: bool,
    pub draw_detail: bool,
    pub draw_static_props: bool,
    pub portal_test_ents: bool,
}

/// `CollateRenderablesInLeaf`, called once per visible leaf from
/// `build_renderables_list`.
fn collate_renderables_in_leaf(
    leaf: usize,
    world_list_leaf_index: usize,
    info: &SetupRenderInfo,
    config: &LeafSystemConfig,
    renderables_in_leaf: &BidirectionalSet<usize, RenderHandle>,
    renderables: &mut HandleTable<RenderHandle, RenderableInfo>,
    leaves: &[LeafRecord],
    engine: &dyn EngineQueries,
    detail_objects: &dyn DetailObjectSystem,
    lists: &mut RenderLists,
) {
    lists.push(RenderGroup::OpaqueStatic, CEntry::marker(world_list_leaf_index));
    lists.push(RenderGroup::OpaqueEntity, CEntry::marker(world_list_leaf_index));

    let handles: Vec<RenderHandle> = renderables_in_leaf.elements_in_bucket(leaf).collect();
    for handle in handles {
        let renderable = match renderables.get_mut(handle) {
            Some(r) => r,
            None => continue,
        };

        if !info.draw_static_props && renderable.flags.contains(RenderFlags::STATIC_PROP) {
            continue;
        }

        if renderable.render_group != RenderGroup::TranslucentEntity {
            if renderable.render_frame2 == info.render_frame {
                continue;
            }
            renderable.render_frame2 = info.render_frame;
        } else if renderable.render_leaf != Some(leaf) {
            continue;
        }

        let mut alpha = 255u8;
        if info.draw_translucent {
            alpha = renderable.caps.fx_blend();
            if alpha == 0 {
                continue;
            }
        }

        let abs_mins = renderable.abs_mins;
        let abs_maxs = renderable.abs_maxs;

        if info.portal_test_ents && renderable.area != -1 {
            if !engine.does_box_touch_area_frustum(abs_mins, abs_maxs, renderable.area) {
                continue;
            }
        } else if engine.cull_box(abs_mins, abs_maxs) {
            continue;
        }

        if engine.is_occluded(abs_mins, abs_maxs) {
            continue;
        }

        if renderable.render_group != RenderGroup::TranslucentEntity {
            let group = if matches!(renderable.render_group, RenderGroup::OpaqueStatic | RenderGroup::OpaqueEntity) {
                bucketed_opaque_group(renderable.render_group, abs_mins, abs_maxs, config)
            } else {
                renderable.render_group
            };

            lists.push(
                group,
                CEntry {
                    renderable: Some(renderable.caps.clone()),
                    world_list_leaf_index,
                    two_pass: false,
                    handle: Some(handle),
                    abs_mins,
                    abs_maxs,
                },
            );
        } else {
            let two_pass = renderable.flags.contains(RenderFlags::TWO_PASS) && alpha == 255;

            if info.draw_translucent {
                lists.push(
                    renderable.render_group,
                    CEntry {
                        renderable: Some(renderable.caps.clone()),
                        world_list_leaf_index,
                        two_pass,
                        handle: Some(handle),
                        abs_mins,
                        abs_maxs,
                    },
                );
            }

            if two_pass {
                let group = if renderable.flags.contains(RenderFlags::STATIC_PROP) {
                    bucketed_opaque_group(RenderGroup::OpaqueStatic, abs_mins, abs_maxs, config)
                } else {
                    RenderGroup::OpaqueEntity
                };
                lists.push(
                    group,
                    CEntry {
                        renderable: Some(renderable.caps.clone()),
                        world_list_leaf_index,
                        two_pass: true,
                        handle: Some(handle),
                        abs_mins,
                        abs_maxs,
                    },
                );
            }
        }
    }

    if info.draw_detail {
        let leaf_record = &leaves[leaf];
        if leaf_record.detail.last_render_frame == info.detail_build_frame
            && (leaf_record.detail.count != 0 || leaf_record.has_subsystem_data(DETAIL_OBJECTS_SUBSYSTEM_SLOT))
        {
            let (first, count) = leaf_record.detail_objects();
            for i in first..(first + count) {
                let detail = match detail_objects.get_detail_model(i as u32) {
                    Some(d) => d,
                    None => continue,
                };
                let (mins, maxs) = detail.render_bounds_worldspace();
                if detail.is_transparent() {
                    if info.draw_translucent && detail.fx_blend() > 0 {
                        lists.push(
                            RenderGroup::TranslucentEntity,
                            CEntry {
                                renderable: Some(detail.clone()),
                                world_list_leaf_index,
                                two_pass: false,
                                handle: None,
                                abs_mins: mins,
                                abs_maxs: maxs,
                            },
                        );
                    }
                } else {
                    lists.push(
                        RenderGroup::OpaqueEntity,
                        CEntry {
                            renderable: Some(detail.clone()),
                            world_list_leaf_index,
                            two_pass: false,
                            handle: None,
                            abs_mins: mins,
                            abs_maxs: maxs,
                        },
                    );
                }
            }
        }
    }
}

/// Comb-sort back-to-front (non-increasing forward distance) by projecting
/// `(renderOrigin + 0.5*(mins+maxs))` onto the view forward vector. Step
/// sequence is 4, 2, 1, exactly as the original; NaN distances are coerced
/// to 0. The original's comparator (`clientleafsystem.cpp:2110`) actually
/// sorts front-to-back despite its "back-to-front" comment; this swaps the
/// comparator direction to match the sort's documented intent instead.
pub fn sort_entities(render_origin: Vector3<f32>, render_forward: Vector3<f32>, entities: &mut [CEntry]) {
    let n = entities.len();
    if n <= 1 {
        return;
    }

    let mut dists: Vec<f32> = entities
        .iter()
        .map(|entry| {
            let center = match &entry.renderable {
                Some(caps) => caps.render_origin() + 0.5 * (entry.abs_mins + entry.abs_maxs),
                None => 0.5 * (entry.abs_mins + entry.abs_maxs),
            };
            let d = (center - render_origin).dot(render_forward);
            if d.is_nan() {
                0.0
            } else {
                d
            }
        })
        .collect();

    let mut step: i64 = 4;
    while step > 0 {
        let end = n as i64 - step;
        let mut i: i64 = 0;
        while i < end {
            let a = i as usize;
            let b = (i + step) as usize;
            if dists[a] < dists[b] {
                entities.swap(a, b);
                dists.swap(a, b);
                if i == 0 {
                    i = -step;
                } else {
                    i -= step << 1;
                }
            }
            i += step;
        }
        step >>= 1;
    }
}

/// `BuildRenderablesList`. Walks the visible leaf list in order, collates
/// each leaf's renderables, and sorts each leaf's freshly-added translucent
/// entries before moving to the next leaf -- so the final translucent group
/// ends up back-to-front overall.
#[allow(clippy::too_many_arguments)]
pub fn build_renderables_list(
    info: &SetupRenderInfo,
    config: &LeafSystemConfig,
    renderables_in_leaf: &BidirectionalSet<usize, RenderHandle>,
    renderables: &mut HandleTable<RenderHandle, RenderableInfo>,
    leaves: &[LeafRecord],
    engine: &dyn EngineQueries,
    detail_objects: &dyn DetailObjectSystem,
    lists: &mut RenderLists,
) {
    for (world_list_leaf_index, &leaf) in info.visible_leaves.iter().enumerate() {
        let before = lists.group(RenderGroup::TranslucentEntity).len();

        collate_renderables_in_leaf(
            leaf,
            world_list_leaf_index,
            info,
            config,
            renderables_in_leaf,
            renderables,
            leaves,
            engine,
            detail_objects,
            lists,
        );

        let after = lists.group(RenderGroup::TranslucentEntity).len();
        if after != before && info.draw_translucent {
            let translucent = lists.group_mut(RenderGroup::TranslucentEntity);
            sort_entities(info.render_origin, info.render_forward, &mut translucent[before..after]);
        }
    }
}

/// `CollateViewModelRenderables`. Iterates the view-model list in reverse
/// insertion order so the most recently added model wins ties, partitioning
/// by each renderable's *current* render group (which `compute_fx_blend`
/// may have just changed).
pub fn collate_view_model_renderables(
    view_models: &[RenderHandle],
    renderables: &mut HandleTable<RenderHandle, RenderableInfo>,
) -> (Vec<Arc<dyn RenderableCaps>>, Vec<Arc<dyn RenderableCaps>>) {
    let mut opaque = Vec::new();
    let mut translucent = Vec::new();

    for &handle in view_models.iter().rev() {
        let info = match renderables.get_mut(handle) {
            Some(info) => info,
            None => continue,
        };
        info.cached_fx_blend = info.caps.compute_fx_blend();

        if matches!(info.render_group, RenderGroup::ViewModelOpaque | RenderGroup::OpaqueEntity) {
            opaque.push(info.caps.clone());
        } else {
            translucent.push(info.caps.clone());
        }
    }

    (opaque, translucent)
}
