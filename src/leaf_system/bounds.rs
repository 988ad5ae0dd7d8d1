//! Tight-bounds bloating and the growing-object hysteresis rule.
//!
//! Grounded on `CalcRenderableWorldSpaceAABB_Bloated` in the original: the
//! grid-quantisation step and the `MinShrinkVolume`/`2*vol(new) >= vol(U)`
//! hysteresis test for `BloatBounds`-flagged renderables (particle systems).

use cgmath::Vector3;

fn volume(min: Vector3<f32>, max: Vector3<f32>) -> f32 {
    let d = max - min;
    (d.x.max(0.0) * d.y.max(0.0) * d.z.max(0.0)).max(0.0)
}

fn union(a_min: Vector3<f32>, a_max: Vector3<f32>, b_min: Vector3<f32>, b_max: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    (
        Vector3::new(a_min.x.min(b_min.x), a_min.y.min(b_min.y), a_min.z.min(b_min.z)),
        Vector3::new(a_max.x.max(b_max.x), a_max.y.max(b_max.y), a_max.z.max(b_max.z)),
    )
}

/// Quantise tight bounds outward to the `granularity` grid: `min` rounds
/// down, `max` rounds up. Small jitter inside one grid cell never re-enters
/// the tree.
pub fn quantize(min: Vector3<f32>, max: Vector3<f32>, granularity: f32) -> (Vector3<f32>, Vector3<f32>) {
    let floor_to_grid = |v: f32| (v / granularity).floor() * granularity;
    let ceil_to_grid = |v: f32| (v / granularity).ceil() * granularity;
    (
        Vector3::new(floor_to_grid(min.x), floor_to_grid(min.y), floor_to_grid(min.z)),
        Vector3::new(ceil_to_grid(max.x), ceil_to_grid(max.y), ceil_to_grid(max.z)),
    )
}

/// Apply the growing-object hysteresis rule for `BloatBounds`-flagged
/// renderables: prefer the union of current and new bloated bounds when it's
/// small or when the new bounds make up at least half the union (still
/// growing); otherwise the object shrank materially and we re-tighten to the
/// new bounds.
pub fn apply_hysteresis(
    current: (Vector3<f32>, Vector3<f32>),
    new: (Vector3<f32>, Vector3<f32>),
    min_shrink_volume: f32,
) -> (Vector3<f32>, Vector3<f32>) {
    let (u_min, u_max) = union(current.0, current.1, new.0, new.1);
    let vol_u = volume(u_min, u_max);
    let vol_new = volume(new.0, new.1);

    if vol_u <= min_shrink_volume || 2.0 * vol_new >= vol_u {
        (u_min, u_max)
    } else {
        new
    }
}

/// Compute the bloated bounds that should be stored and registered in the
/// leaf index, given freshly computed tight bounds and the renderable's
/// previously-registered bloated bounds (if any).
pub fn compute_bloated_bounds(
    tight_min: Vector3<f32>,
    tight_max: Vector3<f32>,
    previous_bloated: Option<(Vector3<f32>, Vector3<f32>)>,
    growing_object_hysteresis: bool,
    granularity: f32,
    min_shrink_volume: f32,
) -> (Vector3<f32>, Vector3<f32>) {
    let quantized = quantize(tight_min, tight_max, granularity);
    match (growing_object_hysteresis, previous_bloated) {
        (true, Some(prev)) => apply_hysteresis(prev, quantized, min_shrink_volume),
        _ => quantized,
    }
}
