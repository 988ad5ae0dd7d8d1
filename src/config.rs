//! Tunables that the original hard-codes as constants. Exposed as a struct
//! with a `Default` mirroring those constants, following the way
//! `richter::common::console::CvarRegistry` treats tunables as
//! independently-settable named values rather than buried literals.

/// Number of opaque size buckets (`huge`/`large`/`medium`/`small`).
pub const N_BUCKETS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct LeafSystemConfig {
    /// Grid granularity for bloated-bounds quantisation.
    pub bloat_granularity: f32,
    /// Hysteresis threshold below which a union of bloated bounds is kept
    /// even when the renderable shrank.
    pub min_shrink_volume: f32,
    /// Bound on `RecomputeRenderableLeaves`'s retry loop.
    pub max_dirty_iterations: u32,
    /// Size-bucket thresholds, largest first: `[huge, large, medium]`.
    /// Anything below the smallest threshold falls into the unbucketed
    /// (smallest) group.
    pub bucket_thresholds: [f32; N_BUCKETS - 1],
    /// Per-render-group emission cap.
    pub max_group_entities: usize,
}

impl Default for LeafSystemConfig {
    fn default() -> Self {
        LeafSystemConfig {
            bloat_granularity: 32.0,
            min_shrink_volume: 32.0 * 32.0 * 32.0,
            max_dirty_iterations: 10,
            bucket_thresholds: [200.0, 80.0, 30.0],
            max_group_entities: 4096,
        }
    }
}
