//! The per-shadow record: projection-type flags and the at-most-once enum
//! stamp used by `AddShadowToLeaf`/`EnumerateShadowsInLeaves`.

bitflags::bitflags! {
    #[derive(Default)]
    pub struct ShadowFlags: u32 {
        const SHADOW     = 0b0000_0001;
        const FLASHLIGHT = 0b0000_0010;
    }
}

pub struct ShadowInfo {
    pub external_id: u32,
    pub flags: ShadowFlags,
    /// Last shadow-enum-counter value this shadow was visited at, used by
    /// `EnumerateShadowsInLeaves` to yield each shadow once per pass.
    pub enum_count: u64,
}

impl ShadowInfo {
    pub fn new(external_id: u32, flags: ShadowFlags) -> Self {
        ShadowInfo {
            external_id,
            flags,
            enum_count: 0,
        }
    }
}
