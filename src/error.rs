use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

/// Construction-time misuse of the leaf system. Steady-state frame errors
/// (bad handles, overflowing groups, non-convergent dirty loops) are not
/// represented here -- those are logged and degraded per-frame, not
/// propagated as `Result`s.
#[derive(Debug)]
pub struct LeafSystemError {
    inner: Context<LeafSystemErrorKind>,
}

impl LeafSystemError {
    pub fn kind(&self) -> LeafSystemErrorKind {
        self.inner.get_context().clone()
    }
}

impl From<LeafSystemErrorKind> for LeafSystemError {
    fn from(kind: LeafSystemErrorKind) -> Self {
        LeafSystemError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<LeafSystemErrorKind>> for LeafSystemError {
    fn from(inner: Context<LeafSystemErrorKind>) -> Self {
        LeafSystemError { inner }
    }
}

impl Fail for LeafSystemError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for LeafSystemError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum LeafSystemErrorKind {
    #[fail(display = "Level not initialized: call LevelInitPreEntity first")]
    LevelNotInitialized,
    #[fail(display = "Leaf index {} out of range (level has {} leaves)", leaf, leaf_count)]
    LeafOutOfRange { leaf: usize, leaf_count: usize },
    #[fail(display = "Subsystem slot {} out of range ({} slots configured)", slot, slot_count)]
    SubsystemSlotOutOfRange { slot: usize, slot_count: usize },
}
