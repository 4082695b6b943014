//! The recursive decomposition hierarchy.
//!
//! A part is one node of the decomposition: a tensor shape at a recursion
//! level, reached from a parent through one hashing region. Parts are
//! memoized by `(level, shape, identifier)` in an arena so the hierarchy is
//! a DAG over handles rather than an owning tree.

mod registry;
pub use registry::*;
mod split;
pub use split::*;
mod level2;
pub use level2::*;
mod zero;
pub use zero::*;

/// `(parent part id, hashing region)`. Part of the memoization key.
pub type Identifier = (usize, usize);

/// Stable location of a part in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartHandle {
    pub level: usize,
    pub id: usize,
}

pub(crate) fn csd_len(power: usize) -> usize {
    3usize.pow(power as u32)
}
