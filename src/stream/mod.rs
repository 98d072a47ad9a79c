//! Owned buffering between the caller's windows and the state machines:
//! the scoop on the input side, the tube on the output side.

pub(crate) mod scoop;
pub(crate) mod tube;

pub(crate) use scoop::Scoop;
pub(crate) use tube::{Flush, Tube};
