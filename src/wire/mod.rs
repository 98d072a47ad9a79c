//! Wire-format primitives: big-endian integers, the delta command
//! prototable, and command emission.

pub(crate) mod command;
pub(crate) mod emit;
pub(crate) mod netint;
