//! Table operations, each module adds an `impl Database` block.

pub mod tags;
pub mod terms;
