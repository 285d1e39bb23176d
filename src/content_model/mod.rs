//! Content-model validators
//!
//! This module implements the structural constraints a mapping can declare
//! over a model class:
//! - [`Choice`] - alternation with occurrence bounds
//! - [`Sequence`] - declared element order
//! - [`Group`] - container holding at most one choice
//!
//! Validators are pure functions over instance state, run post-construction
//! by `validate` rather than as hard parse-time rejections.

mod choice;
mod group;
mod sequence;

pub use choice::{Choice, ChoiceMember};
pub use group::{Group, GroupBuilder, GroupEntry};
pub use sequence::Sequence;
