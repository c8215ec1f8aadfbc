//! Cordoning of the Node being drained.
pub mod cordon;
mod patch;

pub use self::cordon::{cordon_node, CordonOutcome};
