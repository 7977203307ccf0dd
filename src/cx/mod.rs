//! Capability context and masking.

mod cx;

pub use cx::{Cx, Unmask};
