//! Scopes, fork variants, and joinable handles.
//!
//! The lifetime of every forked child is a strict sub-interval of its
//! scope: [`scoped`] opens a scope, the fork variants admit children into
//! it, and closure interrupts and joins all of them before control returns
//! to the caller.

mod fork;
mod handle;
#[allow(clippy::module_inception)]
mod scope;
mod state;

pub use handle::{Thread, TryThread};
pub use scope::{scoped, Scope};
