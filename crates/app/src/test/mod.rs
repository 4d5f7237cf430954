//! Service test harness.

pub mod context;
pub mod helpers;

pub use context::TestContext;
