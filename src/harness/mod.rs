//! Harness entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Harness`] | Discovers targets and opens sessions on them |
//! | [`HarnessBuilder`] | Fluent configuration builder |
//! | [`SessionOptions`] | Deadlines and limits shared by sessions |
//!
//! # Example
//!
//! ```ignore
//! use devtools_harness::{Harness, Result};
//!
//! # async fn example() -> Result<()> {
//! let harness = Harness::builder().port(9222).build()?;
//!
//! let background = harness.connect_background().await?;
//! let page = harness.open_page("http://localhost:8000/fixtures/scroll.html").await?;
//!
//! page.bring_to_front().await?;
//! harness.close();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for harness configuration.
pub mod builder;

/// Harness implementation.
pub mod core;

/// Session timing and resource options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HarnessBuilder;
pub use core::Harness;
pub use options::SessionOptions;
