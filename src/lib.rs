//! Load, clean and aggregate the French regional accounts (2012-2022).
//!
//! [`loader`] fetches the semicolon-delimited file, [`preparer`] drops
//! non-positive amounts and administrative columns while tagging each row
//! through [`categorizer`], and [`queries`] derives every dashboard view from
//! the resulting read-only [`Dataset`].
pub mod categorizer;
pub mod config;
pub mod errors;
pub mod loader;
pub mod output;
pub mod preparer;
pub mod queries;
pub mod types;
pub mod util;

pub use categorizer::{categorize, Category};
pub use errors::{DashboardError, Result};
pub use loader::{DatasetCache, Source};
pub use types::{Dataset, Record};
