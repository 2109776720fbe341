//! Error handling and result types for Monorail.
//!
//! All fallible functions return [`Result`], an alias over
//! `color_eyre::eyre::Result`. Known failure kinds are raised as
//! [`crate::error::MonorailError`] and converted into the report with `?`,
//! so callers can still recover them with `downcast_ref`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use color_eyre::eyre::WrapErr;
//! use crate::result::Result;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     let text = std::fs::read_to_string(path)
//!         .wrap_err("Failed to read package manifest")?;
//!     Ok(text)
//! }
//! ```

use color_eyre::eyre::Result as EyreResult;

/// Standard result type used throughout Monorail.
pub type Result<T> = EyreResult<T>;
