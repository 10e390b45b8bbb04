//! Output generation for crawled articles.
//!
//! This module contains the submodules responsible for writing extracted
//! articles out of the process:
//!
//! # Submodules
//!
//! - [`json`]: Writes the normalized records to an `articles.json` feed
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── articles.json
//! ```

pub mod json;
