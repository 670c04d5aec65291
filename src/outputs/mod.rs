//! Output generation for finished reports.
//!
//! # Submodules
//!
//! - [`markdown`]: Renders a report as a readable Markdown document
//! - [`json`]: Writes the raw report fields and sources for machine consumption
//!
//! # Output Structure
//!
//! ```text
//! markdown_output_dir/
//! └── acme-corp_2026-10-16.md
//!
//! json_output_dir/           # only with --json-output-dir
//! └── acme-corp_2026-10-16.json
//! ```

pub mod json;
pub mod markdown;
