//! # template_fill
//!
//! Pastes column-aligned data from a source spreadsheet into an Excel report
//! template, matching columns by header name.
//!
//! ## Features
//!
//! - **Header matching**: source columns are written to the template column whose
//!   trimmed header has exactly the same name; other columns are ignored
//! - **Template preserving**: only the cells written change; styles, other sheets
//!   and every other package part are copied unchanged
//! - **Missing values**: blank the cell, write an empty string, or leave it untouched
//! - **Date systems**: dates keep their calendar value between 1900 and 1904 workbooks
//! - **Deterministic output**: the same inputs always give the same bytes
//!
//! ## Example
//!
//! ```no_run
//! use template_fill::config::TransferConfig;
//! use template_fill::spreadsheet::Workbook;
//!
//! let mut source = Workbook::open("base.xlsx")?;
//! let mut template = Workbook::open("plantilla.xlsx")?;
//! let config = TransferConfig { start_row: 5, ..TransferConfig::default() };
//! let output = template_fill::transfer::transfer(&mut source, &mut template, &config)?;
//! std::fs::write(&output.file_name, &output.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod config;
pub mod error;
mod helpers;
pub mod session;
pub mod spreadsheet;
pub mod transfer;

#[cfg(test)]
mod fixtures;

pub use config::NaPolicy;
pub use config::TransferConfig;
pub use error::ErrorKind;
pub use error::TemplateFillError;
pub use session::Artifact;
pub use session::Outcome;
pub use session::Session;
pub use session::TransferRequest;
pub use session::Upload;
pub use spreadsheet::Workbook;
pub use transfer::transfer;
pub use transfer::TransferOutput;
pub use transfer::TransferReport;
