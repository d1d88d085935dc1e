//! Directory batch driver.
//!
//! ```text
//! list sources → persistence gate → DocumentProcessor → <stem>.json → pause
//! ```
//!
//! Files run strictly one after another; a failure is logged and the batch
//! moves on. The only resumption marker is the output file's existence.

pub mod error;
pub mod types;
pub mod gate;
pub mod runner;
pub mod processors;

pub use error::BatchError;
pub use types::*;
pub use gate::{is_processed, output_path_for};
pub use runner::*;
pub use processors::{DocxPolicyProcessor, PdfPolicyProcessor};
