//! SharePoint Bridge binaries
//!
//! Command-line parsing and logging setup shared by `sharepoint-chat` and
//! `sharepoint-mcp`.

pub mod cli;
pub mod logging;

pub use spbridge_core::*;
pub use spbridge_providers::*;
pub use spbridge_tools::*;
