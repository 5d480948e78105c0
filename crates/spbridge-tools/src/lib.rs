//! Tool server for SharePoint Bridge
//!
//! Registers the SharePoint tools with a [`ToolRegistry`] and serves them to
//! MCP clients over newline-delimited JSON-RPC on stdio.

pub mod lazy;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sharepoint_tools;

#[cfg(test)]
mod testing;

pub use lazy::*;
pub use registry::*;
pub use server::*;
pub use sharepoint_tools::*;
