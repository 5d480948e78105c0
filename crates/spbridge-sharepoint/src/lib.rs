//! SharePoint document library access.
//!
//! [`DocumentLibrary`] is the seam the tool server depends on;
//! [`SharePointService`] implements it against the SharePoint REST API.

pub mod library;
pub mod service;

pub use library::*;
pub use service::*;
