//! Local preview server for generated reports
//!
//! Reports are self-contained and open fine from disk; the preview server
//! exists for machines where `file://` pages are restricted, and for
//! sharing a report on a trusted local network. It is read-only.

pub mod routes;
pub mod server;

pub use server::{ServeConfig, start_server};
