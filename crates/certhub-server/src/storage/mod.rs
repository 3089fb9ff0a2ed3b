//! SQLite storage for the CertHub server.
//!
//! Provides persistence for events, certificates, sparse certificate
//! metadata, incoming staging rows, the verification audit log, and secrets.

mod db;
mod models;
mod queries;
mod queries_incoming;
mod queries_metadata;


pub use db::CertDatabase;
pub use models::*;
pub use queries::{CertificateFilter, CertificateUpdate, EventPatch, NewCertificate, NewEvent};
pub use queries_metadata::MetadataEntry;
