//! `CertHub` Core Library
//!
//! Shared functionality for `CertHub` components:
//! - Certificate-type taxonomy (classification, normalization, required fields)
//! - Short certificate-identifier generation
//! - SQLite pool helpers and shared database error type
//! - Tracing initialization

pub mod db;
pub mod id;
pub mod taxonomy;
pub mod tracing_init;
