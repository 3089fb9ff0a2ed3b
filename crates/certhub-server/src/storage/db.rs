//! SQLite database handle for the CertHub server.
//!
//! `CertDatabase` is generated by the shared `define_database!` macro; query
//! methods live in the sibling `queries_*` modules.

certhub_core::define_database!(CertDatabase, "Certificate database migrations complete");
