//! Infrastructure layer
//!
//! Concrete port implementations. Only in-memory adapters live in this
//! crate; production adapters (database, SMTP, push) belong to the
//! surrounding application.

pub mod persistence;
