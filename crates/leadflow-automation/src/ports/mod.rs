//! Ports layer
//!
//! Hexagonal architecture interfaces: inbound use cases, outbound
//! collaborators and stores.

pub mod inbound;
pub mod outbound;
