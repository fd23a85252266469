//! Common value types for the hostnet plugin manager.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the reconciliation watchers:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Network`]: IPv4 networks in CIDR notation with membership tests

mod mac;
mod net;

pub use mac::MacAddress;
pub use net::Ipv4Network;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv4 network format: {0}")]
    InvalidNetwork(String),
}
