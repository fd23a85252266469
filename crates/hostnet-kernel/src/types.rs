//! Value snapshots of kernel table entries.

use hostnet_types::{MacAddress, ParseError};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A kernel network link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Interface index.
    pub index: u32,
    /// Interface name.
    pub name: String,
    /// Index of the controlling (master) device, 0 if none. A veth enslaved
    /// to a bridge carries the bridge's index here.
    pub master_index: u32,
    /// Index of the peer/parent device, 0 if none. Inside a container,
    /// eth0's parent index is the host-side veth's index.
    pub parent_index: u32,
}

/// Kernel neighbor cache state (NUD_* values from linux/neighbour.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    /// Resolution in progress.
    Incomplete,
    /// Neighbor is reachable.
    Reachable,
    /// Reachability is stale.
    Stale,
    /// Resolution delayed.
    Delay,
    /// Probe in progress.
    Probe,
    /// Resolution failed.
    Failed,
    /// No ARP needed (static or local).
    NoArp,
    /// Permanent entry.
    Permanent,
    /// Anything the kernel reports that we do not model.
    Unknown,
}

/// An IPv4 entry of the kernel neighbor (ARP) cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    /// Index of the link the entry lives on.
    pub link_index: u32,
    /// Neighbor IPv4 address.
    pub ip: Ipv4Addr,
    /// Neighbor MAC address; zero when the kernel has none recorded.
    pub mac: MacAddress,
    /// Kernel neighbor state.
    pub state: NeighborState,
}

/// Transport protocol of a tracked flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(ParseError::InvalidNetwork(other.to_string())),
        }
    }
}

/// A conntrack DNAT entry, identified by its original-destination 3-tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnatEntry {
    /// Destination IP the first packet was addressed to.
    pub original_destination_ip: Ipv4Addr,
    /// Destination port the first packet was addressed to.
    pub original_destination_port: u16,
    /// Transport protocol of the flow.
    pub protocol: Protocol,
    /// Source IP of reply packets, i.e. the backend the flow was pinned to.
    pub reply_source_ip: Ipv4Addr,
}

impl DnatEntry {
    /// Canonical lookup key: `origDstIp:origDstPort/protocol`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}/{}",
            self.original_destination_ip, self.original_destination_port, self.protocol
        )
    }
}

impl fmt::Display for DnatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.key(), self.reply_source_ip)
    }
}
