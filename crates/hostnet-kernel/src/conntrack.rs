//! DNAT conntrack access through the `conntrack(8)` CLI.
//!
//! The netfilter conntrack table has no stable programmatic story we need
//! beyond "list DNAT flows, delete one", so this adapter drives the
//! standard userspace tool and parses its one-line flow format:
//!
//! ```text
//! tcp      6 431999 ESTABLISHED src=10.0.0.2 dst=10.0.0.1 sport=53307 \
//!   dport=8080 src=10.42.0.5 dst=10.0.0.2 sport=80 dport=53307 [ASSURED] mark=0 use=1
//! ```
//!
//! The first src/dst/sport/dport group describes the original direction,
//! the second the reply direction.

use async_trait::async_trait;
use hostnet_common::shell::{self, CONNTRACK_CMD};
use hostnet_common::{HostnetError, Result};
use tracing::{debug, trace};

use crate::ops::ConntrackOps;
use crate::types::{DnatEntry, Protocol};

/// Stateless conntrack CLI adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConntrackCli;

impl ConntrackCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConntrackOps for ConntrackCli {
    async fn list_dnat(&self) -> Result<Vec<DnatEntry>> {
        let cmd = format!("{} -L --dst-nat -f ipv4", CONNTRACK_CMD);
        let result = shell::exec(&cmd).await?;
        if !result.success() {
            return Err(HostnetError::kernel_io(
                "list_dnat_conntrack",
                result.combined_output(),
            ));
        }

        let entries = parse_listing(&result.stdout);
        trace!(count = entries.len(), "listed DNAT conntrack entries");
        Ok(entries)
    }

    async fn delete(&self, entry: &DnatEntry) -> Result<()> {
        // All interpolated values are typed (addresses, port, protocol),
        // no quoting needed.
        let cmd = format!(
            "{} -D -p {} --orig-dst {} --orig-port-dst {} --reply-src {}",
            CONNTRACK_CMD,
            entry.protocol,
            entry.original_destination_ip,
            entry.original_destination_port,
            entry.reply_source_ip,
        );

        shell::exec_or_throw(&cmd)
            .await
            .map_err(|e| HostnetError::kernel_io("conntrack_delete", e.to_string()))?;
        Ok(())
    }
}

/// Parses a full `conntrack -L` listing, skipping lines that are not
/// tcp/udp flows (the tool prints a summary on stderr, but headers or
/// unexpected protocols on stdout are tolerated too).
fn parse_listing(stdout: &str) -> Vec<DnatEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let parsed = parse_flow_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                debug!(line, "skipping unparsable conntrack line");
            }
            parsed
        })
        .collect()
}

/// Parses one flow line into a DNAT entry.
///
/// Field positions vary between protocols (udp flows carry no state
/// column), so fields are located by key, counting repeated keys to tell
/// the original direction from the reply direction.
fn parse_flow_line(line: &str) -> Option<DnatEntry> {
    let mut tokens = line.split_whitespace();
    let protocol: Protocol = tokens.next()?.parse().ok()?;

    let mut original_destination_ip = None;
    let mut original_destination_port = None;
    let mut reply_source_ip = None;

    let mut dst_seen = 0;
    let mut dport_seen = 0;
    let mut src_seen = 0;

    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "dst" => {
                dst_seen += 1;
                if dst_seen == 1 {
                    original_destination_ip = value.parse().ok();
                }
            }
            "dport" => {
                dport_seen += 1;
                if dport_seen == 1 {
                    original_destination_port = value.parse().ok();
                }
            }
            "src" => {
                src_seen += 1;
                if src_seen == 2 {
                    reply_source_ip = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    Some(DnatEntry {
        original_destination_ip: original_destination_ip?,
        original_destination_port: original_destination_port?,
        protocol,
        reply_source_ip: reply_source_ip?,
    })
}
