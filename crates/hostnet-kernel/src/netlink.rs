//! Blocking rtnetlink access to the link and neighbor tables.
//!
//! Each operation opens its own `NETLINK_ROUTE` socket, performs one
//! request/response exchange and closes it again. The async trait surface
//! drives these blocking exchanges from the runtime's blocking pool.

use hostnet_common::{HostnetError, Result};
use hostnet_types::MacAddress;
use netlink_packet_core::{
    NetlinkHeader, NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP,
    NLM_F_REPLACE, NLM_F_REQUEST,
};
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use netlink_packet_route::neighbour::{
    NeighbourAddress, NeighbourAttribute, NeighbourMessage, NeighbourState as NlNeighbourState,
};
use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
use netlink_sys::{protocols::NETLINK_ROUTE, Socket, SocketAddr};
use tracing::{debug, trace};

use crate::ops::NetlinkOps;
use crate::types::{Link, NeighborEntry, NeighborState};

/// Receive buffer size per datagram; the kernel caps rtnetlink dumps well
/// below this.
const RECV_BUF_LEN: usize = 64 * 1024;

/// Stateless rtnetlink adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteNetlink;

impl RouteNetlink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl NetlinkOps for RouteNetlink {
    async fn list_links(&self) -> Result<Vec<Link>> {
        tokio::task::spawn_blocking(dump_links)
            .await
            .map_err(|e| HostnetError::kernel_io("list_links", e.to_string()))?
    }

    async fn link_by_name(&self, name: &str) -> Result<Link> {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || link_by_name_blocking(&name))
            .await
            .map_err(|e| HostnetError::kernel_io("link_by_name", e.to_string()))?
    }

    async fn link_delete(&self, link: &Link) -> Result<()> {
        let link = link.clone();
        tokio::task::spawn_blocking(move || delete_link(&link))
            .await
            .map_err(|e| HostnetError::kernel_io("link_delete", e.to_string()))?
    }

    async fn list_neighbors(&self, link_index: Option<u32>) -> Result<Vec<NeighborEntry>> {
        tokio::task::spawn_blocking(move || dump_neighbors(link_index))
            .await
            .map_err(|e| HostnetError::kernel_io("list_neighbors", e.to_string()))?
    }

    async fn neighbor_set(&self, entry: &NeighborEntry) -> Result<()> {
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || set_neighbor(&entry))
            .await
            .map_err(|e| HostnetError::kernel_io("neighbor_set", e.to_string()))?
    }
}

/// Resolves a link by name on the calling thread.
///
/// This is the entry point for namespace-scoped callers: inside a container
/// namespace the veth enumerator reads eth0's parent index through this
/// function, on the thread that performed the setns.
pub fn link_by_name_blocking(name: &str) -> Result<Link> {
    let links = dump_links()?;
    links
        .into_iter()
        .find(|l| l.name == name)
        .ok_or_else(|| HostnetError::LinkNotFound {
            name: name.to_string(),
        })
}

fn open_socket(operation: &str) -> Result<Socket> {
    let socket = Socket::new(NETLINK_ROUTE)
        .map_err(|e| HostnetError::kernel_io(operation, format!("opening socket: {}", e)))?;
    socket
        .connect(&SocketAddr::new(0, 0))
        .map_err(|e| HostnetError::kernel_io(operation, format!("connecting socket: {}", e)))?;
    Ok(socket)
}

fn send_request(
    socket: &Socket,
    operation: &str,
    payload: RouteNetlinkMessage,
    flags: u16,
) -> Result<()> {
    let mut header = NetlinkHeader::default();
    header.flags = flags;

    let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(payload));
    packet.finalize();

    let mut buf = vec![0u8; packet.buffer_len()];
    packet.serialize(&mut buf);

    socket
        .send(&buf, 0)
        .map_err(|e| HostnetError::kernel_io(operation, format!("send: {}", e)))?;
    Ok(())
}

/// Drains a multi-part dump response, feeding every inner message to `f`.
fn receive_dump<F>(socket: &Socket, operation: &str, mut f: F) -> Result<()>
where
    F: FnMut(RouteNetlinkMessage),
{
    let mut buf = Vec::with_capacity(RECV_BUF_LEN);

    loop {
        buf.clear();
        let len = socket
            .recv(&mut buf, 0)
            .map_err(|e| HostnetError::kernel_io(operation, format!("recv: {}", e)))?;

        let mut offset = 0;
        while offset < len {
            let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..])
                .map_err(|e| {
                    HostnetError::kernel_io(operation, format!("parsing response: {}", e))
                })?;
            let msg_len = msg.header.length as usize;

            match msg.payload {
                NetlinkPayload::Done(_) => return Ok(()),
                NetlinkPayload::Error(err) => {
                    return Err(HostnetError::kernel_io(
                        operation,
                        os_error_message(err.raw_code()),
                    ));
                }
                NetlinkPayload::InnerMessage(inner) => f(inner),
                _ => {}
            }

            if msg_len == 0 {
                break;
            }
            offset += msg_len;
            // Messages inside a datagram are 4-byte aligned.
            offset = (offset + 3) & !3;
        }
    }
}

/// Waits for the kernel's acknowledgment of a change request.
///
/// Returns 0 on success, the negative errno the kernel reported otherwise.
fn receive_ack(socket: &Socket, operation: &str) -> Result<i32> {
    let mut buf = Vec::with_capacity(RECV_BUF_LEN);
    let len = socket
        .recv(&mut buf, 0)
        .map_err(|e| HostnetError::kernel_io(operation, format!("recv ack: {}", e)))?;

    let mut offset = 0;
    while offset < len {
        let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..])
            .map_err(|e| HostnetError::kernel_io(operation, format!("parsing ack: {}", e)))?;
        let msg_len = msg.header.length as usize;

        if let NetlinkPayload::Error(err) = msg.payload {
            return Ok(err.raw_code());
        }

        if msg_len == 0 {
            break;
        }
        offset += msg_len;
        offset = (offset + 3) & !3;
    }

    Err(HostnetError::kernel_io(operation, "no acknowledgment received"))
}

fn os_error_message(raw_code: i32) -> String {
    std::io::Error::from_raw_os_error(-raw_code).to_string()
}

fn dump_links() -> Result<Vec<Link>> {
    let socket = open_socket("list_links")?;
    send_request(
        &socket,
        "list_links",
        RouteNetlinkMessage::GetLink(LinkMessage::default()),
        NLM_F_REQUEST | NLM_F_DUMP,
    )?;

    let mut links = Vec::new();
    receive_dump(&socket, "list_links", |inner| {
        if let RouteNetlinkMessage::NewLink(msg) = inner {
            links.push(link_from_message(msg));
        }
    })?;

    trace!(count = links.len(), "listed links");
    Ok(links)
}

fn link_from_message(msg: LinkMessage) -> Link {
    let mut link = Link {
        index: msg.header.index,
        name: String::new(),
        master_index: 0,
        parent_index: 0,
    };

    for attr in msg.attributes {
        match attr {
            LinkAttribute::IfName(name) => link.name = name,
            LinkAttribute::Controller(index) => link.master_index = index,
            LinkAttribute::Link(index) => link.parent_index = index,
            _ => {}
        }
    }

    link
}

fn delete_link(link: &Link) -> Result<()> {
    let socket = open_socket("link_delete")?;

    let mut msg = LinkMessage::default();
    msg.header.index = link.index;
    send_request(
        &socket,
        "link_delete",
        RouteNetlinkMessage::DelLink(msg),
        NLM_F_REQUEST | NLM_F_ACK,
    )?;

    match receive_ack(&socket, "link_delete")? {
        0 => Ok(()),
        code if code == -libc::ENODEV => {
            // Someone else already cleaned it up between the scan and now.
            debug!(link = %link.name, index = link.index, "link already gone");
            Ok(())
        }
        code => Err(HostnetError::kernel_io(
            "link_delete",
            format!("deleting {}: {}", link.name, os_error_message(code)),
        )),
    }
}

fn dump_neighbors(link_index: Option<u32>) -> Result<Vec<NeighborEntry>> {
    let socket = open_socket("list_neighbors")?;

    let mut req = NeighbourMessage::default();
    req.header.family = AddressFamily::Inet;
    send_request(
        &socket,
        "list_neighbors",
        RouteNetlinkMessage::GetNeighbour(req),
        NLM_F_REQUEST | NLM_F_DUMP,
    )?;

    let mut entries = Vec::new();
    receive_dump(&socket, "list_neighbors", |inner| {
        if let RouteNetlinkMessage::NewNeighbour(msg) = inner {
            if let Some(entry) = neighbor_from_message(msg) {
                if link_index.is_none() || link_index == Some(entry.link_index) {
                    entries.push(entry);
                }
            }
        }
    })?;

    trace!(count = entries.len(), "listed IPv4 neighbors");
    Ok(entries)
}

fn neighbor_from_message(msg: NeighbourMessage) -> Option<NeighborEntry> {
    if msg.header.family != AddressFamily::Inet {
        return None;
    }

    let link_index = msg.header.ifindex;
    let state = state_from_kernel(msg.header.state);

    let mut ip = None;
    let mut mac = None;
    for attr in msg.attributes {
        match attr {
            NeighbourAttribute::Destination(NeighbourAddress::Inet(addr)) => ip = Some(addr),
            NeighbourAttribute::LinkLocalAddress(bytes) if bytes.len() == 6 => {
                let mut raw = [0u8; 6];
                raw.copy_from_slice(&bytes);
                mac = Some(MacAddress::new(raw));
            }
            _ => {}
        }
    }

    Some(NeighborEntry {
        link_index,
        ip: ip?,
        mac: mac.unwrap_or(MacAddress::ZERO),
        state,
    })
}

fn set_neighbor(entry: &NeighborEntry) -> Result<()> {
    let socket = open_socket("neighbor_set")?;

    let mut msg = NeighbourMessage::default();
    msg.header.family = AddressFamily::Inet;
    msg.header.ifindex = entry.link_index;
    msg.header.state = NlNeighbourState::Reachable;
    msg.attributes
        .push(NeighbourAttribute::Destination(NeighbourAddress::Inet(
            entry.ip,
        )));
    msg.attributes
        .push(NeighbourAttribute::LinkLocalAddress(
            entry.mac.as_bytes().to_vec(),
        ));

    send_request(
        &socket,
        "neighbor_set",
        RouteNetlinkMessage::NewNeighbour(msg),
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE,
    )?;

    match receive_ack(&socket, "neighbor_set")? {
        0 => Ok(()),
        code => Err(HostnetError::kernel_io(
            "neighbor_set",
            format!("updating {}: {}", entry.ip, os_error_message(code)),
        )),
    }
}

fn state_from_kernel(state: NlNeighbourState) -> NeighborState {
    match state {
        NlNeighbourState::Incomplete => NeighborState::Incomplete,
        NlNeighbourState::Reachable => NeighborState::Reachable,
        NlNeighbourState::Stale => NeighborState::Stale,
        NlNeighbourState::Delay => NeighborState::Delay,
        NlNeighbourState::Probe => NeighborState::Probe,
        NlNeighbourState::Failed => NeighborState::Failed,
        NlNeighbourState::Noarp => NeighborState::NoArp,
        NlNeighbourState::Permanent => NeighborState::Permanent,
        _ => NeighborState::Unknown,
    }
}
