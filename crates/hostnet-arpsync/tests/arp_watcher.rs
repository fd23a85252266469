//! Reconciliation scenarios for the ARP watcher, driven through in-memory
//! fakes of the metadata view and the kernel tables.

use hostnet_arpsync::ArpWatcher;
use hostnet_common::{HostnetError, Watcher};
use hostnet_kernel::{Link, NeighborEntry, NeighborState};
use hostnet_testing::fixtures::{bridge_network, container, host, network_driver_service};
use hostnet_testing::{FakeMetadata, FakeNetlink};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use std::sync::Arc;

const HOST: &str = "h-1";
const OTHER_HOST: &str = "h-2";
const NETWORK: &str = "n-1";
const DRIVER_MAC: &str = "02:dd:dd:dd:dd:dd";
const BRIDGE_INDEX: u32 = 2;

fn bridge_link() -> Link {
    Link {
        index: BRIDGE_INDEX,
        name: "docker0".to_string(),
        master_index: 0,
        parent_index: 0,
    }
}

fn neighbor(ip: [u8; 4], mac: &str, state: NeighborState) -> NeighborEntry {
    NeighborEntry {
        link_index: BRIDGE_INDEX,
        ip: Ipv4Addr::from(ip),
        mac: mac.parse().unwrap(),
        state,
    }
}

/// Metadata with one local network, the driver container on this host, and
/// the given extra containers.
fn metadata_with(containers: Vec<hostnet_metadata::Container>) -> FakeMetadata {
    let driver = container("c-driver", HOST, NETWORK, "10.42.0.2", DRIVER_MAC);
    FakeMetadata {
        host: host(HOST),
        networks: vec![bridge_network(NETWORK, "docker0", "10.42.0.0/16")],
        services: vec![network_driver_service(vec![driver.clone()])],
        containers: {
            let mut all = vec![driver];
            all.extend(containers);
            all
        },
        unavailable: false,
    }
}

fn watcher(
    metadata: FakeMetadata,
    netlink: FakeNetlink,
) -> (ArpWatcher<FakeMetadata, FakeNetlink>, Arc<FakeNetlink>) {
    let netlink = Arc::new(netlink);
    (
        ArpWatcher::new(Arc::new(metadata), netlink.clone()),
        netlink,
    )
}

#[tokio::test]
async fn fixes_wrong_entry_for_local_container() {
    let metadata = metadata_with(vec![container(
        "c-web",
        HOST,
        NETWORK,
        "10.42.0.5",
        "02:aa:aa:aa:aa:05",
    )]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors = vec![neighbor([10, 42, 0, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale)].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    let sets = netlink.recorded_neighbor_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].ip, Ipv4Addr::new(10, 42, 0, 5));
    assert_eq!(sets[0].mac.to_string(), "02:aa:aa:aa:aa:05");
    assert_eq!(sets[0].state, NeighborState::Reachable);
}

#[tokio::test]
async fn fixes_wrong_entry_for_remote_container_with_driver_mac() {
    let metadata = metadata_with(vec![container(
        "c-remote",
        OTHER_HOST,
        NETWORK,
        "10.42.0.8",
        "02:aa:aa:aa:aa:08",
    )]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors =
        vec![neighbor([10, 42, 0, 8], "02:cc:cc:cc:cc:cc", NeighborState::Reachable)].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    let sets = netlink.recorded_neighbor_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].mac.to_string(), DRIVER_MAC);
}

#[tokio::test]
async fn correct_entry_is_left_alone() {
    let metadata = metadata_with(vec![container(
        "c-web",
        HOST,
        NETWORK,
        "10.42.0.5",
        "02:aa:aa:aa:aa:05",
    )]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors =
        vec![neighbor([10, 42, 0, 5], "02:aa:aa:aa:aa:05", NeighborState::Stale)].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    assert!(netlink.recorded_neighbor_sets().is_empty());
}

#[tokio::test]
async fn unknown_ip_is_retained() {
    let metadata = metadata_with(vec![]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors =
        vec![neighbor([10, 42, 0, 99], "02:ee:ee:ee:ee:99", NeighborState::Stale)].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    // Deliberately no mutation: unknown entries age out on their own.
    assert!(netlink.recorded_neighbor_sets().is_empty());
    assert_eq!(netlink.neighbors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn entries_off_bridge_or_subnet_are_ignored() {
    let metadata = metadata_with(vec![container(
        "c-web",
        HOST,
        NETWORK,
        "10.42.0.5",
        "02:aa:aa:aa:aa:05",
    )]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    let off_bridge = NeighborEntry {
        link_index: 9,
        ..neighbor([10, 42, 0, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale)
    };
    let off_subnet = neighbor([192, 168, 1, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale);
    netlink.neighbors = vec![off_bridge, off_subnet].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    assert!(netlink.recorded_neighbor_sets().is_empty());
}

#[tokio::test]
async fn bad_mac_on_one_entry_does_not_block_the_next() {
    let metadata = metadata_with(vec![
        container("c-bad", HOST, NETWORK, "10.42.0.5", "not-a-mac"),
        container("c-good", HOST, NETWORK, "10.42.0.6", "02:aa:aa:aa:aa:06"),
    ]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors = vec![
        neighbor([10, 42, 0, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale),
        neighbor([10, 42, 0, 6], "02:bb:bb:bb:bb:bb", NeighborState::Stale),
    ]
    .into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();

    let sets = netlink.recorded_neighbor_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].ip, Ipv4Addr::new(10, 42, 0, 6));
}

#[tokio::test]
async fn failed_neighbor_set_does_not_block_the_next() {
    let metadata = metadata_with(vec![
        container("c-1", HOST, NETWORK, "10.42.0.5", "02:aa:aa:aa:aa:05"),
        container("c-2", HOST, NETWORK, "10.42.0.6", "02:aa:aa:aa:aa:06"),
    ]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors = vec![
        neighbor([10, 42, 0, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale),
        neighbor([10, 42, 0, 6], "02:bb:bb:bb:bb:bb", NeighborState::Stale),
    ]
    .into();
    netlink.fail_neighbor_set_for = Some(Ipv4Addr::new(10, 42, 0, 5));

    let (mut watcher, netlink) = watcher(metadata, netlink);
    // Entry-level failure: the pass still succeeds.
    watcher.sync().await.unwrap();

    let sets = netlink.recorded_neighbor_sets();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].ip, Ipv4Addr::new(10, 42, 0, 6));
}

#[tokio::test]
async fn second_pass_on_converged_state_mutates_nothing() {
    let metadata = metadata_with(vec![container(
        "c-web",
        HOST,
        NETWORK,
        "10.42.0.5",
        "02:aa:aa:aa:aa:05",
    )]);
    let mut netlink = FakeNetlink::with_links(vec![bridge_link()]);
    netlink.neighbors =
        vec![neighbor([10, 42, 0, 5], "02:bb:bb:bb:bb:bb", NeighborState::Stale)].into();

    let (mut watcher, netlink) = watcher(metadata, netlink);
    watcher.sync().await.unwrap();
    assert_eq!(netlink.recorded_neighbor_sets().len(), 1);

    watcher.sync().await.unwrap();
    assert_eq!(netlink.recorded_neighbor_sets().len(), 1);
}

#[tokio::test]
async fn no_local_network_aborts_the_pass() {
    let metadata = FakeMetadata {
        host: host(HOST),
        networks: vec![bridge_network(NETWORK, "docker0", "10.42.0.0/16")],
        services: vec![],
        containers: vec![],
        unavailable: false,
    };
    let netlink = FakeNetlink::with_links(vec![bridge_link()]);

    let (mut watcher, _) = watcher(metadata, netlink);
    let err = watcher.sync().await.unwrap_err();
    assert!(matches!(err, HostnetError::NoLocalNetwork));
}

#[tokio::test]
async fn metadata_outage_aborts_the_pass() {
    let mut metadata = metadata_with(vec![]);
    metadata.unavailable = true;
    let netlink = FakeNetlink::with_links(vec![bridge_link()]);

    let (mut watcher, netlink) = watcher(metadata, netlink);
    let err = watcher.sync().await.unwrap_err();
    assert!(matches!(err, HostnetError::MetadataUnavailable { .. }));
    assert!(netlink.recorded_neighbor_sets().is_empty());
}
