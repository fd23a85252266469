//! Reconciliation scenarios for the veth cleanup watcher.

use hostnet_common::{HostnetError, Watcher};
use hostnet_kernel::Link;
use hostnet_testing::fixtures::{bridge_network, container, host, network_driver_service};
use hostnet_testing::{FakeMetadata, FakeNetlink, FakeRuntime};
use hostnet_vethsync::VethWatcher;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const HOST: &str = "h-1";
const NETWORK: &str = "n-1";
const BRIDGE_INDEX: u32 = 2;

fn link(index: u32, name: &str, master_index: u32) -> Link {
    Link {
        index,
        name: name.to_string(),
        master_index,
        parent_index: 0,
    }
}

fn metadata() -> FakeMetadata {
    let driver = container("c-driver", HOST, NETWORK, "10.42.0.2", "02:dd:dd:dd:dd:dd");
    FakeMetadata {
        host: host(HOST),
        networks: vec![bridge_network(NETWORK, "docker0", "10.42.0.0/16")],
        services: vec![network_driver_service(vec![driver.clone()])],
        containers: vec![driver],
        unavailable: false,
    }
}

fn watcher(
    netlink: FakeNetlink,
    runtime: FakeRuntime,
) -> (
    VethWatcher<FakeMetadata, FakeNetlink, FakeRuntime>,
    Arc<FakeNetlink>,
) {
    let netlink = Arc::new(netlink);
    (
        VethWatcher::new(
            Arc::new(metadata()),
            netlink.clone(),
            Arc::new(runtime),
            "veth".to_string(),
        ),
        netlink,
    )
}

#[tokio::test]
async fn deletes_only_the_unclaimed_veth() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vetha1b2c3", BRIDGE_INDEX),
        link(43, "vethd4e5f6", BRIDGE_INDEX),
    ]);
    let mut runtime = FakeRuntime::default();
    runtime.add_container("8f1c6ab2d3e4aabbccdd", "default", Some(42));

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();

    assert_eq!(netlink.deleted_link_names(), vec!["vethd4e5f6".to_string()]);
}

#[tokio::test]
async fn respects_prefix_and_master_filters() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        // Wrong prefix, right master.
        link(40, "tap0", BRIDGE_INDEX),
        // Right prefix, no master.
        link(41, "vethfree", 0),
        // Right prefix, master is not a local bridge.
        link(44, "vethother", 9),
    ]);
    let runtime = FakeRuntime::default();

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();

    assert!(netlink.deleted_link_names().is_empty());
}

#[tokio::test]
async fn ns_failure_skips_that_container_only() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vetha1b2c3", BRIDGE_INDEX),
        link(43, "vethd4e5f6", BRIDGE_INDEX),
    ]);
    let mut runtime = FakeRuntime::default();
    runtime.add_container("8f1c6ab2d3e4aabbccdd", "default", Some(42));
    runtime.add_container("0123456789abcdef0123", "default", None);

    let (mut watcher, netlink) = watcher(netlink, runtime);
    // The second container's namespace entry fails; the scan completes
    // anyway with the entries it could resolve.
    watcher.sync().await.unwrap();

    assert_eq!(netlink.deleted_link_names(), vec!["vethd4e5f6".to_string()]);
}

#[tokio::test]
async fn host_networked_containers_are_excluded() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vetha1b2c3", BRIDGE_INDEX),
    ]);
    let mut runtime = FakeRuntime::default();
    runtime.add_container("hostnetted00aabbccdd", "host", Some(42));

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();

    // The host-networked container does not claim veth 42, so it is
    // dangling and removed.
    assert_eq!(netlink.deleted_link_names(), vec!["vetha1b2c3".to_string()]);
}

#[tokio::test]
async fn falls_back_to_id_derived_names_when_ns_view_is_empty() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vethr8f1c6ab2d3", BRIDGE_INDEX),
        link(43, "vethr0123456789", BRIDGE_INDEX),
    ]);
    let mut runtime = FakeRuntime::default();
    // Namespace entry fails for every container.
    runtime.add_container("8f1c6ab2d3e4aabbccdd", "default", None);

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();

    // Name-keyed pairing: vethr8f1c6ab2d3 is claimed by id derivation,
    // vethr0123456789 belongs to no live container.
    assert_eq!(
        netlink.deleted_link_names(),
        vec!["vethr0123456789".to_string()]
    );
}

#[tokio::test]
async fn no_containers_means_every_veth_is_dangling() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vetha1b2c3", BRIDGE_INDEX),
    ]);
    let runtime = FakeRuntime::default();

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();

    assert_eq!(netlink.deleted_link_names(), vec!["vetha1b2c3".to_string()]);
}

#[tokio::test]
async fn no_local_bridge_aborts_the_pass() {
    // The bridge named in the CNI config has no kernel link.
    let netlink = FakeNetlink::with_links(vec![link(42, "vetha1b2c3", BRIDGE_INDEX)]);
    let runtime = FakeRuntime::default();

    let (mut watcher, netlink) = watcher(netlink, runtime);
    let err = watcher.sync().await.unwrap_err();

    assert!(matches!(err, HostnetError::NoLocalBridge));
    assert!(netlink.deleted_link_names().is_empty());
}

#[tokio::test]
async fn second_pass_on_converged_state_mutates_nothing() {
    let netlink = FakeNetlink::with_links(vec![
        link(BRIDGE_INDEX, "docker0", 0),
        link(42, "vetha1b2c3", BRIDGE_INDEX),
        link(43, "vethd4e5f6", BRIDGE_INDEX),
    ]);
    let mut runtime = FakeRuntime::default();
    runtime.add_container("8f1c6ab2d3e4aabbccdd", "default", Some(42));

    let (mut watcher, netlink) = watcher(netlink, runtime);
    watcher.sync().await.unwrap();
    assert_eq!(netlink.deleted_link_names().len(), 1);

    // The fake removed the deleted link from its table; nothing further
    // to clean on the second pass.
    watcher.sync().await.unwrap();
    assert_eq!(netlink.deleted_link_names().len(), 1);
}
