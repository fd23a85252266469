//! Test infrastructure for the hostnet watchers.
//!
//! Provides in-memory fakes of the capability traits (metadata view,
//! netlink, conntrack, container runtime) plus fixture builders for the
//! metadata entities. The fakes record every mutation so tests can assert
//! exactly which kernel operations a reconciliation pass issued.

pub mod fixtures;

mod fake_conntrack;
mod fake_metadata;
mod fake_netlink;
mod fake_runtime;

pub use fake_conntrack::FakeConntrack;
pub use fake_metadata::FakeMetadata;
pub use fake_netlink::FakeNetlink;
pub use fake_runtime::FakeRuntime;
