//! Scoped network-namespace entry.
//!
//! `setns(2)` moves the *calling thread* into another namespace, so the
//! callback runs on a dedicated OS thread that enters the target namespace,
//! runs the closure, and is restored by a guard on every exit path,
//! including panics. The thread is joined before this module returns, so
//! no runtime worker ever observes a foreign namespace.

use hostnet_common::{HostnetError, Result};
use nix::sched::{setns, CloneFlags};
use std::fs::File;
use std::os::fd::AsFd;
use tracing::error;

/// Runs `f` inside the network namespace of the process `pid`.
///
/// Blocks the calling thread for the duration; drive this from a blocking
/// pool when calling out of async code.
pub fn with_netns<T, F>(container_id: &str, pid: i32, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    std::thread::scope(|scope| {
        let handle = scope.spawn(|| enter_and_run(container_id, pid, f));
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(HostnetError::ns_entry(
                container_id,
                "namespace callback panicked",
            )),
        }
    })
}

fn enter_and_run<T, F>(container_id: &str, pid: i32, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let target = File::open(format!("/proc/{}/ns/net", pid)).map_err(|e| {
        HostnetError::ns_entry(container_id, format!("opening target namespace: {}", e))
    })?;
    // The thread's own namespace, not the process one: the guard must put
    // this thread back exactly where it started.
    let original = File::open("/proc/thread-self/ns/net").map_err(|e| {
        HostnetError::ns_entry(container_id, format!("opening original namespace: {}", e))
    })?;

    let _guard = NetnsGuard::enter(target, original, container_id)?;
    f()
}

/// Restores the original namespace when dropped.
struct NetnsGuard {
    original: File,
}

impl NetnsGuard {
    fn enter(target: File, original: File, container_id: &str) -> Result<Self> {
        setns(target.as_fd(), CloneFlags::CLONE_NEWNET)
            .map_err(|e| HostnetError::ns_entry(container_id, format!("setns: {}", e)))?;
        Ok(Self { original })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if let Err(err) = setns(self.original.as_fd(), CloneFlags::CLONE_NEWNET) {
            // The thread is stuck in a foreign namespace; it dies with the
            // scope, so nothing else can run on it, but say so loudly.
            error!(error = %err, "failed to restore original network namespace");
        }
    }
}
