//! In-memory conntrack DNAT table.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result};
use hostnet_kernel::{ConntrackOps, DnatEntry};
use std::sync::Mutex;

/// Fake DNAT table. `delete` removes the entry and records its key.
#[derive(Debug, Default)]
pub struct FakeConntrack {
    pub entries: Mutex<Vec<DnatEntry>>,
    pub deleted: Mutex<Vec<String>>,
    /// Injected per-entry failure: deleting this key errors.
    pub fail_delete_for: Option<String>,
}

impl FakeConntrack {
    pub fn with_entries(entries: Vec<DnatEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConntrackOps for FakeConntrack {
    async fn list_dnat(&self) -> Result<Vec<DnatEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn delete(&self, entry: &DnatEntry) -> Result<()> {
        if self.fail_delete_for.as_deref() == Some(entry.key().as_str()) {
            return Err(HostnetError::kernel_io("conntrack_delete", "injected failure"));
        }

        self.entries.lock().unwrap().retain(|e| e != entry);
        self.deleted.lock().unwrap().push(entry.key());
        Ok(())
    }
}
