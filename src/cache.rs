use crate::config::IdentificationConfig;
use crate::snapshot::Snapshot;
use serde::Serialize;

/// Identity fields attached to every flushed batch. Set once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub machine_nickname: String,
}

impl From<&IdentificationConfig> for Identity {
    fn from(value: &IdentificationConfig) -> Self {
        Self {
            account_id: value.account_id.clone(),
            organization_id: value.organization_id.clone(),
            organization_name: value.organization_name.clone(),
            machine_nickname: value.machine_nickname.clone(),
        }
    }
}

/// Snapshots awaiting transmission, in collection order. Owned by the
/// scheduler; the reporter only ever sees a [`BatchView`].
#[derive(Debug)]
pub struct BatchCache {
    node: Vec<Snapshot>,
    identity: Identity,
    agent_version: String,
}

impl BatchCache {
    pub fn new(identity: Identity, agent_version: impl Into<String>) -> Self {
        Self {
            node: Vec::new(),
            identity,
            agent_version: agent_version.into(),
        }
    }

    pub fn append(&mut self, snapshot: Snapshot) {
        self.node.push(snapshot);
    }

    /// Drops every snapshot. Identity and version are untouched.
    pub fn reset(&mut self) {
        self.node.clear();
    }

    pub fn len(&self) -> usize {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// Read-only projection used for serialization. Borrowing `self` keeps the
    /// cache frozen for as long as the view is alive.
    pub fn snapshot_view(&self) -> BatchView<'_> {
        BatchView {
            node: &self.node,
            account_id: &self.identity.account_id,
            version: &self.agent_version,
            organization_id: &self.identity.organization_id,
            organization_name: &self.identity.organization_name,
            machine_nickname: &self.identity.machine_nickname,
        }
    }
}

/// Flush payload as it goes over the wire.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchView<'a> {
    pub node: &'a [Snapshot],
    pub account_id: &'a str,
    pub version: &'a str,
    pub organization_id: &'a str,
    pub organization_name: &'a str,
    pub machine_nickname: &'a str,
}
