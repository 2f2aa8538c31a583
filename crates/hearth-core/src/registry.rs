//! Read-only view over the tool's instance registry.

use crate::error::{ReconcileError, Result};
use hearth_multipass::{MultipassClient, VmRecord, VmState};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Query id used when no name is given.
pub const ALL_INSTANCES_ID: &str = "all-instances";

/// Delay between polls in [`InstanceRegistry::wait_for_state`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Answer to a registry query.
///
/// A named query fills `instance`; an unnamed one fills `instances`, which
/// is serialized even when empty so "no instances" stays visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<VmRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<VmRecord>>,
}

/// Stateless lookups of what exists right now.
///
/// Every call goes to the tool; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    client: MultipassClient,
    poll_interval: Duration,
}

impl InstanceRegistry {
    pub fn new(client: MultipassClient) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the delay between polls while waiting for a state.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Look up one instance by name.
    ///
    /// # Errors
    /// `NotFound` when the tool does not know the name.
    pub async fn get(&self, name: &str) -> Result<VmRecord> {
        self.client
            .info(name)
            .await
            .map_err(|e| ReconcileError::from_tool(name, e))
    }

    /// Enumerate every instance. An empty registry is an empty vector.
    pub async fn list(&self) -> Result<Vec<VmRecord>> {
        self.client
            .list()
            .await
            .map_err(|e| ReconcileError::from_tool(ALL_INSTANCES_ID, e))
    }

    /// Answer a named or unnamed query.
    pub async fn query(&self, name: Option<&str>) -> Result<Query> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => Ok(Query {
                id: name.to_string(),
                instance: Some(self.get(name).await?),
                instances: None,
            }),
            None => Ok(Query {
                id: ALL_INSTANCES_ID.to_string(),
                instance: None,
                instances: Some(self.list().await?),
            }),
        }
    }

    /// Poll until the instance reaches one of `states`.
    ///
    /// # Errors
    /// `Timeout` if none of the states is observed within `timeout`; lookup
    /// failures (including `NotFound`) are returned as they happen.
    pub async fn wait_for_state(
        &self,
        name: &str,
        states: &[VmState],
        timeout: Duration,
    ) -> Result<VmRecord> {
        let start = Instant::now();
        loop {
            let record = self.get(name).await?;
            if states.contains(&record.state) {
                tracing::debug!(
                    name,
                    state = %record.state,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "instance reached wanted state"
                );
                return Ok(record);
            }

            if start.elapsed() >= timeout {
                let wanted = states
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("|");
                tracing::warn!(name, state = %record.state, %wanted, "wait for state timed out");
                return Err(ReconcileError::Timeout {
                    name: name.to_string(),
                    wanted,
                    waited: timeout,
                });
            }

            tracing::trace!(name, state = %record.state, "waiting for state");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
