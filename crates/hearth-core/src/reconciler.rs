//! Lifecycle reconciler.
//!
//! Maps reconciliation verbs onto ordered tool invocations. The reconciler
//! holds only immutable configuration: it takes no locks and keeps no cache,
//! so clones can drive any number of names concurrently. Races on one name
//! are settled by the tool itself, which rejects a duplicate launch.

use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, Result};
use crate::registry::InstanceRegistry;
use crate::spec::VmSpec;
use crate::validate::{Limits, Validator};
use hearth_multipass::{MultipassClient, ToolError, VmRecord};
use tracing::Instrument;

/// Outcome of comparing a prior spec with a desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing to do
    NoOp,
    /// Immutable fields changed; destroy and recreate
    Replace { fields: Vec<&'static str> },
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::NoOp)
    }
}

/// Drives instances from their observed state to the declared one.
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: MultipassClient,
    validator: Validator,
    registry: InstanceRegistry,
}

impl Reconciler {
    /// Create a reconciler spawning the configured binary.
    pub fn new(config: ReconcilerConfig) -> Self {
        let client = MultipassClient::new(config.binary_path).launch_grace(config.launch_grace);
        Self::with_client(client, config.limits)
    }

    /// Create a reconciler over an existing client.
    pub fn with_client(client: MultipassClient, limits: Limits) -> Self {
        Self {
            registry: InstanceRegistry::new(client.clone()),
            validator: Validator::new(limits),
            client,
        }
    }

    /// The read-only registry view sharing this reconciler's client.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate the spec, launch it, then read back the observed record.
    ///
    /// Not idempotent by name: if the tool already knows the name, this fails
    /// with `Conflict` and the existing instance is left untouched.
    ///
    /// # Errors
    /// * `Validation` before any tool call if the spec is invalid
    /// * `Conflict` if the name is taken
    /// * `Tool` with the tool's own diagnostic for anything else
    pub async fn create(&self, spec: &VmSpec) -> Result<VmRecord> {
        let span = tracing::info_span!("create", name = %spec.name);
        async move {
            let request = self.validator.validate(spec).inspect_err(|e| {
                tracing::info!(field = %e.field(), reason = e.reason(), "spec rejected");
            })?;

            tracing::info!(
                image = request.image.as_deref().unwrap_or("default"),
                cpus = ?request.cpus,
                timeout = ?request.timeout,
                "launching instance"
            );
            self.client
                .launch(&request)
                .await
                .map_err(|e| ReconcileError::from_tool(&spec.name, e))?;

            let record = self.registry.get(&spec.name).await?;
            tracing::info!(state = %record.state, ipv4 = ?record.ipv4, "instance created");
            Ok(record)
        }
        .instrument(span)
        .await
    }

    /// Read the current observed state.
    ///
    /// # Errors
    /// `NotFound` if the tool does not know the name. After a prior
    /// successful create this means the instance vanished; see [`refresh`](Self::refresh).
    pub async fn read(&self, name: &str) -> Result<VmRecord> {
        let span = tracing::debug_span!("read", name);
        self.registry.get(name).instrument(span).await
    }

    /// Read the current observed state, reporting absence as `None`.
    ///
    /// Callers holding a persisted record drop it on `None`.
    pub async fn refresh(&self, name: &str) -> Result<Option<VmRecord>> {
        match self.read(name).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                tracing::info!(name, "instance no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Compare a prior spec with a desired one.
    pub fn plan(&self, prior: &VmSpec, desired: &VmSpec) -> Plan {
        let fields = prior.changed_fields(desired);
        if fields.is_empty() {
            Plan::NoOp
        } else {
            Plan::Replace { fields }
        }
    }

    /// Accept a no-op plan. Makes no tool call.
    ///
    /// # Errors
    /// `ReplacementRequired` naming the changed fields when the plan is not a
    /// no-op; the caller should [`replace`](Self::replace) instead.
    pub async fn update(&self, prior: &VmSpec, desired: &VmSpec) -> Result<()> {
        let span = tracing::info_span!("update", name = %desired.name);
        span.in_scope(|| match self.plan(prior, desired) {
            Plan::NoOp => {
                tracing::debug!("no changes");
                Ok(())
            }
            Plan::Replace { fields } => {
                tracing::info!(?fields, "immutable fields changed");
                Err(ReconcileError::ReplacementRequired {
                    name: desired.name.clone(),
                    fields,
                })
            }
        })
    }

    /// Destroy the prior instance and create the desired one.
    ///
    /// The desired spec is validated before anything is destroyed.
    pub async fn replace(&self, prior: &VmSpec, desired: &VmSpec) -> Result<VmRecord> {
        let span = tracing::info_span!("replace", name = %prior.name);
        async move {
            self.validator.validate(desired)?;
            self.delete(&prior.name).await?;
            self.create(desired).await
        }
        .instrument(span)
        .await
    }

    /// Delete an instance, then purge so the deletion is final.
    ///
    /// # Errors
    /// * whatever the tool reports for `delete`, unmasked (deleting an
    ///   unknown name is `NotFound`)
    /// * `PurgeFailed` if `delete` succeeded but `purge` did not
    pub async fn delete(&self, name: &str) -> Result<()> {
        let span = tracing::info_span!("delete", name);
        async move {
            self.client
                .delete(name)
                .await
                .map_err(|e| ReconcileError::from_tool(name, e))?;

            self.client.purge().await.map_err(|source| {
                tracing::warn!(error = %source, "purge failed after delete");
                ReconcileError::PurgeFailed {
                    name: name.to_string(),
                    source,
                }
            })?;

            tracing::info!("instance deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Adopt an existing instance by name.
    ///
    /// # Errors
    /// * `Validation` if the name itself is invalid
    /// * `NotFound` if the tool does not know the name
    pub async fn import(&self, name: &str) -> Result<VmRecord> {
        let span = tracing::info_span!("import", name);
        async move {
            self.validator.validate_name(name)?;
            let record = self.registry.get(name).await?;
            tracing::info!(state = %record.state, "instance imported");
            Ok(record)
        }
        .instrument(span)
        .await
    }

    /// Start a stopped or suspended instance.
    pub async fn start(&self, name: &str) -> Result<()> {
        self.verb("start", name, self.client.start(name)).await
    }

    /// Stop a running instance.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.verb("stop", name, self.client.stop(name)).await
    }

    /// Restart an instance.
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.verb("restart", name, self.client.restart(name)).await
    }

    /// Suspend a running instance.
    pub async fn suspend(&self, name: &str) -> Result<()> {
        self.verb("suspend", name, self.client.suspend(name)).await
    }

    async fn verb(
        &self,
        verb: &'static str,
        name: &str,
        call: impl std::future::Future<Output = std::result::Result<(), ToolError>>,
    ) -> Result<()> {
        let span = tracing::info_span!("verb", verb, name);
        async move {
            call.await
                .map_err(|e| ReconcileError::from_tool(name, e))
                .inspect_err(|e| tracing::info!(error = %e, fault = %e.fault(), "verb failed"))?;
            tracing::info!("done");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
