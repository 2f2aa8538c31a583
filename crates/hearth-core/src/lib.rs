//! # hearth-core
//!
//! Reconciliation engine for Multipass virtual machines.
//!
//! Validates a declared [`VmSpec`], turns it into tool invocations and
//! drives the instance through its lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ Reconciler ──▶ Validator            (pure, no tool calls)
//!               │
//!               ├──────────▶ InstanceRegistry ──┐
//!               ▼                               ▼
//!          MultipassClient ──▶ CommandRunner ──▶ multipass
//!               │
//!               └── decode ──▶ VmRecord | ToolError
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use hearth_core::{Reconciler, ReconcilerConfig, VmSpec};
//!
//! # async fn example() -> hearth_core::Result<()> {
//! let reconciler = Reconciler::new(ReconcilerConfig::from_env());
//!
//! let spec = VmSpec::new("dev-box")
//!     .image("22.04")
//!     .cpu("2")
//!     .memory("2G")
//!     .disk("10G");
//!
//! let record = reconciler.create(&spec).await?;
//! println!("{} is {} at {:?}", record.name, record.state, record.ipv4);
//!
//! // Later: None means the instance vanished outside our control
//! if reconciler.refresh("dev-box").await?.is_none() {
//!     println!("dev-box is gone");
//! }
//!
//! reconciler.delete("dev-box").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! [`Reconciler`] holds no lock and no cache. Operations on distinct names
//! run independently; on one name the tool's own state decides, and a
//! duplicate create surfaces as [`ReconcileError::Conflict`].

pub mod config;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod spec;
pub mod validate;

pub use config::{ConfigError, ReconcilerConfig};
pub use error::{Fault, ReconcileError, Result};
pub use reconciler::{Plan, Reconciler};
pub use registry::{InstanceRegistry, Query, ALL_INSTANCES_ID};
pub use spec::VmSpec;
pub use validate::{Field, Limits, ValidationError, Validator};

// Re-export tool-layer types that appear in this crate's API
pub use hearth_multipass::{
    ByteSize, CommandOutput, CommandRunner, LaunchRequest, MultipassClient, SizeUnit, ToolError,
    VmRecord, VmState,
};
