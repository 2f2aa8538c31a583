//! # hearth-multipass
//!
//! Command layer for driving the Multipass CLI.
//! Spawns the tool, decodes its JSON output and classifies its failures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hearth_multipass::{LaunchRequest, MultipassClient};
//!
//! # async fn example() -> hearth_multipass::Result<()> {
//! let client = MultipassClient::new("multipass");
//!
//! let request = LaunchRequest::new("dev-box").image("22.04").cpus(2);
//! client.launch(&request).await?;
//!
//! let record = client.info("dev-box").await?;
//! println!("{} is {}", record.name, record.state);
//!
//! client.delete("dev-box").await?;
//! client.purge().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Process Execution**: One subprocess per call, stdout and stderr captured
//! - **Structured Decoding**: `list` and `info` payloads into typed records
//! - **Partial Failures**: Per-entity `errors` kept apart from not-found
//! - **Failure Classification**: Tool diagnostics classified once, at the boundary
//! - **Runner Seam**: `CommandRunner` lets tests substitute a fake tool

mod client;
mod command;
mod decode;
mod error;
mod launch;
mod record;

pub use client::{MultipassClient, DEFAULT_BINARY};
pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use decode::{decode_info, decode_list, InfoOutcome};
pub use error::{Action, DecodeError, FailureCause, Result, ToolError};
pub use launch::{ByteSize, LaunchRequest, SizeUnit};
pub use record::{VmRecord, VmState};
