//! In-memory stand-in for the multipass binary.
//!
//! Models the tool's registry closely enough to exercise the reconciler:
//! atomic name reservation on launch, soft delete plus purge, and the
//! start/stop/suspend state machine. Every invocation is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use hearth_core::{CommandOutput, CommandRunner, Limits, MultipassClient, Reconciler, VmState};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct FakeMultipass {
    instances: Mutex<HashMap<String, VmState>>,
    calls: Mutex<Vec<Vec<String>>>,
    fail_purge: AtomicBool,
    info_payload: Mutex<Option<String>>,
}

impl FakeMultipass {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a reconciler whose client talks to this fake.
    pub fn reconciler(self: &Arc<Self>) -> Reconciler {
        let client = MultipassClient::with_runner(self.clone());
        Reconciler::with_client(client, Limits::default())
    }

    /// Number of tool invocations so far.
    pub fn invocations(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every recorded argument vector, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every following `purge` fail.
    pub fn fail_purge(&self) {
        self.fail_purge.store(true, Ordering::SeqCst);
    }

    /// Answer every following `info` with this payload and exit 0.
    pub fn set_info_payload(&self, payload: &str) {
        *self.info_payload.lock().unwrap() = Some(payload.to_string());
    }

    /// Put an instance into the registry behind the reconciler's back.
    pub fn insert(&self, name: &str, state: VmState) {
        self.instances
            .lock()
            .unwrap()
            .insert(name.to_string(), state);
    }

    /// Remove an instance behind the reconciler's back.
    pub fn remove(&self, name: &str) {
        self.instances.lock().unwrap().remove(name);
    }

    pub fn state(&self, name: &str) -> Option<VmState> {
        self.instances.lock().unwrap().get(name).copied()
    }

    fn launch(&self, args: &[String]) -> CommandOutput {
        let Some(name) = flag_value(args, "--name") else {
            return CommandOutput::failed(1, "launch failed: missing --name");
        };

        let mut instances = self.instances.lock().unwrap();
        if instances.contains_key(name) {
            return CommandOutput::failed(
                2,
                format!("launch failed: instance \"{name}\" already exists"),
            );
        }
        instances.insert(name.to_string(), VmState::Running);
        CommandOutput::ok(format!("Launched: {name}\n"))
    }

    fn info(&self, name: &str) -> CommandOutput {
        if let Some(payload) = self.info_payload.lock().unwrap().clone() {
            return CommandOutput::ok(payload);
        }

        match self.state(name) {
            Some(state) => CommandOutput::ok(info_json(name, state)),
            None => CommandOutput::failed(
                2,
                format!("info failed: The following errors occurred:\ninstance \"{name}\" does not exist\n"),
            ),
        }
    }

    fn list(&self) -> CommandOutput {
        let instances = self.instances.lock().unwrap();
        let mut names: Vec<_> = instances.keys().cloned().collect();
        names.sort();
        let entries: Vec<String> = names
            .iter()
            .filter(|n| instances[*n] != VmState::Deleted)
            .map(|n| {
                format!(
                    r#"{{"name": "{n}", "state": "{}", "ipv4": [], "release": "Ubuntu 22.04 LTS"}}"#,
                    instances[n]
                )
            })
            .collect();
        CommandOutput::ok(format!(r#"{{"list": [{}]}}"#, entries.join(", ")))
    }

    fn delete(&self, name: &str) -> CommandOutput {
        let mut instances = self.instances.lock().unwrap();
        match instances.get_mut(name) {
            Some(state) if *state != VmState::Deleted => {
                *state = VmState::Deleted;
                CommandOutput::ok("")
            }
            _ => CommandOutput::failed(
                2,
                format!("delete failed: The following errors occurred:\ninstance \"{name}\" does not exist\n"),
            ),
        }
    }

    fn purge(&self) -> CommandOutput {
        if self.fail_purge.load(Ordering::SeqCst) {
            return CommandOutput::failed(1, "purge failed: cannot connect to the multipass socket");
        }
        self.instances
            .lock()
            .unwrap()
            .retain(|_, state| *state != VmState::Deleted);
        CommandOutput::ok("")
    }

    fn transition(&self, verb: &str, name: &str) -> CommandOutput {
        let mut instances = self.instances.lock().unwrap();
        let Some(state) = instances.get_mut(name) else {
            return CommandOutput::failed(
                2,
                format!("{verb} failed: instance \"{name}\" does not exist"),
            );
        };

        let next = match (verb, *state) {
            (_, VmState::Deleted) => Err("is deleted"),
            ("start", _) => Ok(VmState::Running),
            ("stop", VmState::Running | VmState::Starting) => Ok(VmState::Stopped),
            ("stop", VmState::Stopped) => Err("is already stopped"),
            ("restart", VmState::Running | VmState::Starting) => Ok(VmState::Running),
            ("suspend", VmState::Running) => Ok(VmState::Suspended),
            (_, _) => Err("is not running"),
        };

        match next {
            Ok(next) => {
                *state = next;
                CommandOutput::ok("")
            }
            Err(why) => CommandOutput::failed(2, format!("{verb} failed: instance \"{name}\" {why}")),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeMultipass {
    fn binary(&self) -> &Path {
        Path::new("fake-multipass")
    }

    async fn run(&self, args: &[String], _limit: Option<Duration>) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(args.to_vec());

        // Let concurrent callers interleave like separate processes would
        tokio::task::yield_now().await;

        let verb = args.first().map(String::as_str).unwrap_or_default();
        let name = args.get(1).map(String::as_str).unwrap_or_default();
        Ok(match verb {
            "launch" => self.launch(args),
            "info" => self.info(name),
            "list" => self.list(),
            "delete" => self.delete(name),
            "purge" => self.purge(),
            "start" | "stop" | "restart" | "suspend" => self.transition(verb, name),
            other => CommandOutput::failed(1, format!("unknown command: {other}")),
        })
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn info_json(name: &str, state: VmState) -> String {
    let ipv4 = if state == VmState::Running {
        r#"["192.168.64.2"]"#
    } else {
        "[]"
    };
    format!(
        r#"{{"errors": [], "info": {{"{name}": {{"state": "{state}", "ipv4": {ipv4}, "release": "Ubuntu 22.04 LTS", "image_hash": "f3b1c2", "cpu_count": "1", "load": [0.1, 0.2, 0.3]}}}}}}"#
    )
}
