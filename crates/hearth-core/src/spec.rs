//! Desired-state specification of a VM.

use serde::{Deserialize, Serialize};

/// Caller-declared configuration for one VM.
///
/// Every field is kept exactly as the caller wrote it; parsing into typed
/// values happens once, in [`Validator::validate`](crate::Validator::validate).
/// `name` is the identity. All other fields are immutable after creation:
/// changing them means destroy-and-recreate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmSpec {
    /// Instance name, unique across the tool's registry
    pub name: String,
    /// OS image reference (`22.04`, `jammy`); the tool's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// vCPU count as a positive integer string
    pub cpu: String,
    /// Memory size with unit suffix (`1G`, `512M`)
    pub memory: String,
    /// Disk size with unit suffix (`5G`)
    pub disk: String,
    /// Path to a cloud-init YAML seed file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<String>,
    /// Bound on the create operation (`5m`, `300s`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl VmSpec {
    /// Create a spec with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the image.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the vCPU count.
    pub fn cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = cpu.into();
        self
    }

    /// Set the memory size.
    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = memory.into();
        self
    }

    /// Set the disk size.
    pub fn disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = disk.into();
        self
    }

    /// Set the cloud-init seed file.
    pub fn cloud_init(mut self, path: impl Into<String>) -> Self {
        self.cloud_init = Some(path.into());
        self
    }

    /// Set the create timeout.
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Names of the fields whose values differ from `other`.
    ///
    /// `name` is the identity and counts like any other immutable field.
    /// `timeout` only bounds creation and is never compared. An unset
    /// optional and an empty string are the same declaration.
    pub fn changed_fields(&self, other: &VmSpec) -> Vec<&'static str> {
        fn norm(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("")
        }

        let mut changed = Vec::new();
        if self.name != other.name {
            changed.push("name");
        }
        if norm(&self.image) != norm(&other.image) {
            changed.push("image");
        }
        if self.cpu != other.cpu {
            changed.push("cpu");
        }
        if self.memory != other.memory {
            changed.push("memory");
        }
        if self.disk != other.disk {
            changed.push("disk");
        }
        if norm(&self.cloud_init) != norm(&other.cloud_init) {
            changed.push("cloud_init");
        }
        changed
    }
}
