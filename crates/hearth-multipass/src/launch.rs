//! Launch parameters and their rendering into tool arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Unit suffix of a size value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeUnit {
    B,
    K,
    M,
    G,
    T,
}

impl SizeUnit {
    /// Bytes per unit.
    pub fn multiplier(&self) -> u64 {
        match self {
            SizeUnit::B => 1,
            SizeUnit::K => 1 << 10,
            SizeUnit::M => 1 << 20,
            SizeUnit::G => 1 << 30,
            SizeUnit::T => 1 << 40,
        }
    }

    /// Parse a unit suffix (`K`, `M`, `G`, `T`, case-insensitive, optional trailing `B`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "" | "B" => Some(SizeUnit::B),
            "K" | "KB" => Some(SizeUnit::K),
            "M" | "MB" => Some(SizeUnit::M),
            "G" | "GB" => Some(SizeUnit::G),
            "T" | "TB" => Some(SizeUnit::T),
            _ => None,
        }
    }
}

/// A memory or disk size as the tool expects it (`512M`, `5G`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSize {
    pub value: u64,
    pub unit: SizeUnit,
}

impl ByteSize {
    pub const fn new(value: u64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    /// Total size in bytes, saturating.
    pub fn bytes(&self) -> u64 {
        self.value.saturating_mul(self.unit.multiplier())
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            SizeUnit::B => write!(f, "{}", self.value),
            unit => write!(f, "{}{:?}", self.value, unit),
        }
    }
}

/// Parameters for `multipass launch`.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub name: String,
    pub image: Option<String>,
    pub cpus: Option<u32>,
    pub memory: Option<ByteSize>,
    pub disk: Option<ByteSize>,
    pub cloud_init: Option<PathBuf>,
    /// Bound on the whole launch, passed to the tool as `--timeout`
    pub timeout: Option<Duration>,
}

impl LaunchRequest {
    /// Create a request for the given instance name with tool defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            cpus: None,
            memory: None,
            disk: None,
            cloud_init: None,
            timeout: None,
        }
    }

    /// Set the image (`22.04`, `jammy`, `docker`).
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the vCPU count.
    pub fn cpus(mut self, count: u32) -> Self {
        self.cpus = Some(count);
        self
    }

    /// Set the memory size.
    pub fn memory(mut self, size: ByteSize) -> Self {
        self.memory = Some(size);
        self
    }

    /// Set the disk size.
    pub fn disk(mut self, size: ByteSize) -> Self {
        self.disk = Some(size);
        self
    }

    /// Set the cloud-init seed file.
    pub fn cloud_init(mut self, path: impl Into<PathBuf>) -> Self {
        self.cloud_init = Some(path.into());
        self
    }

    /// Set the launch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Render the argument vector, omitting every unset option.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["launch".to_string()];

        if let Some(image) = self.image.as_deref().filter(|i| !i.is_empty()) {
            args.push(image.to_string());
        }

        args.push("--name".into());
        args.push(self.name.clone());

        if let Some(cpus) = self.cpus {
            args.push("--cpus".into());
            args.push(cpus.to_string());
        }
        if let Some(memory) = self.memory {
            args.push("--memory".into());
            args.push(memory.to_string());
        }
        if let Some(disk) = self.disk {
            args.push("--disk".into());
            args.push(disk.to_string());
        }
        if let Some(path) = &self.cloud_init {
            args.push("--cloud-init".into());
            args.push(path.to_string_lossy().into_owned());
        }
        if let Some(timeout) = self.timeout {
            args.push("--timeout".into());
            args.push(timeout_secs(timeout).to_string());
        }

        args
    }
}

/// Whole seconds for the tool's `--timeout`, never below one.
fn timeout_secs(timeout: Duration) -> u64 {
    (timeout.as_secs_f64().round() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize::new(512, SizeUnit::M).to_string(), "512M");
        assert_eq!(ByteSize::new(5, SizeUnit::G).to_string(), "5G");
        assert_eq!(ByteSize::new(1073741824, SizeUnit::B).to_string(), "1073741824");
    }

    #[test]
    fn test_byte_size_bytes() {
        assert_eq!(ByteSize::new(1, SizeUnit::G).bytes(), 1073741824);
        assert_eq!(
            ByteSize::new(1024, SizeUnit::M).bytes(),
            ByteSize::new(1, SizeUnit::G).bytes()
        );
        assert_eq!(ByteSize::new(u64::MAX, SizeUnit::T).bytes(), u64::MAX);
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!(SizeUnit::parse("G"), Some(SizeUnit::G));
        assert_eq!(SizeUnit::parse("mb"), Some(SizeUnit::M));
        assert_eq!(SizeUnit::parse(""), Some(SizeUnit::B));
        assert_eq!(SizeUnit::parse("X"), None);
    }

    #[test]
    fn test_minimal_args() {
        let args = LaunchRequest::new("a").args();
        assert_eq!(args, vec!["launch", "--name", "a"]);
    }

    #[test]
    fn test_full_args() {
        let request = LaunchRequest::new("test-instance")
            .image("22.04")
            .cpus(2)
            .memory(ByteSize::new(2, SizeUnit::G))
            .disk(ByteSize::new(10, SizeUnit::G))
            .cloud_init("/path/to/cloud-init.yaml")
            .timeout(Duration::from_secs(15 * 60));

        assert_eq!(
            request.args(),
            vec![
                "launch",
                "22.04",
                "--name",
                "test-instance",
                "--cpus",
                "2",
                "--memory",
                "2G",
                "--disk",
                "10G",
                "--cloud-init",
                "/path/to/cloud-init.yaml",
                "--timeout",
                "900",
            ]
        );
    }

    #[test]
    fn test_empty_image_is_omitted() {
        let args = LaunchRequest::new("a").image("").args();
        assert_eq!(args, vec!["launch", "--name", "a"]);
    }

    #[test]
    fn test_timeout_rounding() {
        assert_eq!(timeout_secs(Duration::from_millis(90_600)), 91);
        assert_eq!(timeout_secs(Duration::from_millis(200)), 1);
        assert_eq!(timeout_secs(Duration::from_secs(5445)), 5445);
    }
}
