//! Spec validation.
//!
//! Validation is pure: it never touches the tool, so an invalid spec can
//! never cause a subprocess to be spawned. Rules are checked field by field
//! in declaration order and the first failure wins.

use crate::spec::VmSpec;
use hearth_multipass::{ByteSize, LaunchRequest, SizeUnit};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Longest accepted instance name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Spec field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Cpu,
    Memory,
    Disk,
    CloudInit,
    Timeout,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name => write!(f, "name"),
            Field::Cpu => write!(f, "cpu"),
            Field::Memory => write!(f, "memory"),
            Field::Disk => write!(f, "disk"),
            Field::CloudInit => write!(f, "cloud_init"),
            Field::Timeout => write!(f, "timeout"),
        }
    }
}

/// A spec field violates a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    field: Field,
    reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// The offending field.
    pub fn field(&self) -> Field {
        self.field
    }

    /// Why the value was rejected.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Resource bounds enforced by the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    /// Highest accepted vCPU count
    pub max_cpus: u32,
    pub min_memory: ByteSize,
    pub max_memory: ByteSize,
    pub min_disk: ByteSize,
    pub max_disk: ByteSize,
    /// Longest accepted cloud-init path, in characters
    pub max_cloud_init_path: usize,
    /// Longest accepted create timeout
    pub max_timeout: Duration,
    /// Require the cloud-init file to exist on disk
    pub check_cloud_init_exists: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_cpus: 64,
            min_memory: ByteSize::new(256, SizeUnit::M),
            max_memory: ByteSize::new(512, SizeUnit::G),
            min_disk: ByteSize::new(5, SizeUnit::G),
            max_disk: ByteSize::new(4096, SizeUnit::G),
            max_cloud_init_path: 1000,
            max_timeout: Duration::from_secs(24 * 60 * 60),
            check_cloud_init_exists: false,
        }
    }
}

/// Checks specs against [`Limits`] and turns them into launch requests.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Validate a full spec and parse it into a typed launch request.
    ///
    /// # Errors
    /// Returns the first rule violation, naming the offending field.
    pub fn validate(&self, spec: &VmSpec) -> Result<LaunchRequest, ValidationError> {
        self.validate_name(&spec.name)?;

        let cpus = parse_cpu(&spec.cpu, self.limits.max_cpus)
            .map_err(|r| ValidationError::new(Field::Cpu, r))?;
        let memory = parse_size(
            Field::Memory,
            &spec.memory,
            self.limits.min_memory,
            self.limits.max_memory,
        )?;
        let disk = parse_size(
            Field::Disk,
            &spec.disk,
            self.limits.min_disk,
            self.limits.max_disk,
        )?;
        let cloud_init = self
            .parse_cloud_init(spec.cloud_init.as_deref().unwrap_or(""))
            .map_err(|r| ValidationError::new(Field::CloudInit, r))?;
        let timeout = parse_timeout(spec.timeout.as_deref().unwrap_or(""), self.limits.max_timeout)
            .map_err(|r| ValidationError::new(Field::Timeout, r))?;

        let mut request = LaunchRequest::new(&spec.name)
            .cpus(cpus)
            .memory(memory)
            .disk(disk);
        if let Some(image) = spec.image.as_deref().filter(|i| !i.is_empty()) {
            request = request.image(image);
        }
        if let Some(path) = cloud_init {
            request = request.cloud_init(path);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        Ok(request)
    }

    /// Validate an instance name on its own.
    pub fn validate_name(&self, name: &str) -> Result<(), ValidationError> {
        check_name(name).map_err(|r| ValidationError::new(Field::Name, r))
    }

    fn parse_cloud_init(&self, path: &str) -> Result<Option<PathBuf>, String> {
        if path.is_empty() {
            return Ok(None);
        }
        if path.chars().any(char::is_control) {
            return Err("invalid characters in path".into());
        }
        let len = path.chars().count();
        if len > self.limits.max_cloud_init_path {
            return Err(format!(
                "path too long: {} characters (max {})",
                len, self.limits.max_cloud_init_path
            ));
        }

        let lower = path.to_lowercase();
        if !(lower.ends_with(".yaml") || lower.ends_with(".yml")) {
            return Err(match Path::new(path).extension() {
                Some(ext) => format!("must be a YAML file, got .{}", ext.to_string_lossy()),
                None => "must have .yaml or .yml extension".into(),
            });
        }

        if self.limits.check_cloud_init_exists && !Path::new(path).is_file() {
            return Err(format!("file {path} does not exist"));
        }

        Ok(Some(PathBuf::from(path)))
    }
}

fn check_name(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("name cannot be empty".into());
    };

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(format!("name too long: {len} characters (max {MAX_NAME_LEN})"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err("spaces not allowed".into());
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(format!("invalid characters in name: '{c}'"));
    }
    if first.is_ascii_digit() {
        return Err("name cannot start with number".into());
    }
    if first == '-' {
        return Err("name cannot start with dash".into());
    }
    if name.ends_with('-') {
        return Err("name cannot end with dash".into());
    }
    if name.contains("--") {
        return Err("consecutive dashes not allowed".into());
    }
    Ok(())
}

fn parse_cpu(cpu: &str, max: u32) -> Result<u32, String> {
    if cpu.is_empty() {
        return Err("CPU value cannot be empty".into());
    }

    match cpu.parse::<i64>() {
        Ok(n) if n <= 0 => Err(format!("CPU count must be greater than 0, got {n}")),
        Ok(n) if n > i64::from(max) => Err(format!("CPU count {n} exceeds maximum of {max}")),
        Ok(n) => Ok(n as u32),
        Err(_) => {
            let digits = cpu.strip_prefix('-').unwrap_or(cpu);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                // Out of i64 range
                if cpu.starts_with('-') {
                    Err("CPU count must be greater than 0".into())
                } else {
                    Err(format!("CPU count {cpu} exceeds maximum of {max}"))
                }
            } else if cpu.contains('.') && cpu.parse::<f64>().is_ok() {
                Err(format!("CPU count must be an integer, got {cpu}"))
            } else {
                Err(format!("CPU count must be a number, got '{cpu}'"))
            }
        }
    }
}

fn parse_size(
    field: Field,
    value: &str,
    min: ByteSize,
    max: ByteSize,
) -> Result<ByteSize, ValidationError> {
    let fail = |reason: String| ValidationError::new(field, reason);

    if value.is_empty() {
        return Err(fail(format!("{field} value cannot be empty")));
    }
    if value.starts_with('-') {
        return Err(fail(format!("{field} must be positive, got {value}")));
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);

    if digits.is_empty() {
        return Err(fail(format!(
            "invalid format '{value}': expected <integer><unit> such as 512M or 5G"
        )));
    }
    if suffix.starts_with('.') {
        return Err(fail(format!("decimal values not supported: {value}")));
    }
    let Some(unit) = SizeUnit::parse(suffix) else {
        if suffix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(fail(format!("invalid unit '{suffix}': use K, M, G or T")));
        }
        return Err(fail(format!(
            "invalid format '{value}': expected <integer><unit> such as 512M or 5G"
        )));
    };

    let n: u64 = digits
        .parse()
        .map_err(|_| fail(format!("{value} exceeds maximum of {max}")))?;
    if n == 0 {
        return Err(fail(format!("{field} must be greater than 0")));
    }

    let size = ByteSize::new(n, unit);
    if size.bytes() < min.bytes() {
        return Err(fail(format!("minimum {field} is {min}, got {size}")));
    }
    if size.bytes() > max.bytes() {
        return Err(fail(format!("{size} exceeds maximum of {max}")));
    }
    Ok(size)
}

fn parse_timeout(value: &str, max: Duration) -> Result<Option<Duration>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.starts_with('-') {
        return Err(format!("timeout must be positive, got {value}"));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!(
            "timeout must include time unit, e.g. {value}s or {value}m"
        ));
    }

    let timeout = humantime::parse_duration(value)
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;

    if timeout.is_zero() {
        return Err("timeout must be greater than 0".into());
    }
    if timeout > max {
        return Err(format!(
            "timeout {} exceeds maximum of {}",
            humantime::format_duration(timeout),
            humantime::format_duration(max)
        ));
    }
    Ok(Some(timeout))
}
