//! Decoding of `list --format json` and `info --format json` payloads.

use crate::error::DecodeError;
use crate::record::{VmRecord, VmState};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Result of looking a single name up in an `info` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoOutcome {
    /// The name is present and the payload carries no errors.
    Found(VmRecord),
    /// The payload is clean but does not mention the name.
    NotFound,
    /// The payload flags per-entity errors.
    PartialFailure(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    list: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct InfoEnvelope {
    #[serde(default)]
    info: HashMap<String, RawInstance>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    ipv4: Option<Vec<String>>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    image_release: Option<String>,
    #[serde(default)]
    image_hash: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl RawInstance {
    fn into_record(self, fallback_name: &str) -> VmRecord {
        VmRecord {
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| fallback_name.to_string()),
            state: self
                .state
                .as_deref()
                .map(VmState::parse)
                .unwrap_or(VmState::Unknown),
            ipv4: self.ipv4.unwrap_or_default(),
            release: self.release.filter(|r| !r.is_empty()).or(self.image_release),
            image_hash: self.image_hash.filter(|h| !h.is_empty()),
            metadata: self.extra,
        }
    }
}

fn error_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Decode the output of `list --format json`.
///
/// A well-formed payload with no entries means no instances exist.
pub fn decode_list(bytes: &[u8]) -> Result<Vec<VmRecord>, DecodeError> {
    let envelope: ListEnvelope =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::new("list", e))?;

    Ok(envelope
        .list
        .into_iter()
        .map(|raw| raw.into_record(""))
        .collect())
}

/// Decode the output of `info <name> --format json` and look `name` up in it.
pub fn decode_info(bytes: &[u8], name: &str) -> Result<InfoOutcome, DecodeError> {
    let mut envelope: InfoEnvelope =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::new("info", e))?;

    if !envelope.errors.is_empty() {
        let errors = envelope.errors.into_iter().map(error_text).collect();
        return Ok(InfoOutcome::PartialFailure(errors));
    }

    match envelope.info.remove(name) {
        Some(raw) => Ok(InfoOutcome::Found(raw.into_record(name))),
        None => Ok(InfoOutcome::NotFound),
    }
}
