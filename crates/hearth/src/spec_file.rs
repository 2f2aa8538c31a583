//! Loading VM specs from TOML files.

use anyhow::{Context, Result};
use hearth_core::VmSpec;
use std::path::Path;

/// Read and parse a spec file.
///
/// Unknown keys are rejected so that typos fail loudly instead of being
/// silently ignored.
pub fn load(path: &Path) -> Result<VmSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec file {}", path.display()))?;
    parse(&text).with_context(|| format!("failed to parse spec file {}", path.display()))
}

fn parse(text: &str) -> Result<VmSpec> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_spec() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name = "dev-box"
image = "22.04"
cpu = "2"
memory = "2G"
disk = "10G"
cloud_init = "./seed.yaml"
timeout = "5m"
"#
        )
        .unwrap();

        let spec = load(file.path()).unwrap();
        assert_eq!(spec.name, "dev-box");
        assert_eq!(spec.image.as_deref(), Some("22.04"));
        assert_eq!(spec.cpu, "2");
        assert_eq!(spec.cloud_init.as_deref(), Some("./seed.yaml"));
        assert_eq!(spec.timeout.as_deref(), Some("5m"));
    }

    #[test]
    fn test_optional_fields_default() {
        let spec = parse("name = \"a\"\ncpu = \"1\"").unwrap();
        assert_eq!(spec.name, "a");
        assert!(spec.image.is_none());
        assert!(spec.memory.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse("name = \"a\"\ncpus = \"1\"").unwrap_err();
        assert!(err.to_string().contains("cpus"), "{err}");
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/non/existent/spec.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read spec file"));
    }
}
