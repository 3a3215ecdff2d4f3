use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

pub const NATINFO_FILE: &str = "natinfo.json";
pub const FLAGS_DIR: &str = "flags";

/// Per-nationality display data (currently just flag images).
#[derive(Debug, Clone)]
pub struct NatInfo {
    base_dir: PathBuf,
    entries: Value,
}

impl NatInfo {
    /// Load `natinfo.json` from `base_dir`; a missing file yields empty info.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(NATINFO_FILE);
        let entries = if path.is_file() {
            let raw =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no nationality info file");
            Value::Null
        };

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            entries,
        })
    }

    pub fn flag_for(&self, nationality: &str) -> Option<PathBuf> {
        let key = nationality_key(nationality)?;
        let file_name = self
            .entries
            .get(&key)
            .and_then(|entry| entry.get("flag"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{key}.png"));

        let path = self.base_dir.join(FLAGS_DIR).join(file_name);
        path.is_file().then_some(path)
    }
}

fn nationality_key(nationality: &str) -> Option<String> {
    let nationality = nationality.trim();
    if nationality.is_empty() {
        return None;
    }
    Some(nationality.to_lowercase().replace(' ', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with_flags(flags: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(FLAGS_DIR)).expect("flags dir");
        for flag in flags {
            fs::write(dir.path().join(FLAGS_DIR).join(flag), b"png").expect("flag");
        }
        dir
    }

    #[test]
    fn default_flag_name_uses_the_nationality_key() {
        let dir = base_with_flags(&["free-french.png"]);
        let natinfo = NatInfo::load(dir.path()).expect("load");

        assert_eq!(
            natinfo.flag_for("Free French"),
            Some(dir.path().join(FLAGS_DIR).join("free-french.png"))
        );
        assert_eq!(natinfo.flag_for("German"), None);
        assert_eq!(natinfo.flag_for(""), None);
    }

    #[test]
    fn json_entry_overrides_flag_file() {
        let dir = base_with_flags(&["swastika-free.png", "german.png"]);
        fs::write(
            dir.path().join(NATINFO_FILE),
            r#"{ "german": { "flag": "swastika-free.png" } }"#,
        )
        .expect("natinfo");
        let natinfo = NatInfo::load(dir.path()).expect("load");

        assert_eq!(
            natinfo.flag_for("German"),
            Some(dir.path().join(FLAGS_DIR).join("swastika-free.png"))
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = base_with_flags(&[]);
        fs::write(dir.path().join(NATINFO_FILE), "{ not json").expect("natinfo");

        let err = NatInfo::load(dir.path()).expect_err("malformed");
        assert!(err.to_string().contains(NATINFO_FILE));
    }
}
