//! Engine configuration via `attrflow.toml`
//!
//! On first open a commented default `attrflow.toml` is written next to the
//! schema directory. To change settings, edit the file and reopen the engine.

use attrflow_core::{Error, Result};
use attrflow_filters::FilterSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the engine's base directory.
pub const CONFIG_FILE_NAME: &str = "attrflow.toml";

/// Engine configuration loaded from `attrflow.toml`.
///
/// # Example
///
/// ```toml
/// schema_dir = "schema"
/// default_backend = "mem"
/// check_acl = true
/// acl_topic_prefix = "attrflow.objects"
///
/// [filters]
/// samba_rid_base = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding object schema files (`*.json`), relative to the
    /// config file unless absolute.
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    /// Backend used for attributes and object types that name none.
    #[serde(default = "default_backend")]
    pub default_backend: String,
    /// Consult the ACL oracle on save and remove.
    #[serde(default = "default_true")]
    pub check_acl: bool,
    /// Topic prefix for ACL checks; the object type is appended.
    #[serde(default = "default_topic_prefix")]
    pub acl_topic_prefix: String,
    /// Settings handed to the filter library.
    #[serde(default)]
    pub filters: FilterSettings,
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schema")
}

fn default_backend() -> String {
    "mem".to_string()
}

fn default_true() -> bool {
    true
}

fn default_topic_prefix() -> String {
    "attrflow.objects".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_dir: default_schema_dir(),
            default_backend: default_backend(),
            check_acl: true,
            acl_topic_prefix: default_topic_prefix(),
            filters: FilterSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# attrflow engine configuration
#
# Directory with object schema files (*.json), relative to this file.
schema_dir = "schema"

# Backend used when a schema or attribute names none.
default_backend = "mem"

# Ask the ACL oracle before saving or removing objects (default: true).
check_acl = true

# ACL topic checked for an object type is "<prefix>.<ObjectType>".
acl_topic_prefix = "attrflow.objects"

# Settings consulted by individual filters.
[filters]
# Object type of samba domain definitions.
samba_domain_type = "SambaDomain"
# RID base when a domain carries no sambaAlgorithmicRidBase.
samba_rid_base = 1000
# Domain used for objects without sambaDomainName.
# default_samba_domain = "EXAMPLE"
# Object type of foreman host groups.
foreman_host_group_type = "ForemanHostGroup"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no engine can run with.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty default backend or topic prefix.
    pub fn validate(&self) -> Result<()> {
        if self.default_backend.trim().is_empty() {
            return Err(Error::Config("default_backend must not be empty".into()));
        }
        if self.check_acl && self.acl_topic_prefix.trim().is_empty() {
            return Err(Error::Config(
                "acl_topic_prefix must not be empty when check_acl is set".into(),
            ));
        }
        Ok(())
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Schema directory resolved against the directory of the config file
    pub fn schema_dir_from(&self, base: &Path) -> PathBuf {
        if self.schema_dir.is_absolute() {
            self.schema_dir.clone()
        } else {
            base.join(&self.schema_dir)
        }
    }

    /// ACL topic of an object type
    pub fn acl_topic(&self, object_type: &str) -> String {
        format!("{}.{}", self.acl_topic_prefix, object_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_default() {
        let config: EngineConfig = toml::from_str(EngineConfig::default_toml()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        EngineConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.default_backend, "mem");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "default_backend = \"ldap\"\n").unwrap();

        EngineConfig::write_default_if_missing(&path).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.default_backend, "ldap");
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert!(config.check_acl);
        assert_eq!(config.filters.samba_rid_base, 1000);
    }

    #[test]
    fn filter_section_overrides() {
        let config: EngineConfig = toml::from_str(
            r#"
[filters]
samba_rid_base = 5000
default_samba_domain = "CORP"
"#,
        )
        .unwrap();
        assert_eq!(config.filters.samba_rid_base, 5000);
        assert_eq!(config.filters.default_samba_domain.as_deref(), Some("CORP"));
        assert_eq!(config.filters.samba_domain_type, "SambaDomain");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "check_acl = \"maybe\"").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn empty_backend_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "default_backend = \"\"").unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = EngineConfig {
            check_acl: false,
            schema_dir: PathBuf::from("/etc/attrflow/schema"),
            ..EngineConfig::default()
        };
        config.write_to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.schema_dir_from(dir.path()),
            PathBuf::from("/etc/attrflow/schema")
        );
    }

    #[test]
    fn relative_schema_dir_resolves_against_base() {
        let config = EngineConfig::default();
        assert_eq!(
            config.schema_dir_from(Path::new("/srv/app")),
            PathBuf::from("/srv/app/schema")
        );
        assert_eq!(config.acl_topic("User"), "attrflow.objects.User");
    }
}
