use crate::config::schema::{PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up in the project root when no config path is given.
pub const CONFIG_FILE_NAME: &str = "rnv8-patcher.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `<project>/rnv8-patcher.toml`, falling back to defaults when the
/// file does not exist.
pub fn load_for_project(project_root: &Path) -> Result<PatchConfig, ConfigError> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if path.is_file() {
        tracing::debug!(config = %path.display(), "loading project config");
        load_from_path(&path)
    } else {
        Ok(PatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;
    use std::path::PathBuf;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, PatchConfig::default());
        assert_eq!(config.options.runtime_package, "v8-android-jit");
        assert_eq!(
            config.paths.app_build_file,
            PathBuf::from("android/app/build.gradle")
        );
    }

    #[test]
    fn test_partial_override() {
        let config = load_from_str(
            r#"
[paths]
entry_scripts = ["src/App.js"]
host_file_names = ["MainApplication.java", "MainApplicationReactNativeHost.java"]

[options]
runtime_package = "v8-android-nointl"
increase_heap = false
"#,
        )
        .unwrap();

        assert_eq!(config.paths.entry_scripts, vec![PathBuf::from("src/App.js")]);
        assert_eq!(config.paths.host_file_names.len(), 2);
        assert_eq!(config.options.runtime_package, "v8-android-nointl");
        assert!(!config.options.increase_heap);
        assert_eq!(config.options.excluded_library, "libjsc.so");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = load_from_str("[options]\nruntime = \"v8\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_validation_collects_issues() {
        let err = load_from_str(
            r#"
[paths]
app_build_file = "../elsewhere/build.gradle"
entry_scripts = []

[options]
runtime_package = "hermes"
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation { source, .. } => {
                assert_eq!(source.issues.len(), 3);
                assert!(source.issues.contains(&ValidationIssue::MissingField {
                    field: "paths.entry_scripts"
                }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_path_attaches_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[options]\nexcluded_library = \"\"\n").unwrap();

        let err = load_for_project(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_missing_project_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_for_project(dir.path()).unwrap(), PatchConfig::default());
    }
}
