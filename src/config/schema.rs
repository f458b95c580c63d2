use serde::Deserialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Contents of `rnv8-patcher.toml`. Every field has a default matching the
/// React Native CLI template, so an empty file is valid.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatchConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub options: PatchOptions,
}

/// Project-relative locations of the files a run may touch.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub root_build_file: PathBuf,
    pub app_build_file: PathBuf,
    pub build_properties: PathBuf,
    /// Directory searched recursively for application host sources
    pub host_search_root: PathBuf,
    pub host_file_names: Vec<String>,
    /// Entry script candidates; the first existing one is patched
    pub entry_scripts: Vec<PathBuf>,
    /// Directory searched recursively for the iOS app delegate
    pub ios_search_root: PathBuf,
    pub app_delegate_name: String,
    /// Expo app config holding `expo.jsEngine`
    pub app_config: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root_build_file: PathBuf::from("android/build.gradle"),
            app_build_file: PathBuf::from("android/app/build.gradle"),
            build_properties: PathBuf::from("android/gradle.properties"),
            host_search_root: PathBuf::from("android"),
            host_file_names: vec!["MainApplication.java".to_string()],
            entry_scripts: vec![PathBuf::from("App.tsx"), PathBuf::from("App.js")],
            ios_search_root: PathBuf::from("ios"),
            app_delegate_name: "AppDelegate.mm".to_string(),
            app_config: PathBuf::from("app.json"),
        }
    }
}

/// What to patch and with which values.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PatchOptions {
    /// npm package providing the prebuilt V8 AAR (`v8-android`, `v8-android-jit`, ...)
    pub runtime_package: String,
    /// Native library excluded from the APK
    pub excluded_library: String,
    /// Name of the packaging sub-block inside `android { }`
    pub packaging_block: String,
    /// Point the root project's local Maven repository at the runtime package
    pub root_repository: bool,
    /// Declare the runtime AAR in the app `dependencies { }` block
    pub app_dependency: bool,
    /// Replace the commented-out default `org.gradle.jvmargs` line
    pub increase_heap: bool,
    pub jvm_args: String,
    /// Fail when no application host file is found
    pub strict_hosts: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            runtime_package: "v8-android-jit".to_string(),
            excluded_library: "libjsc.so".to_string(),
            packaging_block: "packagingOptions".to_string(),
            root_repository: true,
            app_dependency: true,
            increase_heap: true,
            jvm_args: "-Xmx2048m -XX:MaxMetaspaceSize=512m".to_string(),
            strict_hosts: false,
        }
    }
}

/// Maven coordinates prefix shared by every V8 AAR variant.
pub const RUNTIME_ARTIFACT_PREFIX: &str = "org.chromium:v8-android";

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let paths = &self.paths;
        let options = &self.options;

        for (field, path) in [
            ("paths.root_build_file", &paths.root_build_file),
            ("paths.app_build_file", &paths.app_build_file),
            ("paths.build_properties", &paths.build_properties),
            ("paths.host_search_root", &paths.host_search_root),
            ("paths.ios_search_root", &paths.ios_search_root),
            ("paths.app_config", &paths.app_config),
        ] {
            check_relative(field, path, &mut issues);
        }
        for path in &paths.entry_scripts {
            check_relative("paths.entry_scripts", path, &mut issues);
        }

        if paths.host_file_names.iter().all(|name| name.trim().is_empty()) {
            issues.push(ValidationIssue::MissingField {
                field: "paths.host_file_names",
            });
        }
        if paths.entry_scripts.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "paths.entry_scripts",
            });
        }
        if paths.app_delegate_name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "paths.app_delegate_name",
            });
        }

        if options.excluded_library.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "options.excluded_library",
            });
        }
        if options.packaging_block.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "options.packaging_block",
            });
        }
        // The dependency marker is the artifact prefix, so other names would
        // never be deduplicated.
        if !options.runtime_package.starts_with("v8-android") {
            issues.push(ValidationIssue::InvalidValue {
                field: "options.runtime_package",
                message: format!(
                    "'{}' is not a v8-android package",
                    options.runtime_package
                ),
            });
        }
        if options.increase_heap && options.jvm_args.trim().is_empty() {
            issues.push(ValidationIssue::InvalidValue {
                field: "options.jvm_args",
                message: "must be set when increase_heap is enabled".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn check_relative(field: &'static str, path: &Path, issues: &mut Vec<ValidationIssue>) {
    if path.as_os_str().is_empty() {
        issues.push(ValidationIssue::MissingField { field });
    } else if path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
    {
        issues.push(ValidationIssue::InvalidValue {
            field,
            message: format!("'{}' must stay inside the project root", path.display()),
        });
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
