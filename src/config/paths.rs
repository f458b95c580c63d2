use std::path::{Path, PathBuf};

use crate::config::schema::PathsConfig;

/// Resolved locations of every file a patch run may touch.
///
/// Replaces any reliance on the current working directory: all paths are
/// joined onto an explicit project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    layout: PathsConfig,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, layout: PathsConfig) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// Default React Native CLI layout under `root`.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self::new(root, PathsConfig::default())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &PathsConfig {
        &self.layout
    }

    pub fn root_build_file(&self) -> PathBuf {
        self.root.join(&self.layout.root_build_file)
    }

    pub fn app_build_file(&self) -> PathBuf {
        self.root.join(&self.layout.app_build_file)
    }

    pub fn build_properties(&self) -> PathBuf {
        self.root.join(&self.layout.build_properties)
    }

    pub fn host_search_root(&self) -> PathBuf {
        self.root.join(&self.layout.host_search_root)
    }

    pub fn ios_search_root(&self) -> PathBuf {
        self.root.join(&self.layout.ios_search_root)
    }

    pub fn app_config(&self) -> PathBuf {
        self.root.join(&self.layout.app_config)
    }

    /// Entry script candidates in priority order.
    pub fn entry_script_candidates(&self) -> Vec<PathBuf> {
        self.layout
            .entry_scripts
            .iter()
            .map(|path| self.root.join(path))
            .collect()
    }

    /// First existing entry script.
    pub fn entry_script(&self) -> Option<PathBuf> {
        self.entry_script_candidates()
            .into_iter()
            .find(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_paths_join_root() {
        let paths = ProjectPaths::with_defaults("/work/AwesomeProject");
        assert_eq!(
            paths.app_build_file(),
            PathBuf::from("/work/AwesomeProject/android/app/build.gradle")
        );
        assert_eq!(
            paths.build_properties(),
            PathBuf::from("/work/AwesomeProject/android/gradle.properties")
        );
    }

    #[test]
    fn test_entry_script_prefers_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::with_defaults(dir.path());
        assert_eq!(paths.entry_script(), None);

        fs::write(dir.path().join("App.js"), "").unwrap();
        assert_eq!(paths.entry_script(), Some(dir.path().join("App.js")));

        fs::write(dir.path().join("App.tsx"), "").unwrap();
        assert_eq!(paths.entry_script(), Some(dir.path().join("App.tsx")));
    }
}
