pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::{load_for_project, load_from_path, load_from_str, ConfigError, CONFIG_FILE_NAME};
pub use paths::ProjectPaths;
pub use schema::{
    PatchConfig, PatchOptions, PathsConfig, ValidationError, ValidationIssue,
    RUNTIME_ARTIFACT_PREFIX,
};
