//! RNV8 Patcher: switch a scaffolded React Native project to the V8 runtime
//!
//! The patcher edits Gradle build scripts, Gradle properties, Java host
//! sources and the JS entry script with line-oriented structural rewrites.
//! No file format is fully parsed.
//!
//! # Architecture
//!
//! - [`gradle`] locates `name { ... }` blocks with a brace scanner and
//!   rewrites their bodies (insert a sub-block or merge a declaration).
//! - [`anchor`] holds prioritized, named regex anchors for files without a
//!   block structure. The first strategy that matches is reported.
//! - [`patch`] turns one [`PatchRule`] into a text transformation.
//! - [`orchestrator`] runs the fixed sequence of rules through a
//!   [`Changeset`].
//!
//! # Safety
//!
//! - Every file is staged in memory; nothing is written until commit
//! - Commit re-checks each file's hash and aborts on concurrent edits
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement, vendored and build directories refused
//! - Idempotent operations
//!
//! # Example
//!
//! ```no_run
//! use rnv8_patcher::{PatchOptions, Patcher, ProjectPaths};
//!
//! # fn main() -> Result<(), rnv8_patcher::PatchError> {
//! let paths = ProjectPaths::with_defaults("/work/AwesomeProject");
//! let mut patcher = Patcher::new(paths, PatchOptions::default())?;
//! patcher.add_runtime_support()?;
//! patcher.add_runtime_hint()?;
//!
//! for report in patcher.reports() {
//!     println!("{}: {}", report.step, report.outcome);
//! }
//! patcher.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod config;
pub mod edit;
pub mod expo;
pub mod generated;
pub mod gradle;
pub mod orchestrator;
pub mod patch;
pub mod safety;

// Re-exports
pub use anchor::{AnchorMatch, AnchorStrategy};
pub use config::{
    load_for_project, load_from_path, load_from_str, ConfigError, PatchConfig, PatchOptions,
    PathsConfig, ProjectPaths,
};
pub use edit::{Changeset, EditError, FileChange};
pub use orchestrator::{FileDiff, Patcher, Step, StepReport};
pub use patch::{apply_to_file, patch_file, PatchError, PatchOutcome, PatchRule};
pub use safety::{ProjectGuard, SafetyError};
