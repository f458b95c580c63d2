use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::patch::PatchError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block not found: {block}")]
    NotFound { block: String },

    #[error("block '{block}' is never closed")]
    Unbalanced { block: String },

    #[error("unsupported layout for '{block}': {reason}")]
    UnsupportedLayout { block: String, reason: String },
}

impl BlockError {
    /// Attach the file the block was searched in.
    pub fn at(self, file: &Path) -> PatchError {
        let file: PathBuf = file.to_path_buf();
        match self {
            BlockError::NotFound { block } => PatchError::BlockNotFound { file, block },
            BlockError::Unbalanced { block } => PatchError::UnbalancedBlock { file, block },
            BlockError::UnsupportedLayout { block, reason } => PatchError::UnsupportedLayout {
                file,
                reason: format!("{block}: {reason}"),
            },
        }
    }
}
