//! Line-oriented block model for Gradle build scripts.

pub mod errors;
pub mod locator;
pub mod rewriter;
mod scanner;

pub use errors::BlockError;
pub use locator::{find_block, find_child_block, TextRegion};
pub use rewriter::{
    ensure_sub_block_line, insert_sub_block, merge_into_block, Declaration, LineSet, Policy,
};
