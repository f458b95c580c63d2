//! Tagged generated sections.
//!
//! A section looks like
//!
//! ```text
//! // @generated begin <tag> - expo prebuild (DO NOT MODIFY) sync-<hash>
//! ...lines...
//! // @generated end <tag>
//! ```
//!
//! The hash covers the section body, so re-merging identical content is a
//! no-op while changed content replaces the previous section instead of
//! stacking a second copy.

use regex::Regex;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug, Clone)]
pub enum GeneratedError {
    #[error("anchor /{anchor}/ matched no line")]
    AnchorNotFound { anchor: String },

    #[error("invalid anchor pattern /{pattern}/: {source}")]
    InvalidAnchor {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Where a section is inserted.
#[derive(Debug, Clone, Copy)]
pub enum Placement<'a> {
    /// `offset` lines after the first (or last) line matching `anchor`.
    /// An offset of 0 inserts before the anchor line.
    Anchor {
        anchor: &'a Regex,
        last: bool,
        offset: usize,
    },
    /// After the final line.
    End,
}

/// One section to merge.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub tag: &'a str,
    pub body: &'a str,
    /// Line comment token of the target language (`//`, `#`)
    pub comment: &'a str,
    pub placement: Placement<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub contents: String,
    /// A section was written
    pub did_merge: bool,
    /// A previous section for the same tag was removed
    pub did_clear: bool,
}

/// `sync-<hex>` digest of a section body.
pub fn content_hash(body: &str) -> String {
    format!("sync-{:016x}", xxh3_64(body.as_bytes()))
}

pub fn header_comment(body: &str, tag: &str, comment: &str) -> String {
    format!(
        "{comment} @generated begin {tag} - expo prebuild (DO NOT MODIFY) {}",
        content_hash(body)
    )
}

fn footer_comment(tag: &str, comment: &str) -> String {
    format!("{comment} @generated end {tag}")
}

/// Merge `section` into `src`, replacing an outdated copy of the same tag.
pub fn merge_contents(src: &str, section: &Section<'_>) -> Result<MergeResult, GeneratedError> {
    let header = header_comment(section.body, section.tag, section.comment);
    if src.contains(&header) {
        return Ok(MergeResult {
            contents: src.to_string(),
            did_merge: false,
            did_clear: false,
        });
    }

    let sanitized = remove_generated(src, section.tag);
    let base = sanitized.as_deref().unwrap_or(src);
    let mut lines: Vec<&str> = base.split('\n').collect();

    let index = match section.placement {
        Placement::End => lines.len(),
        Placement::Anchor {
            anchor,
            last,
            offset,
        } => {
            let found = if last {
                lines.iter().rposition(|line| anchor.is_match(line))
            } else {
                lines.iter().position(|line| anchor.is_match(line))
            };
            let found = found.ok_or_else(|| GeneratedError::AnchorNotFound {
                anchor: anchor.as_str().to_string(),
            })?;
            (found + offset).min(lines.len())
        }
    };

    let footer = footer_comment(section.tag, section.comment);
    let block: Vec<&str> = std::iter::once(header.as_str())
        .chain(section.body.split('\n'))
        .chain(std::iter::once(footer.as_str()))
        .collect();
    let tail = lines.split_off(index);
    lines.extend(block);
    lines.extend(tail);

    tracing::debug!(
        tag = section.tag,
        line = index,
        replaced = sanitized.is_some(),
        "merged generated section"
    );

    Ok(MergeResult {
        contents: lines.join("\n"),
        did_merge: true,
        did_clear: sanitized.is_some(),
    })
}

/// Remove the section for `tag`, if any.
pub fn remove_contents(src: &str, tag: &str) -> MergeResult {
    let sanitized = remove_generated(src, tag);
    MergeResult {
        did_clear: sanitized.is_some(),
        contents: sanitized.unwrap_or_else(|| src.to_string()),
        did_merge: false,
    }
}

/// `None` when no complete section for `tag` exists.
fn remove_generated(src: &str, tag: &str) -> Option<String> {
    let begin = format!("@generated begin {tag} ");
    let end = format!("@generated end {tag}");
    let mut lines: Vec<&str> = src.split('\n').collect();

    let start = lines.iter().position(|line| line.contains(&begin))?;
    let stop = lines.iter().position(|line| line.trim_end().ends_with(&end))?;
    if start >= stop {
        return None;
    }

    lines.drain(start..=stop);
    Some(lines.join("\n"))
}
