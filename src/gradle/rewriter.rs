//! Block rewriting policies.
//!
//! Only the body of the targeted block changes. Header and footer lines, and
//! everything outside the block, are reproduced byte for byte.

use std::borrow::Cow;

use crate::gradle::errors::BlockError;
use crate::gradle::locator::find_child_block;

const DEFAULT_INDENT: &str = "    ";

/// A declarative line plus the substring that identifies earlier copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lines containing this substring are treated as prior declarations.
    pub marker: String,
    /// Canonical line, without indentation or line terminator.
    pub line: String,
}

impl Declaration {
    pub fn new(marker: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            line: line.into(),
        }
    }

    /// `exclude "**/<library>"`, deduplicated on `/<library>`.
    pub fn exclude_library(library: &str) -> Self {
        Self::new(format!("/{library}"), format!("exclude \"**/{library}\""))
    }
}

/// Which policy produced a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The sub-block was absent and has been created.
    Insert,
    /// The sub-block existed and its body was merged.
    Merge,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Insert => "insert-block",
            Policy::Merge => "merge-block",
        }
    }
}

/// Ordered body lines, each keeping its original terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSet<'a> {
    lines: Vec<Cow<'a, str>>,
}

impl<'a> LineSet<'a> {
    pub fn from_lines(lines: &[&'a str]) -> Self {
        Self {
            lines: lines.iter().map(|line| Cow::Borrowed(*line)).collect(),
        }
    }

    /// Drop every line containing `marker`. Returns how many were removed.
    pub fn remove_containing(&mut self, marker: &str) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| !line.contains(marker));
        before - self.lines.len()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(Cow::Owned(line));
    }

    /// Leading whitespace of the first line holding a declaration. Blank
    /// and comment lines are ignored.
    pub fn indent(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| {
                let code = line.trim();
                !code.is_empty() && !is_comment(code)
            })
            .map(|line| leading_whitespace(line))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.as_ref())
    }
}

/// A block split into its opening line, body lines and closing line.
struct BlockLines<'a> {
    header: Cow<'a, str>,
    body: Vec<&'a str>,
    footer: Cow<'a, str>,
}

impl<'a> BlockLines<'a> {
    fn split(region: &'a str, block: &str) -> Result<Self, BlockError> {
        let lines: Vec<&str> = region.split_inclusive('\n').collect();
        let unsupported = |reason: &str| BlockError::UnsupportedLayout {
            block: block.to_string(),
            reason: reason.to_string(),
        };

        let (header, rest) = lines
            .split_first()
            .ok_or_else(|| unsupported("empty block"))?;
        let Some((footer, body)) = rest.split_last() else {
            return Self::expand_empty(header)
                .ok_or_else(|| unsupported("block opens and closes on the same line"));
        };
        if !footer.trim_start().starts_with('}') {
            return Err(unsupported("closing brace shares a line with other content"));
        }

        Ok(Self {
            header: Cow::Borrowed(*header),
            body: body.to_vec(),
            footer: Cow::Borrowed(*footer),
        })
    }

    /// `name {}` on one line becomes an opening and a closing line with no
    /// body. Anything between the braces is left alone.
    fn expand_empty(line: &str) -> Option<Self> {
        let code = line.trim_end_matches(['\r', '\n']);
        let terminator = &line[code.len()..];
        let open = code.find('{')?;
        let inner = code[open + 1..].trim_end().strip_suffix('}')?;
        if !inner.trim().is_empty() {
            return None;
        }

        let eol = if terminator.is_empty() { "\n" } else { terminator };
        Some(Self {
            header: Cow::Owned(format!("{}{eol}", &code[..=open])),
            body: Vec::new(),
            footer: Cow::Owned(format!("{}}}{terminator}", leading_whitespace(code))),
        })
    }

    fn eol(&self) -> &'static str {
        if self.header.ends_with("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Indentation for direct children, derived from the header when the
    /// body gives no hint.
    fn child_indent(&self, body_indent: Option<&str>) -> String {
        match body_indent {
            Some(indent) => indent.to_string(),
            None => format!("{}{DEFAULT_INDENT}", leading_whitespace(&self.header)),
        }
    }
}

/// Merge policy: drop marker lines from the block body and append one
/// canonical declaration.
///
/// `region` must be a whole block as returned by the locator.
pub fn merge_into_block(
    region: &str,
    block: &str,
    decl: &Declaration,
) -> Result<String, BlockError> {
    let lines = BlockLines::split(region, block)?;
    let mut body = LineSet::from_lines(&lines.body);
    let removed = body.remove_containing(&decl.marker);
    let indent = lines.child_indent(body.indent());
    tracing::debug!(block, removed, "merging declaration into block");

    body.push(format!("{indent}{}{}", decl.line, lines.eol()));

    let mut out = String::with_capacity(region.len() + decl.line.len() + indent.len() + 2);
    out.push_str(&lines.header);
    for line in body.iter() {
        out.push_str(line);
    }
    out.push_str(&lines.footer);
    Ok(out)
}

/// Insertion policy: add `name { <decl> }` just before the region's closing
/// line.
pub fn insert_sub_block(
    region: &str,
    block: &str,
    name: &str,
    decl: &Declaration,
) -> Result<String, BlockError> {
    let lines = BlockLines::split(region, block)?;
    let body = LineSet::from_lines(&lines.body);
    let indent = lines.child_indent(body.indent());
    let unit = indent
        .strip_prefix(leading_whitespace(&lines.header))
        .filter(|unit| !unit.is_empty())
        .unwrap_or(DEFAULT_INDENT);
    let eol = lines.eol();

    let mut out = String::with_capacity(region.len() + name.len() + decl.line.len() + 32);
    out.push_str(&lines.header);
    for line in &lines.body {
        out.push_str(line);
    }
    out.push_str(&format!("{indent}{name} {{{eol}"));
    out.push_str(&format!("{indent}{unit}{}{eol}", decl.line));
    out.push_str(&format!("{indent}}}{eol}"));
    out.push_str(&lines.footer);
    Ok(out)
}

/// Ensure `decl` is declared in the `name` sub-block of `region`, creating
/// the sub-block when absent.
pub fn ensure_sub_block_line(
    region: &str,
    block: &str,
    name: &str,
    decl: &Declaration,
) -> Result<(String, Policy), BlockError> {
    match find_child_block(region, name) {
        Ok(sub) => {
            let merged = merge_into_block(sub.region, name, decl)?;
            Ok((sub.replace(&merged), Policy::Merge))
        }
        Err(BlockError::NotFound { .. }) => {
            Ok((insert_sub_block(region, block, name, decl)?, Policy::Insert))
        }
        Err(other) => Err(other),
    }
}

fn is_comment(code: &str) -> bool {
    code.starts_with("//") || code.starts_with("/*") || code.starts_with('*')
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}
