use crate::gradle::errors::BlockError;
use crate::gradle::scanner::{matching_close, BraceScanner};

/// A located block and the text around it.
///
/// The three slices always concatenate back to the searched buffer. The
/// region covers whole lines: from the start of the line that opens the block
/// to the end (newline included) of the line that closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRegion<'a> {
    pub head: &'a str,
    pub region: &'a str,
    pub tail: &'a str,
}

impl<'a> TextRegion<'a> {
    fn split(text: &'a str, start: usize, end: usize) -> Self {
        Self {
            head: &text[..start],
            region: &text[start..end],
            tail: &text[end..],
        }
    }

    /// Reassemble with a replacement region.
    pub fn replace(&self, region: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + region.len() + self.tail.len());
        out.push_str(self.head);
        out.push_str(region);
        out.push_str(self.tail);
        out
    }
}

/// Locate a top-level block such as `android { ... }`.
///
/// The opening line must start at column 0 with `name` followed by `{`.
pub fn find_block<'a>(content: &'a str, name: &str) -> Result<TextRegion<'a>, BlockError> {
    find_at_depth(content, name, 0, 0)
}

/// Locate a block nested directly inside an already-located region.
///
/// Only depth-1 children are considered, so `packagingOptions` inside
/// `buildTypes { release { ... } }` is not picked up.
pub fn find_child_block<'a>(region: &'a str, name: &str) -> Result<TextRegion<'a>, BlockError> {
    // The region's own opening line is never a candidate.
    let first_line = line_end(region, 0);
    find_at_depth(region, name, 1, first_line)
}

fn find_at_depth<'a>(
    text: &'a str,
    name: &str,
    depth: usize,
    from: usize,
) -> Result<TextRegion<'a>, BlockError> {
    let mut scanner = BraceScanner::new(text, 0);
    let mut line_start = 0;

    loop {
        if line_start >= from && scanner.depth() == depth && scanner.in_code() {
            let line = &text[line_start..line_end(text, line_start)];
            // Top-level blocks must start at column 0.
            let indent = if depth == 0 {
                0
            } else {
                line.len() - line.trim_start().len()
            };
            if let Some(brace) = opening_brace(&line[indent..], name) {
                let open = line_start + indent + brace;
                let close = matching_close(text, open).ok_or_else(|| BlockError::Unbalanced {
                    block: name.to_string(),
                })?;
                tracing::debug!(block = name, start = line_start, close, "located block");
                return Ok(TextRegion::split(text, line_start, line_end(text, close)));
            }
        }

        match scanner.skip_line() {
            Some(next) => line_start = next,
            None => break,
        }
    }

    Err(BlockError::NotFound {
        block: name.to_string(),
    })
}

/// Offset of `{` if `line` opens a block called `name`.
fn opening_brace(line: &str, name: &str) -> Option<usize> {
    let rest = line.strip_prefix(name)?;
    let trimmed = rest.trim_start();
    trimmed
        .starts_with('{')
        .then(|| name.len() + (rest.len() - trimmed.len()))
}

/// End of the line containing `at`, including its newline.
fn line_end(text: &str, at: usize) -> usize {
    text[at..]
        .find('\n')
        .map(|offset| at + offset + 1)
        .unwrap_or(text.len())
}
