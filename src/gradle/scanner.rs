//! Brace-aware byte scanner for Groovy build scripts.
//!
//! Tracks nesting depth while skipping comments and string literals, so a
//! brace inside `"**/lib{a,b}.so"` or `// }` never closes a block. Slashy
//! and dollar-slashy strings are not recognised.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Quoted(u8),
    TripleQuoted(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Open,
    Close,
    Newline,
    Other,
}

pub(crate) struct BraceScanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    mode: Mode,
}

impl<'a> BraceScanner<'a> {
    pub(crate) fn new(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
            depth: 0,
            mode: Mode::Code,
        }
    }

    /// Current brace depth relative to the starting position.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Byte offset of the next unconsumed byte.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// True when the next byte is outside comments and strings.
    pub(crate) fn in_code(&self) -> bool {
        self.mode == Mode::Code
    }

    /// Consume one byte (or one multi-byte delimiter).
    pub(crate) fn step(&mut self) -> Option<Step> {
        let at = self.pos;
        let b = *self.bytes.get(at)?;
        let next = self.bytes.get(at + 1).copied();
        self.pos += 1;

        let step = match self.mode {
            Mode::Code => match b {
                b'/' if next == Some(b'/') => {
                    self.pos += 1;
                    self.mode = Mode::LineComment;
                    Step::Other
                }
                b'/' if next == Some(b'*') => {
                    self.pos += 1;
                    self.mode = Mode::BlockComment;
                    Step::Other
                }
                b'"' | b'\'' if self.bytes[at..].starts_with(&[b, b, b]) => {
                    self.pos += 2;
                    self.mode = Mode::TripleQuoted(b);
                    Step::Other
                }
                b'"' | b'\'' => {
                    self.mode = Mode::Quoted(b);
                    Step::Other
                }
                b'{' => {
                    self.depth += 1;
                    Step::Open
                }
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    Step::Close
                }
                b'\n' => Step::Newline,
                _ => Step::Other,
            },
            Mode::LineComment => {
                if b == b'\n' {
                    self.mode = Mode::Code;
                    Step::Newline
                } else {
                    Step::Other
                }
            }
            Mode::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    self.pos += 1;
                    self.mode = Mode::Code;
                }
                if b == b'\n' {
                    Step::Newline
                } else {
                    Step::Other
                }
            }
            Mode::Quoted(quote) => match b {
                b'\\' => {
                    if next.is_some_and(|n| n != b'\n') {
                        self.pos += 1;
                    }
                    Step::Other
                }
                // Single-line literal: an unterminated quote ends at the newline.
                b'\n' => {
                    self.mode = Mode::Code;
                    Step::Newline
                }
                _ if b == quote => {
                    self.mode = Mode::Code;
                    Step::Other
                }
                _ => Step::Other,
            },
            Mode::TripleQuoted(quote) => {
                if self.bytes[at..].starts_with(&[quote, quote, quote]) {
                    self.pos += 2;
                    self.mode = Mode::Code;
                }
                if b == b'\n' {
                    Step::Newline
                } else {
                    Step::Other
                }
            }
        };

        Some(step)
    }

    /// Advance past the next newline. Returns the start of the following
    /// line, or `None` when the input ends first.
    pub(crate) fn skip_line(&mut self) -> Option<usize> {
        while let Some(step) = self.step() {
            if step == Step::Newline {
                return (self.pos < self.bytes.len()).then_some(self.pos);
            }
        }
        None
    }
}

/// Byte offset of the `}` matching the `{` at `open`.
pub(crate) fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut scanner = BraceScanner::new(text, open);
    while let Some(step) = scanner.step() {
        if step == Step::Close && scanner.depth() == 0 {
            return Some(scanner.pos() - 1);
        }
    }
    None
}
