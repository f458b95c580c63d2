//! File patch rules.
//!
//! A [`PatchRule`] is one transformation of one file's text. Rules never
//! touch the disk themselves: [`apply_to_file`] runs a rule against the
//! content staged in a [`Changeset`], and [`patch_file`] wraps that in a
//! single-file read-modify-write.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::anchor::{self, AnchorStrategy};
use crate::edit::{Changeset, EditError};
use crate::gradle::{self, Declaration};
use crate::safety::{ProjectGuard, SafetyError};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("required file does not exist: {path}")]
    MissingFile { path: PathBuf },

    #[error("block '{block}' not found in {file}")]
    BlockNotFound { file: PathBuf, block: String },

    #[error("block '{block}' in {file} is never closed")]
    UnbalancedBlock { file: PathBuf, block: String },

    #[error("unsupported layout in {file}: {reason}")]
    UnsupportedLayout { file: PathBuf, reason: String },

    #[error("no anchor matched in {file} (tried: {tried})")]
    AnchorNotFound { file: PathBuf, tried: String },

    #[error("{platform} JavaScript engine in {file} is {engine}, expected 'jsc'")]
    UnsupportedEngine {
        file: PathBuf,
        platform: String,
        engine: String,
    },

    #[error("failed to parse {file}: {source}")]
    InvalidAppConfig {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no host files named {names} found under {root}")]
    NoHostFiles { root: PathBuf, names: String },

    #[error("invalid anchor pattern '{name}': {source}")]
    InvalidAnchor {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to search {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Result of running one rule against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for applied/already-applied"]
pub enum PatchOutcome {
    /// Content changed; `strategy` names the policy or anchor used
    Applied { strategy: String },
    /// Content already carried the change
    AlreadyApplied,
    /// Nothing to do for this file (single substitutions that found no target)
    NotApplicable { reason: String },
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied { strategy } => write!(f, "applied ({strategy})"),
            PatchOutcome::AlreadyApplied => write!(f, "already applied"),
            PatchOutcome::NotApplicable { reason } => write!(f, "not applicable: {reason}"),
        }
    }
}

/// One transformation of a file's text.
#[derive(Debug, Clone)]
pub enum PatchRule {
    /// Ensure `declaration` inside `sub_block`, nested in top-level `block`.
    /// Creates the sub-block when absent; fails when `block` is missing.
    EnsureSubBlockLine {
        block: String,
        sub_block: String,
        declaration: Declaration,
    },
    /// Ensure `declaration` directly inside top-level `block`.
    EnsureBlockLine {
        block: String,
        declaration: Declaration,
    },
    /// Replace every line equal to `from` (ignoring trailing whitespace).
    ReplaceLine { from: String, to: String },
    /// Replace every occurrence of a literal.
    ReplaceText { from: String, to: String },
    /// Insert `text` right after the first anchor that matches.
    InsertAfterAnchor {
        anchors: Vec<AnchorStrategy>,
        text: String,
        /// Presence of this substring means the text was already inserted
        marker: String,
        /// Fail instead of reporting `NotApplicable` when nothing matches
        required: bool,
    },
}

impl PatchRule {
    /// Apply the rule to `content`, returning the new text and the outcome.
    ///
    /// `file` is only used for error reporting.
    pub fn apply(
        &self,
        file: &Path,
        content: &str,
    ) -> Result<(String, PatchOutcome), PatchError> {
        match self {
            PatchRule::EnsureSubBlockLine {
                block,
                sub_block,
                declaration,
            } => {
                let found = gradle::find_block(content, block).map_err(|e| e.at(file))?;
                let (region, policy) =
                    gradle::ensure_sub_block_line(found.region, block, sub_block, declaration)
                        .map_err(|e| e.at(file))?;
                Ok(changed_or_same(
                    content,
                    found.replace(&region),
                    policy.as_str(),
                ))
            }

            PatchRule::EnsureBlockLine { block, declaration } => {
                let found = gradle::find_block(content, block).map_err(|e| e.at(file))?;
                let region = gradle::merge_into_block(found.region, block, declaration)
                    .map_err(|e| e.at(file))?;
                Ok(changed_or_same(
                    content,
                    found.replace(&region),
                    gradle::Policy::Merge.as_str(),
                ))
            }

            PatchRule::ReplaceLine { from, to } => {
                let mut replaced = 0;
                let mut already = false;
                let mut out = String::with_capacity(content.len());
                for line in content.split_inclusive('\n') {
                    let body = line.trim_end();
                    if body == from {
                        out.push_str(to);
                        out.push_str(&line[body.len()..]);
                        replaced += 1;
                    } else {
                        already |= body == to;
                        out.push_str(line);
                    }
                }

                if replaced > 0 {
                    Ok((
                        out,
                        PatchOutcome::Applied {
                            strategy: "replace-line".to_string(),
                        },
                    ))
                } else if already {
                    Ok((content.to_string(), PatchOutcome::AlreadyApplied))
                } else {
                    Ok((
                        content.to_string(),
                        PatchOutcome::NotApplicable {
                            reason: format!("no line equal to '{from}'"),
                        },
                    ))
                }
            }

            PatchRule::ReplaceText { from, to } => {
                if content.contains(from.as_str()) {
                    Ok((
                        content.replace(from.as_str(), to),
                        PatchOutcome::Applied {
                            strategy: "replace-text".to_string(),
                        },
                    ))
                } else if content.contains(to.as_str()) {
                    Ok((content.to_string(), PatchOutcome::AlreadyApplied))
                } else {
                    Ok((
                        content.to_string(),
                        PatchOutcome::NotApplicable {
                            reason: format!("'{from}' not present"),
                        },
                    ))
                }
            }

            PatchRule::InsertAfterAnchor {
                anchors,
                text,
                marker,
                required,
            } => {
                if content.contains(marker.as_str()) {
                    return Ok((content.to_string(), PatchOutcome::AlreadyApplied));
                }

                match anchor::first_match(anchors, content) {
                    Some(found) => {
                        let text = with_line_ending(text, line_ending_at(content, found.start));
                        let mut out = String::with_capacity(content.len() + text.len());
                        out.push_str(&content[..found.end]);
                        out.push_str(&text);
                        out.push_str(&content[found.end..]);
                        Ok((
                            out,
                            PatchOutcome::Applied {
                                strategy: found.strategy.to_string(),
                            },
                        ))
                    }
                    None if *required => Err(PatchError::AnchorNotFound {
                        file: file.to_path_buf(),
                        tried: anchor::describe(anchors),
                    }),
                    None => {
                        let tried = anchor::describe(anchors);
                        Ok((
                            content.to_string(),
                            PatchOutcome::NotApplicable {
                                reason: format!("no anchor matched (tried: {tried})"),
                            },
                        ))
                    }
                }
            }
        }
    }
}

/// Terminator of the line containing `at`, or of the file's first line when
/// that line is unterminated.
fn line_ending_at(content: &str, at: usize) -> &'static str {
    let newline = content[at..]
        .find('\n')
        .map(|offset| at + offset)
        .or_else(|| content.find('\n'));
    match newline {
        Some(pos) if content[..pos].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn with_line_ending<'a>(text: &'a str, eol: &str) -> Cow<'a, str> {
    if eol == "\n" {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.replace("\r\n", "\n").replace('\n', eol))
    }
}

fn changed_or_same(content: &str, new_content: String, strategy: &str) -> (String, PatchOutcome) {
    if new_content == content {
        (new_content, PatchOutcome::AlreadyApplied)
    } else {
        (
            new_content,
            PatchOutcome::Applied {
                strategy: strategy.to_string(),
            },
        )
    }
}

/// Run `rule` against the staged content of `file`.
///
/// The file must exist. Returns the canonical path the change was staged
/// under along with the outcome.
pub fn apply_to_file(
    changeset: &mut Changeset,
    file: &Path,
    rule: &PatchRule,
) -> Result<(PathBuf, PatchOutcome), PatchError> {
    if !file.exists() {
        return Err(PatchError::MissingFile {
            path: file.to_path_buf(),
        });
    }

    let (canonical, content) = changeset.read(file)?;
    let (new_content, outcome) = rule.apply(&canonical, &content)?;
    if matches!(outcome, PatchOutcome::Applied { .. }) {
        changeset.stage(&canonical, new_content);
    }
    Ok((canonical, outcome))
}

/// Read `file`, apply one rule, and write the result back.
pub fn patch_file(
    guard: &ProjectGuard,
    file: &Path,
    rule: &PatchRule,
) -> Result<PatchOutcome, PatchError> {
    let mut changeset = Changeset::new(guard.clone());
    let (_, outcome) = apply_to_file(&mut changeset, file, rule)?;
    changeset.commit()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn packaging_rule() -> PatchRule {
        PatchRule::EnsureSubBlockLine {
            block: "android".to_string(),
            sub_block: "packagingOptions".to_string(),
            declaration: Declaration::exclude_library("libjsc.so"),
        }
    }

    #[test]
    fn test_sub_block_rule_reports_policy() {
        let file = Path::new("build.gradle");
        let (once, outcome) = packaging_rule()
            .apply(file, "android {\n    compileSdkVersion 30\n}\n")
            .unwrap();
        assert_eq!(
            outcome,
            PatchOutcome::Applied {
                strategy: "insert-block".to_string()
            }
        );

        let (twice, outcome) = packaging_rule().apply(file, &once).unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_sub_block_rule_missing_block_is_hard_error() {
        let err = packaging_rule()
            .apply(Path::new("build.gradle"), "dependencies {\n}\n")
            .unwrap_err();
        match err {
            PatchError::BlockNotFound { file, block } => {
                assert_eq!(file, PathBuf::from("build.gradle"));
                assert_eq!(block, "android");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_block_line_rule_replaces_old_declaration() {
        let rule = PatchRule::EnsureBlockLine {
            block: "dependencies".to_string(),
            declaration: Declaration::new(
                "org.chromium:v8-android",
                "implementation \"org.chromium:v8-android-jit:+\"",
            ),
        };
        let input = "dependencies {\n    implementation 'org.chromium:v8-android:+'\n    implementation \"androidx.appcompat:appcompat:1.1.0\"\n}\n";
        let (out, _) = rule.apply(Path::new("build.gradle"), input).unwrap();
        assert_eq!(
            out,
            "dependencies {\n    implementation \"androidx.appcompat:appcompat:1.1.0\"\n    implementation \"org.chromium:v8-android-jit:+\"\n}\n"
        );
    }

    #[test]
    fn test_replace_line_is_noop_on_miss() {
        let rule = PatchRule::ReplaceLine {
            from: "# org.gradle.jvmargs=-Xmx2048m".to_string(),
            to: "org.gradle.jvmargs=-Xmx4096m".to_string(),
        };
        let file = Path::new("gradle.properties");

        let (out, outcome) = rule
            .apply(file, "a=1\n# org.gradle.jvmargs=-Xmx2048m  \r\nb=2")
            .unwrap();
        assert_eq!(out, "a=1\norg.gradle.jvmargs=-Xmx4096m  \r\nb=2");
        assert!(matches!(outcome, PatchOutcome::Applied { .. }));

        let (again, outcome) = rule.apply(file, &out).unwrap();
        assert_eq!(again, out);
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);

        let (_, outcome) = rule.apply(file, "a=1\n").unwrap();
        assert!(matches!(outcome, PatchOutcome::NotApplicable { .. }));
    }

    #[test]
    fn test_replace_text_outcomes() {
        let rule = PatchRule::ReplaceText {
            from: "jsc-android/dist".to_string(),
            to: "v8-android-jit/dist".to_string(),
        };
        let file = Path::new("build.gradle");
        let (out, outcome) = rule
            .apply(file, "url(\"$rootDir/../node_modules/jsc-android/dist\")")
            .unwrap();
        assert_eq!(out, "url(\"$rootDir/../node_modules/v8-android-jit/dist\")");
        assert!(matches!(outcome, PatchOutcome::Applied { .. }));
        assert_eq!(rule.apply(file, &out).unwrap().1, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn test_insert_after_anchor() {
        let rule = PatchRule::InsertAfterAnchor {
            anchors: vec![AnchorStrategy::new("export", r"(?m)^export default App;$").unwrap()],
            text: "\n// hint".to_string(),
            marker: "// hint".to_string(),
            required: true,
        };
        let file = Path::new("App.js");

        let (out, outcome) = rule.apply(file, "export default App;\n").unwrap();
        assert_eq!(out, "export default App;\n// hint\n");
        assert_eq!(
            outcome,
            PatchOutcome::Applied {
                strategy: "export".to_string()
            }
        );
        assert_eq!(rule.apply(file, &out).unwrap().1, PatchOutcome::AlreadyApplied);

        let err = rule.apply(file, "module.exports = App;\n").unwrap_err();
        assert!(matches!(err, PatchError::AnchorNotFound { .. }));
    }

    #[test]
    fn test_insert_after_anchor_follows_crlf() {
        let rule = PatchRule::InsertAfterAnchor {
            anchors: vec![AnchorStrategy::new("export", r"(?mR)^export default App;$").unwrap()],
            text: "\nif (hint) {\n  log();\n}".to_string(),
            marker: "if (hint)".to_string(),
            required: true,
        };

        let (out, _) = rule
            .apply(Path::new("App.js"), "const App = 1;\r\nexport default App;\r\n")
            .unwrap();
        assert_eq!(
            out,
            "const App = 1;\r\nexport default App;\r\nif (hint) {\r\n  log();\r\n}\r\n"
        );

        let (out, _) = rule
            .apply(Path::new("App.js"), "export default App;\n")
            .unwrap();
        assert_eq!(out, "export default App;\nif (hint) {\n  log();\n}\n");
    }

    #[test]
    fn test_patch_file_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let gradle = dir.path().join("build.gradle");
        fs::write(&gradle, "android {\n    compileSdkVersion 30\n}\n").unwrap();
        let guard = ProjectGuard::new(dir.path()).unwrap();

        let outcome = patch_file(&guard, &gradle, &packaging_rule()).unwrap();
        assert!(matches!(outcome, PatchOutcome::Applied { .. }));
        assert!(fs::read_to_string(&gradle)
            .unwrap()
            .contains("exclude \"**/libjsc.so\""));

        let missing = patch_file(&guard, &dir.path().join("nope.gradle"), &packaging_rule());
        assert!(matches!(missing, Err(PatchError::MissingFile { .. })));
    }
}
