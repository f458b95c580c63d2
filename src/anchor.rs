//! Named anchor strategies for files without a block structure.
//!
//! Generated sources drift between template versions, so each insertion point
//! is described by an ordered list of strategies. The first one that matches
//! wins and its name is reported back to the caller.

use regex::Regex;
use std::fmt;

/// One way of locating an insertion point.
#[derive(Debug, Clone)]
pub struct AnchorStrategy {
    name: String,
    pattern: Regex,
}

impl AnchorStrategy {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl fmt::Display for AnchorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (/{}/)", self.name, self.pattern.as_str())
    }
}

/// Where a strategy matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch<'a> {
    pub strategy: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Try `strategies` in order and return the first match.
pub fn first_match<'a>(
    strategies: &'a [AnchorStrategy],
    content: &str,
) -> Option<AnchorMatch<'a>> {
    strategies.iter().find_map(|strategy| {
        let found = strategy.pattern.find(content);
        tracing::debug!(
            strategy = strategy.name(),
            matched = found.is_some(),
            "anchor strategy tried"
        );
        found.map(|m| AnchorMatch {
            strategy: strategy.name(),
            start: m.start(),
            end: m.end(),
        })
    })
}

/// Comma-separated strategy names, for diagnostics.
pub fn describe(strategies: &[AnchorStrategy]) -> String {
    strategies
        .iter()
        .map(AnchorStrategy::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategies() -> Vec<AnchorStrategy> {
        vec![
            AnchorStrategy::new("footer", r"(?m)^footer$").unwrap(),
            AnchorStrategy::new("export", r"(?m)^export default App;$").unwrap(),
        ]
    }

    #[test]
    fn test_first_match_respects_priority() {
        let all = strategies();
        let content = "export default App;\nfooter\n";
        let m = first_match(&all, content).unwrap();
        assert_eq!(m.strategy, "footer");
        assert_eq!(&content[m.start..m.end], "footer");
    }

    #[test]
    fn test_first_match_falls_back() {
        let all = strategies();
        let content = "const App = () => null;\nexport default App;\n";
        let m = first_match(&all, content).unwrap();
        assert_eq!(m.strategy, "export");
        assert_eq!(&content[m.end..], "\n");
    }

    #[test]
    fn test_no_match() {
        assert!(first_match(&strategies(), "nothing here").is_none());
        assert_eq!(describe(&strategies()), "footer, export");
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(AnchorStrategy::new("broken", "(unclosed").is_err());
    }
}
