//! Line suppression with regex patterns.
//!
//! Lines matching any configured pattern are dropped before classification,
//! so noisy server output never reaches Discord.

use fancy_regex::Regex;
use tracing::warn;

use crate::config::types::FiltersConfig;

/// Filter that checks raw server lines against regex patterns.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl LineFilter {
    /// Create a filter from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: compile_patterns(patterns),
        }
    }

    /// Build the filter from the `filters` config section.
    ///
    /// Returns `None` when filtering is disabled or nothing is configured.
    pub fn from_config(config: Option<&FiltersConfig>) -> Option<Self> {
        let config = config?;
        if !config.enabled {
            return None;
        }

        let filter = Self::new(config.patterns.clone());
        filter.has_patterns().then_some(filter)
    }

    /// Returns `true` if the line matches any pattern and should be dropped.
    pub fn should_suppress(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.regex.is_match(line).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    pub fn has_patterns(&self) -> bool {
        !self.patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_allows_all() {
        let filter = LineFilter::default();
        assert!(!filter.should_suppress("Player #1 Alice connected"));
        assert!(!filter.has_patterns());
    }

    #[test]
    fn test_partial_match() {
        let filter = LineFilter::new(vec!["BEClient:.*kicked".to_string()]);
        assert!(filter.should_suppress("BEClient: player kicked for spam"));
        assert!(!filter.should_suppress("BEClient: player joined"));
    }

    #[test]
    fn test_invalid_regex_skipped() {
        let filter = LineFilter::new(vec!["[invalid".to_string(), "valid".to_string()]);
        assert!(filter.should_suppress("valid line"));
        assert!(!filter.should_suppress("[broken"));
    }

    #[test]
    fn test_case_insensitive_lookahead() {
        let filter = LineFilter::new(vec!["(?i)^verify(?!.*ok)".to_string()]);
        assert!(filter.should_suppress("VERIFY signature failed"));
        assert!(!filter.should_suppress("verify ok"));
    }

    #[test]
    fn test_from_config() {
        assert!(LineFilter::from_config(None).is_none());

        let disabled = FiltersConfig {
            enabled: false,
            patterns: vec!["x".to_string()],
        };
        assert!(LineFilter::from_config(Some(&disabled)).is_none());

        let empty = FiltersConfig {
            enabled: true,
            patterns: Vec::new(),
        };
        assert!(LineFilter::from_config(Some(&empty)).is_none());

        let enabled = FiltersConfig {
            enabled: true,
            patterns: vec!["^noise".to_string()],
        };
        let filter = LineFilter::from_config(Some(&enabled)).unwrap();
        assert!(filter.should_suppress("noise from server"));
    }
}
