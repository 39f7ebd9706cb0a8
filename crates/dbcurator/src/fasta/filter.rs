use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// How the individual criteria combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Any,
    All,
    None,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Any => "any",
            MatchMode::All => "all",
            MatchMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Simple,
    Regex,
}

pub trait TextFilter {
    fn matches(&self, text: &str) -> bool;

    /// Checks the criteria, returning a user-facing message when unusable.
    fn test_criteria(&self) -> Result<(), String>;
}

/// Case-insensitive word filter: criteria are split on whitespace and each
/// word is tested as a substring.
#[derive(Debug, Clone)]
pub struct SimpleTextFilter {
    words: Vec<String>,
    mode: MatchMode,
}

impl SimpleTextFilter {
    pub fn new(criteria: &str, mode: MatchMode) -> Self {
        let words = criteria
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        Self { words, mode }
    }
}

impl TextFilter for SimpleTextFilter {
    fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        let mut hits = self.words.iter().map(|w| text.contains(w.as_str()));
        match self.mode {
            MatchMode::Any => hits.any(|hit| hit),
            MatchMode::All => hits.all(|hit| hit),
            MatchMode::None => !hits.any(|hit| hit),
        }
    }

    fn test_criteria(&self) -> Result<(), String> {
        if self.words.is_empty() {
            return Err("Enter a criteria string".to_string());
        }
        Ok(())
    }
}

/// Case-insensitive regular expression filter. `Any` and `All` both mean
/// "the pattern is found", `None` means it is not.
#[derive(Debug, Clone)]
pub struct RegexTextFilter {
    pattern: Result<Regex, String>,
    mode: MatchMode,
}

impl RegexTextFilter {
    pub fn new(criteria: &str, mode: MatchMode) -> Self {
        let pattern = RegexBuilder::new(criteria)
            .case_insensitive(true)
            .build()
            .map_err(|e| e.to_string());
        Self { pattern, mode }
    }
}

impl TextFilter for RegexTextFilter {
    fn matches(&self, text: &str) -> bool {
        let Ok(pattern) = &self.pattern else {
            return false;
        };
        let found = pattern.is_match(text);
        match self.mode {
            MatchMode::Any | MatchMode::All => found,
            MatchMode::None => !found,
        }
    }

    fn test_criteria(&self) -> Result<(), String> {
        match &self.pattern {
            Ok(_) => Ok(()),
            Err(e) => Err(format!("Invalid regular expression: {}", e)),
        }
    }
}

/// Builds the filter for a text mode.
pub fn build_filter(criteria: &str, text_mode: TextMode, mode: MatchMode) -> Box<dyn TextFilter> {
    match text_mode {
        TextMode::Simple => Box::new(SimpleTextFilter::new(criteria, mode)),
        TextMode::Regex => Box::new(RegexTextFilter::new(criteria, mode)),
    }
}
