use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::curation::steps::header_transform::rewrite_header;

/// A named, registered source database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastaSource {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    /// Offered as a default choice to users.
    #[serde(default)]
    pub common: bool,
    #[serde(default)]
    pub transform: Option<HeaderTransform>,
}

impl FastaSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            common: false,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: HeaderTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Header rewrite applied to every record included from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTransform {
    pub name: String,
    pub group_pattern: String,
    pub substitution: String,
}

impl HeaderTransform {
    pub fn new(
        name: impl Into<String>,
        group_pattern: impl Into<String>,
        substitution: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group_pattern: group_pattern.into(),
            substitution: substitution.into(),
        }
    }

    pub fn compile(&self) -> Result<CompiledTransform, regex::Error> {
        Ok(CompiledTransform {
            pattern: Regex::new(&self.group_pattern)?,
            substitution: self.substitution.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledTransform {
    pattern: Regex,
    substitution: String,
}

impl CompiledTransform {
    pub fn apply(&self, header: &str) -> String {
        rewrite_header(&self.pattern, &self.substitution, header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_rewrites_header() {
        let transform = HeaderTransform::new(
            "ipi",
            r"^>IPI:(IPI\d+)\.\d+\|(.*)$",
            ">$1 $2",
        )
        .compile()
        .unwrap();

        assert_eq!(
            transform.apply(">IPI:IPI00000001.2|SWISS-PROT:O95793"),
            ">IPI00000001 SWISS-PROT:O95793"
        );
        assert_eq!(transform.apply(">other header"), ">other header");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(HeaderTransform::new("bad", "(", "$1").compile().is_err());
    }
}
