use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use url::Url;

use crate::archive::ArchiveError;
use crate::config::BundledResourcesConfig;

/// Prefix of locators that name a resource shipped with the installation.
pub const BUNDLED_PREFIX: &str = "classpath:";

/// Where a source database comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Network(Url),
    Bundled(String),
}

impl SourceLocator {
    /// Parses and normalizes a locator. Network locators keep their
    /// canonical URL form.
    pub fn parse(locator: &str) -> Result<Self, ArchiveError> {
        let trimmed = locator.trim();
        let invalid = |reason: &str| ArchiveError::InvalidLocator {
            locator: trimmed.to_string(),
            reason: reason.to_string(),
        };

        if let Some(resource) = trimmed.strip_prefix(BUNDLED_PREFIX) {
            let relative = resource.trim_start_matches('/');
            if relative.is_empty() {
                return Err(invalid("empty resource path"));
            }
            if Path::new(relative)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(invalid("resource path must stay inside the resource root"));
            }
            return Ok(SourceLocator::Bundled(trimmed.to_string()));
        }

        let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
        match url.scheme() {
            "http" | "https" | "ftp" => Ok(SourceLocator::Network(url)),
            other => Err(ArchiveError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceLocator::Network(url) => url.as_str(),
            SourceLocator::Bundled(resource) => resource,
        }
    }

    fn last_segment(&self) -> &str {
        match self {
            SourceLocator::Network(url) => url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .unwrap_or_default(),
            SourceLocator::Bundled(resource) => {
                resource.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default()
            }
        }
    }

    /// `<last segment up to its first dot>_<YYYYMMDD-HHMMSS>.fasta.gz`
    pub fn archive_file_name(&self, now: DateTime<Utc>) -> String {
        let segment = self.last_segment();
        let segment = segment.strip_prefix(BUNDLED_PREFIX).unwrap_or(segment);
        let base = match segment.split('.').next() {
            Some(base) if !base.is_empty() => base,
            _ => "source",
        };
        format!("{}_{}.fasta.gz", base, now.format("%Y%m%d-%H%M%S"))
    }
}

/// Allow-list of bundled resources and the directory they resolve against.
#[derive(Debug, Clone, Default)]
pub struct BundledResources {
    root: PathBuf,
    allowed: Vec<String>,
}

impl BundledResources {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            allowed: Vec::new(),
        }
    }

    pub fn from_config(config: &BundledResourcesConfig) -> Self {
        let root = config.root.as_deref().map(PathBuf::from).unwrap_or_default();
        Self {
            root,
            allowed: config.allowed.clone(),
        }
    }

    pub fn allow(mut self, locator: impl Into<String>) -> Self {
        self.allowed.push(locator.into());
        self
    }

    pub fn is_allowed(&self, locator: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == locator)
    }

    /// File backing a bundled locator.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        let relative = locator
            .strip_prefix(BUNDLED_PREFIX)
            .unwrap_or(locator)
            .trim_start_matches('/');
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_network_locator_normalizes() {
        let locator = SourceLocator::parse(" HTTP://Example.org/pub/db.fasta.gz ").unwrap();
        assert_eq!(locator.as_str(), "http://example.org/pub/db.fasta.gz");
        assert!(matches!(locator, SourceLocator::Network(_)));
    }

    #[test]
    fn test_parse_rejects_bad_locators() {
        assert!(matches!(
            SourceLocator::parse("not a url"),
            Err(ArchiveError::InvalidLocator { .. })
        ));
        assert!(matches!(
            SourceLocator::parse("file:///etc/passwd"),
            Err(ArchiveError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            SourceLocator::parse("classpath:/../secret.fasta"),
            Err(ArchiveError::InvalidLocator { .. })
        ));
        assert!(SourceLocator::parse("classpath:").is_err());
    }

    #[test]
    fn test_archive_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        let network = SourceLocator::parse("ftp://ftp.example.org/pub/uniprot_sprot.fasta.gz").unwrap();
        assert_eq!(network.archive_file_name(now), "uniprot_sprot_20260304-050607.fasta.gz");

        let bundled = SourceLocator::parse("classpath:/testdbs/ShortTest.fasta.gz").unwrap();
        assert_eq!(bundled.archive_file_name(now), "ShortTest_20260304-050607.fasta.gz");

        let bare = SourceLocator::parse("http://example.org/").unwrap();
        assert_eq!(bare.archive_file_name(now), "source_20260304-050607.fasta.gz");
    }

    #[test]
    fn test_bundled_resources() {
        let bundled = BundledResources::new("/opt/res").allow("classpath:/testdbs/ShortTest.fasta.gz");

        assert!(bundled.is_allowed("classpath:/testdbs/ShortTest.fasta.gz"));
        assert!(!bundled.is_allowed("classpath:/testdbs/Other.fasta.gz"));
        assert_eq!(
            bundled.resolve("classpath:/testdbs/ShortTest.fasta.gz"),
            PathBuf::from("/opt/res/testdbs/ShortTest.fasta.gz")
        );
    }
}
