//! Content-addressed cache of downloaded source databases.

pub mod cache;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod locator;

pub use cache::SourceArchiveCache;
pub use entry::ArchiveEntry;
pub use error::ArchiveError;
pub use fetcher::{DownloadProgress, NetworkFetcher, RemoteFetcher};
pub use locator::{BundledResources, SourceLocator, BUNDLED_PREFIX};
