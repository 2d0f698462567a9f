use crate::scrapers::types::{ExtractedFields, ExtractionError};
use async_trait::async_trait;

/// Common trait for single-listing extractors
/// The orchestrator only sees this seam, so tests can swap the browser out
#[async_trait]
pub trait ListingExtractor: Send + Sync {
    /// Fetch `url` and extract the first listing on it
    async fn extract(&self, url: &str) -> Result<ExtractedFields, ExtractionError>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}
