use crate::models::{ListingRules, NewProperty, PropertyPatch, PropertyRecord, ScrapeStatus, ValidationError};
use crate::scrapers::{ExtractedFields, ExtractionError, ListingExtractor};
use crate::store::{PropertyStore, StoreError};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Why a scrape attempt ended in FAILED
#[derive(Debug, thiserror::Error)]
pub enum ScrapeFailure {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("extracted data rejected: {0}")]
    Rejected(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("Property {0} not found")]
    NotFound(i64),
    #[error("Can only retry failed scraping attempts (property {id} is {status})")]
    InvalidState { id: i64, status: ScrapeStatus },
    #[error("Scraping failed for {}: {source}", .record.url)]
    ScrapeFailed {
        /// The record as stored after the FAILED transition
        record: Box<PropertyRecord>,
        #[source]
        source: ScrapeFailure,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of `run_scrape`: the stored record and whether this call extracted it
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    pub record: PropertyRecord,
    /// `false` when an already COMPLETED record was returned as-is
    pub extracted: bool,
}

/// Drives one scrape attempt through the record lifecycle:
/// lookup or stub, IN_PROGRESS, extraction, then COMPLETED or FAILED.
///
/// Concurrent calls for the same URL are not serialized; the store's unique
/// URL constraint is the only guard and the last status write wins.
#[derive(Clone)]
pub struct ScrapeOrchestrator {
    store: Arc<dyn PropertyStore>,
    extractor: Arc<dyn ListingExtractor>,
    rules: ListingRules,
}

impl ScrapeOrchestrator {
    pub fn new(
        store: Arc<dyn PropertyStore>,
        extractor: Arc<dyn ListingExtractor>,
        rules: ListingRules,
    ) -> Self {
        Self {
            store,
            extractor,
            rules,
        }
    }

    pub fn rules(&self) -> &ListingRules {
        &self.rules
    }

    /// Scrape `url` into its record, creating a stub if none exists.
    /// A COMPLETED record is returned untouched without extracting.
    pub async fn run_scrape(&self, url: &str) -> Result<ScrapeOutcome, OrchestrationError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OrchestrationError::InvalidUrl("URL is required".to_string()));
        }
        if !self.rules.accepts_url(url) {
            return Err(OrchestrationError::InvalidUrl(format!(
                "Invalid listing URL, expected prefix {}",
                self.rules.url_prefix
            )));
        }

        let id = match self.store.get_by_url(url).await? {
            Some(existing) if existing.status == ScrapeStatus::Completed => {
                info!(id = existing.id, url = %url, "Property already scraped");
                return Ok(ScrapeOutcome {
                    record: existing,
                    extracted: false,
                });
            }
            Some(existing) => {
                info!(id = existing.id, url = %url, previous = %existing.status, "Re-scraping existing property");
                self.store
                    .update_status(existing.id, ScrapeStatus::InProgress)
                    .await?;
                existing.id
            }
            None => {
                let stub = self.store.create(NewProperty::stub(url)).await?;
                info!(id = stub.id, url = %url, "Created stub property");
                stub.id
            }
        };

        let record = self.resolve(id, url).await?;
        Ok(ScrapeOutcome {
            record,
            extracted: true,
        })
    }

    /// Re-run extraction for a FAILED record against its stored URL
    pub async fn retry(&self, id: i64) -> Result<PropertyRecord, OrchestrationError> {
        let record = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(OrchestrationError::NotFound(id))?;

        if record.status != ScrapeStatus::Failed {
            return Err(OrchestrationError::InvalidState {
                id,
                status: record.status,
            });
        }

        info!(id, url = %record.url, "Retrying failed scrape");
        self.store.update_status(id, ScrapeStatus::InProgress).await?;
        self.resolve(id, &record.url).await
    }

    /// Every path out of here leaves the record COMPLETED or FAILED,
    /// short of the store itself refusing the final write.
    async fn resolve(&self, id: i64, url: &str) -> Result<PropertyRecord, OrchestrationError> {
        info!(id, url = %url, source = self.extractor.source_name(), "Starting extraction");

        match self.extractor.extract(url).await {
            Ok(fields) => self.complete(id, fields).await,
            Err(e) => {
                warn!(id, url = %url, kind = e.kind(), "Extraction failed: {}", e);
                self.fail(id, e.into()).await
            }
        }
    }

    async fn complete(
        &self,
        id: i64,
        fields: ExtractedFields,
    ) -> Result<PropertyRecord, OrchestrationError> {
        let patch = PropertyPatch {
            title: Some(fields.title),
            location: Some(fields.location),
            price: Some(fields.price),
            image_url: Some(fields.image_url),
            status: Some(ScrapeStatus::Completed),
        };

        if let Err(rejected) = patch.validate(&self.rules) {
            warn!(id, "Extracted fields rejected: {}", rejected);
            return self.fail(id, rejected.into()).await;
        }

        match self.store.update(id, patch).await {
            Ok(record) => {
                info!(id, title = %record.title, "Scraping completed");
                Ok(record)
            }
            Err(e) => {
                if let Err(mark) = self.store.update_status(id, ScrapeStatus::Failed).await {
                    error!(id, "Could not mark property as failed: {}", mark);
                }
                Err(e.into())
            }
        }
    }

    async fn fail(
        &self,
        id: i64,
        failure: ScrapeFailure,
    ) -> Result<PropertyRecord, OrchestrationError> {
        self.store.update_status(id, ScrapeStatus::Failed).await?;
        let record = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(OrchestrationError::NotFound(id))?;

        Err(OrchestrationError::ScrapeFailed {
            record: Box::new(record),
            source: failure,
        })
    }
}
