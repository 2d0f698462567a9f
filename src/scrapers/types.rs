use crate::models::ListingRules;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fields pulled from the first listing card
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub title: String,
    pub location: String,
    pub price: String,
    pub image_url: String,
}

/// Every way an extraction can fail, with the browser's own errors flattened to text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("navigation to {url} did not finish within {timeout:?}: {reason}")]
    NavigationTimeout {
        url: String,
        timeout: Duration,
        reason: String,
    },
    #[error("content anchor `{selector}` did not appear within {timeout:?}")]
    ContentNotFound { selector: String, timeout: Duration },
    #[error("failed to extract property data: {reason}")]
    ExtractionFailed { reason: String },
}

impl ExtractionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ExtractionError::ExtractionFailed {
            reason: reason.into(),
        }
    }

    /// Short tag for logs and API messages
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::NavigationTimeout { .. } => "navigation_timeout",
            ExtractionError::ContentNotFound { .. } => "content_not_found",
            ExtractionError::ExtractionFailed { .. } => "extraction_failed",
        }
    }
}

/// Where the value of a field lives inside a matched element
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// Trimmed text content
    Text,
    /// First non-empty attribute, in order
    Attributes(Vec<String>),
}

/// One (selector, source) candidate; candidates are tried in order
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCandidate {
    pub selector: String,
    pub source: FieldSource,
}

impl FieldCandidate {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            source: FieldSource::Text,
        }
    }

    pub fn attributes(selector: &str, attributes: &[&str]) -> Self {
        Self {
            selector: selector.to_string(),
            source: FieldSource::Attributes(attributes.iter().map(|a| a.to_string()).collect()),
        }
    }
}

/// Markup description of the supported listing site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    pub name: &'static str,
    pub rules: ListingRules,
    /// Present once the results list has rendered
    pub content_anchor: String,
    /// First match is the card we extract from
    pub listing_card: String,
    pub title: Vec<FieldCandidate>,
    pub location: Vec<FieldCandidate>,
    pub price: Vec<FieldCandidate>,
    pub image_url: Vec<FieldCandidate>,
}

impl SiteProfile {
    pub fn magicbricks() -> Self {
        Self {
            name: "MagicBricks",
            rules: ListingRules::default(),
            content_anchor: ".mb-srp__list".to_string(),
            listing_card: ".mb-srp__list .mb-srp__card".to_string(),
            title: vec![
                FieldCandidate::text(".mb-srp__card--title"),
                FieldCandidate::text(".mb-srp__card__title"),
            ],
            location: vec![
                FieldCandidate::text(".mb-srp__card--addr"),
                FieldCandidate::text(".mb-srp__card__address"),
            ],
            price: vec![FieldCandidate::text(".mb-srp__card__price--amount")],
            image_url: vec![FieldCandidate::attributes(
                ".mb-srp__card__photo",
                &["data-src", "src"],
            )],
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.rules.url_prefix = prefix.into();
        self
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::magicbricks()
    }
}

/// Browser session tuning
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub navigation_timeout: Duration,
    pub content_timeout: Duration,
    /// How long the network must stay quiet before the page counts as settled
    pub network_idle: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            navigation_timeout: Duration::from_secs(60),
            content_timeout: Duration::from_secs(30),
            network_idle: Duration::from_millis(500),
        }
    }
}
