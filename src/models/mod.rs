use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Page size used when a listing request carries no usable `limit`
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Lifecycle status of a property record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ScrapeStatus {
    pub const ALL: [ScrapeStatus; 4] = [
        ScrapeStatus::Pending,
        ScrapeStatus::InProgress,
        ScrapeStatus::Completed,
        ScrapeStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Pending => "PENDING",
            ScrapeStatus::InProgress => "IN_PROGRESS",
            ScrapeStatus::Completed => "COMPLETED",
            ScrapeStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                ValidationError::single(format!(
                    "Invalid status value. Must be one of: {}",
                    allowed.join(", ")
                ))
            })
    }
}

/// A stored property listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: i64,
    pub title: String,
    pub location: String,
    pub price: String,
    pub image_url: String,
    pub url: String,
    pub status: ScrapeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new record
#[derive(Debug, Clone, PartialEq)]
pub struct NewProperty {
    pub title: String,
    pub location: String,
    pub price: String,
    pub image_url: String,
    pub url: String,
    pub status: ScrapeStatus,
}

impl NewProperty {
    /// Placeholder created when a scrape starts for an unknown URL
    pub fn stub(url: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            location: String::new(),
            price: String::new(),
            image_url: String::new(),
            url: url.into(),
            status: ScrapeStatus::InProgress,
        }
    }

    pub fn validate(&self, rules: &ListingRules) -> Result<(), ValidationError> {
        rules.check(Some(&self.url), Some(&self.price))
    }
}

/// Partial update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<ScrapeStatus>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.location.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self, rules: &ListingRules) -> Result<(), ValidationError> {
        rules.check(None, self.price.as_deref())
    }
}

/// Boundary rules shared by manual submissions and scrape results
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRules {
    /// Scheme + host + path prefix every accepted listing URL starts with
    pub url_prefix: String,
    /// Glyph a non-empty price must start with
    pub currency_glyph: char,
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            url_prefix: "https://www.magicbricks.com/".to_string(),
            currency_glyph: '₹',
        }
    }
}

impl ListingRules {
    pub fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(&self.url_prefix)
    }

    /// Collect every violation instead of stopping at the first one
    pub fn check(&self, url: Option<&str>, price: Option<&str>) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if let Some(url) = url {
            if !self.accepts_url(url) {
                errors.push(format!("Invalid URL. Must start with {}", self.url_prefix));
            }
        }

        if let Some(price) = price {
            if !price.is_empty() && !price.starts_with(self.currency_glyph) {
                errors.push(format!("Price must start with {} symbol", self.currency_glyph));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Validation failed: {}", .0.join(", "))]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Price,
    Title,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Price => "price",
            SortField::Title => "title",
        }
    }

    /// Unknown fields fall back to `created_at`
    fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some("updated_at") => SortField::UpdatedAt,
            Some("price") => SortField::Price,
            Some("title") => SortField::Title,
            _ => SortField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw listing parameters as they arrive from a query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Normalized listing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub status: Option<ScrapeStatus>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            status: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl ListQuery {
    /// Only an unknown status is rejected; bad sort and paging values fall back to defaults.
    pub fn normalize(&self) -> Result<ListOptions, ValidationError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<ScrapeStatus>().map_err(|_| {
                ValidationError::single(format!("Invalid status filter: {}", raw))
            })?),
            None => None,
        };

        let sort_order = match self.sort_order.as_deref() {
            Some("ASC") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        Ok(ListOptions {
            status,
            sort_by: SortField::parse_or_default(self.sort_by.as_deref()),
            sort_order,
            limit: non_negative_or(self.limit.as_deref(), DEFAULT_PAGE_SIZE),
            offset: non_negative_or(self.offset.as_deref(), 0),
        })
    }
}

fn non_negative_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(leading_integer)
        .filter(|n| *n >= 0)
        .unwrap_or(default)
}

/// Integer prefix of `raw` after leading whitespace, so `"20abc"` reads as 20
fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return None;
    }
    let sign_len = raw.len() - unsigned.len();
    raw[..sign_len + digits].parse().ok()
}
