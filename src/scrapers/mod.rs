pub mod browser;
pub mod card;
pub mod traits;
pub mod types;

pub use browser::BrowserExtractor;
pub use traits::ListingExtractor;
pub use types::{BrowserSettings, ExtractedFields, ExtractionError, SiteProfile};
