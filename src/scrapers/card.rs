use crate::scrapers::types::{ExtractedFields, ExtractionError, FieldCandidate, FieldSource, SiteProfile};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Extract the first listing card from rendered page HTML.
///
/// Returns `Ok(None)` when the page has no card at all. Each field is
/// resolved on its own, so a missing title selector never hides the price.
pub fn extract_first_card(
    html: &str,
    profile: &SiteProfile,
) -> Result<Option<ExtractedFields>, ExtractionError> {
    let document = Html::parse_document(html);
    let card_selector = parse_selector(&profile.listing_card)?;

    let Some(card) = document.select(&card_selector).next() else {
        debug!(selector = %profile.listing_card, "No listing card in page");
        return Ok(None);
    };

    let price_text = first_match(card, &profile.price)?;

    Ok(Some(ExtractedFields {
        title: first_match(card, &profile.title)?,
        location: first_match(card, &profile.location)?,
        price: normalize_price(&price_text, profile.rules.currency_glyph),
        image_url: first_match(card, &profile.image_url)?,
    }))
}

/// The first card as a usable listing: a page without a card, or a card
/// without a title, is an extraction failure rather than empty data.
pub fn extract_listing(html: &str, profile: &SiteProfile) -> Result<ExtractedFields, ExtractionError> {
    let fields = extract_first_card(html, profile)?
        .ok_or_else(|| ExtractionError::failed("no listing card on page"))?;

    if fields.title.is_empty() {
        return Err(ExtractionError::failed("listing card has no title"));
    }
    Ok(fields)
}

/// First non-empty value produced by the candidates, or an empty string
fn first_match(card: ElementRef<'_>, candidates: &[FieldCandidate]) -> Result<String, ExtractionError> {
    for candidate in candidates {
        let selector = parse_selector(&candidate.selector)?;
        let Some(element) = card.select(&selector).next() else {
            continue;
        };

        let value = match &candidate.source {
            FieldSource::Text => element.text().collect::<String>().trim().to_string(),
            FieldSource::Attributes(attributes) => attributes
                .iter()
                .filter_map(|name| element.value().attr(name))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string(),
        };

        if !value.is_empty() {
            return Ok(value);
        }
    }

    Ok(String::new())
}

/// Keep digits, the decimal point, the currency glyph and whitespace
pub fn normalize_price(raw: &str, glyph: char) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == glyph || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector)
        .map_err(|e| ExtractionError::failed(format!("invalid selector `{}`: {:?}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(cards: &str) -> String {
        format!(
            r#"<html><body><div class="mb-srp__list">{}</div></body></html>"#,
            cards
        )
    }

    #[test]
    fn extracts_all_fields_from_first_card() {
        let html = page(
            r#"
            <div class="mb-srp__card">
                <h2 class="mb-srp__card--title"> 2 BHK Flat </h2>
                <div class="mb-srp__card--addr">Downtown</div>
                <div class="mb-srp__card__price--amount">₹ 50 Lac</div>
                <img class="mb-srp__card__photo" src="placeholder.gif" data-src="https://img/x.jpg">
            </div>
            <div class="mb-srp__card">
                <h2 class="mb-srp__card--title">Second card</h2>
            </div>
            "#,
        );

        let fields = extract_first_card(&html, &SiteProfile::magicbricks())
            .unwrap()
            .unwrap();

        assert_eq!(fields.title, "2 BHK Flat");
        assert_eq!(fields.location, "Downtown");
        assert_eq!(fields.price, "₹ 50");
        assert_eq!(fields.image_url, "https://img/x.jpg");
    }

    #[test]
    fn page_without_card_is_an_extraction_failure() {
        let err = extract_listing(&page(""), &SiteProfile::magicbricks()).unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
        assert!(err.to_string().contains("no listing card"));
    }

    #[test]
    fn card_without_title_is_an_extraction_failure() {
        let html = page(
            r#"
            <div class="mb-srp__card">
                <h2 class="mb-srp__card--title">   </h2>
                <div class="mb-srp__card__price--amount">₹ 50 Lac</div>
            </div>
            "#,
        );

        let err = extract_listing(&html, &SiteProfile::magicbricks()).unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
        assert!(err.to_string().contains("no title"));
    }

    #[test]
    fn titled_card_is_a_listing() {
        let html = page(
            r#"<div class="mb-srp__card"><h2 class="mb-srp__card--title">Studio</h2></div>"#,
        );

        let fields = extract_listing(&html, &SiteProfile::magicbricks()).unwrap();
        assert_eq!(fields.title, "Studio");
        assert!(fields.price.is_empty());
    }

    #[test]
    fn falls_back_to_alternate_selectors() {
        let html = page(
            r#"
            <div class="mb-srp__card">
                <h2 class="mb-srp__card__title">Villa</h2>
                <div class="mb-srp__card__address">Sector 10 Dwarka</div>
                <img class="mb-srp__card__photo" src="https://img/fallback.jpg">
            </div>
            "#,
        );

        let fields = extract_first_card(&html, &SiteProfile::magicbricks())
            .unwrap()
            .unwrap();

        assert_eq!(fields.title, "Villa");
        assert_eq!(fields.location, "Sector 10 Dwarka");
        assert_eq!(fields.image_url, "https://img/fallback.jpg");
    }

    #[test]
    fn missing_fields_come_back_empty() {
        let html = page(
            r#"<div class="mb-srp__card"><div class="mb-srp__card__price--amount">₹1.85 Cr</div></div>"#,
        );

        let fields = extract_first_card(&html, &SiteProfile::magicbricks())
            .unwrap()
            .unwrap();

        assert_eq!(fields.title, "");
        assert_eq!(fields.location, "");
        assert_eq!(fields.image_url, "");
        assert_eq!(fields.price, "₹1.85");
    }

    #[test]
    fn no_card_yields_none() {
        let html = page("");
        assert!(extract_first_card(&html, &SiteProfile::magicbricks())
            .unwrap()
            .is_none());
    }

    #[test]
    fn empty_title_candidate_does_not_shadow_the_next_one() {
        let html = page(
            r#"
            <div class="mb-srp__card">
                <h2 class="mb-srp__card--title">   </h2>
                <h2 class="mb-srp__card__title">Plot</h2>
            </div>
            "#,
        );

        let fields = extract_first_card(&html, &SiteProfile::magicbricks())
            .unwrap()
            .unwrap();
        assert_eq!(fields.title, "Plot");
    }

    #[test]
    fn new_markup_variant_is_a_profile_change() {
        let mut profile = SiteProfile::magicbricks();
        profile
            .title
            .push(FieldCandidate::text("[data-testid=\"property-title\"]"));

        let html = page(
            r#"<div class="mb-srp__card"><div data-testid="property-title">Studio</div></div>"#,
        );

        let fields = extract_first_card(&html, &profile).unwrap().unwrap();
        assert_eq!(fields.title, "Studio");
    }

    #[test]
    fn invalid_selector_is_an_extraction_failure() {
        let mut profile = SiteProfile::magicbricks();
        profile.listing_card = "div[".to_string();

        let err = extract_first_card(&page(""), &profile).unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
    }

    #[test]
    fn price_normalization_strips_formatting_noise() {
        assert_eq!(normalize_price("₹ 50,00,000*", '₹'), "₹ 5000000");
        assert_eq!(normalize_price("  ₹ 1.85 Cr  ", '₹'), "₹ 1.85");
        assert_eq!(normalize_price("Price on request", '₹'), "");
    }
}
