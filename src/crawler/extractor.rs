//! HTML extractor for listing pages
//!
//! This module turns the body of one listing page into the ordered list of
//! item identifiers it links to. Extraction is pure: no I/O, no shared state.

use crate::url::SearchMode;
use scraper::{Html, Selector};

/// Turns a page body into item identifiers
///
/// An empty result is a valid outcome and means the page listed nothing.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, mode: SearchMode) -> Vec<String>;
}

/// Extractor for rusneb.ru search results and catalog volume listings
///
/// # Extraction Rules
///
/// | Mode | Card | Link |
/// |------|------|------|
/// | Catalog | `.cards-results__item` | `a.cards-results__link` |
/// | Search | `.search-list__item` | `a.search-list__item_link` |
///
/// The link's `href` must contain `/catalog/`; the identifier is what follows
/// it. In search mode only the first path segment after `/catalog/` is kept.
///
/// # Example
///
/// ```
/// use catalog_sweep::crawler::{Extractor, RusnebExtractor};
/// use catalog_sweep::url::SearchMode;
///
/// let html = r#"<div class="cards-results__item">
///     <a class="cards-results__link" href="/catalog/000200_RU_A_1">Open</a>
/// </div>"#;
/// let items = RusnebExtractor.extract(html, SearchMode::Catalog);
/// assert_eq!(items, vec!["000200_RU_A_1".to_string()]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RusnebExtractor;

impl Extractor for RusnebExtractor {
    fn extract(&self, body: &str, mode: SearchMode) -> Vec<String> {
        let document = Html::parse_document(body);
        match mode {
            SearchMode::Catalog => extract_ids(
                &document,
                ".cards-results__item",
                "a.cards-results__link",
                false,
            ),
            SearchMode::Search => extract_ids(
                &document,
                ".search-list__item",
                "a.search-list__item_link",
                true,
            ),
        }
    }
}

/// Collects the identifier of the first matching link of every card
fn extract_ids(
    document: &Html,
    card_selector: &str,
    link_selector: &str,
    first_segment_only: bool,
) -> Vec<String> {
    let (Ok(cards), Ok(link)) = (Selector::parse(card_selector), Selector::parse(link_selector))
    else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    for card in document.select(&cards) {
        let Some(href) = card
            .select(&link)
            .next()
            .and_then(|element| element.value().attr("href"))
        else {
            continue;
        };

        if let Some(id) = catalog_id(href, first_segment_only) {
            ids.push(id);
        }
    }

    ids
}

/// Returns the part of `href` after `/catalog/`
fn catalog_id(href: &str, first_segment_only: bool) -> Option<String> {
    let (_, rest) = href.split_once("/catalog/")?;
    let id = if first_segment_only {
        rest.split('/').next().unwrap_or_default()
    } else {
        rest
    };

    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
