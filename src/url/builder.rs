use crate::url::{ParseRequest, SearchMode};
use crate::SweepError;
use ::url::Url;

/// Builds listing page URLs relative to a site root
///
/// | Mode | Template |
/// |------|----------|
/// | Search | `{base}search/?q={query}&PAGEN_1={page}` |
/// | Catalog | `{base}catalog/{query}/?volumes=page-{page}` |
/// | Download | `{base}local/tools/exalead/getFiles.php?book_id={id}&doc_type=pdf` |
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: Url,
}

impl UrlBuilder {
    /// Creates a builder rooted at `base`
    ///
    /// # Errors
    ///
    /// Fails if `base` does not parse or cannot carry a path (e.g. `mailto:`).
    pub fn new(base: &str) -> crate::Result<Self> {
        let base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(SweepError::UrlParse(::url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self { base })
    }

    /// Returns the URL of listing page `page` for `request`
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_sweep::url::{ParseRequest, UrlBuilder};
    ///
    /// let builder = UrlBuilder::new("https://rusneb.ru/").unwrap();
    /// let url = builder.page_url(&ParseRequest::catalog("000200_3107"), 2);
    /// assert_eq!(url.as_str(), "https://rusneb.ru/catalog/000200_3107/?volumes=page-2");
    /// ```
    pub fn page_url(&self, request: &ParseRequest, page: u64) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);

        // Guaranteed by the constructor rejecting cannot-be-a-base URLs
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            match request.mode() {
                SearchMode::Search => {
                    segments.push("search").push("");
                }
                SearchMode::Catalog => {
                    segments.push("catalog").push(request.query()).push("");
                }
            }
        }

        match request.mode() {
            SearchMode::Search => {
                url.query_pairs_mut()
                    .append_pair("q", request.query())
                    .append_pair("PAGEN_1", &page.to_string());
            }
            SearchMode::Catalog => {
                url.query_pairs_mut()
                    .append_pair("volumes", &format!("page-{}", page));
            }
        }

        url
    }

    /// Returns the PDF download URL of one item
    pub fn download_url(&self, item_id: &str) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["local", "tools", "exalead", "getFiles.php"]);
        }

        url.query_pairs_mut()
            .append_pair("book_id", item_id)
            .append_pair("doc_type", "pdf");
        url
    }
}
