//! Request and URL templating module for Catalog-Sweep
//!
//! A [`ParseRequest`] names what is being harvested: either a free-text search
//! or the identifier of a catalog whose volumes are browsed page by page.
//! [`UrlBuilder`] turns a request plus a page number into the listing URL.

mod builder;

pub use builder::UrlBuilder;

use std::fmt;

/// How a query is interpreted by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Free-text search results
    Search,
    /// Volume listing of one catalog entry
    Catalog,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Catalog => write!(f, "catalog"),
        }
    }
}

/// An immutable harvesting request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    query: String,
    mode: SearchMode,
}

impl ParseRequest {
    /// Creates a request for the given query and mode
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
        }
    }

    /// Shorthand for a free-text search request
    pub fn search(query: impl Into<String>) -> Self {
        Self::new(query, SearchMode::Search)
    }

    /// Shorthand for a catalog browse request
    pub fn catalog(catalog_id: impl Into<String>) -> Self {
        Self::new(catalog_id, SearchMode::Catalog)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}
