use crate::errors::AppError;
use crate::models::RawListing;
use futures::stream::BoxStream;

/// A validated search, ready to hand to a [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub location: Option<String>,
    /// Number of leads the caller will keep. A hint for page sizing only.
    pub limit: usize,
}

impl SearchQuery {
    /// Text sent to the provider: `"<query> in <location>"` or the bare query.
    pub fn text_query(&self) -> String {
        match &self.location {
            Some(location) => format!("{} in {}", self.query, location),
            None => self.query.clone(),
        }
    }
}

/// Source of raw place listings for a search.
///
/// The returned stream is lazy: provider requests are issued only as it is
/// polled, and dropping it stops any further fetching.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, query: &'a SearchQuery)
        -> BoxStream<'a, Result<RawListing, AppError>>;
}
