use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::fetcher::{Fetcher, SearchQuery};
use crate::models::{RawListing, SearchTextResponse};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde_json::json;

/// Largest `pageSize` the Places API accepts for text search.
pub const MAX_PAGE_SIZE: usize = 20;

/// Fields requested from `places:searchText`. Billing depends on this mask.
pub const FIELD_MASK: &str = "places.displayName,places.formattedAddress,\
places.internationalPhoneNumber,places.nationalPhoneNumber,places.websiteUri,\
places.rating,places.userRatingCount,places.types,places.location,nextPageToken";

/// Client for the Google Places API (New) text search.
#[derive(Clone)]
pub struct PlacesService {
    client: Client,
    base_url: String,
    api_key: String,
    language_code: String,
    region_code: Option<String>,
    max_pages: usize,
}

impl PlacesService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.places_base_url.trim_end_matches('/').to_string(),
            api_key: config.google_maps_api_key.clone(),
            language_code: config.places_language_code.clone(),
            region_code: config.places_region_code.clone(),
            max_pages: config.places_max_pages.max(1),
        })
    }

    /// Fetches one page of text-search results.
    ///
    /// `page_size` must stay the same for every page of one search; the
    /// provider rejects page tokens issued for a different request.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<SearchTextResponse, AppError> {
        let url = format!("{}/places:searchText", self.base_url);
        let text_query = query.text_query();

        let mut body = json!({
            "textQuery": text_query,
            "pageSize": page_size,
            "languageCode": self.language_code,
        });
        if query.location.is_some() {
            if let Some(region) = &self.region_code {
                body["regionCode"] = json!(region);
            }
        }
        if let Some(token) = page_token {
            body["pageToken"] = json!(token);
        }

        tracing::info!("Searching Places for: {}", text_query);
        // Redact the key from logs
        tracing::debug!("Places URL: {} (X-Goog-Api-Key: [REDACTED])", url);

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AppError::RateLimited(format!(
                    "Places API returned {}: {}",
                    status, error_text
                )));
            }

            tracing::error!("Places API returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Places API returned status {}: {}",
                status, error_text
            )));
        }

        let page: SearchTextResponse = response.json().await?;

        tracing::debug!(
            "Places page returned {} listings (more: {})",
            page.places.len(),
            page.next_page_token.is_some()
        );
        Ok(page)
    }
}

/// Pagination state between two page requests.
struct Cursor {
    page: usize,
    token: Option<String>,
    exhausted: bool,
}

impl Fetcher for PlacesService {
    /// Streams listings page by page. The next page is requested only when the
    /// consumer polls past the current one, up to `max_pages` pages.
    fn fetch<'a>(
        &'a self,
        query: &'a SearchQuery,
    ) -> BoxStream<'a, Result<RawListing, AppError>> {
        let page_size = query.limit.clamp(1, MAX_PAGE_SIZE);
        let start = Cursor {
            page: 0,
            token: None,
            exhausted: false,
        };

        stream::try_unfold(start, move |cursor| async move {
            if cursor.exhausted || cursor.page >= self.max_pages {
                return Ok::<_, AppError>(None);
            }

            let page = self
                .search_page(query, page_size, cursor.token.as_deref())
                .await
                .with_context(|| {
                    format!("page {} of '{}'", cursor.page + 1, query.text_query())
                })?;

            let token = page.next_page_token.filter(|t| !t.is_empty());
            let next = Cursor {
                page: cursor.page + 1,
                exhausted: token.is_none(),
                token,
            };
            Ok::<_, AppError>(Some((page.places, next)))
        })
        .map_ok(|places| stream::iter(places.into_iter().map(Ok::<RawListing, AppError>)))
        .try_flatten()
        .boxed()
    }
}
