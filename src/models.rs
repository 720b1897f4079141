use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============ Lead Models ============

/// One business entry pulled from the map-search provider.
///
/// `name` is never blank for leads produced by [`Lead::from_raw`]; the
/// collector's identity key depends on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    /// Business name.
    pub name: String,
    /// Formatted postal address.
    pub address: Option<String>,
    /// Phone number, international format when the provider has one.
    pub phone: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Average rating in `[0, 5]`.
    pub rating: Option<f64>,
    /// Number of ratings. Only set when `rating` is.
    pub reviews_count: Option<u32>,
    /// Comma-separated provider place types.
    pub category: Option<String>,
    /// Latitude of the place.
    pub latitude: Option<f64>,
    /// Longitude of the place.
    pub longitude: Option<f64>,
}

impl Lead {
    /// Normalizes a raw provider listing into a lead.
    ///
    /// Returns `None` when the listing has no usable name. Blank optional text
    /// becomes `None`, an out-of-range rating is dropped together with its
    /// review count.
    pub fn from_raw(raw: RawListing) -> Option<Lead> {
        let name = raw
            .display_name
            .and_then(DisplayName::into_text)
            .and_then(non_blank)?;

        let rating = raw
            .rating
            .filter(|r| r.is_finite() && (0.0..=5.0).contains(r));
        let reviews_count = rating
            .and(raw.user_rating_count)
            .and_then(|count| u32::try_from(count).ok());

        let category = raw
            .types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let (latitude, longitude) = match raw.location {
            Some(LatLng {
                latitude: Some(lat),
                longitude: Some(lng),
            }) => (Some(lat), Some(lng)),
            _ => (None, None),
        };

        Some(Lead {
            name,
            address: raw.formatted_address.and_then(non_blank),
            phone: raw
                .international_phone_number
                .and_then(non_blank)
                .or_else(|| raw.national_phone_number.and_then(non_blank)),
            website: raw.website_uri.and_then(non_blank),
            rating,
            reviews_count,
            category: non_blank(category),
            latitude,
            longitude,
        })
    }

    /// Dedup key: name and address, lowercased with whitespace runs collapsed.
    pub fn identity_key(&self) -> (String, String) {
        (
            normalize_key_part(&self.name),
            normalize_key_part(self.address.as_deref().unwrap_or("")),
        )
    }

    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn has_website(&self) -> bool {
        self.website.as_deref().is_some_and(|w| !w.trim().is_empty())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_key_part(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary counts over a finished result collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeadStats {
    pub total: usize,
    pub with_phone: usize,
    pub with_website: usize,
}

/// Outcome of one successful scrape. Frozen once built.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub query: String,
    pub location: Option<String>,
    pub leads: Vec<Lead>,
    pub stats: LeadStats,
    pub completed_at: DateTime<Utc>,
}

// ============ Places API Models ============

/// One `place` object from the Places API (New) `places:searchText` response.
///
/// Only the fields requested through the field mask are modelled; anything
/// else in the payload is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub display_name: Option<DisplayName>,
    pub formatted_address: Option<String>,
    pub international_phone_number: Option<String>,
    pub national_phone_number: Option<String>,
    pub website_uri: Option<String>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<i64>,
    #[serde(default)]
    pub types: Vec<String>,
    pub location: Option<LatLng>,
}

/// `displayName` is a localized text object, older payloads send a bare string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayName {
    Localized {
        #[serde(default)]
        text: String,
        #[serde(default, rename = "languageCode")]
        language_code: Option<String>,
    },
    Plain(String),
}

impl DisplayName {
    pub fn into_text(self) -> Option<String> {
        match self {
            DisplayName::Localized { text, .. } => Some(text),
            DisplayName::Plain(text) => Some(text),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Response body of `places:searchText`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTextResponse {
    #[serde(default)]
    pub places: Vec<RawListing>,
    pub next_page_token: Option<String>,
}

// ============ API Request/Response Models ============

/// Body of `POST /api/v1/scrape`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScrapeRequest {
    /// Free-text place or business query.
    #[serde(default)]
    #[schema(example = "coffee shops")]
    pub query: String,
    /// Optional location appended to the query.
    #[serde(default)]
    #[schema(example = "Austin, TX")]
    pub location: Option<String>,
    /// Result limit, as a number or numeric string.
    #[serde(default, rename = "maxResults")]
    #[schema(value_type = Option<String>, example = "20")]
    pub max_results: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScrapeResponse {
    pub success: bool,
    pub leads: Vec<Lead>,
    pub stats: LeadStats,
}

impl From<&ScrapeResult> for ScrapeResponse {
    fn from(result: &ScrapeResult) -> Self {
        Self {
            success: true,
            leads: result.leads.clone(),
            stats: result.stats,
        }
    }
}

/// Body of `POST /api/v1/export`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExportRequest {
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
