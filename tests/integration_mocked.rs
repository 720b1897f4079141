/// Integration tests with a mocked Places API
/// Tests pagination, error mapping and the full scrape workflow without hitting Google
use futures::StreamExt;
use lead_scraper_api::config::Config;
use lead_scraper_api::errors::AppError;
use lead_scraper_api::fetcher::{Fetcher, SearchQuery};
use lead_scraper_api::orchestrator::Orchestrator;
use lead_scraper_api::services::{PlacesService, FIELD_MASK};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(places_base_url: String) -> Config {
    Config {
        google_maps_api_key: "test_key".to_string(),
        places_base_url,
        ..Config::default()
    }
}

fn query(text: &str, location: Option<&str>, limit: usize) -> SearchQuery {
    SearchQuery {
        query: text.to_string(),
        location: location.map(str::to_string),
        limit,
    }
}

fn place(name: &str, address: &str) -> serde_json::Value {
    json!({
        "displayName": {"text": name, "languageCode": "en"},
        "formattedAddress": address,
        "internationalPhoneNumber": "+1 512-555-0100",
        "rating": 4.2,
        "userRatingCount": 87,
        "types": ["cafe", "food"]
    })
}

#[tokio::test]
async fn test_search_page_sends_key_mask_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .and(header("X-Goog-Api-Key", "test_key"))
        // The header matcher splits values on commas
        .and(headers(
            "X-Goog-FieldMask",
            FIELD_MASK.split(',').collect::<Vec<_>>(),
        ))
        .and(body_partial_json(json!({
            "textQuery": "coffee in Austin, TX",
            "pageSize": 5,
            "languageCode": "en",
            "regionCode": "US"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "places": [place("Radio Coffee", "4204 Manchaca Rd, Austin, TX")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = PlacesService::new(&create_test_config(mock_server.uri())).unwrap();
    let page = service
        .search_page(&query("coffee", Some("Austin, TX"), 5), 5, None)
        .await
        .unwrap();

    assert_eq!(page.places.len(), 1);
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_fetch_follows_page_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .and(body_partial_json(json!({"pageToken": "page-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "places": [place("C", "3 St")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "places": [place("A", "1 St"), place("B", "2 St")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = PlacesService::new(&create_test_config(mock_server.uri())).unwrap();
    let search = query("coffee", None, 50);
    let listings: Vec<_> = service.fetch(&search).collect().await;

    assert_eq!(listings.len(), 3);
    assert!(listings.iter().all(|l| l.is_ok()));
}

#[tokio::test]
async fn test_scrape_stops_requesting_pages_once_bounded() {
    let mock_server = MockServer::start().await;

    // Only the first page may be requested: it already fills the bound
    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "places": [place("A", "1 St"), place("B", "2 St")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = PlacesService::new(&config).unwrap();
    let orchestrator = Orchestrator::from_config(Arc::new(service), &config);

    let request = serde_json::from_value(json!({"query": "coffee", "maxResults": "2"})).unwrap();
    let result = orchestrator.scrape("session", request).await.unwrap();

    assert_eq!(result.leads.len(), 2);
    assert_eq!(result.stats.with_phone, 2);
    assert_eq!(result.leads[0].category.as_deref(), Some("cafe, food"));
}

#[tokio::test]
async fn test_rate_limit_is_reported_as_such() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = PlacesService::new(&config).unwrap();
    let orchestrator = Orchestrator::from_config(Arc::new(service), &config);

    let request = serde_json::from_value(json!({"query": "coffee"})).unwrap();
    let err = orchestrator.scrape("session", request).await.unwrap_err();

    assert!(matches!(err.root(), AppError::RateLimited(_)));
    assert!(orchestrator.last_result("session").await.is_none());
}

#[tokio::test]
async fn test_provider_error_fails_the_scrape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let service = PlacesService::new(&create_test_config(mock_server.uri())).unwrap();
    let search = query("coffee", None, 10);
    let first = service.fetch(&search).next().await.unwrap();

    match first {
        Err(err) => assert!(matches!(err.root(), AppError::ExternalApiError(_))),
        Ok(_) => panic!("expected provider failure"),
    }
}

#[tokio::test]
async fn test_empty_response_yields_no_leads() {
    let mock_server = MockServer::start().await;

    // Places returns an empty object when nothing matches
    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let service = PlacesService::new(&config).unwrap();
    let orchestrator = Orchestrator::from_config(Arc::new(service), &config);

    let request = serde_json::from_value(json!({"query": "nothing here"})).unwrap();
    let result = orchestrator.scrape("session", request).await.unwrap();

    assert!(result.leads.is_empty());
    assert_eq!(result.stats.total, 0);
}

#[tokio::test]
async fn test_fetch_stops_at_max_pages_with_constant_page_size() {
    let mock_server = MockServer::start().await;

    // Every page promises another one
    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "places": [place("A", "1 St")],
            "nextPageToken": "more"
        })))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    assert_eq!(config.places_max_pages, 3);
    let service = PlacesService::new(&config).unwrap();
    let search = query("coffee", None, 100);
    let listings: Vec<_> = service.fetch(&search).collect().await;
    assert_eq!(listings.len(), 3);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let bodies: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert!(bodies.iter().all(|b| b["pageSize"] == 20));
    assert!(bodies[0].get("pageToken").is_none());
    assert!(bodies[1..].iter().all(|b| b["pageToken"] == "more"));
}

#[tokio::test]
async fn test_undecodable_response_is_a_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/places:searchText"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let service = PlacesService::new(&create_test_config(mock_server.uri())).unwrap();
    let err = service
        .search_page(&query("coffee", None, 5), 5, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExternalApiError(_)));
}
