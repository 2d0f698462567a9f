//! HTTP request surface over the store and the scrape orchestrator.

pub mod error;
pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::orchestrator::ScrapeOrchestrator;
use crate::store::PropertyStore;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn PropertyStore>,
    pub orchestrator: ScrapeOrchestrator,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scrape", post(routes::start_scrape))
        .route(
            "/properties",
            get(routes::list_properties).post(routes::create_property),
        )
        .route(
            "/properties/:id",
            get(routes::get_property)
                .put(routes::update_property)
                .delete(routes::delete_property),
        )
        .route("/properties/:id/status", get(routes::scrape_status))
        .route("/properties/:id/retry", post(routes::retry_scrape));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    info!("Server is running on port {}", port);
    axum::serve(listener, router(state))
        .await
        .context("HTTP server stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{anchor_missing, flat, test_rules, ScriptedExtractor, LISTING_URL};
    use crate::scrapers::{ExtractedFields, ExtractionError};
    use crate::store::SqliteStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(outcomes: Vec<Result<ExtractedFields, ExtractionError>>) -> Router {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let extractor = Arc::new(ScriptedExtractor::new(store.clone(), outcomes));
        router(AppState {
            store: store.clone(),
            orchestrator: ScrapeOrchestrator::new(store, extractor, test_rules()),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn manual_listing(url: &str) -> Value {
        json!({
            "title": "2 BHK Flat",
            "location": "Downtown",
            "price": "₹ 50 L",
            "url": url,
        })
    }

    #[tokio::test]
    async fn scrape_then_poll_status() {
        let app = app(vec![Ok(flat())]).await;

        let (status, body) = call(&app, "POST", "/api/scrape", Some(json!({ "url": LISTING_URL }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Scraping completed successfully");
        assert_eq!(body["property"]["status"], "COMPLETED");
        assert_eq!(body["property"]["imageUrl"], "https://img/x.jpg");

        let id = body["property"]["id"].as_i64().unwrap();
        let (status, body) = call(&app, "GET", &format!("/api/properties/{}/status", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["property"]["title"], "2 BHK Flat");
    }

    #[tokio::test]
    async fn scraping_a_completed_url_again_says_it_already_exists() {
        let app = app(vec![Ok(flat())]).await;
        let (_, first) = call(&app, "POST", "/api/scrape", Some(json!({ "url": LISTING_URL }))).await;

        let (status, body) = call(&app, "POST", "/api/scrape", Some(json!({ "url": LISTING_URL }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Property already exists");
        assert_eq!(body["property"], first["property"]);
    }

    #[tokio::test]
    async fn failed_scrape_reports_record_and_allows_retry() {
        let app = app(vec![Err(anchor_missing()), Ok(flat())]).await;

        let (status, body) = call(&app, "POST", "/api/scrape", Some(json!({ "url": LISTING_URL }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["property"]["status"], "FAILED");
        assert!(body["error"].as_str().unwrap().contains("retry"));

        let id = body["property"]["id"].as_i64().unwrap();
        let (status, body) = call(&app, "POST", &format!("/api/properties/{}/retry", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["property"]["status"], "COMPLETED");

        let (status, body) = call(&app, "POST", &format!("/api/properties/{}/retry", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn scrape_input_is_validated_before_anything_runs() {
        let app = app(vec![]).await;

        let (status, body) = call(&app, "POST", "/api/scrape", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "URL is required");

        let (status, _) = call(&app, "POST", "/api/scrape", Some(json!({ "url": "https://elsewhere.test/" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, "GET", "/api/properties", None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn create_rejects_duplicates_with_existing_record() {
        let app = app(vec![]).await;

        let (status, created) = call(&app, "POST", "/api/properties", Some(manual_listing(LISTING_URL))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["property"]["status"], "PENDING");
        assert_eq!(created["property"]["imageUrl"], "");

        let mut again = manual_listing(LISTING_URL);
        again["title"] = json!("Something else");
        let (status, body) = call(&app, "POST", "/api/properties", Some(again)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["property"], created["property"]);

        let (_, list) = call(&app, "GET", "/api/properties", None).await;
        assert_eq!(list["count"], 1);
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let app = app(vec![]).await;

        let mut missing = manual_listing(LISTING_URL);
        missing["title"] = json!("");
        let (status, body) = call(&app, "POST", "/api/properties", Some(missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");

        let mut bad_price = manual_listing(LISTING_URL);
        bad_price["price"] = json!("50 L");
        let (status, body) = call(&app, "POST", "/api/properties", Some(bad_price)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Price must start with ₹"));

        let (status, _) = call(&app, "POST", "/api/properties", Some(manual_listing("https://elsewhere.test/p/1"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_price_only_keeps_other_fields() {
        let app = app(vec![]).await;
        let (_, created) = call(&app, "POST", "/api/properties", Some(manual_listing(LISTING_URL))).await;
        let id = created["property"]["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/properties/{}", id),
            Some(json!({ "price": "₹ 45 L" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let updated = &body["property"];
        assert_eq!(updated["price"], "₹ 45 L");
        for field in ["title", "location", "imageUrl", "status", "url"] {
            assert_eq!(updated[field], created["property"][field], "{field} changed");
        }

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/api/properties/{}", id),
            Some(json!({ "status": "DONE" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_tolerates_bad_sort_and_paging() {
        let app = app(vec![]).await;
        for n in 1..=3 {
            call(
                &app,
                "POST",
                "/api/properties",
                Some(manual_listing(&format!("{}/{}", LISTING_URL, n))),
            )
            .await;
        }

        let (status, body) = call(&app, "GET", "/api/properties?sortBy=nonsense&limit=-1&offset=xyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["total"], 3);

        let (status, body) = call(&app, "GET", "/api/properties?limit=2&offset=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (status, _) = call(&app, "GET", "/api/properties?status=DONE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let app = app(vec![]).await;

        for (method, uri) in [
            ("GET", "/api/properties/7"),
            ("GET", "/api/properties/7/status"),
            ("DELETE", "/api/properties/7"),
            ("POST", "/api/properties/7/retry"),
        ] {
            let (status, body) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body["error"], "Property not found");
        }

        let (status, _) = call(&app, "GET", "/api/properties/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let app = app(vec![]).await;
        let (_, created) = call(&app, "POST", "/api/properties", Some(manual_listing(LISTING_URL))).await;
        let id = created["property"]["id"].as_i64().unwrap();

        let (status, body) = call(&app, "DELETE", &format!("/api/properties/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Property deleted successfully");

        let (status, _) = call(&app, "GET", &format!("/api/properties/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
