use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::models::{ListQuery, NewProperty, PropertyPatch, ScrapeStatus};
use crate::server::error::ApiError;
use crate::server::AppState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
pub struct ScrapeRequest {
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    title: Option<String>,
    location: Option<String>,
    price: Option<String>,
    image_url: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyRequest {
    title: Option<String>,
    location: Option<String>,
    price: Option<String>,
    image_url: Option<String>,
    status: Option<String>,
}

/// Present and non-blank, or `None`
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn start_scrape(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body?;
    let url = required(body.url).ok_or_else(|| ApiError::BadRequest("URL is required".to_string()))?;

    let outcome = state.orchestrator.run_scrape(&url).await?;
    let message = if outcome.extracted {
        "Scraping completed successfully"
    } else {
        "Property already exists"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "property": outcome.record,
    })))
}

pub async fn scrape_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let property = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "status": property.status,
        "property": property,
    })))
}

pub async fn create_property(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePropertyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body?;

    let (Some(title), Some(location), Some(price), Some(url)) = (
        required(body.title),
        required(body.location),
        required(body.price),
        required(body.url),
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    let property = NewProperty {
        title,
        location,
        price,
        image_url: body.image_url.unwrap_or_default(),
        url,
        status: ScrapeStatus::Pending,
    };
    property.validate(state.orchestrator.rules())?;

    if let Some(existing) = state.store.get_by_url(&property.url).await? {
        return Err(ApiError::Conflict {
            message: "Property with this URL already exists".to_string(),
            property: Some(Box::new(existing)),
        });
    }

    let created = state.store.create(property).await?;
    info!(id = created.id, url = %created.url, "Property created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Property created successfully",
            "property": created,
        })),
    ))
}

pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let options = query.normalize()?;
    let properties = state.store.list(&options).await?;
    let total = state.store.count(options.status).await?;

    Ok(Json(json!({
        "success": true,
        "count": properties.len(),
        "total": total,
        "properties": properties,
    })))
}

pub async fn get_property(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let property = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;

    Ok(Json(json!({ "success": true, "property": property })))
}

pub async fn update_property(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdatePropertyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let Json(body) = body?;

    let patch = PropertyPatch {
        title: body.title,
        location: body.location,
        price: body.price,
        image_url: body.image_url,
        status: body.status.map(|s| s.parse::<ScrapeStatus>()).transpose()?,
    };
    patch.validate(state.orchestrator.rules())?;

    let property = state.store.update(id, patch).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Property updated successfully",
        "property": property,
    })))
}

pub async fn delete_property(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    state.store.delete(id).await?;
    info!(id, "Property deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Property deleted successfully",
    })))
}

pub async fn retry_scrape(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let property = state.orchestrator.retry(id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Scraping retry completed successfully",
        "property": property,
    })))
}
