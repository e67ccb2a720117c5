//! HTTP surface
//!
//! - `GET /health` lists the available layouts
//! - `POST /render` renders one slide
//! - `POST /render/carousel` renders `{"slides": [...]}` in order
//!
//! Request validation happens here, before the renderer is called. Renderer
//! failures come back as 500 with the error message; no partial results.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as Base64Engine;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

use crate::session::Backend;
use crate::{render_carousel, Error, RenderedImage, SlideData, SlideRenderer};

/// Shared handler state
pub struct AppState<B: Backend> {
    pub renderer: Arc<SlideRenderer<B>>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}

pub fn router<B: Backend>(renderer: Arc<SlideRenderer<B>>) -> Router {
    Router::new()
        .route("/health", get(health::<B>))
        .route("/render", post(render_slide::<B>))
        .route("/render/carousel", post(render_slides::<B>))
        .with_state(AppState { renderer })
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<B, F>(renderer: Arc<SlideRenderer<B>>, addr: std::net::SocketAddr, shutdown: F) -> std::io::Result<()>
where
    B: Backend,
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(renderer))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Error response body: `{"success": false, "error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn rejected(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }

    fn internal(err: Error) -> Self {
        error!("Request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    templates: Vec<String>,
}

#[derive(Serialize)]
struct SlideBody {
    success: bool,
    image: String,
    format: &'static str,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct CarouselEntry {
    position: usize,
    image: String,
    format: &'static str,
}

#[derive(Serialize)]
struct CarouselBody {
    success: bool,
    slides: Vec<CarouselEntry>,
}

fn encode(image: &RenderedImage) -> String {
    base64::engine::general_purpose::STANDARD.encode(&image.data)
}

async fn health<B: Backend>(State(state): State<AppState<B>>) -> Result<Json<HealthBody>, ApiError> {
    let templates = state
        .renderer
        .templates()
        .list_available_styles()
        .map_err(ApiError::internal)?;
    Ok(Json(HealthBody { status: "ok", templates }))
}

async fn render_slide<B: Backend>(
    State(state): State<AppState<B>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SlideBody>, ApiError> {
    let Json(body) = body.map_err(ApiError::rejected)?;
    let slide = match body {
        Value::Object(map) => SlideData::from(map),
        _ => return Err(ApiError::bad_request("request body must be a JSON object")),
    };
    if slide.layout_style().is_none() {
        return Err(ApiError::bad_request(Error::MissingLayoutStyle.to_string()));
    }

    let image = state.renderer.render_slide(&slide).await.map_err(ApiError::internal)?;
    Ok(Json(SlideBody {
        success: true,
        image: encode(&image),
        format: image.format.as_str(),
        width: image.width,
        height: image.height,
    }))
}

async fn render_slides<B: Backend>(
    State(state): State<AppState<B>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CarouselBody>, ApiError> {
    let Json(body) = body.map_err(ApiError::rejected)?;
    let slides = match body.get("slides") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ApiError::bad_request(Error::EmptyCarousel.to_string())),
    };
    let slides = slides
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(SlideData::from(map.clone())),
            _ => Err(ApiError::bad_request("each slide must be a JSON object")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rendered = render_carousel(&state.renderer, &slides)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(CarouselBody {
        success: true,
        slides: rendered
            .iter()
            .map(|s| CarouselEntry {
                position: s.position,
                image: encode(&s.image),
                format: s.image.format.as_str(),
            })
            .collect(),
    }))
}
