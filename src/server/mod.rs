//! HTTP JSON surface.
//!
//! Exposes indexing and searching over two POST endpoints, both answering
//! with a `{success, data}` envelope. Failures map to HTTP 200 with
//! `success: false` and an opaque message; callers inspect the envelope,
//! not the status code.

use crate::context::{Context, SearchOptions};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{self, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:5555";

#[derive(Debug, Deserialize)]
struct IndexRequest {
    path: PathSpec,
}

/// `"path"` accepts one path or a list of paths
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    pattern: String,
    #[serde(default)]
    ignorecase: bool,
    pathfilter: Option<String>,
}

#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    data: Value,
}

fn reply(success: bool, data: Value) -> Response {
    let mut response = Json(Envelope { success, data }).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn unknown_error() -> Response {
    reply(false, Value::String("unknown error".to_string()))
}

async fn handle_index(
    State(ctx): State<Arc<Context>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            error!("index: bad request: {}", rejection);
            return unknown_error();
        }
    };

    let outcome = tokio::task::spawn_blocking(move || match request.path {
        PathSpec::One(path) => ctx.index(Path::new(&path)),
        PathSpec::Many(paths) => {
            let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
            ctx.index_all(&paths)
                .map(|flags| flags.iter().all(|&ok| ok))
        }
    })
    .await;

    match outcome {
        Ok(Ok(true)) => reply(true, Value::Bool(true)),
        Ok(Ok(false)) => {
            error!("index: indexer reported failure");
            unknown_error()
        }
        Ok(Err(err)) => {
            error!("index failed: {}", err);
            unknown_error()
        }
        Err(err) => {
            error!("index task failed: {}", err);
            unknown_error()
        }
    }
}

async fn handle_search(
    State(ctx): State<Arc<Context>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            error!("search: bad request: {}", rejection);
            return unknown_error();
        }
    };

    let options = SearchOptions {
        ignore_case: request.ignorecase,
        path_filter: request.pathfilter,
        ..SearchOptions::default()
    };

    let outcome =
        tokio::task::spawn_blocking(move || ctx.search(&request.pattern, &options)).await;

    match outcome {
        Ok(Ok(hits)) => match serde_json::to_value(&hits) {
            Ok(data) => reply(true, data),
            Err(err) => {
                error!("search: serialization failed: {}", err);
                unknown_error()
            }
        },
        Ok(Err(err)) => {
            error!("search failed: {}", err);
            unknown_error()
        }
        Err(err) => {
            error!("search task failed: {}", err);
            unknown_error()
        }
    }
}

/// Build the application router
pub fn app(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/index", post(handle_index))
        .route("/search", post(handle_search))
        .with_state(ctx)
}

/// Serve the JSON API until the listener fails
pub async fn serve(ctx: Arc<Context>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app(ctx)).await?;
    Ok(())
}
