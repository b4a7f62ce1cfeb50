#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use geoportal::api::{ApiError, LoginRequest, LoginResponse, PortalBackend, RankingEntry};
use geoportal::config::{AppConfig, DataConfig};
use geoportal::data::load_store;
use geoportal::intake::ContributionPayload;
use geoportal::server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ADMIN_COOKIE: &str = "authToken=admin-token; userRole=admin";
pub const USER_COOKIE: &str = "authToken=user-token; userRole=user";

/// In-memory stand-in for the contributions API.
pub struct FakeBackend {
    pub contributions: Value,
    pub ranking: Result<Vec<RankingEntry>, ApiError>,
    pub login: Result<LoginResponse, ApiError>,
    pub submit_error: Option<ApiError>,
    pub submitted: Mutex<Vec<(ContributionPayload, String)>>,
    pub logouts: Mutex<Vec<String>>,
    pub logout_error: Option<ApiError>,
    pub fetches: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            contributions: json!({ "contributions": [] }),
            ranking: Ok(Vec::new()),
            login: Ok(LoginResponse::default()),
            submit_error: None,
            submitted: Mutex::new(Vec::new()),
            logouts: Mutex::new(Vec::new()),
            logout_error: None,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl FakeBackend {
    pub fn with_contributions(count: usize) -> Self {
        let records: Vec<Value> = (1..=count)
            .map(|id| {
                json!({
                    "id": id,
                    "organization": format!("Municipal Office {id}"),
                    "request_type": "submit_dataset",
                    "message": "Updated shapefile attached",
                    "status": "pending",
                    "user": { "name": format!("Contributor {id}") },
                    "created_at": "2025-10-01T09:00:00Z",
                    "files": format!("[\"contributions/{id}/layer.zip\"]")
                })
            })
            .collect();
        Self {
            contributions: json!({ "contributions": records }),
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalBackend for FakeBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.login.clone()
    }

    async fn fetch_contributions(&self, _token: Option<&str>) -> Result<Value, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.contributions.clone())
    }

    async fn submit_contribution(
        &self,
        payload: &ContributionPayload,
        token: &str,
    ) -> Result<Value, ApiError> {
        self.submitted
            .lock()
            .unwrap()
            .push((payload.clone(), token.to_string()));
        match &self.submit_error {
            Some(e) => Err(e.clone()),
            None => Ok(json!({ "message": "Contribution created" })),
        }
    }

    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, ApiError> {
        self.ranking.clone()
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.logouts.lock().unwrap().push(token.to_string());
        match &self.logout_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

pub fn router(backend: Arc<FakeBackend>) -> Router {
    let config = AppConfig {
        data: DataConfig {
            layer_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("data/layers"),
            points: None,
        },
        ..AppConfig::default()
    };
    let store = load_store(&config.data).unwrap();
    build_router(Arc::new(AppState::new(config, store, backend)))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A file part for [`multipart_request`].
pub struct FilePart<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    pub bytes: Vec<u8>,
}

pub fn multipart_request(
    cookie: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    multipart_request_with_files(cookie, fields, file.into_iter().collect())
}

pub fn multipart_request_with_files(
    cookie: Option<&str>,
    fields: &[(&str, &str)],
    files: Vec<FilePart<'_>>,
) -> Request<Body> {
    const BOUNDARY: &str = "portal-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.name, file.mime_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post("/contribute").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}
