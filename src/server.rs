use crate::api::{ApiError, LoginRequest, PortalBackend, RankingEntry};
use crate::config::AppConfig;
use crate::dashboard::{
    Dashboard, DashboardError, PageWindow, Pagination, ReviewCatalog, REVIEW_CATALOG,
};
use crate::data::{Extent, FeatureStore};
use crate::intake::{
    Attachment, ContributionForm, FormFields, FormPhase, IntakeError, RequestType,
    ALLOWED_MIME_TYPES, REQUEST_TYPES, SUCCESS_MESSAGE,
};
use crate::layers::{GisDataset, LayerDescriptor, LayerId, LayerRegistry, UnknownLayer};
use crate::render::{render, MapContext, RenderPlan};
use crate::session::{role_gate, Role, Session, SessionUpdate};
use crate::style::{StyleBook, StyleError};
use crate::submission::{format_size, Submission, SubmissionAdapter};
use crate::visibility::{VisibilityPatch, VisibilityState};
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub struct AppState {
    pub config: AppConfig,
    pub store: FeatureStore,
    pub registry: LayerRegistry,
    pub styles: StyleBook,
    pub backend: Arc<dyn PortalBackend>,
    pub adapter: SubmissionAdapter,
    /// Filled from the backend on first dashboard access.
    pub dashboard: RwLock<Option<Dashboard>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: FeatureStore, backend: Arc<dyn PortalBackend>) -> Self {
        Self {
            adapter: SubmissionAdapter::new(config.api.files_base_url.clone()),
            registry: LayerRegistry::builtin(),
            styles: StyleBook::builtin(),
            dashboard: RwLock::new(None),
            config,
            store,
            backend,
        }
    }

    fn map_context(&self) -> MapContext<'_> {
        MapContext {
            store: &self.store,
            registry: &self.registry,
            styles: &self.styles,
            map: &self.config.map,
        }
    }

    fn new_dashboard(&self) -> Dashboard {
        Dashboard::new(Pagination::new(self.config.dashboard.page_size))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    /// Intake failure that echoes the submitted fields back.
    #[error("{error}")]
    Form { error: IntakeError, fields: FormFields },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    UnknownLayer(#[from] UnknownLayer),
    #[error("layer {0} has no data")]
    LayerNotLoaded(LayerId),
    #[error("Enter both email and password to continue.")]
    MissingCredentials,
    #[error("{0}")]
    BadRequest(String),
}

/// Backend 4xx answers pass through; anything else from upstream is a bad gateway.
fn upstream_status(status: Option<u16>) -> StatusCode {
    status
        .filter(|s| (400..500).contains(s))
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

fn intake_status(error: &IntakeError) -> StatusCode {
    match error {
        IntakeError::SignInRequired => StatusCode::UNAUTHORIZED,
        IntakeError::InFlight => StatusCode::CONFLICT,
        IntakeError::Rejected { status, .. } => upstream_status(*status),
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl PortalError {
    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::Intake(e) | PortalError::Form { error: e, .. } => intake_status(e),
            PortalError::Api(e) => upstream_status(e.status()),
            PortalError::Dashboard(DashboardError::OutsideCatalog { .. }) => StatusCode::BAD_REQUEST,
            PortalError::Dashboard(_) | PortalError::UnknownLayer(_) | PortalError::LayerNotLoaded(_) => {
                StatusCode::NOT_FOUND
            }
            PortalError::Style(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PortalError::MissingCredentials => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed with {status}: {self}");
        } else {
            debug!("Request rejected with {status}: {self}");
        }
        let body = match &self {
            PortalError::Form { fields, .. } => json!({ "error": self.to_string(), "fields": fields }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config.upload.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(2);

    let dashboard = Router::new()
        .route("/dashboard", get(dashboard_page))
        .route("/dashboard/refresh", post(refresh_dashboard))
        .route("/dashboard/submissions/:id", put(commit_submission))
        .route_layer(middleware::from_fn(role_gate));

    let mut router = Router::new()
        .route("/", get(catalog))
        .route("/map", get(default_map).post(custom_map))
        .route("/map/layers/:id", get(layer_collection))
        .route("/map/layers/:id/extent", get(layer_extent))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/contribute", get(contribute_form).post(submit_contribution))
        .merge(dashboard)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(dir) = &state.config.server.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>) -> Result<()> {
    let addr = SocketAddr::from((state.config.server.bind, state.config.server.port));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Portal listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// --- catalog ---

#[derive(Deserialize)]
struct CatalogQuery {
    category: Option<String>,
}

#[derive(Serialize)]
struct Catalog<'a> {
    categories: BTreeSet<&'a str>,
    layers: Vec<&'a LayerDescriptor>,
    datasets: &'a [GisDataset],
    ranking: Vec<RankingEntry>,
}

async fn catalog(State(state): State<Arc<AppState>>, Query(query): Query<CatalogQuery>) -> Response {
    let ranking = match state.backend.fetch_ranking().await {
        Ok(ranking) => ranking,
        Err(e) => {
            warn!("Contributor ranking unavailable: {e}");
            Vec::new()
        }
    };
    let layers: Vec<&LayerDescriptor> = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(category) => state.registry.by_category(category).collect(),
        None => state.registry.layers().iter().collect(),
    };
    Json(Catalog {
        categories: state.registry.categories(),
        layers,
        datasets: state.registry.datasets(),
        ranking,
    })
    .into_response()
}

// --- map ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapView {
    visibility: VisibilityState,
    core_facilities_checked: bool,
    plan: RenderPlan,
}

fn map_view(state: &AppState, visibility: VisibilityState) -> Result<Json<MapView>, PortalError> {
    let plan = render(&state.map_context(), &visibility)?;
    Ok(Json(MapView {
        core_facilities_checked: visibility.core_facilities_checked(),
        visibility,
        plan,
    }))
}

async fn default_map(State(state): State<Arc<AppState>>) -> Result<Json<MapView>, PortalError> {
    map_view(&state, VisibilityState::default())
}

async fn custom_map(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<VisibilityPatch>,
) -> Result<Json<MapView>, PortalError> {
    let mut visibility = VisibilityState::default();
    visibility.apply(&patch);
    map_view(&state, visibility)
}

async fn layer_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FeatureCollection>, PortalError> {
    let id: LayerId = id.parse()?;
    state
        .store
        .collection(id)
        .cloned()
        .map(Json)
        .ok_or(PortalError::LayerNotLoaded(id))
}

async fn layer_extent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Extent>, PortalError> {
    let id: LayerId = id.parse()?;
    state
        .store
        .extent(id)
        .map(Json)
        .ok_or(PortalError::LayerNotLoaded(id))
}

// --- session ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginFormView {
    signed_in: bool,
    role: Role,
    fields: [&'static str; 3],
}

async fn login_form(session: Session) -> Json<LoginFormView> {
    Json(LoginFormView {
        signed_in: session.is_signed_in(),
        role: session.role,
        fields: ["email", "password", "remember"],
    })
}

#[derive(Deserialize)]
struct LoginInput {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    remember: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResult {
    pub message: String,
    pub role: Role,
    pub redirect: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginInput>,
) -> Result<(Option<SessionUpdate>, Json<LoginResult>), PortalError> {
    let email = input.email.trim();
    let password = input.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(PortalError::MissingCredentials);
    }

    let response = state
        .backend
        .login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember: input.remember,
        })
        .await?;

    let role = response.role();
    let update = match response.bearer_token() {
        Some(token) => Some(SessionUpdate::establish(token, role, input.remember)),
        None => {
            warn!("Login for {email} succeeded without a token");
            None
        }
    };
    info!("Signed in {email} as {}", role.as_str());

    Ok((
        update,
        Json(LoginResult {
            message: "Login successful. Redirecting...".to_string(),
            role,
            redirect: role.landing_path().to_string(),
        }),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> (SessionUpdate, Json<serde_json::Value>) {
    if let Some(token) = &session.token {
        if let Err(e) = state.backend.logout(token).await {
            warn!("Backend logout failed: {e}");
        }
    }
    (SessionUpdate::clear(), Json(json!({ "redirect": "/" })))
}

// --- contribute ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContributeFormView {
    enabled: bool,
    phase: FormPhase,
    request_types: Vec<RequestType>,
    allowed_mime_types: &'static [&'static str],
    max_bytes: u64,
    max_size: String,
}

async fn contribute_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Json<ContributeFormView> {
    let form = ContributionForm::with_limit(session.token, state.config.upload.max_bytes);
    Json(ContributeFormView {
        enabled: form.phase() != FormPhase::Unauthenticated,
        phase: form.phase(),
        request_types: REQUEST_TYPES.to_vec(),
        allowed_mime_types: ALLOWED_MIME_TYPES,
        max_bytes: state.config.upload.max_bytes,
        max_size: format_size(state.config.upload.max_bytes),
    })
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> PortalError {
    PortalError::BadRequest(format!("Malformed form data: {e}"))
}

async fn submit_contribution(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, PortalError> {
    let mut form = ContributionForm::with_limit(session.token, state.config.upload.max_bytes);
    if form.phase() == FormPhase::Unauthenticated {
        return Err(IntakeError::SignInRequired.into());
    }

    let mut fields = FormFields::default();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if !file_name.is_empty() || !bytes.is_empty() {
                    files.push(Attachment::new(file_name, mime_type, bytes.to_vec()));
                }
            }
            "organization" => fields.organization = field.text().await.map_err(bad_multipart)?,
            "request_type" => fields.request_type = field.text().await.map_err(bad_multipart)?,
            "message" => fields.message = field.text().await.map_err(bad_multipart)?,
            "name" => fields.name = field.text().await.map_err(bad_multipart)?,
            "email" => fields.email = field.text().await.map_err(bad_multipart)?,
            other => debug!("Ignoring form field {other:?}"),
        }
    }

    form.edit(|f| *f = fields)?;
    if files.len() > 1 {
        return Err(PortalError::Form {
            error: IntakeError::MultipleFiles,
            fields: form.fields().clone(),
        });
    }
    if let Some(file) = files.pop() {
        if let Err(error) = form.attach(file) {
            return Err(PortalError::Form {
                error,
                fields: form.fields().clone(),
            });
        }
    }

    match form.submit(state.backend.as_ref()).await {
        Ok(()) => Ok(Json(json!({ "message": SUCCESS_MESSAGE }))),
        Err(error) => Err(PortalError::Form {
            error,
            fields: form.fields().clone(),
        }),
    }
}

// --- dashboard ---

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

#[derive(Serialize)]
struct DashboardView {
    #[serde(flatten)]
    window: PageWindow<Submission>,
    showing: String,
    catalog: ReviewCatalog,
}

impl From<PageWindow<Submission>> for DashboardView {
    fn from(window: PageWindow<Submission>) -> Self {
        Self {
            showing: window.summary(),
            window,
            catalog: REVIEW_CATALOG,
        }
    }
}

async fn fetch_submissions(state: &AppState, token: Option<&str>) -> Result<Vec<Submission>, ApiError> {
    let payload = state.backend.fetch_contributions(token).await?;
    let submissions = state.adapter.adapt_list(payload);
    info!("Fetched {} submissions for review", submissions.len());
    Ok(submissions)
}

async fn ensure_loaded(state: &AppState, token: Option<&str>) -> Result<(), ApiError> {
    if state.dashboard.read().await.is_some() {
        return Ok(());
    }
    let submissions = fetch_submissions(state, token).await?;
    let mut slot = state.dashboard.write().await;
    if slot.is_none() {
        let mut dashboard = state.new_dashboard();
        dashboard.replace_all(submissions);
        *slot = Some(dashboard);
    }
    Ok(())
}

async fn dashboard_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Result<Json<DashboardView>, PortalError> {
    ensure_loaded(&state, session.token.as_deref()).await?;
    let mut slot = state.dashboard.write().await;
    let dashboard = slot.get_or_insert_with(|| state.new_dashboard());
    if let Some(page) = query.page {
        dashboard.goto(page);
    }
    Ok(Json(dashboard.current_window().into()))
}

async fn refresh_dashboard(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<DashboardView>, PortalError> {
    let submissions = fetch_submissions(&state, session.token.as_deref()).await?;
    let mut slot = state.dashboard.write().await;
    let dashboard = slot.get_or_insert_with(|| state.new_dashboard());
    dashboard.replace_all(submissions);
    Ok(Json(dashboard.current_window().into()))
}

async fn commit_submission(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    Json(record): Json<Submission>,
) -> Result<Json<Submission>, PortalError> {
    if record.id != id {
        return Err(PortalError::BadRequest(format!(
            "Submission id {:?} does not match the path id {:?}",
            record.id, id
        )));
    }
    ensure_loaded(&state, session.token.as_deref()).await?;

    let mut slot = state.dashboard.write().await;
    let dashboard = slot.get_or_insert_with(|| state.new_dashboard());
    let mut draft = dashboard.open(&id)?;
    draft.replace(record);
    let committed = dashboard.commit(draft)?.clone();
    info!("Saved submission {} as {}", committed.id, committed.status);
    Ok(Json(committed))
}
