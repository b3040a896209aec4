use crate::aggregate::{sanitize, upload, PublishedRegion};
use crate::config::Config;
use crate::cropper::Cropper;
use crate::detection::{DetectorParams, StepTiming};
use crate::error::CropError;
use crate::geometry::{Bound, Rect};
use crate::regions::{parse_region_specs, Coordinate, RegionSpec};
use crate::store::BlobStore;
use crate::stores;
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, Method},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use image::ImageFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Room for the non-file form fields on top of the file size limit
const FORM_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cropper: Arc<Cropper>,
    pub store: Arc<dyn BlobStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let cropper = Cropper::new(&config)?;
        let store = stores::build(&config).context("Failed to initialize blob store")?;

        Ok(Self {
            cropper: Arc::new(cropper),
            store,
            config: Arc::new(config),
        })
    }
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub readable_formats: Vec<String>,
    pub writable_formats: Vec<String>,
    pub max_file_size_bytes: usize,
    pub workers: usize,
    pub detector: DetectorParams,
    pub store: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct CropResponse {
    pub filename: String,
    pub url: String,
    pub name: String,
    pub rect: Rect,
}

#[derive(Serialize)]
pub struct MulticropResponse {
    pub original_filename: String,
    pub num_crops: usize,
    pub crops: Vec<PublishedRegion>,
    pub processing_time_ms: u64,
}

#[derive(Serialize)]
pub struct AutoCropResponse {
    pub original_filename: String,
    pub num_crops: usize,
    pub cropped_images: Vec<PublishedRegion>,
    pub candidates_found: usize,
    pub processing_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Build the router with all layers applied
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    let router = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/images/upload", post(handle_upload))
        .route("/images/crop", post(handle_crop))
        .route("/images/multicrop", post(handle_multicrop))
        .route("/images/auto_crop", post(handle_auto_crop))
        .layer(DefaultBodyLimit::max(
            config.max_file_size.saturating_add(FORM_OVERHEAD),
        ))
        .layer(cors_layer(&config)?)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_allows_any() {
        return Ok(cors.allow_origin(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;
    tracing::info!("Using '{}' blob store", state.store.name());

    let app = app(state)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Parsed multipart form: one file plus plain text fields
struct UploadForm {
    file: Option<Bytes>,
    filename: Option<String>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart, max_file_size: usize) -> Result<Self, CropError> {
        let mut form = UploadForm {
            file: None,
            filename: None,
            fields: HashMap::new(),
        };

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            CropError::InvalidRequest(format!("Failed to parse multipart: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                form.filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    CropError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;
                if data.len() > max_file_size {
                    return Err(CropError::ImageTooLarge {
                        size: data.len(),
                        max: max_file_size,
                    });
                }
                form.file = Some(data);
            } else {
                let value = field.text().await.map_err(|e| {
                    CropError::InvalidRequest(format!("Invalid field '{}': {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// File bytes and the client's filename ("upload" when not given)
    fn take_file(&mut self) -> Result<(Bytes, String), CropError> {
        let data = self.file.take().ok_or(CropError::MissingFile)?;
        let filename = self
            .filename
            .take()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "upload".to_string());
        Ok((data, filename))
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }
}

/// Run CPU-bound or blocking work off the async runtime.
///
/// A request that times out drops the receiving side; work that has not
/// started yet is skipped, and work already running completes (including
/// any uploads) with a warning.
async fn run_blocking<T, F>(label: &'static str, work: F) -> Result<T, CropError>
where
    F: FnOnce() -> Result<T, CropError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        if tx.is_closed() {
            tracing::warn!("Skipping {}: request was dropped before work started", label);
            return;
        }
        deliver(label, tx, work());
    });

    rx.await
        .map_err(|_| CropError::Internal(format!("{} task failed", label)))?
}

/// Hand a finished result back to its request; false if nobody is waiting
fn deliver<T>(
    label: &str,
    tx: oneshot::Sender<Result<T, CropError>>,
    result: Result<T, CropError>,
) -> bool {
    let succeeded = result.is_ok();
    if tx.send(result).is_err() {
        tracing::warn!(
            "{} finished after its request was dropped (succeeded: {}); stored objects are kept",
            label,
            succeeded
        );
        return false;
    }
    true
}

/// Store name for a re-encoded upload, adding the extension when missing
fn upload_name(filename: &str, extension: &str) -> String {
    let name = sanitize(filename);
    if ImageFormat::from_path(&name).is_ok() {
        name
    } else {
        format!("{}.{}", name, extension)
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, CropError> {
    let start = Instant::now();
    let mut form = UploadForm::read(multipart, state.config.max_file_size).await?;
    let (data, filename) = form.take_file()?;

    let cropper = state.cropper.clone();
    let store = state.store.clone();
    let (stored_name, url) = run_blocking("upload", move || {
        let (bytes, format) = cropper.reencode(&data)?;
        let stored_name = upload_name(&filename, format.extension());
        let url = upload(store.as_ref(), &bytes, &stored_name)?;
        Ok((stored_name, url))
    })
    .await?;

    tracing::info!(
        "Upload stored as {} in {}ms",
        stored_name,
        start.elapsed().as_millis()
    );

    Ok(Json(UploadResponse {
        filename: stored_name,
        url,
    }))
}

async fn handle_crop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CropResponse>, CropError> {
    let start = Instant::now();
    let mut form = UploadForm::read(multipart, state.config.max_file_size).await?;
    let (data, filename) = form.take_file()?;

    let coordinate = |bound: Bound| form.text(bound.as_str()).map(Coordinate::from_text);
    let spec = RegionSpec {
        left: coordinate(Bound::Left),
        top: coordinate(Bound::Top),
        right: coordinate(Bound::Right),
        bottom: coordinate(Bound::Bottom),
        name: form.text("name").map(|s| s.to_string()),
    };

    let cropper = state.cropper.clone();
    let store = state.store.clone();
    let response = run_blocking("crop", move || {
        let set = cropper.extract_single(&data, &spec)?;
        let region = set
            .regions()
            .first()
            .ok_or_else(|| CropError::Internal("Crop produced no region".to_string()))?;

        let stored_name = format!("cropped_{}", sanitize(&filename));
        let url = upload(store.as_ref(), &region.bytes, &stored_name)?;

        Ok(CropResponse {
            filename: stored_name,
            url,
            name: region.name.clone(),
            rect: region.rect,
        })
    })
    .await?;

    tracing::info!(
        "Crop {} stored as {} in {}ms",
        response.rect,
        response.filename,
        start.elapsed().as_millis()
    );

    Ok(Json(response))
}

async fn handle_multicrop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<MulticropResponse>, CropError> {
    let start = Instant::now();
    let mut form = UploadForm::read(multipart, state.config.max_file_size).await?;
    let (data, filename) = form.take_file()?;

    let crops = form
        .text("crops")
        .ok_or_else(|| CropError::InvalidRequest("Missing 'crops' field".to_string()))?;
    let specs = parse_region_specs(crops)?;

    let cropper = state.cropper.clone();
    let store = state.store.clone();
    let original = filename.clone();
    let published = run_blocking("multicrop", move || {
        let set = cropper.extract_manual(&data, &specs)?;
        tracing::debug!("Extracted {} regions from {}", set.count(), original);
        set.publish(store.as_ref(), &original)
    })
    .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Multicrop of {} completed in {}ms, {} regions",
        filename,
        processing_time_ms,
        published.len()
    );

    Ok(Json(MulticropResponse {
        original_filename: filename,
        num_crops: published.len(),
        crops: published,
        processing_time_ms,
    }))
}

async fn handle_auto_crop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AutoCropResponse>, CropError> {
    let start = Instant::now();
    let mut form = UploadForm::read(multipart, state.config.max_file_size).await?;
    let (data, filename) = form.take_file()?;

    let cropper = state.cropper.clone();
    let store = state.store.clone();
    let original = filename.clone();
    let (published, candidates_found, steps) = run_blocking("auto crop", move || {
        let auto = cropper.extract_auto(&data)?;
        if auto.crops.is_empty() {
            tracing::info!(
                "No region of {} cleared the area threshold ({} candidates)",
                original,
                auto.candidates_found
            );
        }
        let published = auto.crops.publish(store.as_ref(), &original)?;
        Ok((published, auto.candidates_found, auto.steps))
    })
    .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Auto crop of {} completed in {}ms, {} of {} candidates kept",
        filename,
        processing_time_ms,
        published.len(),
        candidates_found
    );

    Ok(Json(AutoCropResponse {
        original_filename: filename,
        num_crops: published.len(),
        cropped_images: published,
        candidates_found,
        processing_time_ms,
        steps,
    }))
}

async fn handle_root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Multicrop server is running".to_string(),
        status: "running".to_string(),
    })
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let formats = |enabled: fn(&ImageFormat) -> bool| -> Vec<String> {
        ImageFormat::all()
            .filter(|format| enabled(format))
            .filter_map(|format| format.extensions_str().first())
            .map(|ext| ext.to_string())
            .collect()
    };

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        readable_formats: formats(|f| f.reading_enabled()),
        writable_formats: formats(|f| f.writing_enabled()),
        max_file_size_bytes: state.config.max_file_size,
        workers: state.cropper.workers(),
        detector: *state.cropper.detector_params(),
        store: state.store.name().to_string(),
    })
}
