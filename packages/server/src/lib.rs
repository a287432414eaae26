#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for forestcast pipeline results.
//!
//! Serves the driver, forecast and comparison tables plus the run summary
//! as JSON under `/api`. The result is produced once, either by a fresh
//! pipeline run on a blocking worker or by loading a directory written by
//! [`forestcast_pipeline::export::export`], and is read-only afterwards.
//! Until it is available every collection endpoint answers `[]`.

mod handlers;

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use forestcast_dataset::{DatasetConfig, DatasetError};
use forestcast_pipeline::PipelineResult;
use forestcast_pipeline::progress::ProgressCallback;
use forestcast_server_models::{ApiStatus, ResultState};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Where the served result comes from.
#[derive(Debug, Clone)]
pub enum ResultSource {
    /// Run the pipeline over the inputs in `data_dir`.
    Pipeline {
        /// Input layout.
        config: DatasetConfig,
        /// Directory the input files are resolved against.
        data_dir: PathBuf,
    },
    /// Load a previously exported result.
    Exports(PathBuf),
}

impl ResultSource {
    /// Picks the source from the `FORESTCAST_*` variables looked up
    /// through `var`.
    ///
    /// `FORESTCAST_EXPORTS` wins. Otherwise the pipeline runs with the
    /// layout in `FORESTCAST_CONFIG` (or the embedded one) over
    /// `FORESTCAST_DATA_DIR`, falling back to the layout's `[data] dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the layout cannot be read.
    pub fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Result<Self, DatasetError> {
        if let Some(dir) = var("FORESTCAST_EXPORTS") {
            return Ok(Self::Exports(PathBuf::from(dir)));
        }
        let config = match var("FORESTCAST_CONFIG") {
            Some(path) => DatasetConfig::from_file(&PathBuf::from(path))?,
            None => DatasetConfig::embedded()?,
        };
        let data_dir = var("FORESTCAST_DATA_DIR")
            .map_or_else(|| config.data.dir.clone(), PathBuf::from);
        Ok(Self::Pipeline { config, data_dir })
    }
}

/// Server startup options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Where the result comes from.
    pub source: ResultSource,
    /// Optional frontend bundle served at `/`.
    pub static_dir: Option<PathBuf>,
}

/// Shared application state.
///
/// Both slots are written at most once, by the loader task.
#[derive(Default)]
pub struct AppState {
    result: OnceLock<Arc<PipelineResult>>,
    error: OnceLock<String>,
}

impl AppState {
    /// State that already holds `result`.
    #[must_use]
    pub fn ready(result: PipelineResult) -> Self {
        let state = Self::default();
        state.publish(result);
        state
    }

    /// The result, once available.
    #[must_use]
    pub fn result(&self) -> Option<Arc<PipelineResult>> {
        self.result.get().cloned()
    }

    /// Stores the result. Later calls are ignored.
    pub fn publish(&self, result: PipelineResult) {
        if self.result.set(Arc::new(result)).is_err() {
            log::warn!("Pipeline result already published; ignoring a second one");
        }
    }

    /// Records why the result will never arrive.
    pub fn fail(&self, message: String) {
        if self.error.set(message).is_err() {
            log::warn!("Pipeline failure already recorded");
        }
    }

    /// Snapshot for `GET /api/status`.
    #[must_use]
    pub fn status(&self) -> ApiStatus {
        if let Some(result) = self.result.get() {
            return ApiStatus {
                state: ResultState::Ready,
                completed_at: Some(result.completed_at),
                failure_count: result.failures.len(),
                error: None,
            };
        }
        self.error.get().map_or_else(ApiStatus::pending, |e| ApiStatus {
            state: ResultState::Failed,
            error: Some(e.clone()),
            ..ApiStatus::pending()
        })
    }
}

/// Produces the result from `source` and stores it in `state`.
///
/// Blocks for the length of a pipeline run; call it off the async
/// executor.
pub fn populate(state: &AppState, source: &ResultSource, progress: &Arc<dyn ProgressCallback>) {
    match source {
        ResultSource::Pipeline { config, data_dir } => {
            log::info!("Running pipeline over {}", data_dir.display());
            match forestcast_pipeline::run_pipeline(config, data_dir, progress) {
                Ok(result) => state.publish(result),
                Err(e) => {
                    log::error!("Pipeline run failed: {e}");
                    state.fail(e.to_string());
                }
            }
        }
        ResultSource::Exports(dir) => {
            log::info!("Loading exported results from {}", dir.display());
            match forestcast_pipeline::export::load_exports(dir) {
                Ok(result) => state.publish(result),
                Err(e) => {
                    log::error!("Failed to load exports: {e}");
                    state.fail(e.to_string());
                }
            }
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/status", web::get().to(handlers::status))
            .route("/drivers", web::get().to(handlers::drivers))
            .route("/forecasts", web::get().to(handlers::forecasts))
            .route("/comparison", web::get().to(handlers::comparison))
            .route("/regions", web::get().to(handlers::regions))
            .route("/overview", web::get().to(handlers::overview))
            .route("/diagnostics", web::get().to(handlers::diagnostics)),
    );
}

/// Starts the forestcast API server.
///
/// Binds the listener first, then produces the result on a blocking
/// worker so that the API answers (with empty tables) while the pipeline
/// runs. Logging must already be initialized. This is a regular async
/// function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(
    options: ServerOptions,
    progress: Arc<dyn ProgressCallback>,
) -> std::io::Result<()> {
    let state = web::Data::new(AppState::default());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    log::info!("Starting server on {bind_addr}:{port}");

    let static_dir = options.static_dir.clone();
    let app_state = state.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
            .configure(|cfg| {
                // Serve frontend static files
                if let Some(dir) = &static_dir {
                    cfg.service(Files::new("/", dir.clone()).index_file("index.html"));
                }
            })
    })
    .bind((bind_addr, port))?
    .run();

    let source = options.source;
    tokio::task::spawn_blocking(move || populate(&state, &source, &progress));

    server.await
}
