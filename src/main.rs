use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use carematch::routes::{self, AppState};
use carematch::services::catalog::CatalogStore;
use carematch::services::geocode::{Geocoder, ZipLocator, ZippopotamLocator};
use carematch::services::llm::{GeminiModel, LlmClient};
use carematch::services::locations::LocationResolver;
use carematch::services::pipeline::{Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "carematch", about = "Senior-living placement recommendation engine")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Community catalog workbook (single-sheet CSV)
    #[arg(long, default_value = "data/communities.csv")]
    catalog: PathBuf,

    /// Curated locality table (JSON); falls back to the built-in
    /// service-area defaults when absent
    #[arg(long, default_value = "data/locations.json")]
    locations: PathBuf,

    /// Geocode memoization bound (entries)
    #[arg(long, default_value_t = 4096)]
    geocode_cache: usize,

    /// Gemini model id for extraction and ranking
    #[arg(long, default_value = "gemini-2.5-flash")]
    model: String,

    /// Budget multiplier for the hard filter (1.0 = fee must not exceed
    /// the stated budget)
    #[arg(long, default_value_t = 1.0)]
    budget_tolerance: f64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (catalog, summary) = match CatalogStore::load(&args.catalog) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load catalog {}: {e:#}", args.catalog.display());
            std::process::exit(1);
        }
    };
    let catalog = Arc::new(catalog);
    info!(
        "Catalog ready: {} communities ({} rows skipped)",
        summary.loaded, summary.skipped
    );

    let locations = load_locations(&args.locations);

    // Provider credentials are the only environment the engine reads.
    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    let llm_configured = !api_key.is_empty();
    if !llm_configured {
        warn!("GEMINI_API_KEY is not set; consultations will fail until it is provided");
    }

    let model = match GeminiModel::new(&api_key, &args.model) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Failed to initialize the LLM client: {e}");
            std::process::exit(1);
        }
    };
    let llm = Arc::new(LlmClient::new(Arc::new(model)));

    let locator: Arc<dyn ZipLocator> = match ZippopotamLocator::new() {
        Ok(locator) => Arc::new(locator),
        Err(e) => {
            eprintln!("Failed to initialize the geocoder: {e:#}");
            std::process::exit(1);
        }
    };
    let geocoder = Arc::new(Geocoder::new(locator, args.geocode_cache));

    let config = PipelineConfig {
        model_id: args.model.clone(),
        budget_tolerance: args.budget_tolerance,
        ..PipelineConfig::default()
    };
    let pipeline = Arc::new(Pipeline::new(
        catalog.clone(),
        geocoder,
        llm,
        Arc::new(locations),
        config,
    ));

    let app = routes::router(AppState {
        catalog,
        pipeline,
        llm_configured,
    })
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {addr}"));

    info!("carematch engine listening at http://{}", addr);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

fn load_locations(path: &Path) -> LocationResolver {
    if path.exists() {
        match LocationResolver::load(path) {
            Ok(resolver) => return resolver,
            Err(e) => {
                warn!("Ignoring unreadable location table: {e:#}");
            }
        }
    }
    info!("Using the built-in locality table");
    LocationResolver::with_defaults()
}
