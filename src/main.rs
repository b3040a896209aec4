use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod canvas;
mod config;
mod cropper;
mod detection;
mod error;
mod extract;
mod geometry;
mod regions;
mod server;
mod store;
mod stores;

#[derive(Parser, Debug)]
#[command(name = "multicrop-server")]
#[command(about = "Region extraction server for scanned images")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "MULTICROP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MULTICROP_PORT", default_value = "8000")]
    pub port: u16,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "MULTICROP_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Extraction worker threads (0 = one per CPU)
    #[arg(long, env = "MULTICROP_WORKERS", default_value = "0")]
    pub workers: usize,

    /// JPEG quality for automatically detected regions (1-100)
    #[arg(long, env = "MULTICROP_JPEG_QUALITY", default_value = "95")]
    pub jpeg_quality: u8,

    /// Gaussian blur sigma before edge detection
    #[arg(long, env = "MULTICROP_BLUR_SIGMA", default_value = "1.1")]
    pub blur_sigma: f32,

    /// Canny low threshold
    #[arg(long, env = "MULTICROP_CANNY_LOW", default_value = "50")]
    pub canny_low: f32,

    /// Canny high threshold
    #[arg(long, env = "MULTICROP_CANNY_HIGH", default_value = "150")]
    pub canny_high: f32,

    /// Edge gap closing radius in pixels (0 disables)
    #[arg(long, env = "MULTICROP_CLOSE_RADIUS", default_value = "1")]
    pub close_radius: u8,

    /// Minimum contour area for detected regions
    #[arg(long, env = "MULTICROP_MIN_AREA", default_value = "5000")]
    pub min_area: f64,

    /// Blob store backend
    #[arg(long, env = "MULTICROP_STORE", value_enum, default_value = "local")]
    pub store: config::StoreBackend,

    /// Directory for the local store
    #[arg(long, env = "MULTICROP_STORE_DIR", default_value = "./crops")]
    pub store_dir: PathBuf,

    /// Base URL under which the local store's files are served
    #[arg(long, env = "MULTICROP_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Supabase storage bucket
    #[arg(long, env = "SUPABASE_BUCKET", default_value = "Images")]
    pub supabase_bucket: String,

    /// Comma-separated allowed CORS origins ("*" for any)
    #[arg(
        long,
        env = "MULTICROP_CORS_ORIGINS",
        default_value = "http://localhost:3000,http://127.0.0.1:3000,http://localhost:5173"
    )]
    pub cors_origins: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "MULTICROP_REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);
    config.validate()?;

    tracing::info!("Starting multicrop-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
