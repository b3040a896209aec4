use crate::detection::DetectorParams;
use crate::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Blob store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    /// Write objects to a local directory
    Local,
    /// Upload objects to a Supabase Storage bucket
    Supabase,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub workers: usize,
    pub jpeg_quality: u8,
    pub detector: DetectorParams,
    pub store: StoreBackend,
    pub store_dir: PathBuf,
    pub public_base_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub supabase_bucket: String,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            workers: args.workers,
            jpeg_quality: args.jpeg_quality,
            detector: DetectorParams {
                blur_sigma: args.blur_sigma,
                low_threshold: args.canny_low,
                high_threshold: args.canny_high,
                close_radius: args.close_radius,
                min_area: args.min_area,
            },
            store: args.store,
            store_dir: args.store_dir,
            public_base_url: args.public_base_url,
            supabase_url: args.supabase_url,
            supabase_key: args.supabase_key,
            supabase_bucket: args.supabase_bucket,
            cors_origins: args
                .cors_origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        }
    }
}

impl Config {
    /// Reject settings that would fail later or make the detector panic
    pub fn validate(&self) -> anyhow::Result<()> {
        let d = &self.detector;
        if d.low_threshold.is_nan() || d.low_threshold <= 0.0 {
            anyhow::bail!("canny low threshold must be positive (got {})", d.low_threshold);
        }
        if d.high_threshold < d.low_threshold {
            anyhow::bail!(
                "canny high threshold ({}) must not be below the low threshold ({})",
                d.high_threshold,
                d.low_threshold
            );
        }
        if !d.blur_sigma.is_finite() || !d.min_area.is_finite() || d.min_area < 0.0 {
            anyhow::bail!("blur sigma and min area must be finite, min area non-negative");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("jpeg quality must be within 1..=100 (got {})", self.jpeg_quality);
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request timeout must be at least one second");
        }
        if self.store == StoreBackend::Supabase
            && (self.supabase_url.is_none() || self.supabase_key.is_none())
        {
            anyhow::bail!("--store supabase requires SUPABASE_URL and SUPABASE_KEY");
        }
        Ok(())
    }

    /// Any origin allowed
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}
