use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store misconfigured: {0}")]
    Config(String),

    #[error("invalid destination path: {0}")]
    InvalidPath(String),

    #[error("storage rejected the write: {0}")]
    Rejected(String),

    #[error("storage unreachable: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for extracted region bytes
pub trait BlobStore: Send + Sync {
    /// Returns the backend identifier (e.g., "local", "supabase")
    fn name(&self) -> &'static str;

    /// Write `bytes` at `destination_path` and return a URL for the object
    fn store(&self, bytes: &[u8], destination_path: &str) -> Result<String, StoreError>;
}

/// MIME type for an object, guessed from its path extension
pub fn content_type_for(destination_path: &str) -> &'static str {
    ImageFormat::from_path(destination_path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for("Logo_scan.png"), "image/png");
        assert_eq!(content_type_for("auto_crop_0_scan.jpg"), "image/jpeg");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }
}
