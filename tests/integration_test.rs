use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9500);

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Rect {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct PublishedRegion {
    index: usize,
    name: String,
    filename: String,
    url: String,
    rect: Rect,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct MulticropResponse {
    original_filename: String,
    num_crops: usize,
    crops: Vec<PublishedRegion>,
    processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StepTiming {
    name: String,
    time_ms: u64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct AutoCropResponse {
    original_filename: String,
    num_crops: usize,
    cropped_images: Vec<PublishedRegion>,
    candidates_found: usize,
    processing_time_ms: u64,
    steps: Vec<StepTiming>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ErrorResponse {
    error: String,
    code: String,
    index: Option<usize>,
    field: Option<String>,
    #[serde(default)]
    violations: Vec<BoundViolation>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BoundViolation {
    bound: String,
    value: i64,
    limit: i64,
}

struct TestServer {
    child: Child,
    port: u16,
    store_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let store_dir = tempfile::tempdir().expect("Failed to create store dir");

        let child = Command::new(env!("CARGO_BIN_EXE_multicrop-server"))
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .args(["--store", "local", "--workers", "2"])
            .arg("--store-dir")
            .arg(store_dir.path())
            .spawn()
            .expect("Failed to start server");

        let server = Self {
            child,
            port,
            store_dir,
        };
        server.wait_until_ready().await;
        server
    }

    async fn wait_until_ready(&self) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", self.base_url()))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server on port {} did not become ready", self.port);
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn stored(&self, filename: &str) -> bool {
        self.store_dir.path().join(filename).exists()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn encode_png(img: RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode test image");
    buf
}

fn file_part(bytes: Vec<u8>, filename: &str) -> Part {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str("image/png")
        .unwrap()
}

async fn post_form(base_url: &str, route: &str, form: Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}{}", base_url, route))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;

    let response: HealthResponse = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
    assert!(!response.version.is_empty());
}

#[tokio::test]
async fn test_multicrop_stores_named_regions() {
    let server = TestServer::start().await;
    let image = encode_png(RgbImage::from_pixel(200, 200, Rgb([40, 80, 120])));
    let crops = r#"[{"left":10,"top":20,"right":100,"bottom":120,"name":"Logo"},
                    {"left":50,"top":50,"right":150,"bottom":150}]"#;

    let form = Form::new()
        .part("file", file_part(image, "scan.png"))
        .text("crops", crops);
    let response = post_form(&server.base_url(), "/images/multicrop", form).await;

    assert_eq!(response.status(), 200);
    let body: MulticropResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.num_crops, 2);
    assert_eq!(body.crops[0].filename, "Logo_scan.png");
    assert_eq!(body.crops[1].name, "crop_1");
    assert_eq!(body.crops[1].rect.right, 150);
    assert_eq!((body.crops[0].width, body.crops[0].height), (90, 100));
    assert!(server.stored("Logo_scan.png"));
    assert!(server.stored("crop_1_scan.png"));
}

#[tokio::test]
async fn test_multicrop_reports_failing_rectangle() {
    let server = TestServer::start().await;
    let image = encode_png(RgbImage::from_pixel(200, 200, Rgb([40, 80, 120])));
    let crops = r#"[{"left":10,"top":20,"right":100,"bottom":120,"name":"Logo"},
                    {"left":130,"top":200,"right":230,"bottom":300}]"#;

    let form = Form::new()
        .part("file", file_part(image, "scan.png"))
        .text("crops", crops);
    let response = post_form(&server.base_url(), "/images/multicrop", form).await;

    assert_eq!(response.status(), 400);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "INVALID_RECTANGLE");
    assert_eq!(body.index, Some(1));
    assert_eq!(body.field.as_deref(), Some("bottom"));
    let crossed: Vec<&str> = body.violations.iter().map(|v| v.bound.as_str()).collect();
    assert_eq!(crossed, vec!["bottom", "right"]);
    assert!(!server.stored("Logo_scan.png"));
}

#[tokio::test]
async fn test_auto_crop_detects_document() {
    let server = TestServer::start().await;
    let mut img = RgbImage::from_pixel(500, 400, Rgb([250, 250, 245]));
    for y in 80..300 {
        for x in 100..400 {
            img.put_pixel(x, y, Rgb([10, 10, 10]));
        }
    }

    let form = Form::new().part("file", file_part(encode_png(img), "page.png"));
    let response = post_form(&server.base_url(), "/images/auto_crop", form).await;

    assert_eq!(response.status(), 200);
    let body: AutoCropResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.num_crops, 1);
    let region = &body.cropped_images[0];
    assert_eq!(region.filename, "auto_crop_0_page.jpg");
    assert!((region.rect.left - 100).abs() <= 4);
    assert!((region.rect.bottom - 300).abs() <= 4);
    assert!(server.stored("auto_crop_0_page.jpg"));
}

#[tokio::test]
async fn test_empty_file_rejected() {
    let server = TestServer::start().await;

    let form = Form::new().part("file", file_part(Vec::new(), "empty.png"));
    let response = post_form(&server.base_url(), "/images/auto_crop", form).await;

    assert_eq!(response.status(), 400);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "INVALID_IMAGE");
}

#[tokio::test]
async fn test_missing_file_rejected() {
    let server = TestServer::start().await;

    let form = Form::new().text("crops", "[]");
    let response = post_form(&server.base_url(), "/images/multicrop", form).await;

    assert_eq!(response.status(), 400);
    let body: ErrorResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.code, "MISSING_FILE");
}
