mod common;

use image::RgbImage;
use live_classify::config::ClientConfig;
use live_classify::upload::{UploadClient, UPLOAD_FAILED_MESSAGE};

use common::FakeService;

fn client_for(origin: String) -> UploadClient {
    let config = ClientConfig {
        server_url: origin,
        ..ClientConfig::default()
    };
    UploadClient::new(&config)
}

#[tokio::test]
async fn test_upload_returns_detections() {
    let origin = FakeService::new().spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.png");
    RgbImage::new(100, 60).save(&path).unwrap();

    let result = client_for(origin).classify(&path).await;
    assert_eq!(result.error(), None);
    let labels: Vec<_> = result.detections().iter().map(|d| d.label()).collect();
    assert_eq!(labels, vec!["bottle: 92.0%", "bottle: 81.0%"]);
}

#[tokio::test]
async fn test_service_error_body_is_shown_verbatim() {
    let origin = FakeService::new().spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not a jpeg").unwrap();

    let result = client_for(origin).classify(&path).await;
    assert_eq!(result.error(), Some("Could not read image"));
}

#[tokio::test]
async fn test_unreachable_service_gives_generic_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.png");
    RgbImage::new(4, 4).save(&path).unwrap();

    // Nothing listens on the discard port.
    let result = client_for("http://127.0.0.1:9".into()).classify(&path).await;
    assert_eq!(result.error(), Some(UPLOAD_FAILED_MESSAGE));
}

#[tokio::test]
async fn test_health_check() {
    let origin = FakeService::new().spawn().await;
    let health = client_for(origin).check_health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.model_loaded);
    assert_eq!(health.device, "cpu");
    assert!(client_for("http://127.0.0.1:9".into())
        .check_health()
        .await
        .is_err());
}
