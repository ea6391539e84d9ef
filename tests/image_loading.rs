//! End-to-end image loading through the `NewsApp` facade

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{mount_png, test_config};
use newsdesk::{ApiError, NewsApp, Phase};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::MockServer;

fn app(server: &MockServer, dir: &TempDir) -> NewsApp {
    NewsApp::new(test_config(&format!("{}/articles", server.uri()), dir.path())).unwrap()
}

#[tokio::test]
async fn image_resolves_and_lands_in_both_tiers() {
    let server = MockServer::start().await;
    mount_png(&server, "/hero.png", 6, 4, 1).await;
    let dir = TempDir::new().unwrap();
    let app = app(&server, &dir);

    let loader = app.image(&format!("{}/hero.png", server.uri())).unwrap();

    match loader.wait().await {
        Phase::Success(image) => assert_eq!((image.width(), image.height()), (6, 4)),
        other => panic!("expected success, got {other:?}"),
    }
    let stats = app.cache_stats().await;
    assert_eq!(stats.memory_entries, 1);
    assert_eq!(stats.disk_entries, 1);
}

#[tokio::test]
async fn disk_cache_serves_images_after_restart() {
    let server = MockServer::start().await;
    // One network request across both app instances
    mount_png(&server, "/hero.png", 6, 4, 1).await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/hero.png", server.uri());

    {
        let first = app(&server, &dir);
        assert!(matches!(first.image(&url).unwrap().wait().await, Phase::Success(_)));
    }

    let second = app(&server, &dir);
    let phase = second.image(&url).unwrap().wait().await;

    assert!(matches!(phase, Phase::Success(ref img) if img.width() == 6), "got {phase:?}");
    let stats = second.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn cleared_cache_forces_a_new_download_after_restart() {
    let server = MockServer::start().await;
    mount_png(&server, "/hero.png", 6, 4, 2).await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/hero.png", server.uri());

    {
        let first = app(&server, &dir);
        let loader = first.image(&url).unwrap();
        assert!(matches!(loader.wait().await, Phase::Success(_)));

        first.clear_image_cache().await.unwrap();
        assert!(
            matches!(loader.phase(), Phase::Success(_)),
            "resolved loaders keep their image"
        );
        assert_eq!(first.cache_stats().await.disk_entries, 0);
    }

    let second = app(&server, &dir);
    assert!(matches!(second.image(&url).unwrap().wait().await, Phase::Success(_)));
}

#[tokio::test]
async fn same_url_shares_one_loader() {
    let server = MockServer::start().await;
    mount_png(&server, "/hero.png", 6, 4, 1).await;
    let dir = TempDir::new().unwrap();
    let app = app(&server, &dir);
    let url = format!("{}/hero.png", server.uri());

    let a = app.image(&url).unwrap();
    let b = app.image(&url).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(app.loaders().len(), 1);
    a.wait().await;
}

#[tokio::test]
async fn invalid_image_url_is_rejected_up_front() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = app(&server, &dir);

    let err = app.image("data:image/png;base64,AAAA").unwrap_err();

    assert!(matches!(err, ApiError::InvalidLocator { .. }));
    assert!(app.loaders().is_empty());
}

#[tokio::test]
async fn failed_image_reports_a_user_message() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = app(&server, &dir);

    // Nothing mounted: wiremock answers 404
    let phase = app
        .image(&format!("{}/missing.png", server.uri()))
        .unwrap()
        .wait()
        .await;

    match phase {
        Phase::Failure(err) => {
            assert_eq!(err.status_code(), Some(404));
            assert!(err.user_message().starts_with("🌐"));
            assert!(err.user_message().contains("Not Found"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
