// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::cache::{CacheEntry, RequestIdentity, ResponseMetadata};
use crate::error::TransportCode;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn registry() -> LoaderRegistry {
    LoaderRegistry::new(reqwest::Client::new(), ResponseCache::in_memory(16 * 1024 * 1024))
}

fn key(server: &MockServer, p: &str) -> ResourceKey {
    ResourceKey::parse(&format!("{}{p}", server.uri())).unwrap()
}

async fn mount_png(server: &MockServer, p: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(p))
        .and(header("accept", "image/*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(4, 3)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn loads_from_network_and_populates_cache() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 1).await;
    let registry = registry();
    let key = key(&server, "/a.png");

    let loader = registry.get_or_create(&key);
    let image = match loader.wait().await {
        Phase::Success(image) => image,
        other => panic!("expected success, got {other:?}"),
    };

    assert_eq!((image.width(), image.height()), (4, 3));
    assert_eq!(image.format(), Some(ImageFormat::Png));

    let cached = registry
        .cache()
        .lookup(&RequestIdentity::image(key.url().clone()))
        .await
        .expect("image bytes should be cached");
    assert_eq!(cached.body.as_ref(), png_bytes(4, 3).as_slice());
    assert_eq!(cached.metadata.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn cache_hit_skips_network() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 0).await;
    let registry = registry();
    let key = key(&server, "/a.png");

    registry
        .cache()
        .store(
            &RequestIdentity::image(key.url().clone()),
            CacheEntry::new(ResponseMetadata::new(200, key.as_str()), png_bytes(2, 2)),
        )
        .await;

    let phase = registry.get_or_create(&key).wait().await;

    assert!(matches!(&phase, Phase::Success(img) if img.width() == 2), "got {phase:?}");
}

#[tokio::test]
async fn undecodable_cache_hit_falls_back_to_network() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 1).await;
    let registry = registry();
    let key = key(&server, "/a.png");
    let identity = RequestIdentity::image(key.url().clone());

    registry
        .cache()
        .store(
            &identity,
            CacheEntry::new(ResponseMetadata::new(200, key.as_str()), b"garbage".to_vec()),
        )
        .await;

    let phase = registry.get_or_create(&key).wait().await;

    assert!(matches!(&phase, Phase::Success(img) if img.width() == 4), "got {phase:?}");
    let refreshed = registry.cache().lookup(&identity).await.unwrap();
    assert_eq!(refreshed.body.as_ref(), png_bytes(4, 3).as_slice());
}

#[tokio::test]
async fn concurrent_lookups_share_one_loader_and_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shared.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes(4, 3))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(registry());
    let key = key(&server, "/shared.png");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let key = key.clone();
        handles.push(tokio::spawn(async move { registry.get_or_create(&key) }));
    }

    let mut loaders = Vec::new();
    for handle in handles {
        loaders.push(handle.await.unwrap());
    }

    let first = &loaders[0];
    assert!(loaders.iter().all(|l| Arc::ptr_eq(l, first)));
    assert_eq!(registry.len(), 1);
    assert!(matches!(first.wait().await, Phase::Success(_)));
}

#[tokio::test]
async fn equivalent_locators_map_to_one_loader() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 1).await;
    let registry = registry();

    let upper = ResourceKey::parse(&format!("{}/a.png", server.uri().to_uppercase())).unwrap();
    let a = registry.get_or_create(&upper);
    let b = registry
        .get_or_create_url(&Url::parse(&format!("{}/a.png", server.uri())).unwrap())
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    a.wait().await;
}

#[tokio::test]
async fn non_2xx_rejects_with_status_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such image"))
        .mount(&server)
        .await;
    let registry = registry();
    let key = key(&server, "/gone.png");

    let phase = registry.get_or_create(&key).wait().await;

    match phase {
        Phase::Failure(ApiError::HttpStatus(e)) => {
            assert_eq!(e.status, 404);
            assert_eq!(e.body_text(), Some("no such image"));
        }
        other => panic!("expected HttpStatus failure, got {other:?}"),
    }
    assert!(
        registry
            .cache()
            .lookup(&RequestIdentity::image(key.url().clone()))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn undecodable_body_rejects_as_cannot_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
        .mount(&server)
        .await;
    let registry = registry();

    let phase = registry.get_or_create(&key(&server, "/page")).wait().await;

    match phase {
        Phase::Failure(error) => {
            assert!(
                matches!(&error, ApiError::Transport(e) if e.code == TransportCode::CannotDecodeContent),
                "got {error:?}"
            );
            assert!(!error.is_transient());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(registry.cache().stats().await.memory_entries, 0);
}

#[tokio::test]
async fn unreachable_host_rejects_with_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let registry = registry();
    let key = ResourceKey::parse(&format!("http://127.0.0.1:{port}/a.png")).unwrap();

    match registry.get_or_create(&key).wait().await {
        Phase::Failure(error) => assert!(error.is_transient(), "got {error:?}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn settled_loader_never_changes() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 1).await;
    let registry = registry();
    let key = key(&server, "/a.png");

    let loader = registry.get_or_create(&key);
    let first = loader.wait().await;
    let mut rx = loader.subscribe();
    let _ = rx.borrow_and_update();

    loader.cancel();
    registry.clear_image_cache().await.unwrap();
    let again = registry.get_or_create(&key);

    assert!(Arc::ptr_eq(&loader, &again));
    assert_eq!(loader.phase(), first);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn clearing_cache_keeps_resolved_images() {
    let server = MockServer::start().await;
    mount_png(&server, "/a.png", 1).await;
    let registry = registry();
    let key = key(&server, "/a.png");

    let loader = registry.get_or_create(&key);
    assert!(matches!(loader.wait().await, Phase::Success(_)));

    registry.clear_image_cache().await.unwrap();

    assert!(matches!(loader.phase(), Phase::Success(_)));
    assert!(
        registry
            .cache()
            .lookup(&RequestIdentity::image(key.url().clone()))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn dropping_loader_mid_fetch_produces_no_transition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes(4, 3))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let context = Arc::new(LoaderContext {
        http: reqwest::Client::new(),
        cache: ResponseCache::in_memory(1024 * 1024),
    });
    let loader = Loader::spawn(key(&server, "/slow.png"), Arc::clone(&context));
    let rx = loader.subscribe();

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(loader);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(*rx.borrow(), LoaderState::Pending);
    assert_eq!(context.cache.stats().await.memory_entries, 0);
}

#[tokio::test]
async fn cancel_resolves_wait_with_empty_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes(4, 3))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let registry = registry();

    let loader = registry.get_or_create(&key(&server, "/slow.png"));
    loader.cancel();

    let phase = tokio::time::timeout(Duration::from_secs(1), loader.wait())
        .await
        .expect("wait should return once the fetch ends");
    assert_eq!(phase, Phase::Empty);
    assert_eq!(loader.state(), LoaderState::Pending);
}

#[tokio::test]
async fn decode_rejects_truncated_png() {
    let mut bytes = png_bytes(8, 8);
    bytes.truncate(bytes.len() / 2);

    let error = fetch::decode(bytes.into()).await.unwrap_err();

    assert!(matches!(error, ApiError::Transport(e) if e.code == TransportCode::CannotDecodeContent));
}
