//! Feed payloads and image content generators

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::{Value, json};
use std::io::Cursor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encode a solid-color PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encoding a PNG in memory cannot fail");
    out.into_inner()
}

/// One article object; `image` is omitted when `None`
pub fn article_json(id: i64, title: &str, image: Option<&str>) -> Value {
    let mut article = json!({
        "id": id,
        "title": title,
        "subtitle": format!("{title} subtitle"),
        "author": "Emily White",
        "category": "Tech",
        "date": "2025-04-05",
        "text": format!("Body of {title}.")
    });
    if let Some(image) = image {
        article["image"] = Value::String(image.to_string());
    }
    article
}

/// Feed envelope around `articles`
pub fn feed_json(articles: Vec<Value>) -> Value {
    json!({ "articles": articles })
}

/// Serve a PNG at `route`, expecting exactly `calls` requests
pub async fn mount_png(server: &MockServer, route: &str, width: u32, height: u32, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(width, height)),
        )
        .expect(calls)
        .mount(server)
        .await;
}

/// Serve the feed envelope at `/articles`
pub async fn mount_feed(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
