use super::{Image, LoaderContext};
use crate::cache::{CacheEntry, RequestIdentity, ResponseMetadata};
use crate::error::{ApiError, TransportCode};
use crate::types::ResourceKey;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use std::future::Future;
use tokio_util::sync::CancellationToken;

const IMAGE_ACCEPT: &str = "image/*";

/// Cache first, then network. `None` means the fetch was cancelled.
pub(super) async fn run(
    context: &LoaderContext,
    key: &ResourceKey,
    cancel: &CancellationToken,
) -> Option<Result<Image, ApiError>> {
    let identity = RequestIdentity::image(key.url().clone());

    if let Some(entry) = until_cancelled(cancel, context.cache.lookup(&identity)).await? {
        match until_cancelled(cancel, decode(entry.body)).await? {
            Ok(image) => {
                tracing::debug!(key = %key, "Loaded image from cache");
                return Some(Ok(image));
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached image did not decode, refetching");
            }
        }
    }

    tracing::info!(key = %key, "Loading image from network");
    let request = context
        .http
        .get(key.url().clone())
        .header(ACCEPT, IMAGE_ACCEPT)
        .send();
    let response = match until_cancelled(cancel, request).await? {
        Ok(response) => response,
        Err(e) => return Some(Err(ApiError::from(&e))),
    };

    let status = response.status();
    let metadata =
        ResponseMetadata::from_headers(status.as_u16(), response.url().as_str(), response.headers());
    let body = match until_cancelled(cancel, response.bytes()).await? {
        Ok(body) => body,
        Err(e) => return Some(Err(ApiError::from(&e))),
    };

    if !status.is_success() {
        return Some(Err(ApiError::http_status(status.as_u16(), Some(body))));
    }

    let image = match until_cancelled(cancel, decode(body.clone())).await? {
        Ok(image) => image,
        Err(e) => return Some(Err(e)),
    };

    if cancel.is_cancelled() {
        return None;
    }
    context
        .cache
        .store(&identity, CacheEntry::new(metadata, body))
        .await;
    tracing::info!(key = %key, "Cached image");

    Some(Ok(image))
}

/// Decode encoded image bytes on the blocking pool
pub(super) async fn decode(bytes: Bytes) -> Result<Image, ApiError> {
    let decoded = tokio::task::spawn_blocking(move || {
        let format = image::guess_format(&bytes).ok();
        image::load_from_memory(&bytes).map(|pixels| Image::new(pixels, format))
    })
    .await
    .map_err(|e| ApiError::other(format!("image decode task failed: {e}")))?;

    decoded.map_err(|e| ApiError::transport(TransportCode::CannotDecodeContent, e.to_string()))
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}
