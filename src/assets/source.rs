//! Where slide images come from.
//!
//! References are URLs (`http://`, `https://`), `file://` URLs, `data:` URLs with a base64
//! payload, or plain filesystem paths. Every fetch is bounded by [`FetchConfig::max_bytes`]
//! and stops with [`SlideError::Cancelled`] once its [`CancelToken`] flips.

use std::{io::Read, path::Path};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::{
    cancel::CancelToken,
    config::FetchConfig,
    foundation::error::{SlideError, SlideResult},
};

#[cfg(feature = "http")]
const CANCEL_POLL: std::time::Duration = std::time::Duration::from_millis(25);

/// Resolves an image reference to its encoded bytes.
///
/// Implementations return `Err(SlideError::Cancelled)` when `cancel` flips mid-fetch;
/// callers never turn that into a degraded slide.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, reference: &str, cancel: &CancelToken) -> SlideResult<Vec<u8>>;
}

/// The default resolver: HTTP(S) through a shared blocking client, everything else from
/// the local filesystem.
pub struct DefaultImageSource {
    limits: FetchConfig,
    #[cfg(feature = "http")]
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for DefaultImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultImageSource")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl DefaultImageSource {
    pub fn new(limits: FetchConfig) -> SlideResult<Self> {
        #[cfg(feature = "http")]
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(limits.timeout_secs))
            .user_agent(concat!("slidereel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SlideError::validation(format!("build http client: {e}")))?;

        Ok(Self {
            limits,
            #[cfg(feature = "http")]
            client,
        })
    }

    /// The request runs on a helper thread so a stalled server cannot outlive the token.
    /// A cancelled request is abandoned; its thread exits at the next body read or at the
    /// client timeout.
    #[cfg(feature = "http")]
    fn fetch_http(&self, url: &str, cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        use std::sync::mpsc::RecvTimeoutError;

        use anyhow::Context as _;

        let (tx, rx) = std::sync::mpsc::channel();
        let client = self.client.clone();
        let max_bytes = self.limits.max_bytes;
        let worker_cancel = cancel.clone();
        let worker_url = url.to_string();
        std::thread::Builder::new()
            .name("slidereel-fetch".to_string())
            .spawn(move || {
                let _ = tx.send(http_get(&client, &worker_url, max_bytes, &worker_cancel));
            })
            .context("spawn image fetch thread")?;

        loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        tracing::debug!(url = %abbreviate(url), "image fetch cancelled");
                        return Err(SlideError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SlideError::asset_fetch(url, "fetch thread ended without a result"));
                }
            }
        }
    }

    #[cfg(not(feature = "http"))]
    fn fetch_http(&self, url: &str, _cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        Err(SlideError::asset_fetch(
            url,
            "http image sources require the 'http' feature",
        ))
    }

    fn fetch_file(&self, reference: &str, path: &Path, cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        let file = std::fs::File::open(path).map_err(|e| SlideError::asset_fetch(reference, e))?;
        read_bounded(reference, file, self.limits.max_bytes, cancel)
    }

    fn fetch_data_url(&self, reference: &str, rest: &str) -> SlideResult<Vec<u8>> {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| SlideError::asset_fetch(abbreviate(reference), "malformed data url"))?;
        if !meta.ends_with(";base64") {
            return Err(SlideError::asset_fetch(
                abbreviate(reference),
                "only base64 data urls are supported",
            ));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| SlideError::asset_fetch(abbreviate(reference), e))?;
        if bytes.len() as u64 > self.limits.max_bytes {
            return Err(SlideError::asset_fetch(
                abbreviate(reference),
                format!("payload exceeds {} byte limit", self.limits.max_bytes),
            ));
        }
        Ok(bytes)
    }
}

impl ImageSource for DefaultImageSource {
    #[tracing::instrument(level = "debug", skip(self, cancel), fields(reference = %abbreviate(reference)))]
    fn fetch(&self, reference: &str, cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SlideError::asset_fetch("", "empty image reference"));
        }
        cancel.check()?;

        let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
        let bytes = if lower.starts_with("http://") || lower.starts_with("https://") {
            self.fetch_http(reference, cancel)?
        } else if let Some(rest) = reference.strip_prefix("file://") {
            self.fetch_file(reference, Path::new(rest), cancel)?
        } else if let Some(rest) = reference.strip_prefix("data:") {
            self.fetch_data_url(reference, rest)?
        } else {
            self.fetch_file(reference, Path::new(reference), cancel)?
        };
        cancel.check()?;
        Ok(bytes)
    }
}

#[cfg(feature = "http")]
fn http_get(
    client: &reqwest::blocking::Client,
    url: &str,
    max_bytes: u64,
    cancel: &CancelToken,
) -> SlideResult<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| SlideError::asset_fetch(url, e))?;
    cancel.check()?;

    let status = response.status();
    if !status.is_success() {
        return Err(SlideError::asset_fetch(url, format!("http status {status}")));
    }
    if let Some(len) = response.content_length()
        && len > max_bytes
    {
        return Err(SlideError::asset_fetch(
            url,
            format!("body of {len} bytes exceeds {max_bytes} byte limit"),
        ));
    }
    read_bounded(url, response, max_bytes, cancel)
}

/// Fails every read once the token flips.
struct CancellableReader<'a, R> {
    inner: R,
    cancel: &'a CancelToken,
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            // Not `Interrupted`: `read_to_end` retries those.
            return Err(std::io::Error::other("fetch cancelled"));
        }
        self.inner.read(buf)
    }
}

fn read_bounded(
    reference: &str,
    reader: impl Read,
    max_bytes: u64,
    cancel: &CancelToken,
) -> SlideResult<Vec<u8>> {
    let mut buf = Vec::new();
    let read = CancellableReader {
        inner: reader,
        cancel,
    }
    .take(max_bytes.saturating_add(1))
    .read_to_end(&mut buf);
    cancel.check()?;
    read.map_err(|e| SlideError::asset_fetch(reference, e))?;
    if buf.len() as u64 > max_bytes {
        return Err(SlideError::asset_fetch(
            reference,
            format!("body exceeds {max_bytes} byte limit"),
        ));
    }
    Ok(buf)
}

/// Data URLs can be megabytes long; keep errors and logs readable.
fn abbreviate(reference: &str) -> String {
    const MAX: usize = 96;
    match reference.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &reference[..cut]),
        None => reference.to_string(),
    }
}
