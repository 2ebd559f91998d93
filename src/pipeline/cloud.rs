//! Cloud document OCR.
//!
//! [`GoogleVisionOcr`] submits the original PDF bytes to Google Cloud Vision
//! `files:annotate` with `DOCUMENT_TEXT_DETECTION`. The synchronous endpoint
//! accepts at most five pages per request, so larger documents are walked in
//! windows of five using the `totalPages` reported by the first response.

use super::extract::MethodError;
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default `files:annotate` endpoint.
pub const VISION_FILES_ENDPOINT: &str = "https://vision.googleapis.com/v1/files:annotate";

/// Pages per synchronous `files:annotate` request.
const PAGES_PER_REQUEST: usize = 5;

/// A remote document-OCR service.
#[async_trait]
pub trait CloudOcr: Send + Sync {
    /// Recognise every page of `bytes`, returning page texts in page order.
    ///
    /// Missing or rejected credentials are [`MethodError::Unavailable`].
    async fn annotate(
        &self,
        bytes: Arc<[u8]>,
        mime_type: &str,
        language_hints: &[String],
    ) -> Result<Vec<String>, MethodError>;
}

/// Google Cloud Vision over HTTPS with an API key.
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl std::fmt::Debug for GoogleVisionOcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleVisionOcr")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl GoogleVisionOcr {
    pub fn new(
        api_key: Option<String>,
        endpoint: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: endpoint.unwrap_or_else(|| VISION_FILES_ENDPOINT.to_string()),
        })
    }

    async fn annotate_window(
        &self,
        api_key: &str,
        content: &str,
        mime_type: &str,
        language_hints: &[String],
        pages: Option<Vec<usize>>,
    ) -> Result<AnnotateFileResponse, MethodError> {
        let body = BatchAnnotateFilesRequest {
            requests: vec![AnnotateFileRequest {
                input_config: InputConfig {
                    content,
                    mime_type,
                },
                features: vec![Feature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
                image_context: ImageContext { language_hints },
                pages,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MethodError::Failed("cloud OCR request timed out".into())
                } else {
                    MethodError::Failed(format!("cloud OCR request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let detail = response.text().await.unwrap_or_default();
            return Err(MethodError::Unavailable(format!(
                "cloud OCR credentials rejected (HTTP {status}): {}",
                detail.trim()
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MethodError::Failed(format!(
                "cloud OCR returned HTTP {status}: {}",
                detail.trim()
            )));
        }

        let parsed: BatchAnnotateFilesResponse = response
            .json()
            .await
            .map_err(|e| MethodError::Failed(format!("cloud OCR response: {e}")))?;
        parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| MethodError::Failed("cloud OCR returned no file response".into()))
    }
}

#[async_trait]
impl CloudOcr for GoogleVisionOcr {
    async fn annotate(
        &self,
        bytes: Arc<[u8]>,
        mime_type: &str,
        language_hints: &[String],
    ) -> Result<Vec<String>, MethodError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            MethodError::Unavailable("cloud OCR API key is not configured".into())
        })?;
        let content = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let mut texts = Vec::new();
        let mut total_pages: Option<usize> = None;
        let mut first = 1usize;

        loop {
            let (last, window) = match total_pages {
                Some(total) => {
                    let last = total.min(first + PAGES_PER_REQUEST - 1);
                    (last, Some((first..=last).collect()))
                }
                None => (PAGES_PER_REQUEST, None),
            };
            debug!("cloud OCR pages {}–{}", first, last);

            let file = self
                .annotate_window(api_key, &content, mime_type, language_hints, window)
                .await?;
            let total = *total_pages.get_or_insert(file.total_pages.max(1));
            texts.extend(file.page_texts()?);

            if last >= total {
                break;
            }
            first = last + 1;
        }

        info!("cloud OCR annotated {} pages", texts.len());
        Ok(texts)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct BatchAnnotateFilesRequest<'a> {
    requests: Vec<AnnotateFileRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileRequest<'a> {
    input_config: InputConfig<'a>,
    features: Vec<Feature>,
    image_context: ImageContext<'a>,
    /// Absent on the first request: the service then annotates pages 1–5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<Vec<usize>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig<'a> {
    content: &'a str,
    mime_type: &'a str,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext<'a> {
    language_hints: &'a [String],
}

#[derive(Deserialize, Default)]
struct BatchAnnotateFilesResponse {
    #[serde(default)]
    responses: Vec<AnnotateFileResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponse {
    #[serde(default)]
    responses: Vec<PageResponse>,
    #[serde(default)]
    total_pages: usize,
    error: Option<Status>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
    context: Option<PageContext>,
}

#[derive(Deserialize, Default)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PageContext {
    #[serde(default)]
    page_number: usize,
}

#[derive(Deserialize, Default, Debug)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl AnnotateFileResponse {
    /// Page texts of this window in page order. A page without an
    /// annotation (blank page) contributes an empty string.
    fn page_texts(self) -> Result<Vec<String>, MethodError> {
        if let Some(status) = self.error {
            return Err(MethodError::Failed(format!(
                "cloud OCR error {}: {}",
                status.code, status.message
            )));
        }
        let mut pages = self.responses;
        pages.sort_by_key(|p| p.context.as_ref().map(|c| c.page_number).unwrap_or(0));
        pages
            .into_iter()
            .map(|page| match page.error {
                Some(status) => Err(MethodError::Failed(format!(
                    "cloud OCR page error {}: {}",
                    status.code, status.message
                ))),
                None => Ok(page
                    .full_text_annotation
                    .map(|a| a.text)
                    .unwrap_or_default()),
            })
            .collect()
    }
}
