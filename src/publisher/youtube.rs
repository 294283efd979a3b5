//! YouTube Data API v3 client
//!
//! Uploads use the single-request `multipart/related` protocol: a JSON video
//! resource followed by the media bytes, streamed from disk. The access token
//! is obtained out of band and supplied through configuration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::America::Los_Angeles;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tokio_util::bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{PublishReceipt, Publisher, sniff_content_type};
use crate::config::PublisherConfig;
use crate::errors::PublishError;
use crate::models::{ItemMetadata, PrivacyStatus};

/// Error reasons that mean the daily allowance is used up
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "uploadLimitExceeded"];

/// Error reasons that clear up on their own within seconds
const RATE_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded", "backendError"];

/// "People & Blogs", required by the API when no category is given
const DEFAULT_CATEGORY_ID: &str = "22";

pub struct YouTubePublisher {
    client: Client,
    access_token: String,
    upload_base_url: Url,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

impl YouTubePublisher {
    pub fn new(config: &PublisherConfig) -> anyhow::Result<Self> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("publisher.access_token is not set"))?;

        let mut upload_base_url = Url::parse(&config.upload_base_url)?;
        // Url::join drops the last segment unless the base ends with '/'
        if !upload_base_url.path().ends_with('/') {
            let path = format!("{}/", upload_base_url.path());
            upload_base_url.set_path(&path);
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            access_token,
            upload_base_url,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, PublishError> {
        let mut url = self
            .upload_base_url
            .join(path)
            .map_err(|e| PublishError::validation(format!("Invalid endpoint {path}: {e}")))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn check_response(response: Response) -> Result<Response, PublishError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify_error_response(status, &body, Utc::now());
        warn!("YouTube API responded {}: {}", status, error);
        Err(error)
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn publish(
        &self,
        media_path: &Path,
        metadata: &ItemMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let url = self.endpoint(
            "videos",
            &[("uploadType", "multipart"), ("part", "snippet,status")],
        )?;

        let resource = video_resource(metadata);
        let content_type = sniff_content_type(media_path).await;
        let file = tokio::fs::File::open(media_path).await.map_err(|e| {
            PublishError::validation(format!("Cannot open {}: {e}", media_path.display()))
        })?;
        let file_len = file
            .metadata()
            .await
            .map_err(|e| {
                PublishError::validation(format!("Cannot stat {}: {e}", media_path.display()))
            })?
            .len();

        let boundary = format!("folder-publisher-{}", Uuid::new_v4().simple());
        let head = format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{resource}\r\n--{boundary}\r\nContent-Type: {content_type}\r\n\r\n"
        );
        let tail = format!("\r\n--{boundary}--\r\n");
        let content_length = head.len() as u64 + file_len + tail.len() as u64;

        info!(
            "Uploading {} ({} bytes, {}) as {:?}",
            media_path.display(),
            file_len,
            content_type,
            metadata.title
        );

        let body = futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(head)) })
            .chain(ReaderStream::new(file))
            .chain(futures::stream::once(async move {
                Ok::<_, std::io::Error>(Bytes::from(tail))
            }));

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .header(CONTENT_LENGTH, content_length)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_response(response).await?;
        let video: VideoResponse = response.json().await.map_err(|e| {
            // The upload went through; retrying would publish a duplicate
            PublishError::validation(format!("Unreadable upload response: {e}"))
        })?;

        info!("Video uploaded successfully: {}", video.id);
        Ok(PublishReceipt {
            external_id: video.id,
        })
    }

    async fn attach_thumbnail(
        &self,
        external_id: &str,
        thumbnail_path: &Path,
    ) -> Result<(), PublishError> {
        let url = self.endpoint(
            "thumbnails/set",
            &[("videoId", external_id), ("uploadType", "media")],
        )?;

        let content_type = sniff_content_type(thumbnail_path).await;
        let bytes = tokio::fs::read(thumbnail_path).await.map_err(|e| {
            PublishError::validation(format!("Cannot read {}: {e}", thumbnail_path.display()))
        })?;

        debug!(
            "Setting thumbnail {} ({} bytes) on {}",
            thumbnail_path.display(),
            bytes.len(),
            external_id
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_response(response).await?;
        info!("Thumbnail uploaded for {}", external_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

/// JSON video resource for the `snippet,status` parts
fn video_resource(metadata: &ItemMetadata) -> serde_json::Value {
    let mut privacy = metadata.privacy_status;
    if metadata.publish_at.is_some() && privacy != PrivacyStatus::Private {
        // Scheduled publication only works on private videos
        debug!("Forcing private status for scheduled video {:?}", metadata.title);
        privacy = PrivacyStatus::Private;
    }

    let mut status = json!({ "privacyStatus": privacy.as_ref() });
    if let Some(publish_at) = metadata.publish_at {
        status["publishAt"] = json!(publish_at.to_rfc3339());
    }

    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
            "categoryId": metadata.category_id.as_deref().unwrap_or(DEFAULT_CATEGORY_ID),
        },
        "status": status,
    })
}

/// Map a non-success API response onto the pipeline's error taxonomy
pub fn classify_error_response(status: StatusCode, body: &str, now: DateTime<Utc>) -> PublishError {
    let envelope: ApiErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let reasons: Vec<&str> = envelope
        .error
        .errors
        .iter()
        .filter_map(|e| e.reason.as_deref())
        .collect();
    let message = envelope
        .error
        .message
        .clone()
        .or_else(|| reasons.first().map(|r| r.to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    if reasons.iter().any(|r| QUOTA_REASONS.contains(r)) {
        return PublishError::QuotaExceeded {
            resume_at: next_quota_reset(now),
            message,
        };
    }

    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || reasons.iter().any(|r| RATE_REASONS.contains(r))
    {
        return PublishError::transient(Some(status.as_u16()), message);
    }

    PublishError::validation(format!("HTTP {}: {}", status.as_u16(), message))
}

/// Connection failures, timeouts and interrupted bodies are all retryable
fn transport_error(error: reqwest::Error) -> PublishError {
    PublishError::transient(error.status().map(|s| s.as_u16()), error.to_string())
}

/// The daily quota resets at midnight Pacific time
pub fn next_quota_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let pacific = now.with_timezone(&Los_Angeles);
    pacific
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Los_Angeles).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_quota_resets_at_pacific_midnight() {
        // 2025-07-01 20:00 UTC is 13:00 PDT; reset at 07-02 00:00 PDT = 07:00 UTC
        assert_eq!(next_quota_reset(at(2025, 7, 1, 20, 0)), at(2025, 7, 2, 7, 0));
        // 2025-01-15 09:00 UTC is 01:00 PST on the 15th; reset at 16th 08:00 UTC
        assert_eq!(next_quota_reset(at(2025, 1, 15, 9, 0)), at(2025, 1, 16, 8, 0));
    }

    #[test]
    fn test_quota_reason_maps_to_quota_exceeded() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"reason":"quotaExceeded","domain":"youtube.quota"}]}}"#;
        let now = at(2025, 7, 1, 20, 0);
        match classify_error_response(StatusCode::FORBIDDEN, body, now) {
            PublishError::QuotaExceeded { resume_at, message } => {
                assert_eq!(resume_at, next_quota_reset(now));
                assert!(message.contains("exceeded your quota"));
            }
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[rstest]
    #[case(503, "", true)]
    #[case(500, "<html>oops</html>", true)]
    #[case(429, "", true)]
    #[case(403, r#"{"error":{"errors":[{"reason":"rateLimitExceeded"}]}}"#, true)]
    #[case(400, r#"{"error":{"message":"Invalid title","errors":[{"reason":"invalidTitle"}]}}"#, false)]
    #[case(401, "", false)]
    fn test_classify_retryable(#[case] status: u16, #[case] body: &str, #[case] retryable: bool) {
        let status = StatusCode::from_u16(status).unwrap();
        let error = classify_error_response(status, body, Utc::now());
        assert_eq!(error.is_retryable(), retryable, "{error:?}");
    }

    #[test]
    fn test_video_resource_defaults() {
        let mut metadata = ItemMetadata::new("T", "D");
        metadata.tags = vec!["one".into()];
        let resource = video_resource(&metadata);

        assert_eq!(resource["snippet"]["title"], "T");
        assert_eq!(resource["snippet"]["tags"][0], "one");
        assert_eq!(resource["snippet"]["categoryId"], "22");
        assert_eq!(resource["status"]["privacyStatus"], "private");
        assert!(resource["status"].get("publishAt").is_none());
    }

    #[test]
    fn test_scheduled_video_is_private() {
        let mut metadata = ItemMetadata::new("T", "D");
        metadata.privacy_status = PrivacyStatus::Public;
        metadata.publish_at = Some(at(2025, 3, 1, 17, 0));
        let resource = video_resource(&metadata);

        assert_eq!(resource["status"]["privacyStatus"], "private");
        assert_eq!(resource["status"]["publishAt"], "2025-03-01T17:00:00+00:00");
    }
}
