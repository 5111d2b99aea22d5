//! Media hosting through the ImageKit upload API.

use glimpse_core::{
    error::MediaHostError,
    media::{HostedMedia, MediaHost, MediaUpload},
};
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const UPLOAD_TAGS: &str = "backend-upload";

#[derive(Debug, Error)]
pub enum ImageKitError {
    #[error("Request to ImageKit failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ImageKit rejected the upload with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    name: String,
    url: String,
}

#[derive(Clone)]
pub struct ImageKitClient {
    http: Client,
    upload_url: String,
    private_key: String,
    folder: String,
}

impl std::fmt::Debug for ImageKitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageKitClient")
            .field("upload_url", &self.upload_url)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl ImageKitClient {
    #[must_use]
    pub fn new(http: Client, upload_url: String, private_key: String, folder: String) -> Self {
        Self {
            http,
            upload_url,
            private_key,
            folder,
        }
    }

    /// Uploads under a unique file name. The returned name is the one ImageKit picked.
    pub async fn upload_file(&self, upload: MediaUpload) -> Result<HostedMedia, ImageKitError> {
        let file = Part::bytes(upload.bytes).file_name(upload.file_name.clone());
        let form = Form::new()
            .part("file", file)
            .text("fileName", upload.file_name)
            .text("folder", self.folder.clone())
            .text("tags", UPLOAD_TAGS)
            .text("useUniqueFileName", "true");

        let response = self
            .http
            .post(&self.upload_url)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageKitError::Rejected { status, body });
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!(file_id = %uploaded.file_id, url = %uploaded.url, "Uploaded media");

        Ok(HostedMedia {
            url: uploaded.url,
            file_name: uploaded.name,
        })
    }
}

impl MediaHost for ImageKitClient {
    async fn upload(&self, upload: MediaUpload) -> Result<HostedMedia, MediaHostError> {
        self.upload_file(upload).await.map_err(MediaHostError::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::imagekit::{ImageKitClient, ImageKitError};
    use base64::{Engine, prelude::BASE64_STANDARD};
    use glimpse_core::media::{MediaHost, MediaUpload};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, method, path},
    };

    const UPLOAD_PATH: &str = "/api/v1/files/upload";

    fn client(server: &MockServer) -> ImageKitClient {
        ImageKitClient::new(
            reqwest::Client::new(),
            format!("{}{UPLOAD_PATH}", server.uri()),
            "private_key".to_owned(),
            "/uploads/".to_owned(),
        )
    }

    fn upload() -> MediaUpload {
        MediaUpload {
            // Body matchers only see bodies that are valid UTF-8.
            bytes: b"PNG-BYTES".to_vec(),
            file_name: "cat.png".to_owned(),
            content_type: "image/png".to_owned(),
        }
    }

    #[tokio::test]
    async fn upload_returns_hosted_media() {
        let server = MockServer::start().await;
        let credentials = BASE64_STANDARD.encode("private_key:");

        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(header("authorization", format!("Basic {credentials}").as_str()))
            .and(body_string_contains("useUniqueFileName"))
            .and(body_string_contains("/uploads/"))
            .and(body_string_contains("backend-upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fileId": "file_1",
                "name": "cat_Xy12.png",
                "url": "https://ik.imagekit.io/demo/uploads/cat_Xy12.png",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hosted = client(&server).upload(upload()).await.unwrap();

        assert_eq!(hosted.file_name, "cat_Xy12.png");
        assert_eq!(hosted.url, "https://ik.imagekit.io/demo/uploads/cat_Xy12.png");
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("Your account cannot be authenticated."))
            .mount(&server)
            .await;

        let result = client(&server).upload_file(upload()).await;

        assert!(matches!(
            result,
            Err(ImageKitError::Rejected { status, .. }) if status == reqwest::StatusCode::FORBIDDEN
        ));
    }

    #[tokio::test]
    async fn malformed_response_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
            .mount(&server)
            .await;

        assert!(client(&server).upload(upload()).await.is_err());
    }
}
