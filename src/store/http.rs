use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::model::{
    Annotation, AnnotationId, AnnotationPatch, Bookmark, BookmarkId, BookmarkPatch, NewAnnotation,
    NewBookmark, VideoId,
};

use super::AnnotationApi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for the annotation service.
///
/// Routes: `/videos/{video}/annotations[/{id}]` and
/// `/videos/{video}/bookmarks[/{id}]`, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("annotate-video/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let err = error_from_response(status.as_u16(), &body);
        warn!(status = status.as_u16(), error = %err, "annotation service rejected request");
        Err(err)
    }

    fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.send(request)?
            .json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn annotations_path(video: VideoId) -> String {
        format!("/videos/{}/annotations", video.0)
    }

    fn bookmarks_path(video: VideoId) -> String {
        format!("/videos/{}/bookmarks", video.0)
    }
}

pub(crate) fn error_from_response(status: u16, body: &str) -> ApiError {
    if status == 401 {
        return ApiError::Unauthorized;
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_default();
    ApiError::status(status, message)
}

impl AnnotationApi for HttpStore {
    fn list_annotations(&self, video: VideoId) -> ApiResult<Vec<Annotation>> {
        debug!(video = video.0, "GET annotations");
        self.json(self.client.get(self.url(&Self::annotations_path(video))))
    }

    fn create_annotation(&self, video: VideoId, new: &NewAnnotation) -> ApiResult<Annotation> {
        debug!(video = video.0, timestamp = new.timestamp, "POST annotation");
        self.json(
            self.client
                .post(self.url(&Self::annotations_path(video)))
                .json(new),
        )
    }

    fn update_annotation(
        &self,
        video: VideoId,
        id: AnnotationId,
        patch: &AnnotationPatch,
    ) -> ApiResult<Annotation> {
        debug!(video = video.0, id = id.0, "PATCH annotation");
        let path = format!("{}/{}", Self::annotations_path(video), id.0);
        self.json(self.client.patch(self.url(&path)).json(patch))
    }

    fn delete_annotation(&self, video: VideoId, id: AnnotationId) -> ApiResult<()> {
        debug!(video = video.0, id = id.0, "DELETE annotation");
        let path = format!("{}/{}", Self::annotations_path(video), id.0);
        self.send(self.client.delete(self.url(&path))).map(|_| ())
    }

    fn list_bookmarks(&self, video: VideoId) -> ApiResult<Vec<Bookmark>> {
        debug!(video = video.0, "GET bookmarks");
        self.json(self.client.get(self.url(&Self::bookmarks_path(video))))
    }

    fn create_bookmark(&self, video: VideoId, new: &NewBookmark) -> ApiResult<Bookmark> {
        debug!(video = video.0, timestamp = new.timestamp, "POST bookmark");
        self.json(
            self.client
                .post(self.url(&Self::bookmarks_path(video)))
                .json(new),
        )
    }

    fn update_bookmark(
        &self,
        video: VideoId,
        id: BookmarkId,
        patch: &BookmarkPatch,
    ) -> ApiResult<Bookmark> {
        debug!(video = video.0, id = id.0, "PATCH bookmark");
        let path = format!("{}/{}", Self::bookmarks_path(video), id.0);
        self.json(self.client.patch(self.url(&path)).json(patch))
    }

    fn delete_bookmark(&self, video: VideoId, id: BookmarkId) -> ApiResult<()> {
        debug!(video = video.0, id = id.0, "DELETE bookmark");
        let path = format!("{}/{}", Self::bookmarks_path(video), id.0);
        self.send(self.client.delete(self.url(&path))).map(|_| ())
    }
}
