//! Persistence collaborators for annotations and bookmarks.
//!
//! The overlay engine only talks to [`AnnotationApi`]; every call is fallible
//! and is never retried.

mod http;
mod local;

pub use http::HttpStore;
pub use local::LocalStore;

use crate::error::ApiResult;
use crate::model::{
    Annotation, AnnotationId, AnnotationPatch, Bookmark, BookmarkId, BookmarkPatch, NewAnnotation,
    NewBookmark, VideoId,
};

pub trait AnnotationApi: Send + Sync {
    /// All annotations of a video, ordered by timestamp.
    fn list_annotations(&self, video: VideoId) -> ApiResult<Vec<Annotation>>;
    fn create_annotation(&self, video: VideoId, new: &NewAnnotation) -> ApiResult<Annotation>;
    fn update_annotation(
        &self,
        video: VideoId,
        id: AnnotationId,
        patch: &AnnotationPatch,
    ) -> ApiResult<Annotation>;
    fn delete_annotation(&self, video: VideoId, id: AnnotationId) -> ApiResult<()>;

    /// All bookmarks of a video, ordered by timestamp.
    fn list_bookmarks(&self, video: VideoId) -> ApiResult<Vec<Bookmark>>;
    fn create_bookmark(&self, video: VideoId, new: &NewBookmark) -> ApiResult<Bookmark>;
    fn update_bookmark(
        &self,
        video: VideoId,
        id: BookmarkId,
        patch: &BookmarkPatch,
    ) -> ApiResult<Bookmark>;
    fn delete_bookmark(&self, video: VideoId, id: BookmarkId) -> ApiResult<()>;
}
