use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::model::{
    Annotation, AnnotationId, AnnotationPatch, Bookmark, BookmarkId, BookmarkPatch, NewAnnotation,
    NewBookmark, VideoId,
};

use super::AnnotationApi;

const LOCAL_USER: i64 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    next_id: i64,
    annotations: Vec<Annotation>,
    bookmarks: Vec<Bookmark>,
}

impl StoreFile {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Single-user store kept in memory and, when opened from a path, mirrored
/// to a JSON file after every mutation.
///
/// Applies the same input checks as the REST service so both stores reject
/// the same requests.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Mutex<StoreFile>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreFile::default()),
        }
    }

    /// Opens (or starts) a store file. A missing or empty file is an empty
    /// store.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("read annotation store {}", path.display()))?;
            if data.trim().is_empty() {
                StoreFile::default()
            } else {
                serde_json::from_str(&data)
                    .with_context(|| format!("parse annotation store {}", path.display()))?
            }
        } else {
            StoreFile::default()
        };
        debug!(
            path = %path.display(),
            annotations = state.annotations.len(),
            bookmarks = state.bookmarks.len(),
            "opened local store"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// `clip.mp4` -> `clip.mp4.annotations.json`, next to the video.
    pub fn sidecar_path(video_path: &Path) -> PathBuf {
        let mut name = video_path.file_name().unwrap_or_default().to_os_string();
        name.push(".annotations.json");
        video_path.with_file_name(name)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, StoreFile>> {
        self.state
            .lock()
            .map_err(|_| ApiError::Transport("local store lock poisoned".into()))
    }

    fn persist(&self, state: &StoreFile) -> ApiResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(state).map_err(|e| ApiError::Decode(e.to_string()))?;
        std::fs::write(path, data).map_err(|e| {
            ApiError::Transport(format!("write {}: {e}", path.display()))
        })?;
        Ok(())
    }

    /// Runs `change` on a copy of the state, writes the copy, and only then
    /// makes it current. A failed write leaves the store as it was.
    fn mutate<R>(&self, change: impl FnOnce(&mut StoreFile) -> ApiResult<R>) -> ApiResult<R> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }
}

fn sorted_by_time<T: Clone>(items: &[T], timestamp: impl Fn(&T) -> f64) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_by(|a, b| timestamp(a).total_cmp(&timestamp(b)));
    out
}

fn checked_timestamp(t: f64, message: &str) -> ApiResult<f64> {
    if t.is_finite() {
        Ok(t)
    } else {
        Err(ApiError::bad_request(message))
    }
}

impl AnnotationApi for LocalStore {
    fn list_annotations(&self, video: VideoId) -> ApiResult<Vec<Annotation>> {
        let state = self.lock()?;
        let own: Vec<Annotation> = state
            .annotations
            .iter()
            .filter(|a| a.video_id == video)
            .cloned()
            .collect();
        Ok(sorted_by_time(&own, |a| a.timestamp))
    }

    fn create_annotation(&self, video: VideoId, new: &NewAnnotation) -> ApiResult<Annotation> {
        let timestamp = checked_timestamp(new.timestamp, "Timestamp is required")?;
        let description = new.description.trim();
        if description.is_empty() {
            return Err(ApiError::bad_request("Description is required"));
        }

        let annotation = self.mutate(|state| {
            let annotation = Annotation {
                id: AnnotationId(state.allocate_id()),
                video_id: video,
                timestamp,
                description: description.to_string(),
                shape: new.shape.clone(),
                created_by: Some(LOCAL_USER),
                created_at: Some(Utc::now()),
            };
            state.annotations.push(annotation.clone());
            Ok(annotation)
        })?;
        info!(id = annotation.id.0, timestamp, kind = annotation.shape.kind_label(), "annotation stored");
        Ok(annotation)
    }

    fn update_annotation(
        &self,
        video: VideoId,
        id: AnnotationId,
        patch: &AnnotationPatch,
    ) -> ApiResult<Annotation> {
        if patch.is_empty() {
            return Err(ApiError::bad_request("Nothing to update"));
        }
        self.mutate(|state| {
            let existing = state
                .annotations
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| ApiError::not_found("Annotation"))?;
            if existing.video_id != video {
                return Err(ApiError::bad_request("Annotation does not belong to this video"));
            }

            if let Some(t) = patch.timestamp {
                existing.timestamp = checked_timestamp(t, "Invalid timestamp")?;
            }
            if let Some(description) = &patch.description {
                let description = description.trim();
                if description.is_empty() {
                    return Err(ApiError::bad_request("Description is required"));
                }
                existing.description = description.to_string();
            }
            if let Some(shape) = &patch.shape {
                existing.shape = shape.clone();
            }
            Ok(existing.clone())
        })
    }

    fn delete_annotation(&self, video: VideoId, id: AnnotationId) -> ApiResult<()> {
        self.mutate(|state| {
            let index = state
                .annotations
                .iter()
                .position(|a| a.id == id)
                .ok_or_else(|| ApiError::not_found("Annotation"))?;
            if state.annotations[index].video_id != video {
                return Err(ApiError::bad_request("Annotation does not belong to this video"));
            }
            state.annotations.remove(index);
            Ok(())
        })
    }

    fn list_bookmarks(&self, video: VideoId) -> ApiResult<Vec<Bookmark>> {
        let state = self.lock()?;
        let own: Vec<Bookmark> = state
            .bookmarks
            .iter()
            .filter(|b| b.video_id == video)
            .cloned()
            .collect();
        Ok(sorted_by_time(&own, |b| b.timestamp))
    }

    fn create_bookmark(&self, video: VideoId, new: &NewBookmark) -> ApiResult<Bookmark> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(ApiError::bad_request("Title is required"));
        }
        let timestamp = checked_timestamp(new.timestamp, "Valid timestamp is required")?;

        self.mutate(|state| {
            let bookmark = Bookmark {
                id: BookmarkId(state.allocate_id()),
                video_id: video,
                timestamp,
                title: title.to_string(),
                created_by: Some(LOCAL_USER),
                created_at: Some(Utc::now()),
            };
            state.bookmarks.push(bookmark.clone());
            Ok(bookmark)
        })
    }

    fn update_bookmark(
        &self,
        video: VideoId,
        id: BookmarkId,
        patch: &BookmarkPatch,
    ) -> ApiResult<Bookmark> {
        self.mutate(|state| {
            let existing = state
                .bookmarks
                .iter_mut()
                .find(|b| b.id == id && b.video_id == video)
                .ok_or_else(|| ApiError::not_found("Bookmark"))?;

            // blank titles and non-numeric timestamps are ignored, not rejected
            if let Some(title) = patch.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                existing.title = title.to_string();
            }
            if let Some(t) = patch.timestamp.filter(|t| t.is_finite()) {
                existing.timestamp = t;
            }
            Ok(existing.clone())
        })
    }

    fn delete_bookmark(&self, video: VideoId, id: BookmarkId) -> ApiResult<()> {
        self.mutate(|state| {
            let index = state
                .bookmarks
                .iter()
                .position(|b| b.id == id && b.video_id == video)
                .ok_or_else(|| ApiError::not_found("Bookmark"))?;
            state.bookmarks.remove(index);
            Ok(())
        })
    }
}
