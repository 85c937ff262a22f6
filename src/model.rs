use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::UnitPoint;

// ── Ids ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub i64);

// ── Shapes ──────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in unit space; `x, y` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Spatial mark attached to an annotation.
///
/// Wire form is `{"type": "rect" | "freehand" | "note", ...}`. Unknown kinds
/// decode as `Note` so foreign marks never break a listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rect(UnitRect),
    Freehand { points: Vec<UnitPoint> },
    #[default]
    #[serde(other)]
    Note,
}

impl Shape {
    /// Whether the shape leaves any mark on the overlay. Degenerate shapes
    /// are still valid annotations, they just draw nothing.
    pub fn is_drawable(&self) -> bool {
        match self {
            Shape::Rect(r) => r.w > 0.0 && r.h > 0.0,
            Shape::Freehand { points } => points.len() >= 2,
            Shape::Note => false,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Shape::Rect(_) => "rect",
            Shape::Freehand { .. } => "freehand",
            Shape::Note => "note",
        }
    }
}

fn shape_or_note<'de, D>(deserializer: D) -> Result<Shape, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Shape>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Persisted records ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub video_id: VideoId,
    pub timestamp: f64,
    pub description: String,
    #[serde(rename = "dataJson", default, deserialize_with = "shape_or_note")]
    pub shape: Shape,
    #[serde(rename = "createdById", default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: BookmarkId,
    pub video_id: VideoId,
    pub timestamp: f64,
    pub title: String,
    #[serde(rename = "createdById", default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ── Requests ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub timestamp: f64,
    pub description: String,
    #[serde(rename = "dataJson")]
    pub shape: Shape,
}

/// Partial update; absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(rename = "dataJson", skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.timestamp.is_none() && self.shape.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub timestamp: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// `m:ss`, seconds floored.
pub fn format_time(seconds: f64) -> String {
    let s = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", s / 60, s % 60)
}
