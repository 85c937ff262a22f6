use serde::{Deserialize, Serialize};

use crate::model::{Shape, UnitRect};

/// A point relative to the displayed video rectangle, both axes in `[0, 1]`.
///
/// Coordinates are clamped on construction and on deserialization, so a
/// `UnitPoint` never leaves the unit square.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPoint")]
pub struct UnitPoint {
    x: f32,
    y: f32,
}

#[derive(Deserialize)]
struct RawPoint {
    x: f32,
    y: f32,
}

impl From<RawPoint> for UnitPoint {
    fn from(raw: RawPoint) -> Self {
        UnitPoint::new(raw.x, raw.y)
    }
}

impl UnitPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    /// Squared distance in unit space.
    pub fn distance_sq(&self, other: UnitPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// On-screen rectangle of the displayed video, in CSS (logical) pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.left
            && py >= self.top
            && px <= self.left + self.width
            && py <= self.top + self.height
    }
}

impl From<egui::Rect> for DisplayRect {
    fn from(rect: egui::Rect) -> Self {
        Self::new(rect.min.x, rect.min.y, rect.width(), rect.height())
    }
}

/// Map a pointer position to unit space. Out-of-bounds input is clamped,
/// never rejected: drags routinely leave the element.
pub fn to_unit(px: f32, py: f32, rect: DisplayRect) -> UnitPoint {
    UnitPoint::new(
        axis_ratio(px - rect.left, rect.width),
        axis_ratio(py - rect.top, rect.height),
    )
}

fn axis_ratio(offset: f32, extent: f32) -> f32 {
    if extent <= 0.0 || !extent.is_finite() {
        return 0.0;
    }
    offset / extent
}

/// Rectangle spanned by a drag. The origin is always the minimum corner, so
/// the result does not depend on drag direction.
pub fn rect_from_drag(start: UnitPoint, current: UnitPoint) -> UnitRect {
    UnitRect {
        x: start.x.min(current.x),
        y: start.y.min(current.y),
        w: (current.x - start.x).abs(),
        h: (current.y - start.y).abs(),
    }
}

/// Geometry in display (CSS) pixels, ready for a drawing surface.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelShape {
    Rect { x: f32, y: f32, w: f32, h: f32 },
    Polyline(Vec<(f32, f32)>),
}

/// Scale a unit-space shape by the display size. Device pixel density is not
/// applied here; the surface transform owns it.
///
/// `Note` has no geometry and maps to `None`.
pub fn to_pixel_space(shape: &Shape, display_width: f32, display_height: f32) -> Option<PixelShape> {
    match shape {
        Shape::Rect(r) => Some(PixelShape::Rect {
            x: r.x * display_width,
            y: r.y * display_height,
            w: r.w * display_width,
            h: r.h * display_height,
        }),
        Shape::Freehand { points } => Some(PixelShape::Polyline(
            points
                .iter()
                .map(|p| (p.x * display_width, p.y * display_height))
                .collect(),
        )),
        Shape::Note => None,
    }
}
