use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{to_pixel_space, PixelShape};
use crate::model::Shape;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub fn to_egui(self) -> egui::Color32 {
        let [r, g, b, a] = self.0;
        egui::Color32::from_rgba_unmultiplied(r, g, b, a)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeStyle {
    pub stroke: Rgba,
    pub fill: Option<Rgba>,
    /// Stroke width in CSS pixels.
    pub line_width: f32,
}

/// Committed marks and the in-progress draft are drawn in distinct styles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub committed: ShapeStyle,
    pub draft: ShapeStyle,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            committed: ShapeStyle {
                stroke: Rgba::new(255, 0, 0, 255),
                fill: Some(Rgba::new(255, 0, 0, 26)),
                line_width: 3.0,
            },
            draft: ShapeStyle {
                stroke: Rgba::new(0, 255, 0, 255),
                fill: Some(Rgba::new(0, 255, 0, 26)),
                line_width: 3.0,
            },
        }
    }
}

/// A 2D drawing target with a backing store distinct from its CSS size.
///
/// Drawing calls take CSS-pixel coordinates and are mapped to the backing
/// store through the current scale transform.
pub trait Surface {
    /// Reallocates the backing store. Content is lost and the transform
    /// returns to identity.
    fn set_backing_size(&mut self, width: u32, height: u32);
    fn set_css_size(&mut self, width: f32, height: f32);
    /// Replaces the current transform with a pure scale.
    fn set_transform(&mut self, sx: f32, sy: f32);
    /// Clears the whole backing store, independent of the transform.
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba);
    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba, line_width: f32);
    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba, line_width: f32);
}

/// Everything one repaint needs.
#[derive(Clone, Debug, Default)]
pub struct OverlayScene<'a> {
    pub committed: Vec<&'a Shape>,
    pub draft: Option<&'a Shape>,
}

/// Keeps a `Surface` aligned with the displayed video rectangle and repaints
/// it from an `OverlayScene`.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    style: OverlayStyle,
    css_size: (f32, f32),
    pixel_ratio: f32,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            css_size: (0.0, 0.0),
            pixel_ratio: 1.0,
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn css_size(&self) -> (f32, f32) {
        self.css_size
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Whether a wrapper of this size and density would need a resize.
    pub fn needs_resize(&self, width: f32, height: f32, pixel_ratio: f32) -> bool {
        self.css_size != (width, height) || self.pixel_ratio != pixel_ratio
    }

    /// Aligns the surface with a wrapper of `width` x `height` CSS pixels at
    /// `pixel_ratio`, then repaints.
    ///
    /// Order matters: backing store, CSS size, then a reset of the transform
    /// to the device ratio. The transform is replaced, never multiplied, so
    /// repeated resizes cannot compound the scale.
    pub fn resize<S: Surface>(
        &mut self,
        surface: &mut S,
        width: f32,
        height: f32,
        pixel_ratio: f32,
        scene: &OverlayScene<'_>,
    ) {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let width = width.max(0.0);
        let height = height.max(0.0);
        let backing_w = (width * ratio).round() as u32;
        let backing_h = (height * ratio).round() as u32;

        surface.set_backing_size(backing_w, backing_h);
        surface.set_css_size(width, height);
        surface.set_transform(ratio, ratio);

        self.css_size = (width, height);
        self.pixel_ratio = ratio;
        trace!(width, height, ratio, backing_w, backing_h, "overlay resized");

        self.redraw(surface, scene);
    }

    /// Full repaint: clear, committed shapes, then the draft on top.
    /// Idempotent for unchanged input.
    pub fn redraw<S: Surface>(&self, surface: &mut S, scene: &OverlayScene<'_>) {
        surface.clear();
        for shape in &scene.committed {
            self.draw_shape(surface, shape, &self.style.committed);
        }
        if let Some(draft) = scene.draft {
            self.draw_shape(surface, draft, &self.style.draft);
        }
    }

    fn draw_shape<S: Surface>(&self, surface: &mut S, shape: &Shape, style: &ShapeStyle) {
        if !shape.is_drawable() {
            return;
        }
        let (w, h) = self.css_size;
        match to_pixel_space(shape, w, h) {
            Some(PixelShape::Rect { x, y, w, h }) => {
                surface.stroke_rect(x, y, w, h, style.stroke, style.line_width);
                if let Some(fill) = style.fill {
                    surface.fill_rect(x, y, w, h, fill);
                }
            }
            Some(PixelShape::Polyline(points)) => {
                surface.stroke_polyline(&points, style.stroke, style.line_width);
            }
            None => {}
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}
