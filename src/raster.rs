use image::{Rgba as Pixel, RgbaImage};

use crate::overlay::{Rgba, Surface};

/// CPU drawing surface: an `RgbaImage` backing store plus a scale transform.
///
/// Colors are stored unpremultiplied and composited source-over.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    pixels: RgbaImage,
    css_size: (f32, f32),
    transform: (f32, f32),
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            css_size: (0.0, 0.0),
            transform: (1.0, 1.0),
        }
    }
}

impl RasterSurface {
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn css_size(&self) -> (f32, f32) {
        self.css_size
    }

    pub fn transform(&self) -> (f32, f32) {
        self.transform
    }

    pub fn backing_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn to_color_image(&self) -> egui::ColorImage {
        let size = [self.pixels.width() as usize, self.pixels.height() as usize];
        egui::ColorImage::from_rgba_unmultiplied(size, self.pixels.as_raw())
    }

    /// Composites the overlay onto `base`, which must match the backing size.
    pub fn composite_onto(&self, base: &mut RgbaImage) {
        if base.dimensions() != self.pixels.dimensions() {
            return;
        }
        for (dst, src) in base.pixels_mut().zip(self.pixels.pixels()) {
            blend(dst, src.0);
        }
    }

    fn to_device(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.transform.0, y * self.transform.1)
    }

    fn device_width(&self, line_width: f32) -> f32 {
        line_width * (self.transform.0 + self.transform.1) * 0.5
    }

    /// Paints every pixel whose center lies within `half` of any segment of
    /// the device-space polyline. Each pixel is blended at most once.
    fn stroke_device(&mut self, points: &[(f32, f32)], half: f32, color: Rgba) {
        let (w, h) = self.pixels.dimensions();
        if w == 0 || h == 0 || points.len() < 2 {
            return;
        }
        let min_x = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min) - half;
        let max_x = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max) + half;
        let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min) - half;
        let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max) + half;

        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(w);
        let y1 = (max_y.ceil().max(0.0) as u32).min(h);
        let half_sq = half * half;

        for py in y0..y1 {
            for px in x0..x1 {
                let center = (px as f32 + 0.5, py as f32 + 0.5);
                let hit = points
                    .windows(2)
                    .any(|seg| point_to_segment_dist_sq(center, seg[0], seg[1]) <= half_sq);
                if hit {
                    blend(self.pixels.get_pixel_mut(px, py), color.0);
                }
            }
        }
    }
}

impl Surface for RasterSurface {
    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
        self.transform = (1.0, 1.0);
    }

    fn set_css_size(&mut self, width: f32, height: f32) {
        self.css_size = (width, height);
    }

    fn set_transform(&mut self, sx: f32, sy: f32) {
        self.transform = (sx, sy);
    }

    fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Pixel([0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        let (bw, bh) = self.pixels.dimensions();
        let (dx0, dy0) = self.to_device(x, y);
        let (dx1, dy1) = self.to_device(x + w, y + h);
        let x0 = dx0.min(dx1).round().clamp(0.0, bw as f32) as u32;
        let x1 = dx0.max(dx1).round().clamp(0.0, bw as f32) as u32;
        let y0 = dy0.min(dy1).round().clamp(0.0, bh as f32) as u32;
        let y1 = dy0.max(dy1).round().clamp(0.0, bh as f32) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                blend(self.pixels.get_pixel_mut(px, py), color.0);
            }
        }
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba, line_width: f32) {
        let corners = [
            self.to_device(x, y),
            self.to_device(x + w, y),
            self.to_device(x + w, y + h),
            self.to_device(x, y + h),
            self.to_device(x, y),
        ];
        let half = (self.device_width(line_width) * 0.5).max(0.5);
        self.stroke_device(&corners, half, color);
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba, line_width: f32) {
        let device: Vec<(f32, f32)> = points.iter().map(|&(x, y)| self.to_device(x, y)).collect();
        let half = (self.device_width(line_width) * 0.5).max(0.5);
        self.stroke_device(&device, half, color);
    }
}

fn point_to_segment_dist_sq(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let ab = (b.0 - a.0, b.1 - a.1);
    let ap = (p.0 - a.0, p.1 - a.1);
    let len_sq = ab.0 * ab.0 + ab.1 * ab.1;
    let t = if len_sq > 0.0 {
        ((ap.0 * ab.0 + ap.1 * ab.1) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.0 + ab.0 * t - p.0;
    let cy = a.1 + ab.1 * t - p.1;
    cx * cx + cy * cy
}

/// Source-over on unpremultiplied RGBA.
fn blend(dst: &mut Pixel<u8>, src: [u8; 4]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    dst.0 = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Shape, UnitRect};
    use crate::overlay::{OverlayRenderer, OverlayScene, OverlayStyle};

    const RED: Rgba = Rgba::new(255, 0, 0, 255);

    fn alpha_at(surface: &RasterSurface, x: u32, y: u32) -> u8 {
        surface.pixels().get_pixel(x, y).0[3]
    }

    #[test]
    fn backing_store_follows_pixel_ratio() {
        let mut renderer = OverlayRenderer::default();
        let mut surface = RasterSurface::default();
        renderer.resize(&mut surface, 160.0, 90.0, 2.0, &OverlayScene::default());
        assert_eq!(surface.backing_size(), (320, 180));
        assert_eq!(surface.css_size(), (160.0, 90.0));
        assert_eq!(surface.transform(), (2.0, 2.0));
    }

    #[test]
    fn shapes_stay_aligned_after_resizing_twice() {
        let mut renderer = OverlayRenderer::new(OverlayStyle::default());
        let mut surface = RasterSurface::default();
        let shape = Shape::Rect(UnitRect {
            x: 0.25,
            y: 0.25,
            w: 0.5,
            h: 0.5,
        });
        let scene = OverlayScene {
            committed: vec![&shape],
            draft: None,
        };

        renderer.resize(&mut surface, 200.0, 100.0, 2.0, &scene);
        let first = surface.pixels().clone();
        renderer.resize(&mut surface, 200.0, 100.0, 2.0, &scene);

        assert_eq!(surface.transform(), (2.0, 2.0));
        assert_eq!(surface.pixels(), &first);
        // left edge of the rect: css x = 50 -> device x = 100
        assert_eq!(surface.pixels().get_pixel(100, 100).0, [255, 0, 0, 255]);
        assert_eq!(alpha_at(&surface, 20, 100), 0);
        assert_eq!(alpha_at(&surface, 399, 199), 0);
    }

    #[test]
    fn redraw_is_idempotent() {
        let mut renderer = OverlayRenderer::default();
        let mut surface = RasterSurface::default();
        let shape = Shape::Rect(UnitRect {
            x: 0.1,
            y: 0.1,
            w: 0.3,
            h: 0.3,
        });
        let scene = OverlayScene {
            committed: vec![&shape],
            draft: None,
        };
        renderer.resize(&mut surface, 100.0, 100.0, 1.0, &scene);
        let once = surface.pixels().clone();
        renderer.redraw(&mut surface, &scene);
        renderer.redraw(&mut surface, &scene);
        assert_eq!(surface.pixels(), &once);
    }

    #[test]
    fn fill_is_translucent_over_transparent_background() {
        let mut surface = RasterSurface::default();
        surface.set_backing_size(10, 10);
        surface.fill_rect(0.0, 0.0, 5.0, 5.0, Rgba::new(255, 0, 0, 26));
        assert_eq!(surface.pixels().get_pixel(2, 2).0, [255, 0, 0, 26]);
        assert_eq!(alpha_at(&surface, 7, 7), 0);
    }

    #[test]
    fn polyline_paints_along_its_path_only() {
        let mut surface = RasterSurface::default();
        surface.set_backing_size(20, 20);
        surface.stroke_polyline(&[(0.0, 10.0), (20.0, 10.0)], RED, 2.0);
        assert_eq!(alpha_at(&surface, 5, 9), 255);
        assert_eq!(alpha_at(&surface, 5, 10), 255);
        assert_eq!(alpha_at(&surface, 5, 2), 0);
        assert_eq!(alpha_at(&surface, 5, 17), 0);
    }

    #[test]
    fn composite_blends_overlay_onto_frame() {
        let mut surface = RasterSurface::default();
        surface.set_backing_size(4, 4);
        surface.fill_rect(0.0, 0.0, 2.0, 4.0, RED);
        let mut frame = RgbaImage::from_pixel(4, 4, Pixel([0, 0, 255, 255]));
        surface.composite_onto(&mut frame);
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(3, 0).0, [0, 0, 255, 255]);
    }
}
