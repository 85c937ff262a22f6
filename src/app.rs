use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use image::{DynamicImage, RgbaImage};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::geometry::{to_unit, DisplayRect};
use crate::model::{format_time, AnnotationId, BookmarkId, VideoId};
use crate::overlay::OverlayRenderer;
use crate::playback::{ClockPlayer, PlaybackController, PlaybackEvent, VideoElement};
use crate::raster::RasterSurface;
use crate::session::{DrawMode, DrawSession};
use crate::store::AnnotationApi;
use crate::workspace::{Dispatch, Notice, Workspace};

const MAX_VIDEO_WIDTH: f32 = 1000.0;
const MAX_VIDEO_HEIGHT: f32 = 520.0;
const DEFAULT_FRAME_SIZE: (u32, u32) = (1280, 720);

pub struct AppOptions {
    pub title: String,
    pub video: VideoId,
    pub api: Arc<dyn AnnotationApi>,
    pub settings: Settings,
    pub poster: Option<PathBuf>,
    pub duration: f64,
    pub frame_size: Option<(u32, u32)>,
}

enum EditDialog {
    Annotation {
        id: AnnotationId,
        description: String,
        timestamp: String,
    },
    Bookmark {
        id: BookmarkId,
        title: String,
        timestamp: String,
    },
}

enum ListAction {
    Seek(f64),
    EditAnnotation(AnnotationId),
    DeleteAnnotation(AnnotationId),
    EditBookmark(BookmarkId),
    DeleteBookmark(BookmarkId),
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct VideoAnnotateApp {
    title: String,
    workspace: Workspace,
    playback: PlaybackController<ClockPlayer>,

    renderer: OverlayRenderer,
    surface: RasterSurface,
    overlay_texture: Option<egui::TextureHandle>,
    drawn_revision: Option<(u64, u64)>,
    metadata_pending: bool,

    poster: Option<DynamicImage>,
    poster_texture: Option<egui::TextureHandle>,

    edit: Option<EditDialog>,
}

impl VideoAnnotateApp {
    pub fn new(options: AppOptions) -> Self {
        let poster = options.poster.as_deref().and_then(load_poster);
        let frame_size = poster
            .as_ref()
            .map(|img| (img.width(), img.height()))
            .or(options.frame_size)
            .unwrap_or(DEFAULT_FRAME_SIZE);

        let session = DrawSession::new(options.settings.freehand_min_spacing);
        let mut workspace = Workspace::new(options.video, options.api, Dispatch::Background, session);
        // a fresh workspace is never expired
        let _ = workspace.reload();

        Self {
            title: options.title,
            workspace,
            playback: PlaybackController::new(ClockPlayer::new(options.duration, frame_size)),
            renderer: OverlayRenderer::new(options.settings.overlay_style()),
            surface: RasterSurface::default(),
            overlay_texture: None,
            drawn_revision: None,
            metadata_pending: false,
            poster,
            poster_texture: None,
            edit: None,
        }
    }

    fn ensure_poster_texture(&mut self, ctx: &egui::Context) {
        if self.poster_texture.is_some() {
            return;
        }
        if let Some(ref img) = self.poster {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.poster_texture =
                Some(ctx.load_texture("poster", color_image, egui::TextureOptions::LINEAR));
        }
    }

    fn pump_playback(&mut self, ctx: &egui::Context) {
        let dt = ctx.input(|i| i.stable_dt) as f64;
        for event in self.playback.poll(dt) {
            match event {
                PlaybackEvent::MetadataLoaded {
                    width,
                    height,
                    duration,
                } => {
                    info!(width, height, duration, "video metadata loaded");
                    self.metadata_pending = true;
                }
                PlaybackEvent::TimeUpdate(t) => self.workspace.on_time_update(t),
            }
        }
        if self.playback.video().is_playing() {
            ctx.request_repaint();
        }
        if self.workspace.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    /// Video rectangle inside `available`, keeping the frame's aspect ratio.
    fn display_size(&self, available: egui::Vec2) -> egui::Vec2 {
        let (fw, fh) = self
            .playback
            .video()
            .intrinsic_size()
            .unwrap_or(DEFAULT_FRAME_SIZE);
        let aspect = if fw > 0 && fh > 0 { fh as f32 / fw as f32 } else { 9.0 / 16.0 };
        let mut width = available.x.min(MAX_VIDEO_WIDTH).max(0.0);
        let mut height = width * aspect;
        let max_height = available.y.min(MAX_VIDEO_HEIGHT).max(0.0);
        if height > max_height {
            height = max_height;
            width = height / aspect;
        }
        egui::vec2(width, height)
    }

    /// Resize or redraw the overlay when its inputs changed, then upload.
    fn sync_overlay(&mut self, ctx: &egui::Context, size: egui::Vec2) {
        let ratio = ctx.pixels_per_point();
        let revision = self.workspace.overlay_revision();
        let scene = self.workspace.scene();

        if self.metadata_pending || self.renderer.needs_resize(size.x, size.y, ratio) {
            self.renderer
                .resize(&mut self.surface, size.x, size.y, ratio, &scene);
            self.metadata_pending = false;
        } else if self.drawn_revision == Some(revision) {
            return;
        } else {
            self.renderer.redraw(&mut self.surface, &scene);
        }
        self.drawn_revision = Some(revision);

        let (w, h) = self.surface.backing_size();
        if w == 0 || h == 0 {
            return;
        }
        let image = self.surface.to_color_image();
        match self.overlay_texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.overlay_texture =
                    Some(ctx.load_texture("overlay", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, response: &egui::Response, display: DisplayRect) {
        let session = self.workspace.session_mut();
        if session.active_mode().is_none() {
            return;
        }
        if response.hovered() {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        if response.drag_started_by(egui::PointerButton::Primary) {
            // egui reports the drag a few pixels late; anchor at the press
            let origin = ctx.input(|i| i.pointer.press_origin());
            if let Some(pos) = origin.or(response.interact_pointer_pos()) {
                session.pointer_down(to_unit(pos.x, pos.y, display));
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) && session.is_dragging() {
            let (latest, moved) =
                ctx.input(|i| (i.pointer.latest_pos(), i.pointer.delta() != egui::Vec2::ZERO));
            if let Some(pos) = latest {
                if !display.contains(pos.x, pos.y) {
                    session.pointer_leave();
                } else if moved {
                    session.pointer_move(to_unit(pos.x, pos.y, display));
                }
            }
        }

        if response.drag_stopped_by(egui::PointerButton::Primary) {
            session.pointer_up();
        }
    }

    fn export_overlay(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("overlay.png")
            .save_file()
        else {
            return;
        };
        match self.write_overlay_png(&path) {
            Ok(()) => {
                info!(path = %path.display(), "overlay exported");
                self.workspace
                    .notify(Notice::Info(format!("Exported to {}", path.display())));
            }
            Err(err) => {
                error!(error = %err, "overlay export failed");
                self.workspace
                    .notify(Notice::Error(format!("Export failed: {err}")));
            }
        }
    }

    /// Current overlay composited over the poster frame (or black), at the
    /// overlay's backing resolution.
    fn write_overlay_png(&self, path: &Path) -> image::ImageResult<()> {
        let (w, h) = self.surface.backing_size();
        let mut frame: RgbaImage = match &self.poster {
            Some(poster) => image::imageops::resize(
                &poster.to_rgba8(),
                w,
                h,
                image::imageops::FilterType::Triangle,
            ),
            None => RgbaImage::from_pixel(w, h, image::Rgba([0, 0, 0, 255])),
        };
        self.surface.composite_onto(&mut frame);
        frame.save(path)
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let playing = self.playback.video().is_playing();
            if ui.button(if playing { "Pause" } else { "Play" }).clicked() {
                self.playback.toggle_play();
            }

            let duration = self.playback.video().duration().unwrap_or(0.0);
            let mut t = self.playback.current_time();
            let slider = ui.add(egui::Slider::new(&mut t, 0.0..=duration).show_value(false));
            if slider.changed() {
                self.playback.seek(t);
            }
            ui.label(format!(
                "{} / {}",
                format_time(self.playback.current_time()),
                format_time(duration)
            ));

            ui.separator();
            let active = self.workspace.session().active_mode();
            for mode in [DrawMode::Freehand, DrawMode::Rect] {
                let on = active == Some(mode);
                let label = if on {
                    format!("Stop {}", mode.label())
                } else {
                    format!("Draw {}", mode.label())
                };
                if ui.selectable_label(on, label).clicked() {
                    self.workspace.session_mut().toggle_mode(mode);
                }
            }
            if ui.button("Clear Draft").clicked() {
                self.workspace.session_mut().clear();
            }

            ui.separator();
            if ui.button("Export Overlay").clicked() {
                self.export_overlay();
            }
            if self.workspace.is_busy() {
                ui.spinner();
            }
        });

        let mut dismiss = false;
        if let Some(notice) = self.workspace.notice() {
            ui.horizontal(|ui| {
                match notice {
                    Notice::Info(msg) => ui.colored_label(egui::Color32::from_rgb(80, 200, 120), msg),
                    Notice::Error(msg) => ui.colored_label(egui::Color32::from_rgb(230, 80, 80), msg),
                };
                dismiss = ui.small_button("x").clicked();
            });
        }
        if dismiss {
            self.workspace.dismiss_notice();
        }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        let mut actions = Vec::new();
        let now = self.playback.current_time();

        ui.heading("Annotations");
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.workspace.description)
                    .hint_text("Annotation description"),
            );
            if ui.button("Save").clicked() {
                let _ = self.workspace.commit_annotation(now);
            }
        });
        ui.weak(format!("Saves at current video time: {}", format_time(now)));

        egui::ScrollArea::vertical()
            .id_salt("annotations")
            .max_height(ui.available_height() * 0.5)
            .show(ui, |ui| {
                for a in self.workspace.annotations() {
                    let visible = self.workspace.visible().contains(a.id);
                    ui.horizontal(|ui| {
                        let text = egui::RichText::new(format!(
                            "{} ({})",
                            a.description,
                            format_time(a.timestamp)
                        ));
                        let text = if visible { text.strong() } else { text };
                        if ui.link(text).clicked() {
                            actions.push(ListAction::Seek(a.timestamp));
                        }
                        if ui.small_button("Edit").clicked() {
                            actions.push(ListAction::EditAnnotation(a.id));
                        }
                        if ui.small_button("Delete").clicked() {
                            actions.push(ListAction::DeleteAnnotation(a.id));
                        }
                    });
                }
            });
        ui.weak("Drawings appear automatically when playback reaches the timestamp.");

        ui.separator();
        ui.heading("Bookmarks");
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.workspace.bookmark_title)
                    .hint_text("Bookmark title"),
            );
            if ui.button("Add").clicked() {
                let _ = self.workspace.add_bookmark(now);
            }
        });

        let near = self.workspace.bookmarks_near_now();
        egui::ScrollArea::vertical()
            .id_salt("bookmarks")
            .show(ui, |ui| {
                for b in self.workspace.bookmarks() {
                    ui.horizontal(|ui| {
                        let text =
                            egui::RichText::new(format!("{} ({})", b.title, format_time(b.timestamp)));
                        let text = if near.contains(&b.id) { text.strong() } else { text };
                        if ui.link(text).clicked() {
                            actions.push(ListAction::Seek(b.timestamp));
                        }
                        if ui.small_button("Edit").clicked() {
                            actions.push(ListAction::EditBookmark(b.id));
                        }
                        if ui.small_button("Delete").clicked() {
                            actions.push(ListAction::DeleteBookmark(b.id));
                        }
                    });
                }
            });

        for action in actions {
            self.apply_list_action(action);
        }
    }

    fn apply_list_action(&mut self, action: ListAction) {
        match action {
            ListAction::Seek(t) => self.playback.seek(t),
            ListAction::EditAnnotation(id) => {
                if let Some(a) = self.workspace.annotation(id) {
                    self.edit = Some(EditDialog::Annotation {
                        id,
                        description: a.description.clone(),
                        timestamp: a.timestamp.to_string(),
                    });
                }
            }
            ListAction::DeleteAnnotation(id) => {
                let _ = self.workspace.delete_annotation(id);
            }
            ListAction::EditBookmark(id) => {
                if let Some(b) = self.workspace.bookmarks().iter().find(|b| b.id == id) {
                    self.edit = Some(EditDialog::Bookmark {
                        id,
                        title: b.title.clone(),
                        timestamp: b.timestamp.to_string(),
                    });
                }
            }
            ListAction::DeleteBookmark(id) => {
                let _ = self.workspace.delete_bookmark(id);
            }
        }
    }

    fn edit_window(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.edit.take() else {
            return;
        };
        let mut keep_open = true;
        let mut submit = false;
        let heading = match dialog {
            EditDialog::Annotation { .. } => "Edit annotation",
            EditDialog::Bookmark { .. } => "Edit bookmark",
        };

        egui::Window::new(heading)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                match &mut dialog {
                    EditDialog::Annotation {
                        description,
                        timestamp,
                        ..
                    } => {
                        ui.label("Description");
                        ui.text_edit_singleline(description);
                        ui.label("Timestamp (seconds)");
                        ui.text_edit_singleline(timestamp);
                    }
                    EditDialog::Bookmark {
                        title, timestamp, ..
                    } => {
                        ui.label("Title");
                        ui.text_edit_singleline(title);
                        ui.label("Timestamp (seconds)");
                        ui.text_edit_singleline(timestamp);
                    }
                }
                ui.horizontal(|ui| {
                    submit = ui.button("Save").clicked();
                    if ui.button("Cancel").clicked() {
                        keep_open = false;
                    }
                });
            });

        if submit {
            let result = match &dialog {
                EditDialog::Annotation {
                    id,
                    description,
                    timestamp,
                } => self.workspace.update_annotation(*id, description, timestamp),
                EditDialog::Bookmark {
                    id,
                    title,
                    timestamp,
                } => self.workspace.update_bookmark(*id, title, timestamp),
            };
            if result.is_ok() {
                keep_open = false;
            }
        }
        if keep_open {
            self.edit = Some(dialog);
        }
    }
}

fn full_uv() -> egui::Rect {
    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0))
}

fn load_poster(path: &Path) -> Option<DynamicImage> {
    match image::open(path) {
        Ok(img) => Some(img),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not load poster frame");
            None
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for VideoAnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.workspace.poll();
        self.pump_playback(ctx);
        self.ensure_poster_texture(ctx);

        if self.workspace.is_expired() {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.heading("Session expired");
                ui.label("Your credentials are no longer accepted. Restart with a fresh token.");
            });
            return;
        }

        // Keyboard shortcuts
        if !ctx.wants_keyboard_input() {
            let (escape, space) =
                ctx.input(|i| (i.key_pressed(egui::Key::Escape), i.key_pressed(egui::Key::Space)));
            if escape {
                self.workspace.session_mut().clear();
            }
            if space {
                self.playback.toggle_play();
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.label(egui::RichText::new(&self.title).strong());
            self.toolbar(ui);
        });

        egui::SidePanel::right("lists")
            .default_width(340.0)
            .show(ctx, |ui| self.side_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let size = self.display_size(ui.available_size());
            let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
            let painter = ui.painter_at(rect);

            // Video frame
            match &self.poster_texture {
                Some(tex) => {
                    painter.image(tex.id(), rect, full_uv(), egui::Color32::WHITE);
                }
                None => {
                    painter.rect_filled(rect, 0.0, egui::Color32::from_gray(20));
                }
            }

            self.handle_pointer(ctx, &response, DisplayRect::from(rect));
            self.sync_overlay(ctx, rect.size());

            if let Some(tex) = &self.overlay_texture {
                painter.image(tex.id(), rect, full_uv(), egui::Color32::WHITE);
            }

            ui.add_space(8.0);
            ui.weak("Tip: pause at a moment → draw → type description → Save");
        });

        self.edit_window(ctx);
    }
}
