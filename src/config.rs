use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::overlay::{OverlayStyle, Rgba, ShapeStyle};

pub const SETTINGS_FILE_NAME: &str = "annotate_video.json";

/// User settings. Every field has a default, so partial files are fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the annotation service; without it a local JSON store
    /// is used.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub store_path: Option<PathBuf>,
    pub debug_logging: bool,
    /// Minimum distance (unit space) between captured freehand points.
    /// Zero records every pointer move.
    pub freehand_min_spacing: f32,
    pub line_width: f32,
    pub committed_color: Rgba,
    pub committed_fill: Option<Rgba>,
    pub draft_color: Rgba,
    pub draft_fill: Option<Rgba>,
}

impl Default for Settings {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            api_url: None,
            api_token: None,
            store_path: None,
            debug_logging: false,
            freehand_min_spacing: 0.0,
            line_width: style.committed.line_width,
            committed_color: style.committed.stroke,
            committed_fill: style.committed.fill,
            draft_color: style.draft.stroke,
            draft_fill: style.draft.fill,
        }
    }
}

impl Settings {
    pub fn overlay_style(&self) -> OverlayStyle {
        let line_width = if self.line_width > 0.0 { self.line_width } else { 3.0 };
        OverlayStyle {
            committed: ShapeStyle {
                stroke: self.committed_color,
                fill: self.committed_fill,
                line_width,
            },
            draft: ShapeStyle {
                stroke: self.draft_color,
                fill: self.draft_fill,
                line_width,
            },
        }
    }

    /// Missing or empty file yields defaults; malformed JSON is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("deserialize settings file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("write settings file {}", path.display()))
    }
}
