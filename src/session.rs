use tracing::debug;

use crate::geometry::{rect_from_drag, UnitPoint};
use crate::model::{Shape, UnitRect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawMode {
    Rect,
    Freehand,
}

impl DrawMode {
    pub fn label(self) -> &'static str {
        match self {
            DrawMode::Rect => "Rectangle",
            DrawMode::Freehand => "Freehand",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawState {
    Idle,
    Armed(DrawMode),
    Dragging { mode: DrawMode, start: UnitPoint },
}

/// Interactive draw session: owns the uncommitted draft shape.
///
/// Every change to the draft bumps `revision`, which the overlay uses as a
/// redraw trigger and the commit path uses to tell whether the draft it
/// submitted is still the one on screen.
#[derive(Clone, Debug)]
pub struct DrawSession {
    state: DrawState,
    draft: Option<Shape>,
    revision: u64,
    min_spacing_sq: f32,
}

impl Default for DrawSession {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl DrawSession {
    /// `min_spacing` thins freehand capture: a move closer than this (unit
    /// space) to the last kept point is dropped. Zero keeps every move.
    pub fn new(min_spacing: f32) -> Self {
        let spacing = min_spacing.max(0.0);
        Self {
            state: DrawState::Idle,
            draft: None,
            revision: 0,
            min_spacing_sq: spacing * spacing,
        }
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn draft(&self) -> Option<&Shape> {
        self.draft.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_mode(&self) -> Option<DrawMode> {
        match self.state {
            DrawState::Idle => None,
            DrawState::Armed(mode) | DrawState::Dragging { mode, .. } => Some(mode),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DrawState::Dragging { .. })
    }

    /// Mode buttons behave as on/off switches: pressing the active mode
    /// disarms, pressing another one re-arms. The draft is dropped either way.
    pub fn toggle_mode(&mut self, mode: DrawMode) {
        self.state = if self.active_mode() == Some(mode) {
            DrawState::Idle
        } else {
            DrawState::Armed(mode)
        };
        self.set_draft(None);
        debug!(?mode, state = ?self.state, "draw mode toggled");
    }

    pub fn pointer_down(&mut self, p: UnitPoint) {
        let Some(mode) = self.active_mode() else {
            return;
        };
        let seed = match mode {
            DrawMode::Rect => Shape::Rect(UnitRect {
                x: p.x(),
                y: p.y(),
                w: 0.0,
                h: 0.0,
            }),
            DrawMode::Freehand => Shape::Freehand { points: vec![p] },
        };
        self.state = DrawState::Dragging { mode, start: p };
        self.set_draft(Some(seed));
    }

    pub fn pointer_move(&mut self, p: UnitPoint) {
        let DrawState::Dragging { mode, start } = self.state else {
            return;
        };
        match mode {
            DrawMode::Rect => self.set_draft(Some(Shape::Rect(rect_from_drag(start, p)))),
            DrawMode::Freehand => {
                let Some(Shape::Freehand { points }) = self.draft.as_mut() else {
                    return;
                };
                if let Some(last) = points.last() {
                    if self.min_spacing_sq > 0.0 && last.distance_sq(p) < self.min_spacing_sq {
                        return;
                    }
                }
                points.push(p);
                self.revision += 1;
            }
        }
    }

    /// Ends the drag but keeps the mode armed and the draft for commit.
    pub fn pointer_up(&mut self) {
        if let DrawState::Dragging { mode, .. } = self.state {
            self.state = DrawState::Armed(mode);
            debug!(?mode, "drag finished");
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Drops the draft and returns to `Idle`.
    pub fn clear(&mut self) {
        self.state = DrawState::Idle;
        self.set_draft(None);
    }

    /// Clears after a successful commit, unless the user has already started
    /// a different draft since the commit was issued.
    pub fn finish_commit(&mut self, committed_revision: u64) -> bool {
        if self.revision != committed_revision {
            debug!(committed_revision, current = self.revision, "draft changed during commit, keeping it");
            return false;
        }
        self.clear();
        true
    }

    /// The shape to persist: the draft if any, otherwise a `Note` marker.
    pub fn shape_for_commit(&self) -> Shape {
        self.draft.clone().unwrap_or(Shape::Note)
    }

    fn set_draft(&mut self, draft: Option<Shape>) {
        if self.draft.is_none() && draft.is_none() {
            return;
        }
        self.draft = draft;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> UnitPoint {
        UnitPoint::new(x, y)
    }

    #[test]
    fn toggling_same_mode_twice_returns_to_idle_and_clears_draft() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Freehand);
        assert_eq!(session.state(), DrawState::Armed(DrawMode::Freehand));

        session.pointer_down(p(0.1, 0.1));
        session.pointer_move(p(0.2, 0.2));
        assert!(session.draft().is_some());

        session.toggle_mode(DrawMode::Freehand);
        assert_eq!(session.state(), DrawState::Idle);
        assert!(session.draft().is_none());
    }

    #[test]
    fn switching_mode_rearms_and_drops_draft() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Rect);
        session.pointer_down(p(0.1, 0.1));
        session.pointer_up();

        session.toggle_mode(DrawMode::Freehand);
        assert_eq!(session.state(), DrawState::Armed(DrawMode::Freehand));
        assert!(session.draft().is_none());
    }

    #[test]
    fn pointer_down_while_idle_is_ignored() {
        let mut session = DrawSession::default();
        session.pointer_down(p(0.5, 0.5));
        session.pointer_move(p(0.6, 0.6));
        assert_eq!(session.state(), DrawState::Idle);
        assert!(session.draft().is_none());
    }

    #[test]
    fn rect_drag_replaces_rectangle_from_fixed_start() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Rect);
        session.pointer_down(p(0.6, 0.5));
        assert_eq!(
            session.draft(),
            Some(&Shape::Rect(UnitRect {
                x: 0.6,
                y: 0.5,
                w: 0.0,
                h: 0.0
            }))
        );

        session.pointer_move(p(0.9, 0.9));
        session.pointer_move(p(0.2, 0.2));
        let Some(Shape::Rect(r)) = session.draft() else {
            panic!("expected rect draft");
        };
        assert!((r.x - 0.2).abs() < 1e-6);
        assert!((r.y - 0.2).abs() < 1e-6);
        assert!((r.w - 0.4).abs() < 1e-6);
        assert!((r.h - 0.3).abs() < 1e-6);
    }

    #[test]
    fn freehand_drag_appends_points_in_order() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Freehand);
        session.pointer_down(p(0.1, 0.1));
        session.pointer_move(p(0.2, 0.1));
        session.pointer_move(p(0.2, 0.2));

        let Some(Shape::Freehand { points }) = session.draft() else {
            panic!("expected freehand draft");
        };
        assert_eq!(points, &vec![p(0.1, 0.1), p(0.2, 0.1), p(0.2, 0.2)]);
    }

    #[test]
    fn pointer_up_keeps_mode_armed_and_draft() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Rect);
        session.pointer_down(p(0.1, 0.1));
        session.pointer_move(p(0.3, 0.3));
        session.pointer_leave();

        assert_eq!(session.state(), DrawState::Armed(DrawMode::Rect));
        assert!(session.draft().is_some());

        // moves after the drag ended do not touch the draft
        let before = session.revision();
        session.pointer_move(p(0.9, 0.9));
        assert_eq!(session.revision(), before);
    }

    #[test]
    fn clear_discards_draft_and_disarms() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Rect);
        session.pointer_down(p(0.1, 0.1));
        session.clear();
        assert_eq!(session.state(), DrawState::Idle);
        assert_eq!(session.shape_for_commit(), Shape::Note);
    }

    #[test]
    fn finish_commit_keeps_a_newer_draft() {
        let mut session = DrawSession::default();
        session.toggle_mode(DrawMode::Rect);
        session.pointer_down(p(0.1, 0.1));
        session.pointer_up();
        let committed = session.revision();

        session.pointer_down(p(0.5, 0.5));
        session.pointer_move(p(0.7, 0.7));
        assert!(!session.finish_commit(committed));
        assert!(session.draft().is_some());

        let current = session.revision();
        assert!(session.finish_commit(current));
        assert!(session.draft().is_none());
        assert_eq!(session.state(), DrawState::Idle);
    }

    #[test]
    fn spacing_threshold_thins_dense_moves() {
        let mut session = DrawSession::new(0.05);
        session.toggle_mode(DrawMode::Freehand);
        session.pointer_down(p(0.1, 0.1));
        session.pointer_move(p(0.11, 0.1));
        session.pointer_move(p(0.12, 0.1));
        session.pointer_move(p(0.2, 0.1));

        let Some(Shape::Freehand { points }) = session.draft() else {
            panic!("expected freehand draft");
        };
        assert_eq!(points.len(), 2);
    }
}
