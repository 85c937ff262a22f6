use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{parse_timestamp, ApiError, ApiResult, ValidationError};
use crate::model::{
    Annotation, AnnotationId, AnnotationPatch, Bookmark, BookmarkId, BookmarkPatch, NewAnnotation,
    NewBookmark, VideoId,
};
use crate::overlay::OverlayScene;
use crate::session::DrawSession;
use crate::store::AnnotationApi;
use crate::visibility::{bookmarks_near, visible, VisibleSet};

/// Message shown to the user after an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// How store calls are executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// On the calling thread; completions are still delivered through `poll`.
    Inline,
    /// On one worker thread, in submission order.
    Background,
}

type Job = Box<dyn FnOnce() + Send>;

/// Runs store jobs. The worker executes them one at a time, so every
/// refresh sees all earlier mutations and completions arrive in order.
enum Executor {
    Inline,
    Worker(Sender<Job>),
}

impl Executor {
    fn start(dispatch: Dispatch) -> Self {
        if dispatch == Dispatch::Inline {
            return Executor::Inline;
        }
        let (tx, rx) = mpsc::channel::<Job>();
        let spawned = thread::Builder::new()
            .name("store-worker".into())
            .spawn(move || {
                // ends when the workspace drops its sender
                for job in rx {
                    job();
                }
            });
        match spawned {
            Ok(_) => Executor::Worker(tx),
            Err(err) => {
                warn!(error = %err, "could not start store worker, running requests inline");
                Executor::Inline
            }
        }
    }

    fn run(&self, job: Job) {
        match self {
            Executor::Inline => job(),
            Executor::Worker(tx) => {
                if let Err(mpsc::SendError(job)) = tx.send(job) {
                    warn!("store worker gone, running request inline");
                    job();
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Load,
    CreateAnnotation { draft_revision: u64 },
    UpdateAnnotation,
    DeleteAnnotation,
    CreateBookmark,
    UpdateBookmark,
    DeleteBookmark,
}

impl Op {
    fn success_message(self) -> Option<&'static str> {
        match self {
            Op::Load => None,
            Op::CreateAnnotation { .. } => Some("Annotation added"),
            Op::UpdateAnnotation => Some("Annotation updated"),
            Op::DeleteAnnotation => Some("Annotation deleted"),
            Op::CreateBookmark => Some("Bookmark added"),
            Op::UpdateBookmark => Some("Bookmark updated"),
            Op::DeleteBookmark => Some("Bookmark deleted"),
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Op::Load => "Failed to load data",
            Op::CreateAnnotation { .. } => "Failed to add annotation",
            Op::UpdateAnnotation => "Failed to update annotation",
            Op::DeleteAnnotation => "Failed to delete annotation",
            Op::CreateBookmark => "Failed to add bookmark",
            Op::UpdateBookmark => "Failed to update bookmark",
            Op::DeleteBookmark => "Failed to delete bookmark",
        }
    }
}

/// Which lists to fetch again after a successful mutation.
#[derive(Clone, Copy, Debug)]
enum Refresh {
    Annotations,
    Bookmarks,
    Both,
}

enum Listing {
    Annotations(Vec<Annotation>),
    Bookmarks(Vec<Bookmark>),
    Both(Vec<Annotation>, Vec<Bookmark>),
}

impl Refresh {
    fn fetch(self, api: &dyn AnnotationApi, video: VideoId) -> ApiResult<Listing> {
        Ok(match self {
            Refresh::Annotations => Listing::Annotations(api.list_annotations(video)?),
            Refresh::Bookmarks => Listing::Bookmarks(api.list_bookmarks(video)?),
            Refresh::Both => Listing::Both(api.list_annotations(video)?, api.list_bookmarks(video)?),
        })
    }
}

struct Completion {
    op: Op,
    mutation: ApiResult<()>,
    listing: Option<ApiResult<Listing>>,
}

/// Everything the video page knows about one video: the persisted lists, the
/// visible set for the current time, the draw session and the pending store
/// requests.
///
/// Single-threaded: all state changes happen on the caller's thread. Store
/// requests may run elsewhere and are folded back in by [`Workspace::poll`];
/// until then the stale lists and the current draft stay fully usable.
pub struct Workspace {
    video: VideoId,
    api: Arc<dyn AnnotationApi>,
    executor: Executor,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    in_flight: usize,

    annotations: Vec<Annotation>,
    bookmarks: Vec<Bookmark>,
    visible: VisibleSet,
    current_time: f64,
    revision: u64,

    session: DrawSession,
    notice: Option<Notice>,
    expired: bool,

    /// Form input for the next annotation.
    pub description: String,
    /// Form input for the next bookmark.
    pub bookmark_title: String,
}

impl Workspace {
    pub fn new(
        video: VideoId,
        api: Arc<dyn AnnotationApi>,
        dispatch: Dispatch,
        session: DrawSession,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            video,
            api,
            executor: Executor::start(dispatch),
            tx,
            rx,
            in_flight: 0,
            annotations: Vec::new(),
            bookmarks: Vec::new(),
            visible: VisibleSet::default(),
            current_time: 0.0,
            revision: 0,
            session,
            notice: None,
            expired: false,
            description: String::new(),
            bookmark_title: String::new(),
        }
    }

    pub fn video(&self) -> VideoId {
        self.video
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn bookmarks_near_now(&self) -> Vec<BookmarkId> {
        bookmarks_near(&self.bookmarks, self.current_time)
    }

    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn session(&self) -> &DrawSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DrawSession {
        &mut self.session
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Set once the store reports the credential is no longer valid.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Changes whenever anything the overlay draws may have changed.
    pub fn overlay_revision(&self) -> (u64, u64) {
        (self.revision, self.session.revision())
    }

    /// Visible committed shapes plus the draft, ready for the renderer.
    pub fn scene(&self) -> OverlayScene<'_> {
        OverlayScene {
            committed: self
                .visible
                .select(&self.annotations)
                .map(|a| &a.shape)
                .collect(),
            draft: self.session.draft(),
        }
    }

    /// Playback time tick: recomputes the visible set from scratch.
    pub fn on_time_update(&mut self, current_time: f64) {
        self.current_time = current_time;
        let next = visible(&self.annotations, current_time);
        if next != self.visible {
            debug!(time = current_time, visible = next.len(), "visible set changed");
            self.visible = next;
            self.revision += 1;
        }
    }

    /// Fetches both lists.
    pub fn reload(&mut self) -> Result<(), ValidationError> {
        self.ensure_active()?;
        self.submit(Op::Load, Refresh::Both, |_, _| Ok(()));
        Ok(())
    }

    /// Saves the current description with the draft (or a `Note`) at
    /// `current_time`. Nothing is sent when validation fails.
    pub fn commit_annotation(&mut self, current_time: f64) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return self.reject(ValidationError::EmptyDescription);
        }
        if !current_time.is_finite() || current_time < 0.0 {
            return self.reject(ValidationError::InvalidTimestamp(current_time.to_string()));
        }

        let new = NewAnnotation {
            timestamp: current_time,
            description,
            shape: self.session.shape_for_commit(),
        };
        let draft_revision = self.session.revision();
        info!(timestamp = current_time, kind = new.shape.kind_label(), "committing annotation");
        self.notice = None;
        self.submit(
            Op::CreateAnnotation { draft_revision },
            Refresh::Annotations,
            move |api, video| api.create_annotation(video, &new).map(|_| ()),
        );
        Ok(())
    }

    /// Replaces description and timestamp; the shape is carried over.
    pub fn update_annotation(
        &mut self,
        id: AnnotationId,
        description: &str,
        timestamp_text: &str,
    ) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let description = description.trim().to_string();
        if description.is_empty() {
            return self.reject(ValidationError::EmptyDescription);
        }
        let timestamp = match parse_timestamp(timestamp_text) {
            Ok(t) => t,
            Err(err) => return self.reject(err),
        };
        let patch = AnnotationPatch {
            description: Some(description),
            timestamp: Some(timestamp),
            shape: self.annotation(id).map(|a| a.shape.clone()),
        };
        self.notice = None;
        self.submit(Op::UpdateAnnotation, Refresh::Annotations, move |api, video| {
            api.update_annotation(video, id, &patch).map(|_| ())
        });
        Ok(())
    }

    pub fn delete_annotation(&mut self, id: AnnotationId) -> Result<(), ValidationError> {
        self.ensure_active()?;
        self.notice = None;
        self.submit(Op::DeleteAnnotation, Refresh::Annotations, move |api, video| {
            api.delete_annotation(video, id)
        });
        Ok(())
    }

    pub fn add_bookmark(&mut self, current_time: f64) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let title = self.bookmark_title.trim().to_string();
        if title.is_empty() {
            return self.reject(ValidationError::EmptyTitle);
        }
        if !current_time.is_finite() || current_time < 0.0 {
            return self.reject(ValidationError::InvalidTimestamp(current_time.to_string()));
        }
        let new = NewBookmark {
            title,
            timestamp: current_time,
        };
        self.notice = None;
        self.submit(Op::CreateBookmark, Refresh::Bookmarks, move |api, video| {
            api.create_bookmark(video, &new).map(|_| ())
        });
        Ok(())
    }

    pub fn update_bookmark(
        &mut self,
        id: BookmarkId,
        title: &str,
        timestamp_text: &str,
    ) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let title = title.trim().to_string();
        if title.is_empty() {
            return self.reject(ValidationError::EmptyTitle);
        }
        let timestamp = match parse_timestamp(timestamp_text) {
            Ok(t) => t,
            Err(err) => return self.reject(err),
        };
        let patch = BookmarkPatch {
            title: Some(title),
            timestamp: Some(timestamp),
        };
        self.notice = None;
        self.submit(Op::UpdateBookmark, Refresh::Bookmarks, move |api, video| {
            api.update_bookmark(video, id, &patch).map(|_| ())
        });
        Ok(())
    }

    pub fn delete_bookmark(&mut self, id: BookmarkId) -> Result<(), ValidationError> {
        self.ensure_active()?;
        self.notice = None;
        self.submit(Op::DeleteBookmark, Refresh::Bookmarks, move |api, video| {
            api.delete_bookmark(video, id)
        });
        Ok(())
    }

    /// Applies finished store requests. Returns whether any arrived.
    pub fn poll(&mut self) -> bool {
        let mut any = false;
        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.apply(completion);
            any = true;
        }
        any
    }

    /// Once the session has expired nothing more is sent.
    fn ensure_active(&mut self) -> Result<(), ValidationError> {
        if self.expired {
            return self.reject(ValidationError::SessionExpired);
        }
        Ok(())
    }

    fn reject(&mut self, err: ValidationError) -> Result<(), ValidationError> {
        debug!(error = %err, "input rejected");
        self.notice = Some(Notice::Error(err.to_string()));
        Err(err)
    }

    fn submit<F>(&mut self, op: Op, refresh: Refresh, mutation: F)
    where
        F: FnOnce(&dyn AnnotationApi, VideoId) -> ApiResult<()> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let video = self.video;
        let tx = self.tx.clone();
        let job = move || {
            let mutation = mutation(api.as_ref(), video);
            let listing = mutation.is_ok().then(|| refresh.fetch(api.as_ref(), video));
            // the receiver only goes away with the workspace
            let _ = tx.send(Completion {
                op,
                mutation,
                listing,
            });
        };
        self.in_flight += 1;
        debug!(?op, "store request queued");
        self.executor.run(Box::new(job));
    }

    fn apply(&mut self, completion: Completion) {
        let Completion {
            op,
            mutation,
            listing,
        } = completion;

        if let Err(err) = mutation {
            self.report_failure(op, err);
            return;
        }

        match op {
            Op::CreateAnnotation { draft_revision } => {
                self.description.clear();
                self.session.finish_commit(draft_revision);
            }
            Op::CreateBookmark => self.bookmark_title.clear(),
            _ => {}
        }
        if let Some(message) = op.success_message() {
            info!(?op, "store request succeeded");
            self.notice = Some(Notice::Info(message.to_string()));
        }

        match listing {
            Some(Ok(listing)) => self.apply_listing(listing),
            Some(Err(err)) => self.report_failure(op, err),
            None => {}
        }
    }

    fn apply_listing(&mut self, listing: Listing) {
        match listing {
            Listing::Annotations(annotations) => self.annotations = annotations,
            Listing::Bookmarks(bookmarks) => self.bookmarks = bookmarks,
            Listing::Both(annotations, bookmarks) => {
                self.annotations = annotations;
                self.bookmarks = bookmarks;
            }
        }
        self.visible = visible(&self.annotations, self.current_time);
        self.revision += 1;
    }

    fn report_failure(&mut self, op: Op, err: ApiError) {
        warn!(?op, error = %err, "store request failed");
        if err.is_unauthorized() {
            self.expired = true;
            self.notice = Some(Notice::Error(ValidationError::SessionExpired.to_string()));
            return;
        }
        let message = err.user_message().unwrap_or(op.failure_message());
        self.notice = Some(Notice::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::UnitPoint;
    use crate::model::{Shape, UnitRect};
    use crate::session::{DrawMode, DrawState};
    use crate::store::LocalStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const VIDEO: VideoId = VideoId(1);

    /// Wraps a `LocalStore`, counting calls and optionally failing the next
    /// mutation or stalling the next annotation listing after it was read.
    struct ScriptedApi {
        inner: LocalStore,
        calls: AtomicUsize,
        fail_next: Mutex<Option<ApiError>>,
        stall_next_list: Mutex<Option<Duration>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                inner: LocalStore::in_memory(),
                calls: AtomicUsize::new(0),
                fail_next: Mutex::new(None),
                stall_next_list: Mutex::new(None),
            }
        }

        fn stall_next_list(&self, delay: Duration) {
            *self.stall_next_list.lock().unwrap() = Some(delay);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail_next(&self, err: ApiError) {
            *self.fail_next.lock().unwrap() = Some(err);
        }

        fn mutation(&self) -> ApiResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_next.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl AnnotationApi for ScriptedApi {
        fn list_annotations(&self, video: VideoId) -> ApiResult<Vec<Annotation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let listed = self.inner.list_annotations(video);
            let stall = self.stall_next_list.lock().unwrap().take();
            if let Some(delay) = stall {
                std::thread::sleep(delay);
            }
            listed
        }
        fn create_annotation(&self, video: VideoId, new: &NewAnnotation) -> ApiResult<Annotation> {
            self.mutation()?;
            self.inner.create_annotation(video, new)
        }
        fn update_annotation(
            &self,
            video: VideoId,
            id: AnnotationId,
            patch: &AnnotationPatch,
        ) -> ApiResult<Annotation> {
            self.mutation()?;
            self.inner.update_annotation(video, id, patch)
        }
        fn delete_annotation(&self, video: VideoId, id: AnnotationId) -> ApiResult<()> {
            self.mutation()?;
            self.inner.delete_annotation(video, id)
        }
        fn list_bookmarks(&self, video: VideoId) -> ApiResult<Vec<Bookmark>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_bookmarks(video)
        }
        fn create_bookmark(&self, video: VideoId, new: &NewBookmark) -> ApiResult<Bookmark> {
            self.mutation()?;
            self.inner.create_bookmark(video, new)
        }
        fn update_bookmark(
            &self,
            video: VideoId,
            id: BookmarkId,
            patch: &BookmarkPatch,
        ) -> ApiResult<Bookmark> {
            self.mutation()?;
            self.inner.update_bookmark(video, id, patch)
        }
        fn delete_bookmark(&self, video: VideoId, id: BookmarkId) -> ApiResult<()> {
            self.mutation()?;
            self.inner.delete_bookmark(video, id)
        }
    }

    fn workspace() -> (Workspace, Arc<ScriptedApi>) {
        let api = Arc::new(ScriptedApi::new());
        let ws = Workspace::new(VIDEO, api.clone(), Dispatch::Inline, DrawSession::default());
        (ws, api)
    }

    fn draw_rect(ws: &mut Workspace, from: (f32, f32), to: (f32, f32)) {
        let session = ws.session_mut();
        if session.active_mode() != Some(DrawMode::Rect) {
            session.toggle_mode(DrawMode::Rect);
        }
        session.pointer_down(UnitPoint::new(from.0, from.1));
        session.pointer_move(UnitPoint::new(to.0, to.1));
        session.pointer_up();
    }

    #[test]
    fn empty_description_is_rejected_without_store_call() {
        let (mut ws, api) = workspace();
        ws.description = "   ".into();
        draw_rect(&mut ws, (0.1, 0.1), (0.2, 0.2));

        assert_eq!(ws.commit_annotation(3.0), Err(ValidationError::EmptyDescription));
        assert!(!ws.poll());
        assert_eq!(api.calls(), 0);
        assert_eq!(
            ws.notice(),
            Some(&Notice::Error("Annotation description required".into()))
        );
        assert!(ws.session().draft().is_some());
    }

    #[test]
    fn committed_rect_shows_up_when_playback_returns() {
        let (mut ws, _api) = workspace();
        draw_rect(&mut ws, (0.2, 0.2), (0.6, 0.5));
        ws.description = "Lesion".into();
        ws.commit_annotation(12.3).unwrap();
        assert!(ws.poll());

        assert_eq!(ws.notice(), Some(&Notice::Info("Annotation added".into())));
        assert!(ws.description.is_empty());
        assert_eq!(ws.session().state(), DrawState::Idle);
        assert!(ws.session().draft().is_none());

        let saved = ws.annotations()[0].clone();
        assert_eq!(saved.timestamp, 12.3);
        assert_eq!(saved.description, "Lesion");
        let Shape::Rect(UnitRect { x, y, w, h }) = saved.shape else {
            panic!("expected rect, got {:?}", saved.shape);
        };
        assert!((x - 0.2).abs() < 1e-6 && (y - 0.2).abs() < 1e-6);
        assert!((w - 0.4).abs() < 1e-6 && (h - 0.3).abs() < 1e-6);

        ws.on_time_update(40.0);
        assert!(ws.visible().is_empty());
        ws.on_time_update(12.3);
        assert!(ws.visible().contains(saved.id));
        assert_eq!(ws.scene().committed.len(), 1);
    }

    #[test]
    fn commit_without_draft_saves_a_note() {
        let (mut ws, _api) = workspace();
        ws.description = "just text".into();
        ws.commit_annotation(1.0).unwrap();
        ws.poll();
        assert_eq!(ws.annotations()[0].shape, Shape::Note);
    }

    #[test]
    fn failed_commit_keeps_draft_and_reports_service_message() {
        let (mut ws, api) = workspace();
        draw_rect(&mut ws, (0.1, 0.1), (0.3, 0.3));
        ws.description = "retry me".into();
        api.fail_next(ApiError::bad_request("Video not found"));

        ws.commit_annotation(2.0).unwrap();
        ws.poll();

        assert_eq!(ws.notice(), Some(&Notice::Error("Video not found".into())));
        assert!(ws.session().draft().is_some());
        assert_eq!(ws.description, "retry me");
        assert!(ws.annotations().is_empty());

        api.fail_next(ApiError::Transport("connection refused".into()));
        ws.commit_annotation(2.0).unwrap();
        ws.poll();
        assert_eq!(ws.notice(), Some(&Notice::Error("Failed to add annotation".into())));
    }

    #[test]
    fn unauthorized_marks_workspace_expired_and_stops_requests() {
        let (mut ws, api) = workspace();
        ws.description = "x".into();
        api.fail_next(ApiError::Unauthorized);
        ws.commit_annotation(1.0).unwrap();
        ws.poll();
        assert!(ws.is_expired());

        let before = api.calls();
        assert_eq!(ws.reload(), Err(ValidationError::SessionExpired));
        assert_eq!(ws.commit_annotation(2.0), Err(ValidationError::SessionExpired));
        ws.bookmark_title = "later".into();
        assert_eq!(ws.add_bookmark(2.0), Err(ValidationError::SessionExpired));
        assert_eq!(
            ws.delete_annotation(AnnotationId(1)),
            Err(ValidationError::SessionExpired)
        );
        assert!(!ws.poll());
        assert!(!ws.is_busy());
        assert_eq!(api.calls(), before);
        assert_eq!(
            ws.notice(),
            Some(&Notice::Error("Session expired, sign in again".into()))
        );
    }

    #[test]
    fn new_draft_started_during_commit_survives_completion() {
        let (mut ws, _api) = workspace();
        draw_rect(&mut ws, (0.1, 0.1), (0.3, 0.3));
        ws.description = "first".into();
        ws.commit_annotation(5.0).unwrap();

        // the completion is queued but not yet applied
        draw_rect(&mut ws, (0.5, 0.5), (0.9, 0.9));
        ws.poll();

        assert_eq!(ws.annotations().len(), 1);
        let Some(Shape::Rect(r)) = ws.session().draft() else {
            panic!("new draft should be kept");
        };
        assert!((r.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn edit_validates_and_carries_shape_over() {
        let (mut ws, api) = workspace();
        draw_rect(&mut ws, (0.1, 0.1), (0.3, 0.3));
        ws.description = "before".into();
        ws.commit_annotation(5.0).unwrap();
        ws.poll();
        let id = ws.annotations()[0].id;
        let shape = ws.annotations()[0].shape.clone();

        let calls = api.calls();
        assert!(ws.update_annotation(id, "after", "soon").is_err());
        assert_eq!(ws.notice(), Some(&Notice::Error("Invalid timestamp".into())));
        assert!(ws.update_annotation(id, "  ", "3").is_err());
        assert_eq!(api.calls(), calls);

        ws.update_annotation(id, "after", "7.25").unwrap();
        ws.poll();
        let updated = &ws.annotations()[0];
        assert_eq!(updated.description, "after");
        assert_eq!(updated.timestamp, 7.25);
        assert_eq!(updated.shape, shape);
        assert_eq!(ws.notice(), Some(&Notice::Info("Annotation updated".into())));
    }

    #[test]
    fn delete_refreshes_list_and_visible_set() {
        let (mut ws, _api) = workspace();
        ws.description = "gone soon".into();
        ws.commit_annotation(1.0).unwrap();
        ws.poll();
        ws.on_time_update(1.0);
        let id = ws.annotations()[0].id;
        assert!(ws.visible().contains(id));

        let before = ws.overlay_revision();
        ws.delete_annotation(id).unwrap();
        ws.poll();
        assert!(ws.annotations().is_empty());
        assert!(ws.visible().is_empty());
        assert_ne!(ws.overlay_revision(), before);
    }

    #[test]
    fn bookmarks_round_trip_through_the_store() {
        let (mut ws, _api) = workspace();
        assert_eq!(ws.add_bookmark(1.0), Err(ValidationError::EmptyTitle));

        ws.bookmark_title = "intro".into();
        ws.add_bookmark(4.0).unwrap();
        ws.poll();
        assert!(ws.bookmark_title.is_empty());
        let id = ws.bookmarks()[0].id;

        ws.update_bookmark(id, "opening", "4.5").unwrap();
        ws.poll();
        assert_eq!(ws.bookmarks()[0].title, "opening");

        ws.on_time_update(4.8);
        assert_eq!(ws.bookmarks_near_now(), vec![id]);

        ws.delete_bookmark(id).unwrap();
        ws.poll();
        assert!(ws.bookmarks().is_empty());
        assert_eq!(ws.notice(), Some(&Notice::Info("Bookmark deleted".into())));
    }

    #[test]
    fn background_dispatch_delivers_through_poll() {
        let api = Arc::new(ScriptedApi::new());
        let mut ws = Workspace::new(VIDEO, api, Dispatch::Background, DrawSession::default());
        ws.description = "async".into();
        ws.commit_annotation(0.5).unwrap();
        assert!(ws.is_busy());

        for _ in 0..200 {
            if ws.poll() && !ws.is_busy() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(!ws.is_busy());
        assert_eq!(ws.annotations().len(), 1);
    }

    fn poll_until_idle(ws: &mut Workspace) {
        for _ in 0..400 {
            ws.poll();
            if !ws.is_busy() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("store requests did not finish");
    }

    #[test]
    fn slow_refresh_does_not_overwrite_a_newer_listing() {
        let api = Arc::new(ScriptedApi::new());
        api.stall_next_list(Duration::from_millis(300));
        let mut ws = Workspace::new(VIDEO, api.clone(), Dispatch::Background, DrawSession::default());

        ws.description = "first".into();
        ws.commit_annotation(1.0).unwrap();
        ws.description = "second".into();
        ws.commit_annotation(2.0).unwrap();
        poll_until_idle(&mut ws);

        assert_eq!(api.inner.list_annotations(VIDEO).unwrap().len(), 2);
        let names: Vec<&str> = ws.annotations().iter().map(|a| a.description.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        ws.on_time_update(2.0);
        assert_eq!(ws.visible().len(), 1);
        assert!(ws.visible().contains(ws.annotations()[1].id));
    }

    #[test]
    fn degenerate_drafts_are_saved_and_visible_but_draw_nothing() {
        use crate::overlay::OverlayRenderer;
        use crate::raster::RasterSurface;

        let (mut ws, api) = workspace();

        // a click without movement: one-point freehand
        let session = ws.session_mut();
        session.toggle_mode(DrawMode::Freehand);
        session.pointer_down(UnitPoint::new(0.4, 0.4));
        session.pointer_up();
        ws.description = "dot".into();
        ws.commit_annotation(3.0).unwrap();
        ws.poll();

        // a zero-width rectangle
        draw_rect(&mut ws, (0.5, 0.1), (0.5, 0.6));
        ws.description = "line".into();
        ws.commit_annotation(3.2).unwrap();
        ws.poll();

        let stored = api.inner.list_annotations(VIDEO).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(matches!(&stored[0].shape, Shape::Freehand { points } if points.len() == 1));
        assert!(matches!(stored[1].shape, Shape::Rect(UnitRect { w, .. }) if w == 0.0));

        ws.on_time_update(3.1);
        assert!(ws.visible().contains(stored[0].id));
        assert!(ws.visible().contains(stored[1].id));

        let mut renderer = OverlayRenderer::default();
        let mut surface = RasterSurface::default();
        renderer.resize(&mut surface, 100.0, 80.0, 1.0, &ws.scene());
        assert_eq!(ws.scene().committed.len(), 2);
        assert!(surface.pixels().pixels().all(|p| p.0[3] == 0));
    }
}
