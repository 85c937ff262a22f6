use tracing::debug;

/// The player the overlay sits on top of.
pub trait VideoElement {
    fn current_time(&self) -> f64;
    /// Sets the playhead; implementations clamp to their valid range.
    fn set_current_time(&mut self, seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    /// Known once metadata has loaded.
    fn duration(&self) -> Option<f64>;
    /// Intrinsic frame size, known once metadata has loaded.
    fn intrinsic_size(&self) -> Option<(u32, u32)>;
    /// Advances playback by `dt` seconds of wall time.
    fn advance(&mut self, dt: f64);
}

/// A frame-less player driven by the UI clock. It knows duration and frame
/// size and moves the playhead; decoding pictures is left to whatever draws
/// the frame underneath.
#[derive(Clone, Debug)]
pub struct ClockPlayer {
    time: f64,
    duration: f64,
    size: (u32, u32),
    playing: bool,
}

impl ClockPlayer {
    pub fn new(duration: f64, size: (u32, u32)) -> Self {
        Self {
            time: 0.0,
            duration: duration.max(0.0),
            size,
            playing: false,
        }
    }
}

impl VideoElement for ClockPlayer {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, seconds: f64) {
        let t = if seconds.is_finite() { seconds } else { 0.0 };
        self.time = t.clamp(0.0, self.duration);
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        Some(self.size)
    }

    fn advance(&mut self, dt: f64) {
        if !self.playing || dt <= 0.0 {
            return;
        }
        self.time = (self.time + dt).min(self.duration);
        if self.time >= self.duration {
            self.playing = false;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    MetadataLoaded { width: u32, height: u32, duration: f64 },
    TimeUpdate(f64),
}

/// Thin wrapper over a `VideoElement` that turns its state into events.
#[derive(Debug)]
pub struct PlaybackController<V> {
    video: V,
    metadata_sent: bool,
    last_time: Option<f64>,
}

impl<V: VideoElement> PlaybackController<V> {
    pub fn new(video: V) -> Self {
        Self {
            video,
            metadata_sent: false,
            last_time: None,
        }
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn current_time(&self) -> f64 {
        self.video.current_time()
    }

    /// Seeks (the element clamps) and resumes playback.
    pub fn seek(&mut self, seconds: f64) {
        self.video.set_current_time(seconds);
        self.video.play();
        debug!(requested = seconds, now = self.video.current_time(), "seek");
    }

    pub fn toggle_play(&mut self) {
        if self.video.is_playing() {
            self.video.pause();
        } else {
            self.video.play();
        }
    }

    /// Advances the element and reports what changed since the last poll.
    pub fn poll(&mut self, dt: f64) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if !self.metadata_sent {
            if let (Some((width, height)), Some(duration)) =
                (self.video.intrinsic_size(), self.video.duration())
            {
                self.metadata_sent = true;
                events.push(PlaybackEvent::MetadataLoaded {
                    width,
                    height,
                    duration,
                });
            }
        }

        self.video.advance(dt);
        let now = self.video.current_time();
        if self.last_time != Some(now) {
            self.last_time = Some(now);
            events.push(PlaybackEvent::TimeUpdate(now));
        }
        events
    }
}
