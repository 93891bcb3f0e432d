// crates/sync-engine/src/renderer.rs
//! Renderer seam
//!
//! The engine never owns a renderer. It refers to them through
//! `RendererId` handles into a table kept by the embedding host, reads their
//! state as `RendererSnapshot`s, hears their lifecycle through an
//! `EventBus<RendererEvent>`, and drives them through `PlaybackControl`.

use crate::error::SyncResult;
use crate::event::EventBus;
use mediasync_core::{
    ContentTimeSignal, MediaErrorKind, MediaKind, PeriodInfo, PlayState, ReadyState, RendererId,
    TimeRanges,
};
use std::rc::Rc;

/// Lifecycle notifications a renderer emits
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    Seeked,
    Play,
    Pause,
    Abort,
    Ended,
    RateChange,
    Error,
    Stalled,
    Waiting,
    /// Broadcast presentation state changed
    PlayStateChanged(PlayState),
    /// The set of enabled audio tracks changed
    AudioTracksChanged,
    /// A DASH stream moved to another period
    PeriodChanged { period_id: String },
    /// A DASH manifest was refreshed
    StreamUpdated,
}

impl RendererEvent {
    /// Returns true for the events a media element observer listens to
    pub fn is_playback_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Seeked
                | Self::Play
                | Self::Pause
                | Self::Abort
                | Self::Ended
                | Self::RateChange
                | Self::Error
                | Self::Stalled
                | Self::Waiting
        )
    }
}

/// What a renderer is playing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaSource {
    pub src: String,
    /// Current DASH period, if the source is a DASH stream
    pub current_period: Option<PeriodInfo>,
    /// Every period of the current manifest
    pub periods: Vec<PeriodInfo>,
    /// MPD-level content-identifier ancillary data
    pub ci_ancillary: Option<String>,
    /// Material resolution server URL
    pub mrs_url: Option<String>,
}

/// Point-in-time view of a renderer's state
#[derive(Debug, Clone, PartialEq)]
pub struct RendererSnapshot {
    pub kind: MediaKind,
    pub current_time: f64,
    pub playback_rate: f64,
    pub paused: bool,
    pub ended: bool,
    /// NaN when unknown, infinite for live streams
    pub duration: f64,
    pub ready_state: ReadyState,
    pub buffered: TimeRanges,
    pub error: Option<MediaErrorKind>,
    pub muted: bool,
    /// True when one of the renderer's own audio tracks is enabled
    pub audio_track_enabled: bool,
    pub play_state: PlayState,
    pub source: MediaSource,
}

impl RendererSnapshot {
    /// A paused media element with enough data at position zero
    pub fn element(src: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Element,
            current_time: 0.0,
            playback_rate: 1.0,
            paused: true,
            ended: false,
            duration: f64::NAN,
            ready_state: ReadyState::HaveEnoughData,
            buffered: TimeRanges::new(),
            error: None,
            muted: false,
            audio_track_enabled: false,
            play_state: PlayState::Presenting,
            source: MediaSource {
                src: src.into(),
                ..MediaSource::default()
            },
        }
    }

    /// A presenting broadcast
    pub fn broadcast() -> Self {
        Self {
            kind: MediaKind::Broadcast,
            paused: false,
            ..Self::element("")
        }
    }

    pub fn playing(mut self) -> Self {
        self.paused = false;
        self
    }

    pub fn at(mut self, current_time: f64) -> Self {
        self.current_time = current_time;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_ready_state(mut self, ready_state: ReadyState) -> Self {
        self.ready_state = ready_state;
        self
    }

    pub fn with_buffered(mut self, buffered: impl Into<TimeRanges>) -> Self {
        self.buffered = buffered.into();
        self
    }

    pub fn with_error(mut self, error: MediaErrorKind) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_play_state(mut self, play_state: PlayState) -> Self {
        self.play_state = play_state;
        self
    }

    /// Sets the current DASH period and adds it to the known periods
    pub fn with_period(mut self, period: PeriodInfo) -> Self {
        if !self.source.periods.contains(&period) {
            self.source.periods.push(period.clone());
        }
        self.source.current_period = Some(period);
        self
    }

    pub fn with_mrs_url(mut self, url: impl Into<String>) -> Self {
        self.source.mrs_url = Some(url.into());
        self
    }

    /// Timeline signal derived from this state
    pub fn content_signal(&self) -> ContentTimeSignal {
        ContentTimeSignal::from_playback(
            self.current_time,
            self.playback_rate,
            self.paused,
            self.ended,
        )
    }
}

/// Control surface of a renderer
///
/// Hosts hand out the renderer's native implementation. While a slave is
/// attached to a session its control is replaced by a decorator, so every
/// caller going through the host sees the intercepted surface.
pub trait PlaybackControl {
    fn play(&self);
    fn pause(&self);
    fn seek(&self, time: f64);
    /// Requests a playback rate; returns the rate the renderer applied
    fn set_playback_rate(&self, rate: f64) -> f64;
}

/// Renderer table owned by the embedding host
pub trait RendererHost {
    fn snapshot(&self, id: RendererId) -> SyncResult<RendererSnapshot>;

    /// Control surface currently installed for the renderer
    fn control(&self, id: RendererId) -> SyncResult<Rc<dyn PlaybackControl>>;

    /// Installs a new control surface, returning the previous one
    fn replace_control(
        &self,
        id: RendererId,
        control: Rc<dyn PlaybackControl>,
    ) -> SyncResult<Rc<dyn PlaybackControl>>;

    fn set_muted(&self, id: RendererId, muted: bool) -> SyncResult<()>;

    fn events(&self, id: RendererId) -> SyncResult<Rc<EventBus<RendererEvent>>>;

    /// Marks the renderer as attached to (or released from) a session
    fn set_sync_attached(&self, id: RendererId, attached: bool) -> SyncResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_defaults() {
        let snapshot = RendererSnapshot::element("http://a/b.mp4");
        assert_eq!(snapshot.kind, MediaKind::Element);
        assert!(snapshot.paused);
        assert!(snapshot.duration.is_nan());
        assert!(snapshot.ready_state.has_current_data());
        assert_eq!(snapshot.source.src, "http://a/b.mp4");
    }

    #[test]
    fn test_broadcast_defaults() {
        let snapshot = RendererSnapshot::broadcast();
        assert!(snapshot.kind.is_broadcast());
        assert_eq!(snapshot.play_state, PlayState::Presenting);
    }

    #[test]
    fn test_content_signal() {
        let snapshot = RendererSnapshot::element("x").at(4.0).with_rate(2.0).playing();
        assert_eq!(snapshot.content_signal(), ContentTimeSignal::new(4.0, 2.0));

        let paused = RendererSnapshot::element("x").at(4.0);
        assert!(paused.content_signal().is_stopped());
    }

    #[test]
    fn test_with_period_tracks_known_periods() {
        let snapshot = RendererSnapshot::element("x")
            .with_period(PeriodInfo::new("p1"))
            .with_period(PeriodInfo::new("p2"));
        assert_eq!(snapshot.source.periods.len(), 2);
        assert_eq!(snapshot.source.current_period, Some(PeriodInfo::new("p2")));
    }

    #[test]
    fn test_lifecycle_events() {
        assert!(RendererEvent::Seeked.is_playback_lifecycle());
        assert!(RendererEvent::Error.is_playback_lifecycle());
        assert!(!RendererEvent::AudioTracksChanged.is_playback_lifecycle());
        assert!(!RendererEvent::PlayStateChanged(PlayState::Stopped).is_playback_lifecycle());
    }
}
