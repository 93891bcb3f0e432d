//! Domain types for media synchronisation
//!
//! This module contains the data model organised by responsibility:
//! - `timeline`: timeline selectors and confirmed timelines
//! - `correlation`: correlation timestamps and drift tolerance
//! - `signal`: content-time signal and buffered ranges
//! - `media`: renderer handles and playback state enums
//! - `content`: content identification reported through the bridge

mod content;
mod correlation;
mod media;
mod signal;
mod timeline;

pub use content::{build_content_id, ContentIdStatus, ContentStatusReport, PresentationStatus};
pub use correlation::{CorrelationTimestamp, Tolerance};
pub use media::{MediaKind, PeriodInfo, PlayState, ReadyState, RendererId};
pub use signal::{ContentTimeSignal, TimeRanges};
pub use timeline::{Timeline, TimelineProperties, TimelineSelector};
