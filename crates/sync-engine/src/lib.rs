// crates/sync-engine/src/lib.rs
//! Media timeline synchronisation engine
//!
//! Keeps any number of slave renderers aligned to a master renderer's
//! timeline:
//! - `MasterObserver` turns the master into a content-time signal
//! - `CorrectionClient` seeks or re-rates each slave that drifts
//! - `MediaSynchroniser` ties them together and reports to the timeline bridge
//!
//! Everything runs on one cooperative thread. Renderers live in the
//! embedder's `RendererHost`; the engine only holds `RendererId` handles.
//!
//! # Example
//!
//! ```rust
//! use mediasync_engine::{
//!     AddOptions, LoopbackBridge, MediaSynchroniser, RendererSnapshot, RendererTable,
//!     Scheduler, SyncContext, SynchronizerRegistry,
//! };
//! use std::rc::Rc;
//!
//! let table = Rc::new(RendererTable::new());
//! let bridge = Rc::new(LoopbackBridge::new());
//! let ctx = SyncContext {
//!     registry: Rc::new(SynchronizerRegistry::new()),
//!     bridge: bridge.clone(),
//!     host: table.clone(),
//!     scheduler: Rc::new(Scheduler::new()),
//!     config: Default::default(),
//! };
//!
//! let master = table.insert(RendererSnapshot::element("master.mp4").playing());
//! let slave = table.insert(RendererSnapshot::element("slave.mp4"));
//!
//! let session = MediaSynchroniser::new(ctx);
//! session.init_media_synchroniser(master, "urn:dvb:css:timeline:pts").unwrap();
//! session
//!     .add_media_object(slave, "urn:dvb:css:timeline:pts", AddOptions::default())
//!     .unwrap();
//! bridge.flush();
//!
//! assert_eq!(session.nr_of_slaves(), Some(1));
//! ```

pub mod bridge;
mod client;
mod control;
mod error;
mod event;
mod host;
mod observer;
mod period;
mod registry;
mod renderer;
mod scheduler;
mod session;

pub use bridge::{BridgeCall, BridgeEvent, BridgeSessionId, LoopbackBridge, TimelineBridge};
pub use client::{ClientContext, ClientEvent, ClientOptions, CorrectionClient};
pub use control::SyncedControl;
pub use error::{SyncError, SyncResult};
pub use event::{EventBus, SubscriptionHandle};
pub use host::{ControlCall, RendererTable};
pub use observer::{MasterObserver, ObserverEvent};
pub use period::{diff_periods, PeriodDelta, PeriodTracker, PeriodTransition};
pub use registry::{SessionKey, Supersedable, SynchronizerRegistry};
pub use renderer::{MediaSource, PlaybackControl, RendererEvent, RendererHost, RendererSnapshot};
pub use scheduler::{Scheduler, TimerHandle};
pub use session::{AddOptions, InterDeviceCallback, MediaSynchroniser, SessionEvent, SyncContext};

pub use mediasync_core::{
    ContentTimeSignal, CorrelationTimestamp, MediaKind, PeriodInfo, RendererId, SyncErrorCode,
    Timeline, TimelineSelector, Tolerance,
};
