//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use mediasync_config::SyncConfig;
use mediasync_engine::{
    LoopbackBridge, MediaSynchroniser, RendererId, RendererSnapshot, RendererTable, Scheduler,
    SessionEvent, SyncContext, SynchronizerRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;

pub const MASTER_TIMELINE: &str = "urn:dvb:css:timeline:pts";
pub const SLAVE_TIMELINE: &str = "urn:dvb:css:timeline:temi:1:1";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One host, one bridge and one registry shared by any number of sessions
pub struct Harness {
    pub table: Rc<RendererTable>,
    pub bridge: Rc<LoopbackBridge>,
    pub scheduler: Rc<Scheduler>,
    pub registry: Rc<SynchronizerRegistry>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        init_logging();
        let bridge = Rc::new(LoopbackBridge::new());
        bridge.set_default_units_per_second(1.0);
        Self {
            table: Rc::new(RendererTable::new()),
            bridge,
            scheduler: Rc::new(Scheduler::new()),
            registry: Rc::new(SynchronizerRegistry::new()),
            config: SyncConfig::default(),
        }
    }

    pub fn context(&self) -> SyncContext {
        SyncContext {
            registry: self.registry.clone(),
            bridge: self.bridge.clone(),
            host: self.table.clone(),
            scheduler: self.scheduler.clone(),
            config: self.config.clone(),
        }
    }

    pub fn session(&self) -> (Rc<MediaSynchroniser>, EventLog) {
        let session = MediaSynchroniser::new(self.context());
        let log = EventLog::attach(&session);
        (session, log)
    }

    pub fn master_at(&self, time: f64) -> RendererId {
        self.table
            .insert(RendererSnapshot::element("http://example.com/master.mp4").at(time).playing())
    }

    /// A playing slave with plenty of buffered media
    pub fn slave_at(&self, time: f64) -> RendererId {
        self.table.insert(
            RendererSnapshot::element("http://example.com/slave.mp4")
                .at(time)
                .playing()
                .with_buffered(vec![(0.0, 600.0)]),
        )
    }

    /// An initialised session whose master timeline is bound
    pub fn running_session(&self, master: RendererId) -> (Rc<MediaSynchroniser>, EventLog) {
        let (session, log) = self.session();
        session
            .init_media_synchroniser(master, MASTER_TIMELINE)
            .expect("init");
        self.bridge.flush();
        (session, log)
    }
}

/// Records every session event
#[derive(Clone)]
pub struct EventLog(Rc<RefCell<Vec<SessionEvent>>>);

impl EventLog {
    pub fn attach(session: &MediaSynchroniser) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        session
            .events()
            .subscribe(move |event: &SessionEvent| sink.borrow_mut().push(*event));
        Self(events)
    }

    pub fn all(&self) -> Vec<SessionEvent> {
        self.0.borrow().clone()
    }

    pub fn errors(&self) -> Vec<(u16, Option<RendererId>)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Error {
                    last_error,
                    last_error_source,
                } => Some((last_error.code(), *last_error_source)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}
