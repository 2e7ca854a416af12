//! Shared helpers for integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sensorpipe_core::{
    ConfigStore, FixedClock, MemoryStore, PipelineConfig, ReportSink, SensorModule,
};

/// Sink that records every emitted line for later assertions
pub struct RecordingSink {
    lines: Rc<RefCell<Vec<String>>>,
}

impl RecordingSink {
    pub fn paired() -> (Box<Self>, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(Self {
                lines: Rc::clone(&lines),
            }),
            lines,
        )
    }
}

impl ReportSink for RecordingSink {
    fn emit(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// Config store the test keeps a handle on after the module takes ownership
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Rc<RefCell<MemoryStore>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for SharedStore {
    fn load(&self, key: &str) -> Option<String> {
        self.inner.borrow().load(key)
    }

    fn save(&mut self, key: &str, value: &str) -> bool {
        self.inner.borrow_mut().save(key, value)
    }
}

/// Module with a test-controlled clock and an inspectable store
pub fn build_module(config: PipelineConfig) -> (SensorModule, Rc<FixedClock>, SharedStore) {
    let clock = Rc::new(FixedClock::new(0));
    let store = SharedStore::new();
    let module = SensorModule::new(
        config,
        Box::new(Rc::clone(&clock)),
        Box::new(store.clone()),
    )
    .expect("valid test configuration");
    (module, clock, store)
}
