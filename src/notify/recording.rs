//! 记录调用序列的调度器，`notes triggers` 预览和测试都用它

use std::sync::Mutex;

use super::Dispatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCall {
    ClearAll,
    Schedule {
        fire_in_seconds: u64,
        title: String,
        body: String,
    },
}

impl DispatchCall {
    pub fn schedule(fire_in_seconds: u64, title: &str, body: &str) -> Self {
        DispatchCall::Schedule {
            fire_in_seconds,
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<DispatchCall>>,
}

impl RecordingDispatcher {
    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, call: DispatchCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

impl Dispatcher for RecordingDispatcher {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str) {
        self.record(DispatchCall::schedule(fire_in_seconds, title, body));
    }

    fn clear_all(&self) {
        self.record(DispatchCall::ClearAll);
    }
}
