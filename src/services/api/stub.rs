use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::GenerationApi;
use crate::kernel::event::{GenerationRequest, RecordingId, StatusReport};
use crate::sync::lock;

type Scripted = std::result::Result<StatusReport, String>;

/// Deterministic API that replays scripted answers in order.
///
/// Once the status script is exhausted every query answers `generating`.
#[derive(Debug, Default)]
pub struct ScriptedGenerationApi {
    request_script: Mutex<VecDeque<Scripted>>,
    status_script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
    status_calls: AtomicUsize,
}

impl ScriptedGenerationApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request(self, report: StatusReport) -> Self {
        lock(&self.request_script).push_back(Ok(report));
        self
    }

    pub fn on_request_error(self, message: &str) -> Self {
        lock(&self.request_script).push_back(Err(message.to_string()));
        self
    }

    pub fn then_status(self, report: StatusReport) -> Self {
        lock(&self.status_script).push_back(Ok(report));
        self
    }

    pub fn then_status_times(self, report: StatusReport, times: usize) -> Self {
        {
            let mut script = lock(&self.status_script);
            for _ in 0..times {
                script.push_back(Ok(report.clone()));
            }
        }
        self
    }

    pub fn then_status_error(self, message: &str) -> Self {
        lock(&self.status_script).push_back(Err(message.to_string()));
        self
    }

    pub fn request_calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationApi for ScriptedGenerationApi {
    async fn request_generation(&self, request: &GenerationRequest) -> Result<StatusReport> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.request_script).pop_front();
        match next {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(StatusReport::generating()),
        }
    }

    async fn query_status(&self, _recording_id: &RecordingId) -> Result<StatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.status_script).pop_front();
        match next {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(StatusReport::generating()),
        }
    }
}
