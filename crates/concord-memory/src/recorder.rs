//! A reporter bundle that keeps every reported fact in memory.

use async_trait::async_trait;
use concord_protocol::{Context, ExistenceReporter, PayloadReporter, TermsReporter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEvent {
    Payload {
        context: Context,
        payload: Value,
    },
    Existence {
        context: Context,
        id: String,
        exists: bool,
    },
    Terms {
        context: Context,
        terms: String,
        ids: Vec<String>,
    },
}

/// Append-only event log, in report order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<ReportEvent>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: ReportEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ReportEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordPayload;

#[async_trait]
impl<T: Serialize + Sync> PayloadReporter<Recorder, T> for RecordPayload {
    async fn report(&self, recorder: &Recorder, payload: &T, context: &Context) {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%context, %error, "payload not serializable, skipping report");
                return;
            }
        };
        info!(%context, %payload, "report.payload");
        recorder.record(ReportEvent::Payload {
            context: context.clone(),
            payload,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordExistence;

#[async_trait]
impl ExistenceReporter<Recorder> for RecordExistence {
    async fn report_existence(&self, recorder: &Recorder, id: &str, exists: bool, context: &Context) {
        info!(%context, id, exists, "report.existence");
        recorder.record(ReportEvent::Existence {
            context: context.clone(),
            id: id.to_owned(),
            exists,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTerms;

#[async_trait]
impl TermsReporter<Recorder> for RecordTerms {
    async fn report_terms(&self, recorder: &Recorder, terms: &str, ids: &[String], context: &Context) {
        info!(%context, terms, hits = ids.len(), "report.terms");
        recorder.record(ReportEvent::Terms {
            context: context.clone(),
            terms: terms.to_owned(),
            ids: ids.to_vec(),
        });
    }
}
