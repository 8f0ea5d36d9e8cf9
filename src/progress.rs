//! Progress state and the event surface consumed by a presentation layer.
//!
//! The pipeline is the single producer; whoever drives it (CLI, GUI shell)
//! is the single consumer. Events are published over an unbounded channel so
//! the pipeline never blocks on a slow renderer.

use tokio::sync::{mpsc, oneshot};

use crate::models::AreaCandidate;

/// Current phase of per-region processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RegionSearch,
    LocationSearch,
    Export,
    Finished,
}

/// What is being exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Kml,
    Spreadsheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Started,
    Done,
}

/// Snapshot of the pipeline's progress counters, folded from the event
/// stream on the consumer side.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub object_index: usize,
    pub object_count: usize,
    pub sub_object_index: usize,
    pub sub_object_count: usize,
    pub stage: Option<Stage>,
    /// Requests that failed and were skipped so far.
    pub failed_requests: usize,
}

impl ProgressState {
    /// Fold one event into the snapshot. Events that carry no counter
    /// data (candidate lists, export notifications) leave it untouched.
    pub fn apply(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Object { index, count } => {
                self.object_index = *index;
                self.object_count = *count;
                // A new request starts with a fresh sub-object scope.
                self.sub_object_index = 0;
                self.sub_object_count = 0;
            }
            PipelineEvent::SubObject { index, count } => {
                self.sub_object_index = *index;
                self.sub_object_count = *count;
            }
            PipelineEvent::Stage(stage) => self.stage = Some(*stage),
            PipelineEvent::RequestFailed { .. } => self.failed_requests += 1,
            PipelineEvent::Finished => self.stage = Some(Stage::Finished),
            PipelineEvent::CandidatesReady { .. } | PipelineEvent::Export { .. } => {}
        }
    }
}

/// Events published by the pipeline.
#[derive(Debug)]
pub enum PipelineEvent {
    /// Top-level progress: request `index` of `count` is being processed.
    Object { index: usize, count: usize },
    /// Per-region progress within the current request.
    SubObject { index: usize, count: usize },
    Stage(Stage),
    /// Request `index` failed and was skipped; the batch keeps going.
    RequestFailed { index: usize },
    /// Interactive mode only: the candidate list is ready and the pipeline
    /// is suspended until an index is sent back. Dropping the sender
    /// cancels the run.
    CandidatesReady {
        candidates: Vec<AreaCandidate>,
        reply: oneshot::Sender<usize>,
    },
    Export {
        kind: ExportKind,
        state: ExportState,
    },
    /// The whole batch is done (also emitted after a fatal error, so the
    /// presentation layer can return to idle).
    Finished,
}

/// Sender half handed to the pipeline. A detached reporter (no channel)
/// drops every event, which keeps headless use trivial.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl ProgressReporter {
    /// Create a connected reporter plus the receiving end for the
    /// presentation layer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// Reporter that discards all events.
    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// Publish an event. A consumer that has gone away is not an error;
    /// the pipeline keeps running headless.
    pub fn publish(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn object(&self, index: usize, count: usize) {
        self.publish(PipelineEvent::Object { index, count });
    }

    pub fn sub_object(&self, index: usize, count: usize) {
        self.publish(PipelineEvent::SubObject { index, count });
    }

    pub fn stage(&self, stage: Stage) {
        self.publish(PipelineEvent::Stage(stage));
    }

    pub fn request_failed(&self, index: usize) {
        self.publish(PipelineEvent::RequestFailed { index });
    }

    pub fn export(&self, kind: ExportKind, state: ExportState) {
        self.publish(PipelineEvent::Export { kind, state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.object(0, 3);
        reporter.stage(Stage::RegionSearch);
        reporter.sub_object(1, 5);
        reporter.publish(PipelineEvent::Finished);

        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::Object { index: 0, count: 3 })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::Stage(Stage::RegionSearch))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::SubObject { index: 1, count: 5 })
        ));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Finished)));
    }

    #[test]
    fn test_state_folds_events() {
        let mut state = ProgressState::default();
        state.apply(&PipelineEvent::Object { index: 1, count: 3 });
        state.apply(&PipelineEvent::SubObject { index: 4, count: 9 });
        state.apply(&PipelineEvent::Stage(Stage::LocationSearch));
        assert_eq!(state.object_index, 1);
        assert_eq!(state.sub_object_count, 9);
        assert_eq!(state.stage, Some(Stage::LocationSearch));

        // The next request resets the sub-object scope.
        state.apply(&PipelineEvent::Object { index: 2, count: 3 });
        assert_eq!(state.sub_object_count, 0);

        state.apply(&PipelineEvent::RequestFailed { index: 2 });
        state.apply(&PipelineEvent::RequestFailed { index: 0 });
        assert_eq!(state.failed_requests, 2);

        state.apply(&PipelineEvent::Finished);
        assert_eq!(state.stage, Some(Stage::Finished));
    }

    #[test]
    fn test_detached_reporter_drops_events() {
        let reporter = ProgressReporter::detached();
        // Must not panic or block.
        reporter.object(0, 1);
        reporter.stage(Stage::Finished);
    }
}
