//! Progress reporting for generated pipelines
//!
//! A [`ProgressCallback`] is what generated `run` functions receive as
//! `progress_callback`. Each report carries the name of the current piece, the
//! piece index and the piece count, and the callback folds the fraction within
//! that piece into an overall [`ProgressReport::total_progress`].
//!
//! Nested pipelines report through [`ProgressCallback::sub_callback`], which
//! maps a child's overall progress onto a single piece of the parent.

use crossbeam_channel::Sender;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Snapshot of the most recent progress report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressReport {
    /// Overall progress in `[0, 1]`
    pub total_progress: f64,
    pub piece_name: String,
    pub piece_number: i64,
    pub number_of_pieces: i64,
}

type ProgressSink = Arc<dyn Fn(&ProgressReport) + Send + Sync>;

/// Cloneable, thread-safe progress receiver
///
/// Clones share state, so [`last_report`](Self::last_report) reflects reports
/// made through any clone.
#[derive(Clone, Default)]
pub struct ProgressCallback {
    sink: Option<ProgressSink>,
    state: Arc<Mutex<ProgressReport>>,
}

impl ProgressCallback {
    /// A callback that only records the latest report
    pub fn noop() -> Self {
        Self::default()
    }

    /// Forward every report to `sink`
    pub fn new(sink: impl Fn(&ProgressReport) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
            state: Arc::default(),
        }
    }

    /// Forward every report over a channel, e.g. to a UI thread
    ///
    /// Reports are dropped once the receiver is gone.
    pub fn with_channel(sender: Sender<ProgressReport>) -> Self {
        Self::new(move |report| {
            if sender.send(report.clone()).is_err() {
                tracing::trace!("Progress receiver disconnected, dropping report");
            }
        })
    }

    /// Record progress within one piece of the work
    ///
    /// A non-positive piece count is treated as a single piece.
    pub fn report_progress(&self, piece_name: &str, piece_progress: f64, piece_number: i64, number_of_pieces: i64) {
        let pieces = number_of_pieces.max(1) as f64;
        let per_piece = 1.0 / pieces;
        let report = ProgressReport {
            total_progress: per_piece * piece_number as f64 + per_piece * piece_progress,
            piece_name: piece_name.to_string(),
            piece_number,
            number_of_pieces,
        };

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = report.clone();

        if let Some(sink) = &self.sink {
            sink(&report);
        }
    }

    /// A callback whose overall progress maps onto piece `piece_number` of this one
    pub fn sub_callback(&self, piece_number: i64, number_of_pieces: i64) -> ProgressCallback {
        let parent = self.clone();
        ProgressCallback::new(move |child| {
            parent.report_progress(&child.piece_name, child.total_progress, piece_number, number_of_pieces);
        })
    }

    /// The latest report made through this callback or any clone of it
    pub fn last_report(&self) -> ProgressReport {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("has_sink", &self.sink.is_some())
            .field("last_report", &self.last_report())
            .finish()
    }
}
