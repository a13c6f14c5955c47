//! Progress recording helpers

use crossbeam_channel::{unbounded, Receiver};
use pipeline_creator::{ProgressCallback, ProgressReport};
use std::sync::{Arc, Mutex};

/// A progress callback that forwards every report to the returned receiver
pub fn progress_channel() -> (ProgressCallback, Receiver<ProgressReport>) {
    let (tx, rx) = unbounded();
    (ProgressCallback::with_channel(tx), rx)
}

/// A progress callback that keeps every report in order
pub fn recording_progress() -> (ProgressCallback, Arc<Mutex<Vec<ProgressReport>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let callback = ProgressCallback::new(move |report| {
        sink.lock().unwrap().push(report.clone());
    });
    (callback, reports)
}
