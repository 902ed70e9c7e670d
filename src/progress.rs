use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Observer for per-file and per-page pipeline events. Emitted at least
/// once per page and once per completed file.
pub trait Progress {
    fn file_started(&self, file: &Path, index: usize, total: usize);
    fn page_scanned(&self, file: &Path, page_index: usize);
    fn file_finished(&self, file: &Path, pages: usize);
}

/// Default observer that forwards events to the tracing subscriber.
pub struct LogProgress;

impl Progress for LogProgress {
    fn file_started(&self, file: &Path, index: usize, total: usize) {
        info!(file = %file.display(), index = index + 1, total, "processing file");
    }

    fn page_scanned(&self, _file: &Path, _page_index: usize) {}

    fn file_finished(&self, file: &Path, pages: usize) {
        info!(file = %file.display(), pages, "finished file");
    }
}

/// Coarse cancellation flag checked between pages, never mid-OCR-call.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
