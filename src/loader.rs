use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::backend::{PageTextExtractor, open_document};
use crate::cache::PageKey;
use crate::error::{AppError, AppResult};
use crate::layout::PageCharMap;

#[derive(Debug, Clone)]
pub enum LayoutEvent {
    Loaded {
        generation: u64,
        key: PageKey,
        map: Arc<PageCharMap>,
    },
    Failed {
        generation: u64,
        page: usize,
        message: String,
    },
}

impl LayoutEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Loaded { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

pub trait DocumentOpener: Send + Sync {
    fn open(&self, path: &Path) -> AppResult<Box<dyn PageTextExtractor>>;
}

#[derive(Debug, Default)]
pub struct DefaultDocumentOpener;

impl DocumentOpener for DefaultDocumentOpener {
    fn open(&self, path: &Path) -> AppResult<Box<dyn PageTextExtractor>> {
        open_document(path)
    }
}

#[derive(Debug, Clone)]
struct LayoutJob {
    generation: u64,
    path: PathBuf,
    page: usize,
}

/// Fetches page layouts off the caller's thread.
///
/// Every submission gets a new generation. A job that is superseded before
/// its extraction starts is dropped, and [`LayoutLoader::drain_current`]
/// filters out results that finished after a newer submission.
pub struct LayoutLoader {
    request_tx: UnboundedSender<LayoutJob>,
    event_rx: UnboundedReceiver<LayoutEvent>,
    next_generation: u64,
    // Dropped after `request_tx`, so the worker sees a closed channel and
    // returns before the runtime waits on it.
    _runtime: Option<Runtime>,
}

impl LayoutLoader {
    pub fn new() -> AppResult<Self> {
        Self::new_with_opener(Arc::new(DefaultDocumentOpener))
    }

    /// Runs the worker on the ambient tokio runtime when there is one,
    /// otherwise on a private single-worker runtime.
    pub fn new_with_opener(opener: Arc<dyn DocumentOpener>) -> AppResult<Self> {
        let (request_tx, request_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();

        let (runtime, handle) = match Handle::try_current() {
            Ok(handle) => (None, handle),
            Err(_) => {
                let runtime = Builder::new_multi_thread()
                    .worker_threads(1)
                    .enable_all()
                    .thread_name("pco-layout")
                    .build()
                    .map_err(|source| {
                        AppError::io_with_context(source, "layout runtime failed to start")
                    })?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };
        handle.spawn_blocking(move || worker_main(request_rx, event_tx, opener));

        Ok(Self {
            request_tx,
            event_rx,
            next_generation: 0,
            _runtime: runtime,
        })
    }

    pub fn submit(&mut self, path: &Path, page: usize) -> AppResult<u64> {
        self.next_generation = self.next_generation.saturating_add(1);

        let generation = self.next_generation;
        self.request_tx
            .send(LayoutJob {
                generation,
                path: path.to_path_buf(),
                page,
            })
            .map_err(|_| AppError::unsupported("layout worker is not available"))?;

        Ok(generation)
    }

    pub fn latest_generation(&self) -> u64 {
        self.next_generation
    }

    pub fn drain_events(&mut self) -> Vec<LayoutEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Like [`LayoutLoader::drain_events`] but keeps only the latest submission's results.
    pub fn drain_current(&mut self) -> Vec<LayoutEvent> {
        let latest = self.next_generation;
        self.drain_events()
            .into_iter()
            .filter(|event| {
                let current = event.generation() == latest;
                if !current {
                    log::debug!(
                        "discarding stale layout result (generation {} < {latest})",
                        event.generation()
                    );
                }
                current
            })
            .collect()
    }
}

/// Last opened document, reused while consecutive jobs target the same file.
struct OpenDocument {
    path: PathBuf,
    doc: Box<dyn PageTextExtractor>,
}

fn worker_main(
    mut request_rx: UnboundedReceiver<LayoutJob>,
    event_tx: UnboundedSender<LayoutEvent>,
    opener: Arc<dyn DocumentOpener>,
) {
    let mut current_doc: Option<OpenDocument> = None;

    while let Some(mut job) = request_rx.blocking_recv() {
        while let Ok(newer) = request_rx.try_recv() {
            log::debug!(
                "skipping layout job {} superseded by {}",
                job.generation,
                newer.generation
            );
            job = newer;
        }

        run_job(job, &event_tx, &mut current_doc, opener.as_ref());
    }
}

fn run_job(
    job: LayoutJob,
    event_tx: &UnboundedSender<LayoutEvent>,
    current_doc: &mut Option<OpenDocument>,
    opener: &dyn DocumentOpener,
) {
    let reuse = current_doc
        .as_ref()
        .is_some_and(|open| open.path == job.path);
    if !reuse {
        match opener.open(&job.path) {
            Ok(doc) => {
                *current_doc = Some(OpenDocument {
                    path: job.path.clone(),
                    doc,
                });
            }
            Err(err) => {
                *current_doc = None;
                let _ = event_tx.send(LayoutEvent::Failed {
                    generation: job.generation,
                    page: job.page,
                    message: err.to_string(),
                });
                return;
            }
        }
    }

    let Some(open) = current_doc.as_ref() else {
        return;
    };

    let event = match open.doc.char_map(job.page) {
        Ok(map) => LayoutEvent::Loaded {
            generation: job.generation,
            key: PageKey::new(open.doc.doc_id(), job.page),
            map: Arc::new(map),
        },
        Err(err) => LayoutEvent::Failed {
            generation: job.generation,
            page: job.page,
            message: err.to_string(),
        },
    };
    let _ = event_tx.send(event);
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{DocumentOpener, LayoutEvent, LayoutLoader};
    use crate::backend::{JsonLayoutDoc, PageTextExtractor};
    use crate::error::{AppError, AppResult};

    const DUMP: &str = r#"{
        "pages": [
            {
                "page": { "pageIndex": 0, "width": 100.0, "height": 100.0 },
                "convention": "top_left",
                "fragments": [ { "text": "zero", "originX": 0.0, "originY": 0.0, "fontHeight": 10.0, "totalWidth": 20.0 } ]
            },
            {
                "page": { "pageIndex": 1, "width": 100.0, "height": 100.0 },
                "convention": "top_left",
                "fragments": [ { "text": "one", "originX": 0.0, "originY": 0.0, "fontHeight": 10.0, "totalWidth": 15.0 } ]
            }
        ]
    }"#;

    struct DumpOpener {
        opens: AtomicUsize,
        gate: Mutex<()>,
    }

    impl DumpOpener {
        fn new() -> Self {
            Self {
                opens: AtomicUsize::new(0),
                gate: Mutex::new(()),
            }
        }
    }

    impl DocumentOpener for DumpOpener {
        fn open(&self, path: &Path) -> AppResult<Box<dyn PageTextExtractor>> {
            let _guard = self.gate.lock().expect("gate should not be poisoned");
            self.opens.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("missing.json") {
                return Err(AppError::invalid_argument("layout path must be a regular file"));
            }
            let doc = JsonLayoutDoc::from_json(path, 7, DUMP)?;
            Ok(Box::new(doc))
        }
    }

    fn wait_for_generation(loader: &mut LayoutLoader, generation: u64) -> LayoutEvent {
        let timeout = Duration::from_secs(3);
        let start = Instant::now();

        loop {
            if let Some(event) = loader
                .drain_events()
                .into_iter()
                .find(|event| event.generation() == generation)
            {
                return event;
            }

            assert!(
                start.elapsed() <= timeout,
                "timed out waiting for layout generation {generation}"
            );
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn submit_returns_incrementing_generation() {
        let mut loader =
            LayoutLoader::new_with_opener(Arc::new(DumpOpener::new())).expect("loader should start");
        let path = PathBuf::from("doc.json");

        let first = loader.submit(&path, 0).expect("first submit should succeed");
        let second = loader.submit(&path, 1).expect("second submit should succeed");

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(loader.latest_generation(), 2);
    }

    #[test]
    fn loaded_event_carries_char_map_and_key() {
        let mut loader =
            LayoutLoader::new_with_opener(Arc::new(DumpOpener::new())).expect("loader should start");
        let generation = loader
            .submit(Path::new("doc.json"), 1)
            .expect("submit should succeed");

        match wait_for_generation(&mut loader, generation) {
            LayoutEvent::Loaded { key, map, .. } => {
                assert_eq!(key.doc_id, 7);
                assert_eq!(key.page, 1);
                assert_eq!(map.text(), "one");
            }
            other => panic!("expected loaded event, got {other:?}"),
        }
    }

    #[test]
    fn failures_are_reported_with_generation() {
        let mut loader =
            LayoutLoader::new_with_opener(Arc::new(DumpOpener::new())).expect("loader should start");

        let missing = loader
            .submit(Path::new("missing.json"), 0)
            .expect("submit should succeed");
        assert!(matches!(
            wait_for_generation(&mut loader, missing),
            LayoutEvent::Failed { page: 0, .. }
        ));

        let out_of_range = loader
            .submit(Path::new("doc.json"), 9)
            .expect("submit should succeed");
        match wait_for_generation(&mut loader, out_of_range) {
            LayoutEvent::Failed { message, .. } => {
                assert!(message.contains("page index is out of range"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn documents_are_reused_for_the_same_path() {
        let opener = Arc::new(DumpOpener::new());
        let mut loader =
            LayoutLoader::new_with_opener(opener.clone()).expect("loader should start");

        let first = loader.submit(Path::new("doc.json"), 0).expect("submit should succeed");
        let _ = wait_for_generation(&mut loader, first);
        let second = loader.submit(Path::new("doc.json"), 1).expect("submit should succeed");
        let _ = wait_for_generation(&mut loader, second);

        assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_current_discards_superseded_results() {
        let opener = Arc::new(DumpOpener::new());
        let mut loader =
            LayoutLoader::new_with_opener(opener.clone()).expect("loader should start");

        // Hold the opener so every submission queues up behind the first.
        let gate = opener.gate.lock().expect("gate should not be poisoned");
        let mut generations = Vec::new();
        for page in [0, 1, 0, 1] {
            generations.push(
                loader
                    .submit(Path::new("doc.json"), page)
                    .expect("submit should succeed"),
            );
        }
        drop(gate);

        let latest = *generations.last().expect("generations should not be empty");
        let timeout = Duration::from_secs(3);
        let start = Instant::now();
        let current = loop {
            let events = loader.drain_current();
            if !events.is_empty() {
                break events;
            }
            assert!(start.elapsed() <= timeout, "timed out waiting for latest layout");
            thread::sleep(Duration::from_millis(10));
        };

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].generation(), latest);
        match &current[0] {
            LayoutEvent::Loaded { key, .. } => assert_eq!(key.page, 1),
            other => panic!("expected loaded event, got {other:?}"),
        }
    }

    #[test]
    fn dropping_the_loader_with_queued_jobs_returns() {
        let opener = Arc::new(DumpOpener::new());
        let mut loader =
            LayoutLoader::new_with_opener(opener.clone()).expect("loader should start");

        let gate = opener.gate.lock().expect("gate should not be poisoned");
        for page in [0, 1, 0] {
            loader
                .submit(Path::new("doc.json"), page)
                .expect("submit should succeed");
        }
        drop(gate);

        let start = Instant::now();
        drop(loader);
        assert!(start.elapsed() <= Duration::from_secs(3));
        assert!(opener.opens.load(Ordering::SeqCst) <= 1);
    }
}
