//! Viewer controller.
//!
//! Orchestrates one viewer session in response to a "document selected"
//! event: fetch the raw bytes, decode, rasterize every page into the display
//! container in page order, then arm the artifact scrubber. Single-threaded
//! and cooperative: all deferred work goes through a timer queue keyed by
//! the session clock and is drained by [`ViewerController::tick`].

use std::time::Duration;

use doc_model::{
    DocumentKind, NodeContent, RenderSurface, ViewerPhase, ViewerRequest, ViewerTree,
};
use pdf_engine::{DecodeError, DocumentEngine, DocumentHandle};
use vellum_scheduler::TimerQueue;
use vellum_scrub::{ScrubState, SCRUB_RETRY_OFFSETS};

mod loader;

pub use loader::{Fetch, FetchError, HttpFetcher};

/// Fixed raster multiplier over the document's intrinsic unit size. Policy
/// constant chosen for crisp output on high-density displays, not derived.
pub const ZOOM_FACTOR: f32 = 2.0;

/// Delay between "viewer opened" and "begin fetch", guaranteeing the display
/// container exists before any of it is touched.
pub const OPEN_DELAY: Duration = Duration::from_millis(100);

const LOADING_MESSAGE: &str = "Loading certificate...";

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionJob {
    BeginFetch,
    ScrubPass,
}

#[derive(Debug, Clone, Copy)]
struct QueuedJob {
    generation: u64,
    job: SessionJob,
}

/// One viewer session at a time: `Closed → Loading → Rendered → Closed`,
/// with `Error` reachable from `Loading`. Opening a new request supersedes
/// the live session unconditionally; closing twice is a no-op.
pub struct ViewerController<E: DocumentEngine, F: Fetch> {
    engine: E,
    fetcher: F,
    tree: ViewerTree,
    phase: ViewerPhase,
    request: Option<ViewerRequest>,
    document: Option<DocumentHandle>,
    scrub: ScrubState,
    timers: TimerQueue<QueuedJob>,
    generation: u64,
}

impl<E: DocumentEngine, F: Fetch> ViewerController<E, F> {
    pub fn new(engine: E, fetcher: F) -> Self {
        Self {
            engine,
            fetcher,
            tree: ViewerTree::new(),
            phase: ViewerPhase::Closed,
            request: None,
            document: None,
            scrub: ScrubState::new(),
            timers: TimerQueue::new(),
            generation: 0,
        }
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn tree(&self) -> &ViewerTree {
        &self.tree
    }

    /// The display tree is shared with the host chrome; injected artifacts
    /// arrive through here and are the scrubber's problem.
    pub fn tree_mut(&mut self) -> &mut ViewerTree {
        &mut self.tree
    }

    pub fn request(&self) -> Option<&ViewerRequest> {
        self.request.as_ref()
    }

    pub fn scrub_watch_active(&self) -> bool {
        self.scrub.watch_active()
    }

    /// True once nothing deferred remains: no pending timers and the scrub
    /// watch has been disconnected.
    pub fn is_quiescent(&self) -> bool {
        self.timers.is_empty() && !self.scrub.watch_active()
    }

    /// Handle a "document selected" event. Any live session is torn down
    /// first, so stale content can never show through.
    pub fn open(&mut self, request: ViewerRequest, now: Duration) {
        self.close();
        self.generation += 1;

        log::info!("opening viewer for {}", request.source_url);

        match request.kind {
            DocumentKind::Image => {
                // Direct display; the fetch/decode/scrub pipeline is never
                // involved for plain images.
                self.tree.append_content(NodeContent::Image {
                    source_url: request.source_url.clone(),
                });
                self.phase = ViewerPhase::Rendered;
            }
            DocumentKind::PaginatedDocument => {
                self.phase = ViewerPhase::Loading;
                self.tree
                    .append_content(NodeContent::Placeholder(LOADING_MESSAGE.to_owned()));
                self.timers.schedule(
                    now + OPEN_DELAY,
                    QueuedJob { generation: self.generation, job: SessionJob::BeginFetch },
                );
            }
        }

        self.request = Some(request);
    }

    /// Drain due timer jobs and give the scrub watch a look at the tree.
    pub fn tick(&mut self, now: Duration) {
        for scheduled in self.timers.due(now) {
            if scheduled.payload.generation != self.generation {
                continue;
            }
            if self.phase == ViewerPhase::Closed {
                continue;
            }

            match scheduled.payload.job {
                SessionJob::BeginFetch => self.begin_fetch(now),
                SessionJob::ScrubPass => {
                    self.scrub.run_scheduled_pass(&mut self.tree);
                }
            }
        }

        self.scrub.observe(now, &mut self.tree);
    }

    /// Close the viewer. Synchronous and idempotent: pending timers are
    /// dropped, the scrub watch is disconnected regardless of its timer
    /// state, and the container is cleared before the method returns.
    pub fn close(&mut self) {
        self.timers.clear();
        self.scrub.cancel();
        self.tree.clear();

        if let Some(handle) = self.document.take() {
            if let Err(err) = self.engine.close(handle) {
                log::warn!("failed to close document handle: {err}");
            }
        }

        self.request = None;
        self.phase = ViewerPhase::Closed;
    }

    fn begin_fetch(&mut self, now: Duration) {
        let Some(request) = self.request.clone() else {
            return;
        };

        match self.load_document(&request) {
            Ok(handle) => {
                self.tree.clear_content();
                // Rendered as soon as the loop starts; scrubbing does not
                // wait for every page.
                self.phase = ViewerPhase::Rendered;
                self.document = Some(handle);

                self.render_all_pages(handle);

                self.scrub.activate(now, &mut self.tree);
                for offset in SCRUB_RETRY_OFFSETS {
                    self.timers.schedule(
                        now + offset,
                        QueuedJob { generation: self.generation, job: SessionJob::ScrubPass },
                    );
                }
            }
            Err(err) => {
                log::warn!("viewer failed to load {}: {err}", request.source_url);
                self.phase = ViewerPhase::Error;
                self.tree.clear_content();
                self.tree.append_content(NodeContent::Placeholder(format!(
                    "Error loading certificate: {err}"
                )));
            }
        }
    }

    fn load_document(&mut self, request: &ViewerRequest) -> Result<DocumentHandle, ViewerError> {
        let bytes = self.fetcher.fetch(&request.source_url)?;
        let handle = self.engine.decode(bytes)?;
        Ok(handle)
    }

    fn render_all_pages(&mut self, handle: DocumentHandle) {
        let pages = match self.engine.page_handles(handle) {
            Ok(pages) => pages,
            Err(err) => {
                log::warn!("no pages available to render: {err}");
                return;
            }
        };

        for page in pages {
            match self.engine.render_page(handle, page.number - 1, ZOOM_FACTOR) {
                Ok(image) => {
                    self.tree.append_content(NodeContent::Surface(RenderSurface {
                        page_number: page.number,
                        image,
                    }));
                }
                Err(err) => {
                    // Page-level failures are independent; skip and continue.
                    log::warn!("skipping page {}: {err}", page.number);
                }
            }
        }
    }
}

impl<E: DocumentEngine, F: Fetch> Drop for ViewerController<E, F> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::EmbedKind;
    use pdf_engine::{fixtures, LopdfEngine};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Serves canned bytes and records every locator it was asked for.
    struct StubFetcher {
        bytes: Vec<u8>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl StubFetcher {
        fn new(bytes: Vec<u8>) -> (Self, Rc<RefCell<Vec<String>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            (Self { bytes, calls: calls.clone() }, calls)
        }
    }

    impl Fetch for StubFetcher {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.borrow_mut().push(locator.to_owned());
            if self.bytes.is_empty() {
                return Err(FetchError::EmptyResponse);
            }
            Ok(self.bytes.clone())
        }
    }

    fn controller_with(
        bytes: Vec<u8>,
    ) -> (ViewerController<LopdfEngine, StubFetcher>, Rc<RefCell<Vec<String>>>) {
        let (fetcher, calls) = StubFetcher::new(bytes);
        (ViewerController::new(LopdfEngine::new(), fetcher), calls)
    }

    fn open_and_render(
        controller: &mut ViewerController<LopdfEngine, StubFetcher>,
        locator: &str,
    ) {
        controller.open(ViewerRequest::new(locator), ms(0));
        controller.tick(ms(100));
    }

    #[test]
    fn renders_one_surface_per_page_in_ascending_order() {
        let (mut controller, _) = controller_with(fixtures::pdf_with_pages(3));
        open_and_render(&mut controller, "/certificates/cert.pdf");

        assert_eq!(controller.phase(), ViewerPhase::Rendered);
        assert_eq!(controller.tree().surface_page_numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn fetch_is_deferred_until_the_open_delay_elapses() {
        let (mut controller, calls) = controller_with(fixtures::pdf_with_pages(1));
        controller.open(ViewerRequest::new("cert.pdf"), ms(0));

        assert_eq!(controller.phase(), ViewerPhase::Loading);
        assert_eq!(controller.tree().placeholder_texts(), vec!["Loading certificate..."]);

        controller.tick(ms(50));
        assert!(calls.borrow().is_empty());
        assert_eq!(controller.phase(), ViewerPhase::Loading);

        controller.tick(ms(100));
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(controller.phase(), ViewerPhase::Rendered);
    }

    #[test]
    fn corrupt_input_leaves_exactly_one_error_node_and_no_surfaces() {
        let (mut controller, _) = controller_with(fixtures::corrupt_bytes());
        open_and_render(&mut controller, "cert.pdf");

        assert_eq!(controller.phase(), ViewerPhase::Error);
        assert_eq!(controller.tree().surface_count(), 0);
        assert_eq!(controller.tree().content().children().len(), 1);

        let placeholders = controller.tree().placeholder_texts();
        assert_eq!(placeholders.len(), 1);
        assert!(placeholders[0].starts_with("Error loading certificate:"));
    }

    #[test]
    fn encrypted_input_surfaces_the_restriction_as_an_error() {
        let (mut controller, _) = controller_with(fixtures::encrypted_marker_pdf());
        open_and_render(&mut controller, "cert.pdf");

        assert_eq!(controller.phase(), ViewerPhase::Error);
        let placeholders = controller.tree().placeholder_texts();
        assert_eq!(placeholders.len(), 1);
        assert!(placeholders[0].contains("password protected"));
    }

    #[test]
    fn empty_response_is_an_error_with_no_automatic_retry() {
        let (mut controller, calls) = controller_with(Vec::new());
        open_and_render(&mut controller, "cert.pdf");

        assert_eq!(controller.phase(), ViewerPhase::Error);
        controller.tick(ms(5_000));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn restricted_text_is_gone_after_the_final_scheduled_pass() {
        let (mut controller, _) = controller_with(fixtures::pdf_with_pages(1));
        open_and_render(&mut controller, "cert.pdf");

        // Injected right after the render loop, as a decoder notice would be.
        let notice = controller
            .tree_mut()
            .append_chrome(NodeContent::Text("This file has limited permissions".to_owned()));

        // Past the last retry offset (render at 100ms + 500ms).
        controller.tick(ms(700));
        assert!(controller.tree().node(notice).is_none());
    }

    #[test]
    fn embedded_elements_never_survive_in_the_container() {
        let (mut controller, _) = controller_with(fixtures::pdf_with_pages(1));
        open_and_render(&mut controller, "cert.pdf");
        assert!(!controller.tree().contains_embedded());

        controller.tree_mut().append_content(NodeContent::Embedded(EmbedKind::Frame));
        controller.tick(ms(101));
        assert!(!controller.tree().contains_embedded());

        controller.tree_mut().append_chrome(NodeContent::Embedded(EmbedKind::Object));
        controller.tick(ms(150));
        assert!(!controller.tree().contains_embedded());
    }

    #[test]
    fn reopening_never_shows_content_from_the_prior_request() {
        let (fetcher, _) = StubFetcher::new(fixtures::pdf_with_pages(3));
        let mut controller = ViewerController::new(LopdfEngine::new(), fetcher);
        open_and_render(&mut controller, "first.pdf");
        assert_eq!(controller.tree().surface_count(), 3);

        controller.open(ViewerRequest::new("second.pdf"), ms(200));

        // Cleared synchronously, before the second request has fetched.
        assert_eq!(controller.tree().surface_count(), 0);
        assert_eq!(controller.tree().placeholder_texts(), vec!["Loading certificate..."]);

        controller.tick(ms(300));
        assert_eq!(controller.tree().surface_count(), 3);
        assert_eq!(
            controller.request().map(|request| request.source_url.as_str()),
            Some("second.pdf")
        );
    }

    #[test]
    fn scrub_watch_disconnects_by_the_hard_deadline_despite_reappearing_text() {
        let (mut controller, _) = controller_with(fixtures::pdf_with_pages(1));
        open_and_render(&mut controller, "cert.pdf");

        // Keeps getting removed while the watch lives (activated at 100ms).
        for at in [600u64, 1100, 1600, 2050] {
            let node = controller
                .tree_mut()
                .append_chrome(NodeContent::Text("view permissions".to_owned()));
            controller.tick(ms(at));
            assert!(controller.tree().node(node).is_none(), "at {at}ms");
        }

        // Deadline is 100ms + 2000ms; afterwards the watch must be gone.
        let survivor = controller
            .tree_mut()
            .append_chrome(NodeContent::Text("view permissions".to_owned()));
        controller.tick(ms(2_100));
        assert!(!controller.scrub_watch_active());
        assert!(controller.tree().node(survivor).is_some());
        assert!(controller.is_quiescent());
    }

    #[test]
    fn image_requests_bypass_the_pipeline_entirely() {
        let (mut controller, calls) = controller_with(fixtures::pdf_with_pages(1));
        controller.open(ViewerRequest::new("/certificates/badge.png"), ms(0));

        assert_eq!(controller.phase(), ViewerPhase::Rendered);
        assert!(matches!(
            controller.tree().content().children().first().map(|node| node.content()),
            Some(NodeContent::Image { .. })
        ));

        controller.tick(ms(5_000));
        assert!(calls.borrow().is_empty());
        assert!(!controller.scrub_watch_active());
    }

    #[test]
    fn close_is_idempotent_and_stops_all_deferred_work() {
        let (mut controller, calls) = controller_with(fixtures::pdf_with_pages(2));
        controller.open(ViewerRequest::new("cert.pdf"), ms(0));

        controller.close();
        controller.close();

        assert_eq!(controller.phase(), ViewerPhase::Closed);
        assert!(controller.tree().is_content_empty());
        assert!(controller.is_quiescent());

        // The deferred fetch must not fire after teardown.
        controller.tick(ms(1_000));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn close_after_render_tears_down_the_scrub_watch() {
        let (mut controller, _) = controller_with(fixtures::pdf_with_pages(1));
        open_and_render(&mut controller, "cert.pdf");
        assert!(controller.scrub_watch_active());

        controller.close();
        assert!(!controller.scrub_watch_active());

        // A lingering watch mutating a stale container would show up here.
        let node = controller
            .tree_mut()
            .append_chrome(NodeContent::Text("view permissions".to_owned()));
        controller.tick(ms(500));
        assert!(controller.tree().node(node).is_some());
    }
}
