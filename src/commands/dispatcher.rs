//! Maps command envelopes onto view-state transitions.
//!
//! Single writer for the shared view state (the viewport engine writes the
//! scale fields, nothing else writes at all). `dispatch` never fails and
//! never blocks on the document: image inspection runs on its own thread
//! against a snapshot of its arguments, last write wins.

use std::sync::Arc;
use std::thread;

use log::{debug, warn};

use crate::commands::{CommandEnvelope, RegionPayload};
use crate::document::{inspect, DocumentProvider, RenderHost};
use crate::view::highlight::{
    self, HighlightKind, HighlightRegion, DEFAULT_INK_COLOR, DEFAULT_MARKER_COLOR,
};
use crate::view::{SharedViewState, ZOOM_STEP};

pub struct Dispatcher {
    state: SharedViewState,
    provider: Arc<dyn DocumentProvider>,
    host: Arc<dyn RenderHost>,
}

impl Dispatcher {
    pub fn new(
        state: SharedViewState,
        provider: Arc<dyn DocumentProvider>,
        host: Arc<dyn RenderHost>,
    ) -> Self {
        Self {
            state,
            provider,
            host,
        }
    }

    /// Record the loaded document's page count.
    pub fn document_loaded(&self, num_pages: u32) {
        self.state.lock().unwrap().set_num_pages(num_pages);
    }

    /// Collaborator hook: the user scrolled a page into view. Updates the
    /// active page without issuing a scroll request back.
    pub fn page_scrolled_into_view(&self, page: u32) {
        self.state.lock().unwrap().set_active_page(page);
    }

    /// Apply one command. Bad payloads degrade to no-ops; nothing escapes.
    pub fn dispatch(&self, envelope: CommandEnvelope) {
        match envelope {
            CommandEnvelope::Navigate { page } => self.navigate(page),
            CommandEnvelope::Color(payload) => self.annotate(payload, HighlightKind::Ink),
            CommandEnvelope::Highlight(payload) => self.annotate(payload, HighlightKind::Marker),
            CommandEnvelope::Zoom { value, delta } => self.zoom(value, delta),
            CommandEnvelope::Inspect { page, image_index } => self.spawn_inspect(page, image_index),
            CommandEnvelope::Clear => self.clear(),
            CommandEnvelope::Speech { text } => self.speech(text),
            CommandEnvelope::Unknown { tag } => debug!("ignoring unknown command type {tag:?}"),
        }
    }

    fn navigate(&self, page: Option<u32>) {
        let Some(page) = page else {
            debug!("navigate without a usable page");
            return;
        };
        let target = self.go_to_page(page);
        self.state
            .lock()
            .unwrap()
            .set_transcript(format!("Navigated to page {target}"));
    }

    fn annotate(&self, payload: RegionPayload, kind: HighlightKind) {
        let Some(page) = payload.page else {
            debug!("annotation without a usable page");
            return;
        };

        let region = match kind {
            HighlightKind::Ink => HighlightRegion::ink(
                payload.start,
                payload.end,
                payload.color.unwrap_or_else(|| DEFAULT_INK_COLOR.into()),
            ),
            HighlightKind::Marker => HighlightRegion::marker(
                payload.start,
                payload.end,
                payload.color.unwrap_or_else(|| DEFAULT_MARKER_COLOR.into()),
            ),
        };
        let instruction = highlight::compile(&region);

        self.state.lock().unwrap().set_highlight(page, region);
        self.host.apply_highlight(page, &instruction);

        let target = self.go_to_page(page);
        let status = match kind {
            HighlightKind::Ink => format!("Inked text on page {target}"),
            HighlightKind::Marker => format!("Highlighted text on page {target}"),
        };
        self.state.lock().unwrap().set_transcript(status);
    }

    fn zoom(&self, value: Option<f32>, delta: Option<f32>) {
        let mut state = self.state.lock().unwrap();
        if let Some(value) = value {
            state.set_zoom(value);
        } else if let Some(delta) = delta {
            state.zoom_by(delta);
        } else {
            // A bare zoom command still nudges the view by one step
            state.zoom_by(ZOOM_STEP);
        }
        state.set_transcript("Zoom updated");
    }

    fn clear(&self) {
        self.state.lock().unwrap().clear_annotations();
        self.host.clear_annotations();
        self.state
            .lock()
            .unwrap()
            .set_transcript("Cleared all annotations");
    }

    fn speech(&self, text: Option<String>) {
        match text {
            Some(text) => self.state.lock().unwrap().set_transcript(text),
            None => debug!("speech frame without text"),
        }
    }

    fn spawn_inspect(&self, page: Option<u32>, image_index: Option<i64>) {
        let (Some(page), Some(index)) = (page, image_index) else {
            debug!("inspect without page or image index");
            return;
        };
        self.state
            .lock()
            .unwrap()
            .set_transcript(format!("Inspecting image {index} on page {page}"));

        // Snapshot of everything the task needs; dispatch moves on
        let state = self.state.clone();
        let provider = self.provider.clone();
        let host = self.host.clone();
        thread::spawn(move || run_inspect_task(state, provider, host, page, index));
    }

    /// Synchronous inspect path, used directly by tests.
    pub(crate) fn run_inspect(&self, page: u32, index: i64) {
        run_inspect_task(
            self.state.clone(),
            self.provider.clone(),
            self.host.clone(),
            page,
            index,
        );
    }

    /// Clamp, update the active page, and ask the host to bring it into view.
    fn go_to_page(&self, page: u32) -> u32 {
        let target = {
            let mut state = self.state.lock().unwrap();
            state.set_active_page(page);
            state.active_page
        };
        self.host.scroll_to_page(target);
        target
    }
}

/// Resolve and decode the requested page image. Runs off the dispatch
/// thread; every failure leaves state untouched. A write that lands after
/// a `clear` is accepted as-is: last write wins.
fn run_inspect_task(
    state: SharedViewState,
    provider: Arc<dyn DocumentProvider>,
    host: Arc<dyn RenderHost>,
    page: u32,
    index: i64,
) {
    match inspect::locate_and_decode(provider.as_ref(), page, index) {
        Ok(Some(bitmap)) => {
            host.show_bitmap(&bitmap);
            state.lock().unwrap().inspected_image = Some(bitmap);
        }
        Ok(None) => debug!("no inspectable image {index} on page {page}"),
        Err(err) => warn!("inspect of page {page} failed: {err:#}"),
    }
}
