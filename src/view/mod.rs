//! Shared view state for the presentation engine.
//!
//! One `ViewState` exists per presentation view. The command dispatcher and
//! the viewport geometry engine are its only writers; everything else reads
//! through the shared handle.

pub mod highlight;
pub mod viewport;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use self::highlight::HighlightRegion;

/// Zoom bounds applied to every zoom mutation.
pub const MIN_ZOOM: f32 = 0.4;
pub const MAX_ZOOM: f32 = 3.0;

/// Step applied when a zoom command carries no usable field.
pub const ZOOM_STEP: f32 = 0.1;

/// Current state of the viewer as driven by remote commands.
pub struct ViewState {
    /// Page currently in view, 1-based. Always within `[1, max(num_pages, 1)]`.
    pub active_page: u32,
    /// Page count of the loaded document; 0 until the document loads.
    pub num_pages: u32,
    /// Fit-to-container scale computed by the viewport engine.
    pub base_scale: f32,
    /// User zoom multiplier on top of `base_scale`.
    pub zoom_level: f32,
    /// At most one highlight region per page; replaced, never merged.
    pub highlights: HashMap<u32, HighlightRegion>,
    /// Most recently inspected embedded image, if any.
    pub inspected_image: Option<RgbaImage>,
    /// Latest spoken text or command status line.
    pub transcript: String,
    /// Control channel status.
    pub connected: bool,
    /// Audio capture toggle.
    pub listening: bool,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            active_page: 1,
            num_pages: 0,
            base_scale: 1.0,
            zoom_level: 1.2,
            highlights: HashMap::new(),
            inspected_image: None,
            transcript: "Waiting for commands...".to_string(),
            connected: false,
            listening: false,
        }
    }

    pub fn new_shared() -> SharedViewState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Clamp a page number into the valid range. With an unknown page count
    /// only the floor applies.
    pub fn clamp_page(&self, page: u32) -> u32 {
        if self.num_pages == 0 {
            page.max(1)
        } else {
            page.clamp(1, self.num_pages)
        }
    }

    pub fn set_active_page(&mut self, page: u32) {
        self.active_page = self.clamp_page(page);
    }

    /// Record the document's page count and re-clamp the active page.
    pub fn set_num_pages(&mut self, num_pages: u32) {
        self.num_pages = num_pages;
        self.active_page = self.clamp_page(self.active_page);
    }

    pub fn set_zoom(&mut self, value: f32) {
        self.zoom_level = value.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.set_zoom(self.zoom_level + delta);
    }

    /// Replace the highlight region for a page.
    pub fn set_highlight(&mut self, page: u32, region: HighlightRegion) {
        self.highlights.insert(page, region);
    }

    /// Drop all highlight regions and the inspected image.
    pub fn clear_annotations(&mut self) {
        self.highlights.clear();
        self.inspected_image = None;
    }

    pub fn set_transcript(&mut self, text: impl Into<String>) {
        self.transcript = text.into();
    }

    pub fn set_base_scale(&mut self, scale: f32) {
        self.base_scale = scale;
    }

    /// Scale the renderer should actually display at.
    pub fn effective_scale(&self) -> f32 {
        self.base_scale * self.zoom_level
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedViewState = Arc<Mutex<ViewState>>;
