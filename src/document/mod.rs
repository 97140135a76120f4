//! Collaborator boundary: the document/rendering layer the engine drives.
//!
//! The engine never renders anything itself. It reads page structure
//! through [`DocumentProvider`] and issues view requests through
//! [`RenderHost`]; both are supplied at construction.

pub mod inspect;

use anyhow::Result;
use image::RgbaImage;

use crate::view::highlight::HighlightInstruction;

/// One drawing operation from a page's operator list, reduced to what the
/// engine cares about: whether it paints an image.
#[derive(Debug, Clone)]
pub enum DrawOp {
    /// Paints a referenced image object, addressed by object name.
    PaintImage { object: String },
    /// Paints an image embedded directly in the content stream.
    PaintInlineImage { image: RawImage },
    /// Any operation that does not paint an image.
    Other,
}

/// Image object as handed over by the rendering library.
#[derive(Debug, Clone)]
pub enum RawImage {
    /// Already-decoded bitmap handle (fast path).
    Bitmap(RgbaImage),
    /// Raw sample buffer; component layout is inferred from byte length.
    Raw {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

/// Inbound side of the collaborator boundary.
pub trait DocumentProvider: Send + Sync {
    /// Page count of the loaded document; 0 while nothing is loaded.
    fn page_count(&self) -> u32;

    /// Intrinsic page width at scale 1.0, for base-scale fitting.
    fn page_width(&self, page: u32) -> f32;

    /// Ordered drawing operations for a page. May block; the engine only
    /// calls it from inspect worker threads.
    fn operator_list(&self, page: u32) -> Result<Vec<DrawOp>>;

    /// Resolve a referenced image object from the page's resources.
    fn image_object(&self, page: u32, object: &str) -> Result<RawImage>;
}

/// Outbound side: requests the engine issues to the view layer.
pub trait RenderHost: Send + Sync {
    /// Bring a page into view. Scroll/focus semantics belong to the host.
    fn scroll_to_page(&self, page: u32);

    /// Paint (or repaint) the highlight instruction for a page.
    fn apply_highlight(&self, page: u32, instruction: &HighlightInstruction);

    /// Drop every highlight overlay and close any open image modal.
    fn clear_annotations(&self);

    /// Present an inspected bitmap in the host's modal layer.
    fn show_bitmap(&self, bitmap: &RgbaImage);
}

/// Dense page-number → view-handle map, populated and cleared by the
/// rendering collaborator's mount/unmount hooks. Host implementations use
/// it to answer `scroll_to_page` only for pages that are actually mounted.
pub struct PageArena<H> {
    pages: Vec<Option<H>>,
}

impl<H> PageArena<H> {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Register the view handle for a 1-based page number.
    pub fn mount(&mut self, page: u32, handle: H) {
        if page == 0 {
            return;
        }
        let index = (page - 1) as usize;
        if index >= self.pages.len() {
            self.pages.resize_with(index + 1, || None);
        }
        self.pages[index] = Some(handle);
    }

    pub fn unmount(&mut self, page: u32) {
        if page == 0 {
            return;
        }
        if let Some(slot) = self.pages.get_mut((page - 1) as usize) {
            *slot = None;
        }
    }

    pub fn get(&self, page: u32) -> Option<&H> {
        if page == 0 {
            return None;
        }
        self.pages.get((page - 1) as usize)?.as_ref()
    }

    pub fn is_mounted(&self, page: u32) -> bool {
        self.get(page).is_some()
    }

    /// Drop every handle, e.g. when the document is replaced.
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

impl<H> Default for PageArena<H> {
    fn default() -> Self {
        Self::new()
    }
}
