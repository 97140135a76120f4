//! Highlight regions and the renderable instructions compiled from them.
//!
//! A region addresses a contiguous run of text tokens by sibling index; the
//! rendering collaborator guarantees that token indices are stable across
//! re-renders.

/// Default color when an ink command omits one.
pub const DEFAULT_INK_COLOR: &str = "red";
/// Default color when a marker command omits one.
pub const DEFAULT_MARKER_COLOR: &str = "yellow";

/// Marker overlays are painted translucent so the page text stays legible.
const MARKER_OPACITY: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    /// Replace the glyph color of the addressed tokens.
    Ink,
    /// Paint a translucent band behind the addressed tokens.
    Marker,
}

/// The single annotation tracked per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRegion {
    pub start_index: u32,
    pub end_index: u32,
    pub color: String,
    pub kind: HighlightKind,
}

impl HighlightRegion {
    pub fn ink(start_index: u32, end_index: u32, color: String) -> Self {
        Self {
            start_index,
            end_index,
            color,
            kind: HighlightKind::Ink,
        }
    }

    pub fn marker(start_index: u32, end_index: u32, color: String) -> Self {
        Self {
            start_index,
            end_index,
            color,
            kind: HighlightKind::Marker,
        }
    }
}

/// How the addressed tokens should be painted.
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightStyle {
    /// Opaque color override of the token glyphs themselves.
    InkOverride { color: String },
    /// Translucent band painted over the tokens.
    MarkerOverlay { color: String, opacity: f32 },
}

/// Instruction handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightInstruction {
    pub start_index: u32,
    pub end_index: u32,
    pub style: HighlightStyle,
}

/// Compile a stored region into its renderable instruction.
pub fn compile(region: &HighlightRegion) -> HighlightInstruction {
    let style = match region.kind {
        HighlightKind::Ink => HighlightStyle::InkOverride {
            color: region.color.clone(),
        },
        HighlightKind::Marker => HighlightStyle::MarkerOverlay {
            color: region.color.clone(),
            opacity: MARKER_OPACITY,
        },
    };
    HighlightInstruction {
        start_index: region.start_index,
        end_index: region.end_index,
        style,
    }
}
