//! Generated overlay content and its composition onto pages.
//!
//! # Coordinate System
//!
//! PDF user space has its origin at the bottom-left corner of the media
//! box, X to the right, Y upward. The watermark is drawn around the box
//! center: `Tm` installs a rotation about the center, then `Td` shifts the
//! baseline so the text's visual middle lands on it.
//!
//! # Composition
//!
//! Composition never edits existing content. The overlay becomes a Form
//! XObject carrying its own font and graphics state, and the page gets a
//! fresh dictionary whose `/Contents` is
//!
//! ```text
//! [ "q", existing streams..., "Q", "q /Wm Do Q" ]
//! ```
//!
//! so any graphics state the page content leaves behind is reset
//! before the overlay draws, and overlay resource names cannot collide
//! with the page's own.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as Arena, Object, ObjectId, Stream, StringFormat};

use super::document::{MediaBox, Page};
use crate::config::WatermarkStyle;
use crate::error::{Error, Result};

// =============================================================================
// Layout Constants
// =============================================================================

/// Share of the page diagonal the text may span.
const DIAGONAL_FILL: f32 = 0.9;

/// Smallest font size the fit-to-page shrink goes down to.
const MIN_FONT_SIZE: f32 = 1.0;

/// Baseline drop, as a fraction of the font size, that centers Helvetica
/// capitals vertically.
const BASELINE_SHIFT: f32 = 0.35;

/// Width used for bytes outside the printable ASCII table.
const FALLBACK_GLYPH_WIDTH: u16 = 556;

/// Helvetica advance widths for bytes 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, //
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, //
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, //
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Resource name of the font inside the overlay form.
const FONT_RESOURCE: &str = "FWm";

/// Resource name of the graphics state inside the overlay form.
const GSTATE_RESOURCE: &str = "GSWm";

/// Preferred name of the overlay form inside a page's `/XObject` dictionary.
const FORM_RESOURCE: &str = "Wm";

// =============================================================================
// Overlay
// =============================================================================

/// Single-page generated content, ready to be composed onto a page.
#[derive(Debug, Clone)]
pub struct Overlay {
    text: String,
    font_size: f32,
    media_box: MediaBox,
    content: Vec<u8>,
}

impl Overlay {
    /// Centered, rotated watermark sized to `media_box`.
    pub fn watermark(text: &str, style: &WatermarkStyle, media_box: MediaBox) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidOperands("watermark text must not be blank".into()));
        }

        let encoded = encode_win_ansi(text);
        let font_size = fit_font_size(&encoded, style.font_size, media_box);
        let text_width = text_width(&encoded, font_size);

        let (cx, cy) = media_box.center();
        let (sin, cos) = style.angle_degrees.to_radians().sin_cos();

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(GSTATE_RESOURCE.into())]),
            Operation::new(
                "rg",
                vec![
                    Object::Real(style.gray),
                    Object::Real(style.gray),
                    Object::Real(style.gray),
                ],
            ),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.into()), Object::Real(font_size)],
            ),
            Operation::new(
                "Tm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    Object::Real(cx),
                    Object::Real(cy),
                ],
            ),
            Operation::new(
                "Td",
                vec![
                    Object::Real(-text_width / 2.0),
                    Object::Real(-font_size * BASELINE_SHIFT),
                ],
            ),
            Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];

        let content = Content { operations }
            .encode()
            .map_err(|e| Error::Lopdf(format!("failed to encode overlay content: {e}")))?;

        Ok(Self {
            text: text.to_string(),
            font_size,
            media_box,
            content,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Font size after fitting to the page.
    pub const fn font_size(&self) -> f32 {
        self.font_size
    }

    pub const fn media_box(&self) -> MediaBox {
        self.media_box
    }

    /// Encoded content stream bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Shared font and graphics-state objects an overlay draws with.
#[derive(Debug, Clone, Copy)]
pub struct OverlayResources {
    font: ObjectId,
    gstate: ObjectId,
}

impl OverlayResources {
    /// Add a standard Helvetica font and an ExtGState with `opacity` to
    /// the arena. Done once per document, shared by every page.
    pub fn install(arena: &mut Arena, style: &WatermarkStyle) -> Self {
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        let font = arena.add_object(Object::Dictionary(font));

        let mut gstate = Dictionary::new();
        gstate.set("Type", Object::Name(b"ExtGState".to_vec()));
        gstate.set("ca", Object::Real(style.opacity));
        gstate.set("CA", Object::Real(style.opacity));
        let gstate = arena.add_object(Object::Dictionary(gstate));

        Self { font, gstate }
    }
}

/// Compose `overlay` above the content of `page`.
///
/// Writes a new page dictionary and returns the page value naming it; the
/// dictionary `page` refers to is left as it was.
pub fn compose(
    arena: &mut Arena,
    page: &Page,
    overlay: &Overlay,
    resources: OverlayResources,
) -> Result<Page> {
    let mut dict = arena
        .get_dictionary(page.id())
        .map_err(|e| Error::Lopdf(format!("failed to get page dictionary: {e}")))?
        .clone();

    let form = add_form(arena, overlay, resources);
    let mut page_resources = owned_dictionary(arena, dict.get(b"Resources").ok());
    let form_name = add_resource(arena, &mut page_resources, b"XObject", FORM_RESOURCE, form);
    dict.set("Resources", Object::Dictionary(page_resources));

    let existing = existing_contents(arena, dict.get(b"Contents").ok());
    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        contents.push(Object::Reference(add_stream(arena, b"q\n".to_vec())));
        contents.extend(existing);
        contents.push(Object::Reference(add_stream(arena, b"\nQ\n".to_vec())));
    }
    let mut invoke = b"q /".to_vec();
    invoke.extend_from_slice(&form_name);
    invoke.extend_from_slice(b" Do Q\n");
    contents.push(Object::Reference(add_stream(arena, invoke)));
    dict.set("Contents", Object::Array(contents));

    let new_id = arena.add_object(Object::Dictionary(dict));
    Ok(page.clone().with_id(new_id))
}

/// Wrap the overlay content in a Form XObject over its media box.
fn add_form(arena: &mut Arena, overlay: &Overlay, resources: OverlayResources) -> ObjectId {
    let mut fonts = Dictionary::new();
    fonts.set(FONT_RESOURCE, Object::Reference(resources.font));
    let mut gstates = Dictionary::new();
    gstates.set(GSTATE_RESOURCE, Object::Reference(resources.gstate));
    let mut form_resources = Dictionary::new();
    form_resources.set("Font", Object::Dictionary(fonts));
    form_resources.set("ExtGState", Object::Dictionary(gstates));

    let mut form = Dictionary::new();
    form.set("Type", Object::Name(b"XObject".to_vec()));
    form.set("Subtype", Object::Name(b"Form".to_vec()));
    form.set("FormType", Object::Integer(1));
    form.set("BBox", overlay.media_box().to_object());
    form.set("Resources", Object::Dictionary(form_resources));
    arena.add_object(Object::Stream(Stream::new(form, overlay.content().to_vec())))
}

fn add_stream(arena: &mut Arena, content: Vec<u8>) -> ObjectId {
    arena.add_object(Object::Stream(Stream::new(Dictionary::new(), content)))
}

/// Existing `/Contents` as a list of stream references. An indirect array
/// is flattened into its entries.
fn existing_contents(arena: &Arena, contents: Option<&Object>) -> Vec<Object> {
    fn stream_refs(items: &[Object]) -> Vec<Object> {
        items
            .iter()
            .filter(|item| matches!(item, Object::Reference(_)))
            .cloned()
            .collect()
    }

    match contents {
        Some(Object::Reference(id)) => match arena.get_object(*id) {
            Ok(Object::Array(items)) => stream_refs(items),
            _ => vec![Object::Reference(*id)],
        },
        Some(Object::Array(items)) => stream_refs(items),
        _ => Vec::new(),
    }
}

/// Resolve an optional, possibly indirect dictionary into an owned copy.
fn owned_dictionary(arena: &Arena, object: Option<&Object>) -> Dictionary {
    match object {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => arena
            .get_dictionary(*id)
            .map_or_else(|_| Dictionary::new(), Clone::clone),
        _ => Dictionary::new(),
    }
}

/// Register `id` under `name` in the `category` subdictionary, picking a
/// fresh name if `name` is taken by something else. Returns the name used.
fn add_resource(
    arena: &Arena,
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    id: ObjectId,
) -> Vec<u8> {
    let mut entries = owned_dictionary(arena, resources.get(category).ok());
    let mut key = name.as_bytes().to_vec();
    let mut suffix = 1u32;
    while entries
        .get(&key)
        .is_ok_and(|existing| !matches!(existing, Object::Reference(r) if *r == id))
    {
        key = format!("{name}{suffix}").into_bytes();
        suffix += 1;
    }
    entries.set(key.clone(), Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
    key
}

// =============================================================================
// Text Metrics
// =============================================================================

/// Encode as WinAnsi for a standard Type 1 font. Characters outside
/// Latin-1 become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => u8::try_from(code).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}

/// Advance width of WinAnsi `text` at `font_size`, in points.
pub fn text_width(text: &[u8], font_size: f32) -> f32 {
    let units: u32 = text
        .iter()
        .map(|&b| {
            let width = b
                .checked_sub(32)
                .and_then(|i| HELVETICA_WIDTHS.get(usize::from(i)))
                .copied()
                .unwrap_or(FALLBACK_GLYPH_WIDTH);
            u32::from(width)
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let units = units as f32;
    units * font_size / 1000.0
}

/// Shrink `preferred` until the text fits along the page diagonal.
fn fit_font_size(text: &[u8], preferred: f32, media_box: MediaBox) -> f32 {
    let diagonal = media_box.width().hypot(media_box.height());
    let width_at_preferred = text_width(text, preferred);
    let limit = diagonal * DIAGONAL_FILL;
    if width_at_preferred <= limit || width_at_preferred <= 0.0 {
        return preferred;
    }
    (preferred * limit / width_at_preferred).max(MIN_FONT_SIZE)
}
