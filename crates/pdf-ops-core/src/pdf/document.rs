use lopdf::{Document as Arena, Object, ObjectId};

use super::page_index::PageIndex;
use super::rotation::Rotation;
use super::security::StandardSecurity;
use crate::error::{Error, Result};

/// Page box in default user space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl MediaBox {
    /// US Letter, used when a page tree carries no box at all.
    pub const LETTER: Self = Self {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// Parse a `[llx lly urx ury]` array. Corners are normalized so that
    /// width and height are never negative.
    pub fn from_object(object: &Object) -> Option<Self> {
        let Object::Array(values) = object else {
            return None;
        };
        let numbers: Vec<f32> = values.iter().filter_map(number).collect();
        let [x0, y0, x1, y1] = numbers.as_slice() else {
            return None;
        };
        Some(Self {
            llx: x0.min(*x1),
            lly: y0.min(*y1),
            urx: x0.max(*x1),
            ury: y0.max(*y1),
        })
    }

    pub fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ])
    }

    pub fn width(self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(self) -> f32 {
        self.ury - self.lly
    }

    pub fn center(self) -> (f32, f32) {
        ((self.llx + self.urx) / 2.0, (self.lly + self.ury) / 2.0)
    }
}

impl Default for MediaBox {
    fn default() -> Self {
        Self::LETTER
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// One page of a [`Document`].
///
/// A page is a value: it names the page dictionary inside the owning
/// arena, plus the attributes transforms change. Two pages may name the
/// same dictionary (a split that repeats an index); encoding gives each
/// its own object.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    id: ObjectId,
    rotation: Rotation,
    media_box: MediaBox,
}

impl Page {
    pub const fn new(id: ObjectId, rotation: Rotation, media_box: MediaBox) -> Self {
        Self {
            id,
            rotation,
            media_box,
        }
    }

    /// Id of the page dictionary in the owning arena.
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub const fn media_box(&self) -> MediaBox {
        self.media_box
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub(crate) const fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }
}

/// Whether the arena holds plaintext or Standard Security Handler
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityState {
    Open,
    Encrypted(StandardSecurity),
}

/// A decoded PDF: object arena, ordered pages, security state.
pub struct Document {
    arena: Arena,
    pages: Vec<Page>,
    security: SecurityState,
}

impl Document {
    pub(crate) const fn from_parts(arena: Arena, pages: Vec<Page>, security: SecurityState) -> Self {
        Self {
            arena,
            pages,
            security,
        }
    }

    pub(crate) fn into_parts(self) -> (Arena, Vec<Page>, SecurityState) {
        (self.arena, self.pages, self.security)
    }

    pub(crate) const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Same arena and security, different page sequence.
    #[must_use]
    pub(crate) fn with_pages(self, pages: Vec<Page>) -> Self {
        Self { pages, ..self }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub const fn security(&self) -> &SecurityState {
        &self.security
    }

    pub const fn is_encrypted(&self) -> bool {
        matches!(self.security, SecurityState::Encrypted(_))
    }

    /// PDF header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.arena.version
    }

    /// Fails with [`Error::LockedDocument`] unless the document is open.
    pub fn ensure_open(&self) -> Result<()> {
        match self.security {
            SecurityState::Open => Ok(()),
            SecurityState::Encrypted(_) => Err(Error::LockedDocument),
        }
    }

    /// Decoded content stream bytes of one page, all content streams
    /// concatenated.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let index = PageIndex::try_from_page_num(index, self.page_count())?;
        self.arena
            .get_page_content(self.pages[index.as_usize()].id)
            .map_err(|e| Error::Lopdf(format!("failed to read page content: {e}")))
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.arena.version)
            .field("page_count", &self.pages.len())
            .field("objects", &self.arena.objects.len())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}
