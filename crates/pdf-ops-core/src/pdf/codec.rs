//! Bytes to [`Document`] and back.
//!
//! Decoding loads the object arena with lopdf, checks the catalog and
//! page tree, and reads the security state from the trailer. Open
//! documents get their inheritable page attributes copied down from the
//! page tree so every page dictionary stands alone.
//!
//! Encoding an open document writes a fresh catalog and a flat page tree
//! in page order, then prunes, renumbers and compresses. Encrypted
//! documents are written as they are: object numbers feed the per-object
//! keys, so renumbering would corrupt them.

use std::collections::HashSet;

use lopdf::{Dictionary, Document as Arena, Object, ObjectId};
use tracing::debug;

use super::document::{Document, MediaBox, Page, SecurityState};
use super::rotation::Rotation;
use super::security::StandardSecurity;
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Trailer entries an encrypted document keeps.
const ENCRYPTED_TRAILER_KEYS: [&[u8]; 4] = [b"Root", b"Info", b"Encrypt", b"ID"];

/// Ancestor chains deeper than this are treated as cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Decode PDF bytes.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(Error::MalformedDocument("empty input".into()));
    }

    let arena = Arena::load_mem(bytes)
        .map_err(|e| Error::MalformedDocument(format!("failed to parse PDF: {e}")))?;

    let document = match read_security(&arena)? {
        Some(security) => {
            let pages = survey_pages(&arena)?;
            Document::from_parts(arena, pages, SecurityState::Encrypted(security))
        }
        None => open_arena(arena)?,
    };

    debug!(
        pages = document.page_count(),
        encrypted = document.is_encrypted(),
        version = document.version(),
        "decoded document"
    );
    Ok(document)
}

/// Encode a document to PDF bytes.
pub fn encode(document: &Document) -> Result<Vec<u8>> {
    let mut arena = match document.security() {
        SecurityState::Open => materialize(document)?,
        SecurityState::Encrypted(_) => verbatim(document.arena()),
    };
    save(&mut arena)
}

/// Build an open [`Document`] from a plaintext arena: inline inherited
/// page attributes, then read the page list.
pub(crate) fn open_arena(mut arena: Arena) -> Result<Document> {
    for page_id in page_ids(&arena)? {
        inline_inherited(&mut arena, page_id)?;
    }
    let pages = survey_pages(&arena)?;
    Ok(Document::from_parts(arena, pages, SecurityState::Open))
}

/// Fresh arena holding exactly the document's pages, in order, with a new
/// catalog and single-level page tree. Unreachable objects are dropped,
/// objects renumbered from 1 and streams compressed.
pub(crate) fn materialize(document: &Document) -> Result<Arena> {
    let source = document.arena();
    let mut arena = Arena::with_version(source.version.clone());
    arena.objects = source.objects.clone();
    arena.max_id = source.max_id;

    let pages_id = arena.new_object_id();
    let mut placed: HashSet<ObjectId> = HashSet::new();
    let mut kids = Vec::with_capacity(document.page_count());

    for page in document.pages() {
        let mut dict = source
            .get_dictionary(page.id())
            .map_err(|e| Error::Lopdf(format!("page {:?} missing from arena: {e}", page.id())))?
            .clone();
        dict.set("Type", Object::Name(b"Page".to_vec()));
        dict.set("Parent", Object::Reference(pages_id));
        dict.set("Rotate", Object::Integer(page.rotation().degrees()));
        if dict.get(b"MediaBox").is_err() {
            dict.set("MediaBox", page.media_box().to_object());
        }

        let id = if placed.insert(page.id()) {
            arena.objects.insert(page.id(), Object::Dictionary(dict));
            page.id()
        } else {
            arena.add_object(Object::Dictionary(dict))
        };
        kids.push(Object::Reference(id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    #[allow(clippy::cast_possible_wrap)]
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    arena.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = arena.add_object(Object::Dictionary(catalog));

    arena.trailer = Dictionary::new();
    arena.trailer.set("Root", Object::Reference(catalog_id));
    if let Ok(info) = source.trailer.get(b"Info")
        && matches!(info, Object::Reference(_))
    {
        arena.trailer.set("Info", info.clone());
    }

    let pruned = arena.prune_objects();
    arena.renumber_objects();
    arena.compress();
    debug!(pruned = pruned.len(), objects = arena.objects.len(), "materialized arena");
    Ok(arena)
}

/// Copy of an encrypted arena with object numbers untouched and a clean
/// trailer.
fn verbatim(source: &Arena) -> Arena {
    let mut arena = Arena::with_version(source.version.clone());
    arena.objects = source.objects.clone();
    arena.max_id = source.max_id;
    arena.trailer = Dictionary::new();
    for key in ENCRYPTED_TRAILER_KEYS {
        if let Ok(value) = source.trailer.get(key) {
            arena.trailer.set(key.to_vec(), value.clone());
        }
    }
    arena
}

fn save(arena: &mut Arena) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    arena
        .save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;
    Ok(output)
}

/// Page values for every page in the arena's page tree, in order.
pub(crate) fn survey_pages(arena: &Arena) -> Result<Vec<Page>> {
    let pages = page_ids(arena)?
        .into_iter()
        .map(|id| {
            let rotation = inherited(arena, id, b"Rotate")
                .and_then(|value| match value {
                    Object::Integer(degrees) => Some(Rotation::from_page_attribute(degrees)),
                    _ => None,
                })
                .unwrap_or_default();
            let media_box = inherited(arena, id, b"MediaBox")
                .as_ref()
                .and_then(MediaBox::from_object)
                .unwrap_or_default();
            Page::new(id, rotation, media_box)
        })
        .collect();
    Ok(pages)
}

/// Leaf page ids in page-tree order.
///
/// Every `/Kids` entry must resolve to a dictionary, no node may appear
/// twice, and the leaf count must match the root's `/Count`.
fn page_ids(arena: &Arena) -> Result<Vec<ObjectId>> {
    let catalog = arena
        .catalog()
        .map_err(|e| Error::MalformedDocument(format!("missing catalog: {e}")))?;
    let (root_id, root) = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => (Some(*id), arena.get_dictionary(*id).ok()),
        Ok(Object::Dictionary(dict)) => (None, Some(dict)),
        _ => (None, None),
    };
    let root = root.ok_or_else(|| Error::MalformedDocument("catalog has no page tree".into()))?;

    let mut visited: HashSet<ObjectId> = root_id.into_iter().collect();
    let mut pages = Vec::new();
    collect_leaves(arena, root, 0, &mut visited, &mut pages)?;

    if let Ok(Object::Integer(count)) = root.get(b"Count")
        && usize::try_from(*count).ok() != Some(pages.len())
    {
        return Err(Error::MalformedDocument(format!(
            "page tree /Count is {count} but the tree holds {} pages",
            pages.len()
        )));
    }
    Ok(pages)
}

fn collect_leaves(
    arena: &Arena,
    node: &Dictionary,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    pages: &mut Vec<ObjectId>,
) -> Result<()> {
    if depth >= MAX_TREE_DEPTH {
        return Err(Error::MalformedDocument("page tree is too deep".into()));
    }
    let kids = match node.get(b"Kids") {
        Ok(Object::Array(kids)) => kids,
        Ok(Object::Reference(id)) => arena
            .get_object(*id)
            .and_then(Object::as_array)
            .map_err(|e| Error::MalformedDocument(format!("unresolvable /Kids {id:?}: {e}")))?,
        _ => return Err(Error::MalformedDocument("page tree node has no /Kids".into())),
    };

    for kid in kids {
        let Object::Reference(id) = kid else {
            return Err(Error::MalformedDocument("page tree kid is not a reference".into()));
        };
        if !visited.insert(*id) {
            return Err(Error::MalformedDocument(format!("page tree revisits {id:?}")));
        }
        let dict = arena.get_dictionary(*id).map_err(|e| {
            Error::MalformedDocument(format!("page tree kid {id:?} is not a dictionary: {e}"))
        })?;
        if is_tree_node(dict) {
            collect_leaves(arena, dict, depth + 1, visited, pages)?;
        } else {
            pages.push(*id);
        }
    }
    Ok(())
}

fn is_tree_node(dict: &Dictionary) -> bool {
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => name == b"Pages",
        _ => dict.get(b"Kids").is_ok(),
    }
}

/// The trailer's `/Encrypt` handler, if any.
fn read_security(arena: &Arena) -> Result<Option<StandardSecurity>> {
    let (dict, encrypt_id) = match arena.trailer.get(b"Encrypt") {
        Err(_) => return Ok(None),
        Ok(Object::Reference(id)) => {
            let dict = arena
                .get_dictionary(*id)
                .map_err(|e| Error::MalformedDocument(format!("unresolvable /Encrypt: {e}")))?;
            (dict, Some(*id))
        }
        Ok(Object::Dictionary(dict)) => (dict, None),
        Ok(_) => return Err(Error::MalformedDocument("/Encrypt is not a dictionary".into())),
    };

    let file_id = match arena.trailer.get(b"ID") {
        Ok(Object::Array(ids)) => match ids.first() {
            Some(Object::String(bytes, _)) => bytes.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    StandardSecurity::from_encrypt_dict(dict, file_id, encrypt_id).map(Some)
}

/// Resolve an attribute on a page or its nearest ancestor that has it,
/// following references.
fn inherited(arena: &Arena, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = arena.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(arena, value).clone());
        }
        current = match current.get(b"Parent") {
            Ok(Object::Reference(parent)) => arena.get_dictionary(*parent).ok()?,
            _ => return None,
        };
    }
    None
}

fn resolve<'a>(arena: &'a Arena, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => arena.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Copy inheritable attributes missing on the page from its ancestors.
fn inline_inherited(arena: &mut Arena, page_id: ObjectId) -> Result<()> {
    let missing: Vec<(&[u8], Object)> = {
        let dict = arena
            .get_dictionary(page_id)
            .map_err(|e| Error::MalformedDocument(format!("page {page_id:?} is not a dictionary: {e}")))?;
        INHERITABLE
            .iter()
            .filter(|key| dict.get(key).is_err())
            .filter_map(|key| inherited(arena, page_id, key).map(|value| (*key, value)))
            .collect()
    };
    if missing.is_empty() {
        return Ok(());
    }
    let dict = arena
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::Lopdf(format!("failed to update page {page_id:?}: {e}")))?;
    for (key, value) in missing {
        dict.set(key.to_vec(), value);
    }
    Ok(())
}
