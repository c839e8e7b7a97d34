//! Structural operations over decoded documents.
//!
//! Every function here is pure: documents in, document out, no I/O and no
//! logging sink beyond `tracing` events. [`apply`] dispatches a validated
//! [`Operation`] onto these functions.

use lopdf::{Document as Arena, Object, ObjectId, StringFormat};
use tracing::debug;
use uuid::Uuid;

use crate::config::WatermarkStyle;
use crate::error::{Error, Result};
use crate::pdf::overlay::{self, Overlay, OverlayResources};
use crate::pdf::security::{self, StandardSecurity};
use crate::pdf::{Document, PageIndex, Rotation, SecurityState, codec};
use crate::request::{Operation, TargetFormat};
use crate::util::version_at_least;

/// Header version of merged output.
const MERGED_VERSION: &str = "1.5";

/// Lowest header version that allows 128-bit RC4.
const ENCRYPTED_MIN_VERSION: &str = "1.4";

/// Input or output of a transform.
///
/// Conversions work on bytes that are never decoded; everything else works
/// on decoded documents.
#[derive(Debug)]
pub enum Artifact {
    Document(Document),
    Raw(Vec<u8>),
}

impl Artifact {
    /// The decoded document, or `Internal` if this artifact is raw bytes.
    pub fn into_document(self) -> Result<Document> {
        match self {
            Self::Document(document) => Ok(document),
            Self::Raw(_) => Err(Error::Internal("expected a decoded document".into())),
        }
    }

    /// Serialized form: encoded PDF for documents, the bytes themselves
    /// for raw artifacts.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Document(document) => codec::encode(&document),
            Self::Raw(bytes) => Ok(bytes),
        }
    }
}

/// Run `operation` over its inputs.
///
/// Merge consumes every input; the other operations use the first.
pub fn apply(operation: &Operation, inputs: Vec<Artifact>, style: &WatermarkStyle) -> Result<Artifact> {
    if let Operation::Merge = operation {
        let documents = inputs
            .into_iter()
            .map(Artifact::into_document)
            .collect::<Result<Vec<_>>>()?;
        return merge(documents).map(Artifact::Document);
    }

    let input = inputs
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidOperands(format!("{} needs an input", operation.name())))?;

    let output = match operation {
        Operation::Merge => return Err(Error::Internal("merge dispatched with one input".into())),
        Operation::Split { pages } => Artifact::Document(split(input.into_document()?, pages)?),
        Operation::Rotate { rotation } => Artifact::Document(rotate(input.into_document()?, *rotation)?),
        Operation::Watermark { text } => {
            Artifact::Document(watermark(input.into_document()?, text, style)?)
        }
        Operation::Protect { password } => {
            Artifact::Document(protect(input.into_document()?, password)?)
        }
        Operation::Unlock { password } => {
            Artifact::Document(unlock(input.into_document()?, password)?)
        }
        Operation::Compress => Artifact::Document(compress(input.into_document()?)),
        Operation::ConvertTo => convert_to(input),
        Operation::ConvertFrom { format } => convert_from(input, *format),
    };
    Ok(output)
}

/// Concatenate the pages of every input, in order.
pub fn merge(documents: Vec<Document>) -> Result<Document> {
    if documents.is_empty() {
        return Err(Error::InvalidOperands("merge needs at least one document".into()));
    }
    for document in &documents {
        document.ensure_open()?;
    }

    let mut arena = Arena::with_version(MERGED_VERSION);
    let mut pages = Vec::new();
    let mut offset: u32 = 0;

    for document in documents {
        let (source, source_pages, _) = document.into_parts();
        let highest = source
            .objects
            .keys()
            .map(|&(number, _)| number)
            .max()
            .unwrap_or(0)
            .max(source.max_id);

        for (id, mut object) in source.objects {
            if is_document_structure(&object) {
                continue;
            }
            shift_references(&mut object, offset);
            arena.objects.insert(shifted(id, offset), object);
        }
        pages.extend(
            source_pages
                .into_iter()
                .map(|page| {
                    let id = shifted(page.id(), offset);
                    page.with_id(id)
                }),
        );
        offset = offset.saturating_add(highest);
    }
    arena.max_id = offset;

    debug!(pages = pages.len(), objects = arena.objects.len(), "merged documents");
    Ok(Document::from_parts(arena, pages, SecurityState::Open))
}

/// Catalog and page-tree nodes are rebuilt on encode, outlines are dropped.
fn is_document_structure(object: &Object) -> bool {
    matches!(
        object.type_name(),
        Ok(b"Catalog" | b"Pages" | b"Outlines" | b"Outline")
    )
}

const fn shifted((number, generation): ObjectId, offset: u32) -> ObjectId {
    (number.saturating_add(offset), generation)
}

fn shift_references(object: &mut Object, offset: u32) {
    match object {
        Object::Reference(id) => *id = shifted(*id, offset),
        Object::Array(items) => {
            for item in items {
                shift_references(item, offset);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                shift_references(value, offset);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                shift_references(value, offset);
            }
        }
        _ => {}
    }
}

/// Keep the requested pages in the requested order.
///
/// An empty list selects page 0. Negative and out-of-range indices are
/// skipped; if all are skipped the result has no pages.
pub fn split(document: Document, indices: &[i64]) -> Result<Document> {
    document.ensure_open()?;
    let total = document.page_count();

    let selected: Vec<_> = if indices.is_empty() {
        document.pages().first().cloned().into_iter().collect()
    } else {
        indices
            .iter()
            .filter_map(|&raw| PageIndex::resolve(raw, total))
            .map(|index| document.pages()[index.as_usize()].clone())
            .collect()
    };

    let skipped = indices.len().saturating_sub(selected.len());
    if skipped > 0 {
        debug!(skipped, total, "split skipped out-of-range page indices");
    }
    Ok(document.with_pages(selected))
}

/// Advance every page's rotation by `rotation`.
pub fn rotate(document: Document, rotation: Rotation) -> Result<Document> {
    document.ensure_open()?;
    let pages = document
        .pages()
        .iter()
        .map(|page| page.clone().with_rotation(page.rotation() + rotation))
        .collect();
    Ok(document.with_pages(pages))
}

/// Stamp `text` across every page.
pub fn watermark(document: Document, text: &str, style: &WatermarkStyle) -> Result<Document> {
    document.ensure_open()?;
    if text.trim().is_empty() {
        return Err(Error::InvalidOperands("watermark text must not be blank".into()));
    }

    let (mut arena, pages, security) = document.into_parts();
    let resources = OverlayResources::install(&mut arena, style);

    let mut composed = Vec::with_capacity(pages.len());
    for page in &pages {
        let overlay = Overlay::watermark(text, style, page.media_box())?;
        composed.push(overlay::compose(&mut arena, page, &overlay, resources)?);
    }

    debug!(pages = composed.len(), "watermarked document");
    Ok(Document::from_parts(arena, composed, security))
}

/// Encrypt with the Standard Security Handler, owner password equal to
/// `password`, every permission granted.
pub fn protect(document: Document, password: &str) -> Result<Document> {
    document.ensure_open()?;
    if password.is_empty() {
        return Err(Error::InvalidOperands("protect password must not be empty".into()));
    }

    let mut arena = codec::materialize(&document)?;
    let file_id = md5::compute(Uuid::new_v4().as_bytes()).0.to_vec();
    let (mut handler, key) = StandardSecurity::create(password, file_id.clone());

    security::encrypt_objects(&mut arena, &key);
    let encrypt_id = arena.add_object(Object::Dictionary(handler.encrypt_dictionary()));
    handler.set_encrypt_id(encrypt_id);

    arena.trailer.set("Encrypt", Object::Reference(encrypt_id));
    arena.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
            Object::String(file_id, StringFormat::Hexadecimal),
        ]),
    );
    if !version_at_least(&arena.version, 1, 4) {
        arena.version = ENCRYPTED_MIN_VERSION.to_string();
    }

    let pages = codec::survey_pages(&arena)?;
    debug!(pages = pages.len(), "protected document");
    Ok(Document::from_parts(arena, pages, SecurityState::Encrypted(handler)))
}

/// Remove encryption. Open documents pass through unchanged.
pub fn unlock(document: Document, password: &str) -> Result<Document> {
    let SecurityState::Encrypted(handler) = document.security() else {
        debug!("unlock on an open document is a no-op");
        return Ok(document);
    };
    let key = handler.authenticate(password).ok_or(Error::WrongCredential)?;
    let encrypt_id = handler.encrypt_id();

    let (mut arena, _, _) = document.into_parts();
    security::decrypt_objects(&mut arena, &key, encrypt_id);
    if let Some(id) = encrypt_id {
        arena.objects.remove(&id);
    }
    arena.trailer.remove(b"Encrypt");
    arena.trailer.remove(b"ID");

    let document = codec::open_arena(arena)?;
    debug!(pages = document.page_count(), "unlocked document");
    Ok(document)
}

/// Placeholder: returns the document unchanged.
pub const fn compress(document: Document) -> Document {
    document
}

/// Placeholder: returns the input unchanged.
pub const fn convert_to(input: Artifact) -> Artifact {
    input
}

/// Placeholder: returns the input unchanged whatever the target format.
pub fn convert_from(input: Artifact, format: TargetFormat) -> Artifact {
    debug!(%format, "conversion is a pass-through");
    input
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::testing::{PageSpec, build_pdf};
    use crate::pdf::{decode, encode};

    fn doc(pages: usize) -> Document {
        decode(&build_pdf(&vec![PageSpec::default(); pages])).unwrap()
    }

    fn reload(document: &Document) -> Document {
        decode(&encode(document).unwrap()).unwrap()
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let merged = merge(vec![doc(2), doc(3)]).unwrap();
        assert_eq!(merged.page_count(), 5);
        let merged = reload(&merged);
        assert_eq!(merged.page_count(), 5);
        assert_eq!(merged.page_content(1).unwrap(), doc(2).page_content(1).unwrap());
        assert_eq!(merged.page_content(2).unwrap(), doc(3).page_content(0).unwrap());
    }

    #[test]
    fn test_merge_empty_list() {
        assert!(matches!(merge(Vec::new()), Err(Error::InvalidOperands(_))));
    }

    #[test]
    fn test_merge_refuses_encrypted_input() {
        let locked = protect(doc(1), "pw").unwrap();
        assert!(matches!(merge(vec![doc(1), locked]), Err(Error::LockedDocument)));
    }

    #[test]
    fn test_split_selects_in_given_order() {
        let source = doc(4);
        let expected = source.page_content(3).unwrap();
        let result = split(source, &[3, 0, 3]).unwrap();
        assert_eq!(result.page_count(), 3);
        let result = reload(&result);
        assert_eq!(result.page_count(), 3);
        assert_eq!(result.page_content(0).unwrap(), expected);
        assert_eq!(result.page_content(2).unwrap(), expected);
    }

    #[test]
    fn test_split_edge_cases() {
        assert_eq!(split(doc(3), &[]).unwrap().page_count(), 1);
        assert_eq!(split(doc(3), &[-1, 7, 1]).unwrap().page_count(), 1);
        assert_eq!(split(doc(3), &[5, 9]).unwrap().page_count(), 0);
        assert_eq!(split(doc(0), &[]).unwrap().page_count(), 0);
    }

    #[test]
    fn test_rotate_is_additive() {
        let turned = rotate(rotate(doc(2), Rotation::Deg90).unwrap(), Rotation::Deg270).unwrap();
        assert!(turned.pages().iter().all(|p| p.rotation() == Rotation::Deg0));
        let turned = reload(&rotate(doc(2), Rotation::Deg180).unwrap());
        assert!(turned.pages().iter().all(|p| p.rotation() == Rotation::Deg180));
    }

    #[test]
    fn test_watermark_appends_overlay() {
        let source = doc(2);
        let before = source.page_content(0).unwrap();
        let marked = reload(&watermark(source, "DRAFT", &WatermarkStyle::default()).unwrap());
        assert_eq!(marked.page_count(), 2);
        let after = marked.page_content(0).unwrap();
        assert!(after.len() > before.len());
        assert!(after.windows(before.len()).any(|w| w == before.as_slice()));
    }

    #[test]
    fn test_watermark_blank_text() {
        let err = watermark(doc(1), " \t", &WatermarkStyle::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidOperands(_)));
    }

    #[test]
    fn test_protect_then_unlock() {
        let source = doc(2);
        let content = source.page_content(1).unwrap();

        let locked = protect(source, "s3cret").unwrap();
        assert!(locked.is_encrypted());
        let locked = reload(&locked);
        assert!(locked.is_encrypted());
        assert_eq!(locked.page_count(), 2);
        assert!(matches!(rotate(reload(&locked), Rotation::Deg90), Err(Error::LockedDocument)));

        assert!(matches!(unlock(reload(&locked), "wrong"), Err(Error::WrongCredential)));

        let opened = reload(&unlock(locked, "s3cret").unwrap());
        assert!(!opened.is_encrypted());
        assert_eq!(opened.page_count(), 2);
        assert_eq!(opened.page_content(1).unwrap(), content);
    }

    #[test]
    fn test_protect_rules() {
        assert!(matches!(protect(doc(1), ""), Err(Error::InvalidOperands(_))));
        let locked = protect(doc(1), "a").unwrap();
        assert!(matches!(protect(locked, "b"), Err(Error::LockedDocument)));
    }

    #[test]
    fn test_unlock_open_document_is_noop() {
        let opened = unlock(doc(3), "anything").unwrap();
        assert!(!opened.is_encrypted());
        assert_eq!(opened.page_count(), 3);
    }

    #[test]
    fn test_conversions_are_identity() {
        let bytes = b"not even a pdf".to_vec();
        let out = apply(
            &Operation::ConvertFrom { format: TargetFormat::Docx },
            vec![Artifact::Raw(bytes.clone())],
            &WatermarkStyle::default(),
        )
        .unwrap();
        assert_eq!(out.into_bytes().unwrap(), bytes);

        let out = apply(&Operation::ConvertTo, vec![Artifact::Raw(bytes.clone())], &WatermarkStyle::default()).unwrap();
        assert_eq!(out.into_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_apply_dispatches_merge_over_all_inputs() {
        let inputs = vec![Artifact::Document(doc(1)), Artifact::Document(doc(2))];
        let out = apply(&Operation::Merge, inputs, &WatermarkStyle::default()).unwrap();
        assert_eq!(out.into_document().unwrap().page_count(), 3);
    }

    #[test]
    fn test_compress_is_identity() {
        let compressed = compress(doc(2));
        assert_eq!(compressed.page_count(), 2);
    }
}
