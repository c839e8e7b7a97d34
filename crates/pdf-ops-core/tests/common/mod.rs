//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::{Dictionary, Document as Arena, Object, Stream};
use pdf_ops_core::{
    Document, MemoryStorage, OperationRequest, Pipeline, PipelineConfig, PipelineContext,
    RequestOptions, Storage, StorageError, StorageInfo, decode,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a fixture page refers to its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentsLayout {
    /// `/Contents 4 0 R` naming a stream
    Stream,
    /// `/Contents [4 0 R 5 0 R]`
    Array,
    /// `/Contents 6 0 R` naming an array of streams
    IndirectArray,
}

/// A PDF whose page `n` shows `labels[n]`.
pub fn labelled_pdf(labels: &[&str]) -> Vec<u8> {
    labelled_pdf_with(labels, ContentsLayout::Stream)
}

/// Like [`labelled_pdf`], with page content laid out as `layout`. Array
/// layouts split each page's text object over two streams.
pub fn labelled_pdf_with(labels: &[&str], layout: ContentsLayout) -> Vec<u8> {
    let mut arena = Arena::with_version("1.4");
    let pages_id = arena.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = arena.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    let resources_id = arena.add_object(Object::Dictionary(resources));

    let mut kids = Vec::new();
    for label in labels {
        let contents = match layout {
            ContentsLayout::Stream => {
                let content = format!("BT /F1 18 Tf 72 700 Td ({label}) Tj ET");
                Object::Reference(arena.add_object(Stream::new(Dictionary::new(), content.into_bytes())))
            }
            ContentsLayout::Array | ContentsLayout::IndirectArray => {
                let head = b"BT /F1 18 Tf 72 700 Td ".to_vec();
                let tail = format!("({label}) Tj ET").into_bytes();
                let streams = Object::Array(vec![
                    Object::Reference(arena.add_object(Stream::new(Dictionary::new(), head))),
                    Object::Reference(arena.add_object(Stream::new(Dictionary::new(), tail))),
                ]);
                if layout == ContentsLayout::Array {
                    streams
                } else {
                    Object::Reference(arena.add_object(streams))
                }
            }
        };

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", contents);
        page.set("Resources", Object::Reference(resources_id));
        kids.push(Object::Reference(arena.add_object(Object::Dictionary(page))));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(i64::try_from(kids.len()).unwrap()));
    tree.set("Kids", Object::Array(kids));
    tree.set(
        "MediaBox",
        Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
    );
    arena.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = arena.add_object(Object::Dictionary(catalog));
    arena.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    arena.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF whose page tree lists one more kid than exists: `/Kids` ends
/// with a reference to a missing object and `/Count` includes it.
pub fn pdf_with_dangling_kid(prefix: &str, n: usize) -> Vec<u8> {
    let mut arena = Arena::load_mem(&pdf_with_pages(prefix, n)).unwrap();
    let tree_id = arena.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
    let missing = (arena.max_id + 100, 0);
    let tree = arena.get_object_mut(tree_id).unwrap().as_dict_mut().unwrap();
    tree.get_mut(b"Kids").unwrap().as_array_mut().unwrap().push(Object::Reference(missing));
    tree.set("Count", Object::Integer(i64::try_from(n + 1).unwrap()));

    let mut bytes = Vec::new();
    arena.save_to(&mut bytes).unwrap();
    bytes
}

/// Labels `prefix0 .. prefix{n-1}`.
pub fn labels(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

pub fn pdf_with_pages(prefix: &str, n: usize) -> Vec<u8> {
    let labels = labels(prefix, n);
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    labelled_pdf(&refs)
}

/// Text label drawn on each page, in page order.
pub fn page_labels(document: &Document) -> Vec<String> {
    (0..document.page_count())
        .map(|i| {
            let content = document.page_content(i).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').unwrap() + 1;
            let end = start + text[start..].find(')').unwrap();
            text[start..end].to_string()
        })
        .collect()
}

pub async fn memory_with(files: &[(&str, Vec<u8>)]) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    for (id, data) in files {
        storage.insert(*id, data.clone()).await;
    }
    storage
}

pub fn pipeline(storage: Arc<dyn Storage>) -> Pipeline {
    Pipeline::new(storage, PipelineContext::default(), PipelineConfig::default())
}

pub fn request(operation: &str, sources: &[&str], options: RequestOptions) -> OperationRequest {
    OperationRequest::new(operation, sources.iter().map(ToString::to_string).collect())
        .with_options(options)
}

/// Decode the object a memory locator points at.
pub async fn stored_document(storage: &MemoryStorage, locator: &str) -> Document {
    let id = locator.strip_prefix("memory://").expect("memory locator");
    let bytes = storage.get(id).await.expect("stored result");
    decode(&bytes).unwrap()
}

/// Storage that cancels a token once it has served a fetch.
pub struct CancellingStorage {
    pub inner: MemoryStorage,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Storage for CancellingStorage {
    fn info(&self) -> StorageInfo {
        self.inner.info()
    }

    async fn fetch(&self, id: &str) -> Result<Bytes, StorageError> {
        let result = self.inner.fetch(id).await;
        self.cancel.cancel();
        result
    }

    async fn store(&self, id: &str, data: Bytes) -> Result<String, StorageError> {
        self.inner.store(id, data).await
    }
}
