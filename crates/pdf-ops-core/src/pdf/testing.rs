//! Small PDFs built in memory for unit tests.

use lopdf::{Dictionary, Document as Arena, Object, Stream, StringFormat};

#[derive(Debug, Clone, Copy, Default)]
pub struct PageSpec {
    /// Written as `/Rotate` on the page dictionary.
    pub rotate: Option<i64>,
    /// Leave `/MediaBox` and `/Resources` to the page tree node (A4 there).
    pub inherit_media_box: bool,
}

fn number_array(values: [i64; 4]) -> Object {
    Object::Array(values.into_iter().map(Object::Integer).collect())
}

/// A PDF with one page per spec. Page `n` shows the text `Page n`.
#[allow(clippy::unwrap_used)]
pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut arena = Arena::with_version("1.5");
    let pages_id = arena.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Courier".to_vec()));
    let font_id = arena.add_object(Object::Dictionary(font));

    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut kids = Vec::new();
    for (n, spec) in pages.iter().enumerate() {
        let content = format!("BT /F1 24 Tf 72 720 Td (Page {n}) Tj ET");
        let content_id = arena.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        if !spec.inherit_media_box {
            page.set("MediaBox", number_array([0, 0, 612, 792]));
            page.set("Resources", Object::Dictionary(resources.clone()));
        }
        if let Some(degrees) = spec.rotate {
            page.set("Rotate", Object::Integer(degrees));
        }
        kids.push(Object::Reference(arena.add_object(Object::Dictionary(page))));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(i64::try_from(kids.len()).unwrap()));
    tree.set("Kids", Object::Array(kids));
    tree.set("MediaBox", number_array([0, 0, 595, 842]));
    tree.set("Resources", Object::Dictionary(resources));
    arena.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = arena.add_object(Object::Dictionary(catalog));

    let mut info = Dictionary::new();
    info.set("Title", Object::String(b"Fixture".to_vec(), StringFormat::Literal));
    let info_id = arena.add_object(Object::Dictionary(info));

    arena.trailer.set("Root", Object::Reference(catalog_id));
    arena.trailer.set("Info", Object::Reference(info_id));

    let mut bytes = Vec::new();
    arena.save_to(&mut bytes).unwrap();
    bytes
}
