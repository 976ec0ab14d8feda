//! End-to-end tests for documents written from scratch

use pdfweave::objects::Object;
use pdfweave::{
    DocumentContext, Matrix, Page, PdfError, PdfReader, PdfVersion, Rectangle, ResourceCategory,
    SourceDocument, WriterConfig,
};

fn config() -> WriterConfig {
    WriterConfig::default().with_compression(false)
}

fn create(pages: usize, config: WriterConfig) -> PdfReader {
    let mut context = DocumentContext::new(Vec::new(), config);
    context.write_header().unwrap();
    for _ in 0..pages {
        context.write_page(&Page::letter()).unwrap();
    }
    context.finalize_new_pdf().unwrap();
    PdfReader::from_bytes(context.into_inner()).unwrap()
}

/// Sum the pages reachable from `node`, checking every `Count` on the way.
fn walk(reader: &PdfReader, node: &Object, parent: Option<u32>) -> u64 {
    let id = node.as_reference().unwrap();
    let dict = reader.parse_object(id.number()).unwrap();
    let dict = dict.as_dict().unwrap();
    assert_eq!(dict.get_reference("Parent").map(|p| p.number()), parent);

    match dict.get_name("Type") {
        Some("Page") => 1,
        Some("Pages") => {
            let kids = dict.get_array("Kids").unwrap();
            let total: u64 = kids
                .iter()
                .map(|kid| walk(reader, kid, Some(id.number())))
                .sum();
            assert_eq!(dict.get_integer("Count"), Some(total as i64));
            total
        }
        other => panic!("unexpected node type {other:?}"),
    }
}

#[test]
fn test_empty_document_has_empty_page_tree() {
    let reader = create(0, config());

    assert_eq!(reader.page_count().unwrap(), 0);
    let catalog = reader.catalog().unwrap();
    assert_eq!(catalog.get_name("Type"), Some("Catalog"));
    let pages = reader.resolve(catalog.get("Pages").unwrap()).unwrap();
    assert_eq!(pages.as_dict().unwrap().get_array("Kids").unwrap().len(), 0);
}

#[test]
fn test_counts_hold_for_nested_trees() {
    for pages in [1, 3, 10, 11, 27, 101] {
        let reader = create(pages, config().with_max_page_tree_kids(3));
        let catalog = reader.catalog().unwrap();
        assert_eq!(walk(&reader, catalog.get("Pages").unwrap(), None), pages as u64);
        assert_eq!(reader.page_count().unwrap(), pages as u64);
    }
}

#[test]
fn test_new_document_id_entries_match() {
    let reader = create(2, config());
    let ids = reader.trailer().get_array("ID").unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0].as_bytes(), ids[1].as_bytes());
    assert_eq!(ids[0].as_bytes().unwrap().len(), 16);
}

#[test]
fn test_xref_stream_document() {
    let reader = create(4, config().with_xref_streams(true));

    assert!(reader.uses_xref_stream());
    assert_eq!(reader.trailer().get_name("Type"), Some("XRef"));
    assert!(reader.trailer().get_reference("Root").is_some());
    assert_eq!(reader.page_count().unwrap(), 4);
}

#[test]
fn test_header_follows_configured_version() {
    let reader = create(1, config().with_version(PdfVersion::V1_4));
    assert_eq!(reader.header_version(), PdfVersion::V1_4);
    assert!(!reader.uses_xref_stream());
}

#[test]
fn test_info_dictionary_is_referenced() {
    let mut context = DocumentContext::new(Vec::new(), config());
    context.info_mut().title = Some("Quarterly report".to_string());
    context.info_mut().author = Some("Finance".to_string());
    context.write_header().unwrap();
    context.write_page(&Page::a4()).unwrap();
    context.finalize_new_pdf().unwrap();

    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    let info = reader.trailer().get_reference("Info").unwrap();
    let info = reader.parse_object(info.number()).unwrap();
    let info = info.as_dict().unwrap();
    assert_eq!(info.get_text("Title").as_deref(), Some("Quarterly report"));
    assert_eq!(info.get_text("Author").as_deref(), Some("Finance"));
}

#[test]
fn test_link_annotation_lands_on_next_page() {
    let mut context = DocumentContext::new(Vec::new(), config());
    context.write_header().unwrap();
    context.write_page(&Page::letter()).unwrap();
    let link = context
        .attach_url_link_to_current_page(
            "https://example.com/docs",
            Rectangle::from_position_and_size(72.0, 72.0, 100.0, 20.0),
        )
        .unwrap();
    let second = context.write_page(&Page::letter()).unwrap();
    context.finalize_new_pdf().unwrap();

    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    let page = reader.parse_object(second.number()).unwrap();
    let annots = page.as_dict().unwrap().get_array("Annots").unwrap();
    assert_eq!(annots, &vec![Object::Reference(link)]);

    let annotation = reader.parse_object(link.number()).unwrap();
    let action = annotation.as_dict().unwrap().get_dict("A").unwrap();
    assert_eq!(action.get_name("S"), Some("URI"));
}

#[test]
fn test_non_ascii_link_is_rejected() {
    let mut context = DocumentContext::new(Vec::new(), config());
    context.write_header().unwrap();
    let before = context.position();

    let result = context.attach_url_link_to_current_page(
        "https://example.com/caf\u{e9}",
        Rectangle::from_position_and_size(0.0, 0.0, 10.0, 10.0),
    );
    assert!(matches!(result, Err(PdfError::EncodingError(_))));
    assert_eq!(context.position(), before);
    assert!(context.pending_annotations().is_empty());

    context.write_page(&Page::letter()).unwrap();
    context.finalize_new_pdf().unwrap();
    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    assert_eq!(reader.page_count().unwrap(), 1);
}

#[test]
fn test_form_xobject_is_drawn_from_page() {
    let mut context = DocumentContext::new(Vec::new(), config());
    context.write_header().unwrap();

    let mut form = context
        .start_form_xobject(
            Rectangle::from_position_and_size(0.0, 0.0, 50.0, 50.0),
            Matrix::IDENTITY,
        )
        .unwrap();
    form.write_content(b"0 0 50 50 re f");
    let form_id = context.end_form_xobject(form).unwrap();

    let mut page = Page::letter();
    let name = page
        .resources_mut()
        .add_mapping(ResourceCategory::XObject, form_id);
    let content = format!("q /{name} Do Q");
    context
        .write_page_content(&mut page, content.as_bytes())
        .unwrap();
    let page_id = context.write_page(&page).unwrap();
    context.finalize_new_pdf().unwrap();

    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    let page = reader.parse_object(page_id.number()).unwrap();
    let xobjects = page
        .as_dict()
        .unwrap()
        .get_dict("Resources")
        .unwrap()
        .get_dict("XObject")
        .unwrap()
        .clone();
    assert_eq!(xobjects.get_reference(&name), Some(form_id));

    match reader.parse_object(form_id.number()).unwrap() {
        Object::Stream(dict, data) => {
            assert_eq!(dict.get_name("Subtype"), Some("Form"));
            assert_eq!(data, b"0 0 50 50 re f");
            let resources = dict.get_reference("Resources").unwrap();
            assert!(reader.parse_object(resources.number()).unwrap().as_dict().is_some());
        }
        other => panic!("form is not a stream: {other:?}"),
    }
}

#[cfg(feature = "compression")]
#[test]
fn test_compressed_page_content() {
    let mut context = DocumentContext::new(Vec::new(), WriterConfig::default());
    context.write_header().unwrap();
    let mut page = Page::letter();
    let content = context
        .write_page_content(&mut page, b"0.5 g 72 72 144 144 re f")
        .unwrap();
    context.write_page(&page).unwrap();
    context.finalize_new_pdf().unwrap();

    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    match reader.parse_object(content.number()).unwrap() {
        Object::Stream(dict, _) => assert_eq!(dict.get_name("Filter"), Some("FlateDecode")),
        other => panic!("content is not a stream: {other:?}"),
    }
    assert_eq!(
        reader.stream_data(content.number()).unwrap(),
        b"0.5 g 72 72 144 144 re f"
    );
}
