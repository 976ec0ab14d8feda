//! Deferred resource and form tasks driven through a document session

use pdfweave::objects::{Dictionary, Object, ObjectId};
use pdfweave::{
    DocumentContext, DocumentExtension, FormXObject, Matrix, ObjectSink, Page, PdfError,
    PdfReader, Rectangle, ResourceCategory, ResourcesDictionary, Result, SourceDocument,
    WriterConfig,
};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn context() -> DocumentContext<Vec<u8>> {
    let config = WriterConfig::default().with_compression(false);
    let mut context = DocumentContext::new(Vec::new(), config);
    context.write_header().unwrap();
    context
}

fn font_task(log: &Log, base_font: &'static str) -> Box<dyn pdfweave::ResourceWritingTask> {
    let log = Rc::clone(log);
    Box::new(
        move |name: &str, category: &mut Dictionary, sink: &mut dyn ObjectSink| {
            log.borrow_mut().push(format!("font {name}"));
            let mut font = Dictionary::typed("Font");
            font.set("Subtype", Object::name("Type1"));
            font.set("BaseFont", Object::name(base_font));
            let id = sink.write_new(&Object::Dictionary(font))?;
            category.set(name, id);
            Ok::<(), PdfError>(())
        },
    )
}

#[test]
fn test_font_tasks_run_when_page_is_written() {
    let log = Log::default();
    let mut context = context();
    let mut page = Page::letter();

    let regular = context.add_extended_resource_mapping(
        page.resources_mut(),
        ResourceCategory::Font,
        font_task(&log, "Helvetica"),
    );
    let bold = context.add_extended_resource_mapping(
        page.resources_mut(),
        ResourceCategory::Font,
        font_task(&log, "Helvetica-Bold"),
    );
    assert_ne!(regular, bold);
    assert!(log.borrow().is_empty());
    assert_eq!(context.tasks().pending_resource_tasks(), 2);

    let page_id = context.write_page(&page).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![format!("font {regular}"), format!("font {bold}")]
    );
    assert_eq!(context.tasks().pending_resource_tasks(), 0);

    context.finalize_new_pdf().unwrap();
    let reader = PdfReader::from_bytes(context.into_inner()).unwrap();
    let page = reader.parse_object(page_id.number()).unwrap();
    let fonts = page
        .as_dict()
        .unwrap()
        .get_dict("Resources")
        .unwrap()
        .get_dict("Font")
        .unwrap()
        .clone();
    let bold_font = reader
        .parse_object(fonts.get_reference(&bold).unwrap().number())
        .unwrap();
    assert_eq!(
        bold_font.as_dict().unwrap().get_name("BaseFont"),
        Some("Helvetica-Bold")
    );
}

#[test]
fn test_second_flush_runs_nothing() {
    let log = Log::default();
    let mut context = context();
    let mut resources = ResourcesDictionary::new();
    let name = context.add_extended_resource_mapping(
        &mut resources,
        ResourceCategory::Font,
        font_task(&log, "Courier"),
    );

    let first = context.write_resources_dictionary(&resources).unwrap();
    assert!(first.get_dict("Font").unwrap().contains_key(&name));

    let second = context.write_resources_dictionary(&resources).unwrap();
    assert!(second.get_dict("Font").is_none());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_failing_task_aborts_page() {
    let mut context = context();
    let mut page = Page::letter();
    context.add_extended_resource_mapping(
        page.resources_mut(),
        ResourceCategory::XObject,
        Box::new(
            |name: &str, _category: &mut Dictionary, _sink: &mut dyn ObjectSink| {
                Err::<(), PdfError>(PdfError::TaskFailure(format!("{name} has no image data")))
            },
        ),
    );

    assert!(matches!(
        context.write_page(&page),
        Err(PdfError::TaskFailure(_))
    ));
    assert_eq!(context.tasks().pending_resource_tasks(), 0);
}

#[test]
fn test_form_end_tasks_run_after_form_is_written() {
    let log = Log::default();
    let mut context = context();
    let mut form = context
        .start_form_xobject(
            Rectangle::from_position_and_size(0.0, 0.0, 20.0, 20.0),
            Matrix::IDENTITY,
        )
        .unwrap();

    let font = context.add_extended_resource_mapping(
        form.resources_mut(),
        ResourceCategory::Font,
        font_task(&log, "Times-Roman"),
    );
    form.write_content(format!("BT /{font} 12 Tf ET").as_bytes());

    for label in ["first", "second"] {
        let log = Rc::clone(&log);
        context.register_form_end_writing_task(
            &form,
            Box::new(move |form: &FormXObject, sink: &mut dyn ObjectSink| {
                assert!(sink.position() > 0);
                log.borrow_mut().push(format!("end {label} {}", form.id()));
                Ok::<(), PdfError>(())
            }),
        );
    }
    assert_eq!(context.tasks().pending_form_end_tasks(), 2);

    let id = context.end_form_xobject(form).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            format!("font {font}"),
            format!("end first {id}"),
            format!("end second {id}"),
        ]
    );
    assert_eq!(context.tasks().pending_form_end_tasks(), 0);
}

#[derive(Default)]
struct CategoryRecorder {
    seen: Rc<RefCell<Vec<ResourceCategory>>>,
}

impl DocumentExtension for CategoryRecorder {
    fn on_resource_dictionary_write(
        &mut self,
        category: ResourceCategory,
        _dict: &mut Dictionary,
        _sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        self.seen.borrow_mut().push(category);
        Ok(())
    }

    fn on_form_xobject_write(
        &mut self,
        _form_id: ObjectId,
        _resources_id: ObjectId,
        dict: &mut Dictionary,
        _sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        dict.set("Group", Object::name("Transparency"));
        Ok(())
    }
}

#[test]
fn test_extensions_see_each_emitted_category() {
    let log = Log::default();
    let recorder = CategoryRecorder::default();
    let seen = Rc::clone(&recorder.seen);

    let mut context = context();
    context.add_extension(Box::new(recorder));

    let form = context
        .start_form_xobject(
            Rectangle::from_position_and_size(0.0, 0.0, 5.0, 5.0),
            Matrix::IDENTITY,
        )
        .unwrap();
    assert_eq!(form.dictionary().get_name("Group"), Some("Transparency"));
    let form_id = context.end_form_xobject(form).unwrap();

    let mut page = Page::letter();
    page.resources_mut()
        .add_mapping(ResourceCategory::XObject, form_id);
    context.add_extended_resource_mapping(
        page.resources_mut(),
        ResourceCategory::Font,
        font_task(&log, "Symbol"),
    );
    context.write_page(&page).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![ResourceCategory::XObject, ResourceCategory::Font]
    );
}

#[test]
fn test_reset_discards_pending_tasks() {
    let log = Log::default();
    let mut context = context();
    let mut resources = ResourcesDictionary::new();
    context.add_extended_resource_mapping(
        &mut resources,
        ResourceCategory::Font,
        font_task(&log, "Helvetica"),
    );

    context.reset();
    assert_eq!(context.tasks().pending_resource_tasks(), 0);
    assert!(log.borrow().is_empty());

    let written = context.write_resources_dictionary(&resources).unwrap();
    assert!(written.get_dict("Font").is_none());
    assert!(log.borrow().is_empty());
}
