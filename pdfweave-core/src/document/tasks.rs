//! Deferred write tasks.
//!
//! A resource task is queued when a resource name is requested before the
//! object behind it exists. It runs when the category sub-dictionary of its
//! resources dictionary is serialized. A form end task runs when its form
//! XObject is closed. Each queue is removed before it runs, so it runs at
//! most once whatever the outcome.

use super::form::FormXObject;
use super::resources::{ResourceCategory, ResourcesId};
use crate::error::Result;
use crate::objects::{Dictionary, ObjectId};
use crate::writer::ObjectSink;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Resolves a placeholder resource name, typically by writing the object
/// and binding `name` to it in the category dictionary.
pub trait ResourceWritingTask {
    fn write(
        self: Box<Self>,
        name: &str,
        category: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()>;
}

impl<F> ResourceWritingTask for F
where
    F: FnOnce(&str, &mut Dictionary, &mut dyn ObjectSink) -> Result<()>,
{
    fn write(
        self: Box<Self>,
        name: &str,
        category: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        (*self)(name, category, sink)
    }
}

/// Work to do once a form XObject and its resources are written.
pub trait FormEndWritingTask {
    fn write(self: Box<Self>, form: &FormXObject, sink: &mut dyn ObjectSink) -> Result<()>;
}

impl<F> FormEndWritingTask for F
where
    F: FnOnce(&FormXObject, &mut dyn ObjectSink) -> Result<()>,
{
    fn write(self: Box<Self>, form: &FormXObject, sink: &mut dyn ObjectSink) -> Result<()> {
        (*self)(form, sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceTaskKey {
    pub resources: ResourcesId,
    pub category: ResourceCategory,
}

impl ResourceTaskKey {
    pub fn new(resources: ResourcesId, category: ResourceCategory) -> Self {
        Self {
            resources,
            category,
        }
    }
}

type ResourceQueue = Vec<(String, Box<dyn ResourceWritingTask>)>;

/// Both task registries of a document session.
#[derive(Default)]
pub struct DeferredTasks {
    resource_tasks: HashMap<ResourceTaskKey, ResourceQueue>,
    form_end_tasks: HashMap<ObjectId, Vec<Box<dyn FormEndWritingTask>>>,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource_task(
        &mut self,
        key: ResourceTaskKey,
        name: String,
        task: Box<dyn ResourceWritingTask>,
    ) {
        self.resource_tasks
            .entry(key)
            .or_default()
            .push((name, task));
    }

    pub fn has_resource_tasks(&self, key: ResourceTaskKey) -> bool {
        self.resource_tasks
            .get(&key)
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Run and discard the queue for `key`. Returns how many tasks ran.
    ///
    /// The first failure stops the queue; the tasks after it are dropped.
    pub fn flush_resource_tasks(
        &mut self,
        key: ResourceTaskKey,
        category: &mut Dictionary,
        sink: &mut dyn ObjectSink,
    ) -> Result<usize> {
        let Some(queue) = self.resource_tasks.remove(&key) else {
            return Ok(0);
        };

        let total = queue.len();
        for (ran, (name, task)) in queue.into_iter().enumerate() {
            if let Err(error) = task.write(&name, category, sink) {
                warn!(
                    category = %key.category,
                    name = %name,
                    skipped = total - ran - 1,
                    %error,
                    "resource task failed"
                );
                return Err(error);
            }
        }

        debug!(category = %key.category, tasks = total, "flushed resource tasks");
        Ok(total)
    }

    pub fn register_form_end_task(&mut self, form: ObjectId, task: Box<dyn FormEndWritingTask>) {
        self.form_end_tasks.entry(form).or_default().push(task);
    }

    pub fn has_form_end_tasks(&self, form: ObjectId) -> bool {
        self.form_end_tasks
            .get(&form)
            .is_some_and(|queue| !queue.is_empty())
    }

    /// Run and discard the end tasks of `form`. Returns how many ran.
    pub fn flush_form_end_tasks(
        &mut self,
        form: &FormXObject,
        sink: &mut dyn ObjectSink,
    ) -> Result<usize> {
        let Some(queue) = self.form_end_tasks.remove(&form.id()) else {
            return Ok(0);
        };

        let total = queue.len();
        for task in queue {
            if let Err(error) = task.write(form, sink) {
                warn!(form = %form.id(), %error, "form end task failed");
                return Err(error);
            }
        }
        Ok(total)
    }

    pub fn pending_resource_tasks(&self) -> usize {
        self.resource_tasks.values().map(Vec::len).sum()
    }

    pub fn pending_form_end_tasks(&self) -> usize {
        self.form_end_tasks.values().map(Vec::len).sum()
    }

    /// Drop every pending task without running it
    pub fn clear(&mut self) {
        let dropped = self.pending_resource_tasks() + self.pending_form_end_tasks();
        if dropped > 0 {
            debug!(dropped, "discarding pending deferred tasks");
        }
        self.resource_tasks.clear();
        self.form_end_tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::resources::ResourcesDictionary;
    use crate::error::PdfError;
    use crate::objects::Object;
    use crate::writer::ObjectWriter;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn logging_task(
        log: &Rc<RefCell<Vec<String>>>,
        fail: bool,
    ) -> Box<dyn ResourceWritingTask> {
        let log = Rc::clone(log);
        Box::new(
            move |name: &str, category: &mut Dictionary, sink: &mut dyn ObjectSink| {
                log.borrow_mut().push(name.to_string());
                if fail {
                    return Err(PdfError::TaskFailure(format!("{name} unavailable")));
                }
                let id = sink.write_new(&Object::Dictionary(Dictionary::typed("Font")))?;
                category.set(name, id);
                Ok(())
            },
        )
    }

    #[test]
    fn test_tasks_run_in_order_once() {
        let resources = ResourcesDictionary::new();
        let key = ResourceTaskKey::new(resources.id(), ResourceCategory::Font);
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut tasks = DeferredTasks::new();
        tasks.register_resource_task(key, "F1".to_string(), logging_task(&log, false));
        tasks.register_resource_task(key, "F2".to_string(), logging_task(&log, false));
        assert_eq!(tasks.pending_resource_tasks(), 2);

        let mut writer = ObjectWriter::new(Vec::new());
        let mut category = Dictionary::new();
        assert_eq!(
            tasks
                .flush_resource_tasks(key, &mut category, &mut writer)
                .unwrap(),
            2
        );
        assert_eq!(*log.borrow(), vec!["F1", "F2"]);
        assert_eq!(category.get_reference("F1"), Some(ObjectId::new(1, 0)));
        assert_eq!(category.get_reference("F2"), Some(ObjectId::new(2, 0)));

        assert!(!tasks.has_resource_tasks(key));
        assert_eq!(
            tasks
                .flush_resource_tasks(key, &mut category, &mut writer)
                .unwrap(),
            0
        );
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_failure_discards_rest_of_queue() {
        let resources = ResourcesDictionary::new();
        let key = ResourceTaskKey::new(resources.id(), ResourceCategory::XObject);
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut tasks = DeferredTasks::new();
        tasks.register_resource_task(key, "Fm1".to_string(), logging_task(&log, true));
        tasks.register_resource_task(key, "Fm2".to_string(), logging_task(&log, false));

        let mut writer = ObjectWriter::new(Vec::new());
        let mut category = Dictionary::new();
        let result = tasks.flush_resource_tasks(key, &mut category, &mut writer);
        assert!(matches!(result, Err(PdfError::TaskFailure(_))));
        assert_eq!(*log.borrow(), vec!["Fm1"]);
        assert_eq!(tasks.pending_resource_tasks(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let first = ResourcesDictionary::new();
        let second = ResourcesDictionary::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut tasks = DeferredTasks::new();
        let font = ResourceTaskKey::new(first.id(), ResourceCategory::Font);
        tasks.register_resource_task(font, "F1".to_string(), logging_task(&log, false));

        assert!(!tasks.has_resource_tasks(ResourceTaskKey::new(
            first.id(),
            ResourceCategory::XObject
        )));
        assert!(!tasks.has_resource_tasks(ResourceTaskKey::new(
            second.id(),
            ResourceCategory::Font
        )));
        assert!(tasks.has_resource_tasks(font));
    }

    #[test]
    fn test_clear_drops_without_running() {
        let resources = ResourcesDictionary::new();
        let key = ResourceTaskKey::new(resources.id(), ResourceCategory::Font);
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut tasks = DeferredTasks::new();
        tasks.register_resource_task(key, "F1".to_string(), logging_task(&log, false));
        tasks.register_form_end_task(
            ObjectId::new(3, 0),
            Box::new(|_form: &FormXObject, _sink: &mut dyn ObjectSink| {
                Ok::<(), PdfError>(())
            }),
        );
        tasks.clear();

        assert_eq!(tasks.pending_resource_tasks(), 0);
        assert_eq!(tasks.pending_form_end_tasks(), 0);
        assert!(log.borrow().is_empty());
    }
}
