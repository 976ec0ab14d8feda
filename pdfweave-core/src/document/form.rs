use super::resources::ResourcesDictionary;
use crate::geometry::{Matrix, Rectangle};
use crate::objects::{Dictionary, Object, ObjectId};

/// An open form XObject.
///
/// Created by `DocumentContext::start_form_xobject`, which prepares the
/// stream dictionary and allocates the identity of the resources
/// dictionary. Content and resources are collected here until
/// `DocumentContext::end_form_xobject` writes them.
#[derive(Debug)]
pub struct FormXObject {
    id: ObjectId,
    resources_id: ObjectId,
    bbox: Rectangle,
    matrix: Matrix,
    dictionary: Dictionary,
    resources: ResourcesDictionary,
    content: Vec<u8>,
}

impl FormXObject {
    pub(crate) fn new(
        id: ObjectId,
        resources_id: ObjectId,
        bbox: Rectangle,
        matrix: Matrix,
    ) -> Self {
        let mut dictionary = Dictionary::typed("XObject");
        dictionary.set("Subtype", Object::name("Form"));
        dictionary.set("FormType", Object::Integer(1));
        dictionary.set("BBox", bbox.to_array());
        if !matrix.is_identity() {
            dictionary.set("Matrix", matrix.to_array());
        }
        dictionary.set("Resources", resources_id);

        Self {
            id,
            resources_id,
            bbox,
            matrix,
            dictionary,
            resources: ResourcesDictionary::new(),
            content: Vec::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn resources_id(&self) -> ObjectId {
        self.resources_id
    }

    pub fn bbox(&self) -> Rectangle {
        self.bbox
    }

    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Stream dictionary as prepared when the form was opened
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub(crate) fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    pub fn resources(&self) -> &ResourcesDictionary {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourcesDictionary {
        &mut self.resources
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Append content stream operators
    pub fn write_content(&mut self, operators: &[u8]) {
        self.content.extend_from_slice(operators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix_is_omitted() {
        let bbox = Rectangle::from_position_and_size(0.0, 0.0, 50.0, 20.0);
        let form = FormXObject::new(
            ObjectId::new(4, 0),
            ObjectId::new(5, 0),
            bbox,
            Matrix::IDENTITY,
        );
        let dict = form.dictionary();
        assert_eq!(dict.get_name("Type"), Some("XObject"));
        assert_eq!(dict.get_name("Subtype"), Some("Form"));
        assert_eq!(dict.get_integer("FormType"), Some(1));
        assert!(!dict.contains_key("Matrix"));
        assert_eq!(dict.get_reference("Resources"), Some(ObjectId::new(5, 0)));
    }

    #[test]
    fn test_matrix_written_when_set() {
        let bbox = Rectangle::from_position_and_size(0.0, 0.0, 50.0, 20.0);
        let scaled = Matrix([2.0, 0.0, 0.0, 2.0, 10.0, 10.0]);
        let mut form = FormXObject::new(ObjectId::new(4, 0), ObjectId::new(5, 0), bbox, scaled);
        assert_eq!(form.dictionary().get_array("Matrix").map(Vec::len), Some(6));

        form.write_content(b"q ");
        form.write_content(b"Q");
        assert_eq!(form.content(), b"q Q");
    }
}
