mod dictionary;
mod primitive;

pub use dictionary::Dictionary;
pub use primitive::{Object, ObjectId};

pub type ObjectReference = ObjectId;
