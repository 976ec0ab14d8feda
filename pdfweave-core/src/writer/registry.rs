//! Indirect object bookkeeping: identity allocation and byte offsets.

use crate::error::{PdfError, Result};
use crate::objects::ObjectId;
use std::collections::BTreeMap;

/// Allocates object identities and remembers where each one was written.
///
/// Allocation is monotonic. An identity can be framed at most once per session,
/// which keeps the cross-reference section free of duplicate entries.
#[derive(Debug, Clone)]
pub struct IndirectObjectRegistry {
    next_number: u32,
    written: BTreeMap<u32, (u16, u64)>,
}

/// Snapshot of a registry plus the output position it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    pub next_number: u32,
    pub position: u64,
    pub written: Vec<(ObjectId, u64)>,
}

impl IndirectObjectRegistry {
    pub fn new() -> Self {
        Self {
            next_number: 1,
            written: BTreeMap::new(),
        }
    }

    /// Continue numbering after an existing file that declares `size` objects.
    pub fn starting_at(size: u32) -> Self {
        let mut registry = Self::new();
        registry.reserve(size);
        registry
    }

    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_number, 0);
        self.next_number += 1;
        id
    }

    /// Make sure numbers below `size` are never handed out again.
    pub fn reserve(&mut self, size: u32) {
        self.next_number = self.next_number.max(size.max(1));
    }

    /// Total object count, object 0 included. This is the trailer `Size`.
    pub fn objects_count(&self) -> u32 {
        self.next_number
    }

    pub fn mark_written(&mut self, id: ObjectId, offset: u64) -> Result<()> {
        if id.number() == 0 || id.number() >= self.next_number {
            return Err(PdfError::InvalidObjectReference(
                id.number(),
                id.generation(),
            ));
        }
        if self.written.contains_key(&id.number()) {
            return Err(PdfError::InvalidStructure(format!(
                "object {id} was already written in this session"
            )));
        }
        self.written
            .insert(id.number(), (id.generation(), offset));
        Ok(())
    }

    pub fn is_written(&self, number: u32) -> bool {
        self.written.contains_key(&number)
    }

    pub fn offset_of(&self, number: u32) -> Option<u64> {
        self.written.get(&number).map(|(_, offset)| *offset)
    }

    /// Written objects in ascending object number order.
    pub fn written(&self) -> impl Iterator<Item = (ObjectId, u64)> + '_ {
        self.written
            .iter()
            .map(|(number, (generation, offset))| (ObjectId::new(*number, *generation), *offset))
    }

    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub fn state(&self, position: u64) -> RegistryState {
        RegistryState {
            next_number: self.next_number,
            position,
            written: self.written().collect(),
        }
    }

    pub fn from_state(state: &RegistryState) -> Self {
        Self {
            next_number: state.next_number.max(1),
            written: state
                .written
                .iter()
                .map(|(id, offset)| (id.number(), (id.generation(), *offset)))
                .collect(),
        }
    }
}

impl Default for IndirectObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
