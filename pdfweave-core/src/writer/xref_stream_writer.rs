//! XRef Stream Writer for PDF 1.5+
//!
//! Encodes cross-reference streams according to ISO 32000-1:2008 Section 7.5.8.

use crate::objects::{Dictionary, Object};

/// One row of a cross-reference stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    Free { next_free_object: u32, generation: u16 },
    InUse { offset: u64, generation: u16 },
}

/// Accumulates entries and produces the binary table plus its dictionary.
#[derive(Debug, Clone)]
pub struct XRefStreamWriter {
    /// Entries keyed by object number, kept sorted
    entries: Vec<(u32, XRefEntry)>,
    /// Field widths [type, field2, field3]
    widths: [usize; 3],
}

impl XRefStreamWriter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            // 1 byte for type, 3 bytes for offsets, 2 bytes for generation
            widths: [1, 3, 2],
        }
    }

    pub fn add_free_entry(&mut self, number: u32, next_free: u32, generation: u16) {
        self.insert(
            number,
            XRefEntry::Free {
                next_free_object: next_free,
                generation,
            },
        );
        self.widen(1, next_free as u64);
    }

    pub fn add_in_use_entry(&mut self, number: u32, offset: u64, generation: u16) {
        self.insert(number, XRefEntry::InUse { offset, generation });
        self.widen(1, offset);
    }

    fn insert(&mut self, number: u32, entry: XRefEntry) {
        match self.entries.binary_search_by_key(&number, |(n, _)| *n) {
            Ok(index) => self.entries[index] = (number, entry),
            Err(index) => self.entries.insert(index, (number, entry)),
        }
    }

    fn widen(&mut self, field: usize, value: u64) {
        let needed = Self::bytes_needed(value);
        if needed > self.widths[field] {
            self.widths[field] = needed;
        }
    }

    /// Calculate minimum bytes needed to represent a value
    fn bytes_needed(value: u64) -> usize {
        if value == 0 {
            1
        } else {
            ((value.ilog2() / 8) + 1) as usize
        }
    }

    pub fn widths(&self) -> [usize; 3] {
        self.widths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode entries into binary data, in object number order
    pub fn encode_entries(&self) -> Vec<u8> {
        let row = self.widths.iter().sum::<usize>();
        let mut data = Vec::with_capacity(row * self.entries.len());

        for (_, entry) in &self.entries {
            match entry {
                XRefEntry::Free {
                    next_free_object,
                    generation,
                } => {
                    Self::write_field(&mut data, 0, self.widths[0]);
                    Self::write_field(&mut data, *next_free_object as u64, self.widths[1]);
                    Self::write_field(&mut data, *generation as u64, self.widths[2]);
                }
                XRefEntry::InUse { offset, generation } => {
                    Self::write_field(&mut data, 1, self.widths[0]);
                    Self::write_field(&mut data, *offset, self.widths[1]);
                    Self::write_field(&mut data, *generation as u64, self.widths[2]);
                }
            }
        }

        data
    }

    /// Write a field with the specified width, big-endian
    fn write_field(data: &mut Vec<u8>, value: u64, width: usize) {
        for i in (0..width).rev() {
            data.push(((value >> (i * 8)) & 0xFF) as u8);
        }
    }

    /// `Index` pairs, one per run of consecutive object numbers
    pub fn index_array(&self) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for (number, _) in &self.entries {
            match runs.last_mut() {
                Some((start, count)) if *start + *count == *number => *count += 1,
                _ => runs.push((*number, 1)),
            }
        }
        runs
    }

    /// Stream dictionary carrying the trailer keys.
    ///
    /// `Size`, `W` and `Index` are computed here and override anything the
    /// trailer carries under the same names.
    pub fn create_dictionary(&self, trailer: &Dictionary, size: u32) -> Dictionary {
        let mut dict = Dictionary::typed("XRef");
        dict.set("Size", Object::Integer(size as i64));

        for (key, value) in trailer.iter() {
            if matches!(key.as_str(), "Type" | "Size" | "W" | "Index" | "Length" | "Filter") {
                continue;
            }
            dict.set(key.clone(), value.clone());
        }

        dict.set(
            "W",
            Object::Array(self.widths.iter().map(|w| Object::Integer(*w as i64)).collect()),
        );

        let mut index = Vec::new();
        for (start, count) in self.index_array() {
            index.push(Object::Integer(start as i64));
            index.push(Object::Integer(count as i64));
        }
        dict.set("Index", Object::Array(index));

        dict
    }
}

impl Default for XRefStreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
