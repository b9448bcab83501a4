//! Back-to-front wire buffer builder
//!
//! Data is written from the end of the allocation toward the front, so
//! children always precede (in write order) the records that reference them
//! and every reference is a forward offset when the buffer is read.
//! A vector is written last element first and its count last, which leaves
//! the count directly in front of element zero.
//!
//! Offsets handed out by the builder (`WOffset`) are measured from the end
//! of the buffer and stay valid when the allocation grows.

use byteorder::{ByteOrder, LittleEndian};

use super::schema::WireStruct;

/// Position of a written record, counted from the end of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WOffset(u32);

impl WOffset {
    pub fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldLoc {
    slot: u16,
    offset: usize,
}

/// Builds one wire buffer; consumed by `finish`
pub struct WireBuilder {
    buf: Vec<u8>,
    head: usize,
    min_align: usize,
    fields: Vec<FieldLoc>,
    table_start: Option<usize>,
}

impl WireBuilder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(16);
        Self {
            buf: vec![0u8; capacity],
            head: capacity,
            min_align: 1,
            fields: Vec::new(),
            table_start: None,
        }
    }

    /// Bytes written so far
    pub fn used_space(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Grow so that `additional` bytes fit in front of `head`
    fn ensure(&mut self, additional: usize) {
        if self.head >= additional {
            return;
        }
        let used = self.used_space();
        let old_len = self.buf.len();
        let new_len = (old_len * 2).max(used + additional).max(16);
        let mut grown = vec![0u8; new_len];
        grown[new_len - used..].copy_from_slice(&self.buf[self.head..]);
        self.buf = grown;
        self.head = new_len - used;
    }

    fn reserve(&mut self, len: usize) -> &mut [u8] {
        self.ensure(len);
        self.head -= len;
        &mut self.buf[self.head..self.head + len]
    }

    fn pad(&mut self, len: usize) {
        self.reserve(len).fill(0);
    }

    /// Pad so that after writing `additional` bytes the used space is a
    /// multiple of `size`
    fn prep(&mut self, size: usize, additional: usize) {
        if size > self.min_align {
            self.min_align = size;
        }
        let padding = (size - ((self.used_space() + additional) % size)) % size;
        self.pad(padding);
    }

    fn push_u8(&mut self, value: u8) {
        self.reserve(1)[0] = value;
    }

    fn push_u16(&mut self, value: u16) {
        LittleEndian::write_u16(self.reserve(2), value);
    }

    fn push_u32(&mut self, value: u32) {
        LittleEndian::write_u32(self.reserve(4), value);
    }

    fn push_i32(&mut self, value: i32) {
        LittleEndian::write_i32(self.reserve(4), value);
    }

    fn push_struct<T: WireStruct>(&mut self, value: &T) {
        value.write_le(self.reserve(T::SIZE));
    }

    /// Write a forward reference to `target`
    fn push_uoffset(&mut self, target: WOffset) {
        self.prep(4, 0);
        let target = target.0 as usize;
        debug_assert!(target <= self.used_space(), "reference to unwritten data");
        let relative = self.used_space() + 4 - target;
        self.push_u32(relative as u32);
    }

    fn start_vector(&mut self, elem_size: usize, len: usize, alignment: usize) {
        debug_assert!(self.table_start.is_none(), "vectors cannot be built inside a table");
        self.prep(4, elem_size * len);
        self.prep(alignment, elem_size * len);
    }

    fn end_vector(&mut self, len: usize) -> WOffset {
        self.push_u32(len as u32);
        WOffset(self.used_space() as u32)
    }

    /// Vector of inline structs (or scalars)
    pub fn create_vector<T: WireStruct>(&mut self, items: &[T]) -> WOffset {
        self.start_vector(T::SIZE, items.len(), T::ALIGN);
        for item in items.iter().rev() {
            self.push_struct(item);
        }
        self.end_vector(items.len())
    }

    /// Vector of references to previously written tables
    pub fn create_vector_of_offsets(&mut self, items: &[WOffset]) -> WOffset {
        self.start_vector(4, items.len(), 4);
        for &item in items.iter().rev() {
            self.push_uoffset(item);
        }
        self.end_vector(items.len())
    }

    pub fn start_table(&mut self) {
        debug_assert!(self.table_start.is_none(), "tables cannot nest while open");
        self.fields.clear();
        self.table_start = Some(self.used_space());
    }

    fn track_field(&mut self, slot: u16) {
        self.fields.push(FieldLoc { slot, offset: self.used_space() });
    }

    pub fn add_field_u8(&mut self, slot: u16, value: u8) {
        self.prep(1, 0);
        self.push_u8(value);
        self.track_field(slot);
    }

    pub fn add_field_struct<T: WireStruct>(&mut self, slot: u16, value: &T) {
        self.prep(T::ALIGN, T::SIZE);
        self.push_struct(value);
        self.track_field(slot);
    }

    pub fn add_field_offset(&mut self, slot: u16, target: WOffset) {
        self.push_uoffset(target);
        self.track_field(slot);
    }

    /// Close the open table: write its vtable and the back-offset to it
    pub fn end_table(&mut self) -> WOffset {
        let table_start = self.table_start.take().unwrap_or_else(|| self.used_space());

        self.prep(4, 0);
        self.push_i32(0);
        let object_offset = self.used_space();
        let table_size = object_offset - table_start;

        let slot_count = self.fields.iter().map(|f| f.slot as usize + 1).max().unwrap_or(0);
        let mut entries = vec![0u16; slot_count];
        for field in &self.fields {
            entries[field.slot as usize] = (object_offset - field.offset) as u16;
        }
        self.fields.clear();

        for &entry in entries.iter().rev() {
            self.push_u16(entry);
        }
        self.push_u16(table_size as u16);
        self.push_u16(((slot_count + 2) * 2) as u16);
        let vtable_offset = self.used_space();

        let table_pos = self.buf.len() - object_offset;
        LittleEndian::write_i32(
            &mut self.buf[table_pos..table_pos + 4],
            (vtable_offset - object_offset) as i32,
        );
        WOffset(object_offset as u32)
    }

    /// Record the root reference and hand back the finished bytes
    pub fn finish(mut self, root: WOffset) -> Vec<u8> {
        let min_align = self.min_align.max(4);
        self.prep(min_align, 4);
        self.push_uoffset(root);
        self.buf.split_off(self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_count_precedes_elements() {
        let mut builder = WireBuilder::new(16);
        let values = builder.create_vector(&[10i32, 20, 30]);
        builder.start_table();
        builder.add_field_offset(0, values);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        // find the vector: count 3 followed by 10, 20, 30
        let needle: Vec<u8> = [3u32.to_le_bytes(), 10i32.to_le_bytes(), 20i32.to_le_bytes(), 30i32.to_le_bytes()]
            .concat();
        assert!(bytes.windows(needle.len()).any(|w| w == needle.as_slice()));
    }

    #[test]
    fn test_buffer_grows_past_initial_capacity() {
        let mut builder = WireBuilder::new(16);
        let items: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let values = builder.create_vector(&items);
        builder.start_table();
        builder.add_field_offset(0, values);
        let root = builder.end_table();
        let bytes = builder.finish(root);
        assert!(bytes.len() > 500 * 8);
        assert_eq!(bytes.len() % 8, 0);
    }

    #[test]
    fn test_root_offset_points_at_table() {
        let mut builder = WireBuilder::new(64);
        builder.start_table();
        builder.add_field_u8(0, 7);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        let table = LittleEndian::read_u32(&bytes[0..4]) as usize;
        let soffset = LittleEndian::read_i32(&bytes[table..table + 4]);
        let vtable = (table as i64 - soffset as i64) as usize;
        // one slot: vtable is 6 bytes
        assert_eq!(LittleEndian::read_u16(&bytes[vtable..vtable + 2]), 6);
        let field = LittleEndian::read_u16(&bytes[vtable + 4..vtable + 6]) as usize;
        assert_eq!(bytes[table + field], 7);
    }
}
