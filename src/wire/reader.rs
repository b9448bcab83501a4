//! Bounds-checked readers over a finished wire buffer
//!
//! Nothing here trusts the buffer: every offset, vtable and vector length is
//! checked against the slice before it is followed, so a hostile or
//! truncated buffer yields a `WireError` instead of a panic.

use byteorder::{ByteOrder, LittleEndian};

use super::schema::WireStruct;
use crate::error::WireError;

fn slice_at(buf: &[u8], pos: usize, len: usize) -> Result<&[u8], WireError> {
    let end = pos.checked_add(len).ok_or(WireError::OutOfBounds {
        offset: pos as i64,
        len: buf.len(),
    })?;
    buf.get(pos..end).ok_or(WireError::Truncated {
        offset: pos,
        needed: len,
        len: buf.len(),
    })
}

fn read_u16_at(buf: &[u8], pos: usize) -> Result<u16, WireError> {
    slice_at(buf, pos, 2).map(LittleEndian::read_u16)
}

fn read_u32_at(buf: &[u8], pos: usize) -> Result<u32, WireError> {
    slice_at(buf, pos, 4).map(LittleEndian::read_u32)
}

fn read_i32_at(buf: &[u8], pos: usize) -> Result<i32, WireError> {
    slice_at(buf, pos, 4).map(LittleEndian::read_i32)
}

/// Follow the forward offset stored at `pos`
fn follow(buf: &[u8], pos: usize) -> Result<usize, WireError> {
    let relative = read_u32_at(buf, pos)? as usize;
    let target = pos.checked_add(relative).filter(|&t| t < buf.len());
    target.ok_or(WireError::OutOfBounds {
        offset: pos as i64 + relative as i64,
        len: buf.len(),
    })
}

fn check_align(pos: usize, align: usize) -> Result<(), WireError> {
    if pos % align == 0 {
        Ok(())
    } else {
        Err(WireError::MisalignedOffset { offset: pos, align })
    }
}

/// The table referenced by the root offset at the start of the buffer
pub fn root_table(buf: &[u8]) -> Result<Table<'_>, WireError> {
    let pos = follow(buf, 0)?;
    Table::at(buf, pos)
}

/// A table located in a buffer, with its vtable already checked
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    pos: usize,
    vtable: usize,
    vtable_size: usize,
    table_size: usize,
}

impl<'a> Table<'a> {
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self, WireError> {
        check_align(pos, 4)?;
        let soffset = read_i32_at(buf, pos)? as i64;
        let vtable = pos as i64 - soffset;
        if vtable < 0 || vtable as usize >= buf.len() {
            return Err(WireError::OutOfBounds { offset: vtable, len: buf.len() });
        }
        let vtable = vtable as usize;
        check_align(vtable, 2)?;

        let vtable_size = read_u16_at(buf, vtable)? as usize;
        let table_size = read_u16_at(buf, vtable + 2)? as usize;
        if vtable_size < 4 || vtable_size % 2 != 0 {
            return Err(WireError::InvalidVtable { offset: vtable, reason: "bad vtable size" });
        }
        if table_size < 4 {
            return Err(WireError::InvalidVtable { offset: vtable, reason: "bad table size" });
        }
        slice_at(buf, vtable, vtable_size)?;
        slice_at(buf, pos, table_size)?;

        Ok(Self { buf, pos, vtable, vtable_size, table_size })
    }

    /// Absolute position of a field, `None` when the field is absent
    fn field_pos(&self, slot: u16, size: usize) -> Result<Option<usize>, WireError> {
        let entry = 4 + 2 * slot as usize;
        if entry + 2 > self.vtable_size {
            return Ok(None);
        }
        let offset = read_u16_at(self.buf, self.vtable + entry)? as usize;
        if offset == 0 {
            return Ok(None);
        }
        if offset < 4 || offset + size > self.table_size {
            return Err(WireError::InvalidVtable {
                offset: self.vtable,
                reason: "field outside table",
            });
        }
        Ok(Some(self.pos + offset))
    }

    pub fn read_u8(&self, slot: u16) -> Result<Option<u8>, WireError> {
        Ok(match self.field_pos(slot, 1)? {
            Some(pos) => Some(slice_at(self.buf, pos, 1)?[0]),
            None => None,
        })
    }

    pub fn read_struct<T: WireStruct>(&self, slot: u16) -> Result<Option<T>, WireError> {
        Ok(match self.field_pos(slot, T::SIZE)? {
            Some(pos) => Some(T::read_le(slice_at(self.buf, pos, T::SIZE)?)),
            None => None,
        })
    }

    pub fn read_table(&self, slot: u16) -> Result<Option<Table<'a>>, WireError> {
        Ok(match self.field_pos(slot, 4)? {
            Some(pos) => Some(Table::at(self.buf, follow(self.buf, pos)?)?),
            None => None,
        })
    }

    pub fn read_vector(&self, slot: u16) -> Result<Option<Vector<'a>>, WireError> {
        Ok(match self.field_pos(slot, 4)? {
            Some(pos) => Some(Vector::at(self.buf, follow(self.buf, pos)?)?),
            None => None,
        })
    }

    /// Vector of structs; an absent field reads as empty
    pub fn structs_or_empty<T: WireStruct>(&self, slot: u16) -> Result<Vec<T>, WireError> {
        match self.read_vector(slot)? {
            Some(vector) => vector.structs(),
            None => Ok(Vec::new()),
        }
    }
}

/// A length-prefixed vector located in a buffer
#[derive(Debug, Clone, Copy)]
pub struct Vector<'a> {
    buf: &'a [u8],
    start: usize,
    len: usize,
}

impl<'a> Vector<'a> {
    fn at(buf: &'a [u8], pos: usize) -> Result<Self, WireError> {
        check_align(pos, 4)?;
        let len = read_u32_at(buf, pos)? as usize;
        Ok(Self { buf, start: pos + 4, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn body(&self, elem_size: usize) -> Result<&'a [u8], WireError> {
        let bytes = self.len.checked_mul(elem_size).ok_or(WireError::OutOfBounds {
            offset: self.start as i64,
            len: self.buf.len(),
        })?;
        slice_at(self.buf, self.start, bytes)
    }

    pub fn structs<T: WireStruct>(&self) -> Result<Vec<T>, WireError> {
        let body = self.body(T::SIZE)?;
        Ok(body.chunks_exact(T::SIZE).map(T::read_le).collect())
    }

    pub fn tables(&self) -> Result<Vec<Table<'a>>, WireError> {
        self.body(4)?;
        (0..self.len)
            .map(|i| Table::at(self.buf, follow(self.buf, self.start + 4 * i)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::builder::WireBuilder;

    #[test]
    fn test_absent_field_reads_none() {
        let mut builder = WireBuilder::new(32);
        builder.start_table();
        builder.add_field_u8(0, 3);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        let table = root_table(&bytes).unwrap();
        assert_eq!(table.read_u8(0).unwrap(), Some(3));
        assert_eq!(table.read_u8(1).unwrap(), None);
        assert!(table.read_vector(5).unwrap().is_none());
        assert!(table.structs_or_empty::<i32>(5).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_buffer_is_an_error() {
        let mut builder = WireBuilder::new(32);
        let values = builder.create_vector(&[1i32, 2, 3, 4]);
        builder.start_table();
        builder.add_field_offset(0, values);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        for cut in [0usize, 2, 6, bytes.len() - 4] {
            let result = root_table(&bytes[..cut]).and_then(|t| t.structs_or_empty::<i32>(0));
            assert!(result.is_err(), "cut at {} should fail", cut);
        }
    }

    #[test]
    fn test_huge_vector_length_is_rejected() {
        let mut builder = WireBuilder::new(32);
        let values = builder.create_vector(&[1i32]);
        builder.start_table();
        builder.add_field_offset(0, values);
        let root = builder.end_table();
        let mut bytes = builder.finish(root);

        let table = root_table(&bytes).unwrap();
        let vector = table.read_vector(0).unwrap().unwrap();
        let count_pos = vector.start - 4;
        bytes[count_pos..count_pos + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let table = root_table(&bytes).unwrap();
        assert!(matches!(
            table.structs_or_empty::<i32>(0),
            Err(WireError::Truncated { .. })
        ));
    }
}
