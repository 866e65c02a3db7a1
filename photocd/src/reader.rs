//! Byte-level reading over in-memory buffers.
//!
//! Everything on a Photo CD disc is big-endian, regardless of the host, so
//! all multi-byte reads go through the helpers here.

#[inline]
pub(crate) fn be_u16(buffer: &[u8]) -> u16 {
    u16::from_be_bytes([buffer[0], buffer[1]])
}

#[inline]
pub(crate) fn be_u32(buffer: &[u8]) -> u32 {
    u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]])
}

/// A cursor over an in-memory block, used for the fixed file header and the
/// IPE sidecar. All reads are bounds-checked and return `None` past the end.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    #[inline]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        self.read_bytes(2).map(be_u16)
    }

    #[inline]
    pub(crate) fn read_u32(&mut self) -> Option<u32> {
        self.read_bytes(4).map(be_u32)
    }

    #[inline]
    pub(crate) fn skip(&mut self, len: usize) -> Option<()> {
        self.read_bytes(len).map(|_| ())
    }
}

/// Strip the trailing space padding and everything from the first NUL of an
/// ISO 646 text field.
pub(crate) fn trimmed_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text: String = field[..end]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();
    text.trim_end_matches(' ').to_string()
}
