use crate::error::DecodeError;

/// Marker that older firmware puts in front of the header.
pub const MAGIC: [u8; 2] = *b"MC";

/// Which of the two header encodings a frame used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderLayout {
    /// `"MC", version:u8, reserved:u8, columns:u16, rows:u16`
    WithMagic,
    /// `version:u8, reserved:u8, columns:u16, rows:u16`
    NoMagic,
}

impl HeaderLayout {
    pub const fn encoded_len(self) -> usize {
        match self {
            HeaderLayout::WithMagic => 8,
            HeaderLayout::NoMagic => 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub columns: u16,
    pub rows: u16,
}

impl Header {
    pub fn new(version: u8, columns: u16, rows: u16) -> Self {
        Header {
            version,
            columns,
            rows,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Parse either header layout. Dimensions are not validated here.
    pub fn parse(buf: &[u8]) -> Result<(Header, HeaderLayout), DecodeError> {
        if buf.len() < HeaderLayout::NoMagic.encoded_len() {
            return Err(DecodeError::TooShort { len: buf.len() });
        }

        let layout = if buf.len() >= HeaderLayout::WithMagic.encoded_len() && buf[..2] == MAGIC {
            HeaderLayout::WithMagic
        } else {
            HeaderLayout::NoMagic
        };

        let off = match layout {
            HeaderLayout::WithMagic => MAGIC.len(),
            HeaderLayout::NoMagic => 0,
        };

        // buf[off + 1] is reserved
        let header = Header {
            version: buf[off],
            columns: u16::from_le_bytes([buf[off + 2], buf[off + 3]]),
            rows: u16::from_le_bytes([buf[off + 4], buf[off + 5]]),
        };
        Ok((header, layout))
    }

    pub fn encode(&self, layout: HeaderLayout) -> Vec<u8> {
        let mut out = Vec::with_capacity(layout.encoded_len());
        if layout == HeaderLayout::WithMagic {
            out.extend_from_slice(&MAGIC);
        }
        out.push(self.version);
        out.push(0);
        out.extend_from_slice(&self.columns.to_le_bytes());
        out.extend_from_slice(&self.rows.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_layouts_decode_to_same_header() {
        let header = Header::new(2, 32, 24);

        let with_magic = header.encode(HeaderLayout::WithMagic);
        let no_magic = header.encode(HeaderLayout::NoMagic);
        assert_eq!(with_magic.len(), 8);
        assert_eq!(no_magic.len(), 6);

        let (a, layout_a) = Header::parse(&with_magic).unwrap();
        let (b, layout_b) = Header::parse(&no_magic).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, header);
        assert_eq!(layout_a, HeaderLayout::WithMagic);
        assert_eq!(layout_b, HeaderLayout::NoMagic);
    }

    #[test]
    fn test_field_order_little_endian() {
        let bytes = [1u8, 0xFF, 0x20, 0x00, 0x18, 0x00];
        let (header, _) = Header::parse(&bytes).unwrap();
        assert_eq!(header, Header::new(1, 32, 24));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            Header::parse(&[1, 0, 32, 0, 24]),
            Err(DecodeError::TooShort { len: 5 })
        );
    }

    #[test]
    fn test_magic_needs_full_header() {
        // "MC" followed by only 4 bytes is read as a magic-less header
        let bytes = [b'M', b'C', 2, 0, 1, 0];
        let (header, layout) = Header::parse(&bytes).unwrap();
        assert_eq!(layout, HeaderLayout::NoMagic);
        assert_eq!(header.version, b'M');
    }
}
