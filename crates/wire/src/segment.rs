use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use interest_common::{EntityId, Error, Result};
use interest_kernel::HandlerKind;

/// Segment type tag. Values match the first three [`HandlerKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SegmentKind {
    Create = 0,
    Update = 1,
    Remove = 2,
}

impl SegmentKind {
    /// Emission order within one packet.
    pub const ALL: [SegmentKind; 3] = [Self::Create, Self::Update, Self::Remove];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Create),
            1 => Some(Self::Update),
            2 => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn write_handler(self) -> HandlerKind {
        match self {
            Self::Create => HandlerKind::WriteCreate,
            Self::Update => HandlerKind::WriteUpdate,
            Self::Remove => HandlerKind::WriteRemove,
        }
    }

    pub fn read_handler(self) -> HandlerKind {
        match self {
            Self::Create => HandlerKind::ReadCreate,
            Self::Update => HandlerKind::ReadUpdate,
            Self::Remove => HandlerKind::ReadRemove,
        }
    }

    pub fn error_handler(self) -> HandlerKind {
        match self {
            Self::Create => HandlerKind::ErrorCreate,
            Self::Update => HandlerKind::ErrorUpdate,
            Self::Remove => HandlerKind::ErrorRemove,
        }
    }
}

/// `{kind: u8, reserved: u8, entry_count: u16, payload_size: u32}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub kind: SegmentKind,
    pub entry_count: u16,
    /// Bytes of entries (headers plus payloads) following this header.
    pub payload_size: u32,
}

impl SegmentHeader {
    pub const LEN: usize = 8;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.kind as u8;
        LittleEndian::write_u16(&mut out[2..4], self.entry_count);
        LittleEndian::write_u32(&mut out[4..8], self.payload_size);
        out
    }

    /// Decode the header at the start of `input`; `offset` is its position in
    /// the packet, used for error reporting.
    pub fn decode(mut input: &[u8], offset: usize) -> Result<Self> {
        let truncated = || Error::ReadInvalid {
            offset,
            reason: "truncated segment header",
        };
        let kind = input.read_u8().map_err(|_| truncated())?;
        let _reserved = input.read_u8().map_err(|_| truncated())?;
        let entry_count = input.read_u16::<LittleEndian>().map_err(|_| truncated())?;
        let payload_size = input.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        let kind = SegmentKind::from_u8(kind).ok_or(Error::ReadInvalid {
            offset,
            reason: "unknown segment kind",
        })?;
        Ok(Self {
            kind,
            entry_count,
            payload_size,
        })
    }
}

/// `{entity_id: u64, payload_len: u16}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub entity: EntityId,
    pub payload_len: u16,
}

impl EntryHeader {
    pub const LEN: usize = 10;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        LittleEndian::write_u64(&mut out[0..8], self.entity.0);
        LittleEndian::write_u16(&mut out[8..10], self.payload_len);
        out
    }

    pub fn decode(mut input: &[u8], offset: usize) -> Result<Self> {
        let truncated = || Error::ReadInvalid {
            offset,
            reason: "truncated entry header",
        };
        let entity = input.read_u64::<LittleEndian>().map_err(|_| truncated())?;
        let payload_len = input.read_u16::<LittleEndian>().map_err(|_| truncated())?;
        Ok(Self {
            entity: EntityId(entity),
            payload_len,
        })
    }
}

/// Wire size of a segment with `entries` entries of `payload` bytes each.
pub const fn segment_size(entries: usize, payload: usize) -> usize {
    SegmentHeader::LEN + (EntryHeader::LEN + payload) * entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_header_layout() {
        let header = SegmentHeader {
            kind: SegmentKind::Update,
            entry_count: 3,
            payload_size: 36,
        };
        assert_eq!(header.encode(), [0x01, 0x00, 0x03, 0x00, 0x24, 0x00, 0x00, 0x00]);
        assert_eq!(SegmentHeader::decode(&header.encode(), 0), Ok(header));
    }

    #[test]
    fn entry_header_layout() {
        let entry = EntryHeader {
            entity: EntityId(0x0102),
            payload_len: 2,
        };
        assert_eq!(entry.encode(), [0x02, 0x01, 0, 0, 0, 0, 0, 0, 0x02, 0x00]);
        assert_eq!(EntryHeader::decode(&entry.encode(), 0), Ok(entry));
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(
            SegmentHeader::decode(&[0, 0, 1], 12),
            Err(Error::ReadInvalid {
                offset: 12,
                reason: "truncated segment header"
            })
        );
        assert!(EntryHeader::decode(&[0; 9], 0).is_err());
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let bytes = [7, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            SegmentHeader::decode(&bytes, 0),
            Err(Error::ReadInvalid {
                offset: 0,
                reason: "unknown segment kind"
            })
        );
    }

    #[test]
    fn kinds_line_up_with_handlers() {
        for kind in SegmentKind::ALL {
            assert_eq!(kind.write_handler() as u8, kind as u8);
            assert_eq!(SegmentKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(SegmentKind::Remove.error_handler(), HandlerKind::ErrorRemove);
        assert_eq!(SegmentKind::Create.read_handler(), HandlerKind::ReadCreate);
    }

    #[test]
    fn segment_sizes() {
        assert_eq!(segment_size(3, 2), 44);
        assert_eq!(segment_size(2, 0), 28);
        assert_eq!(segment_size(0, 0), 8);
    }
}
