//! Binary TZif (RFC 8536) decoder.
//!
//! Reads a whole TZif file already loaded into memory and produces the
//! raw, not-yet-reconciled pieces that [`crate::builder`] turns into a
//! zone's transition table.

use crate::error::{TzError, TzResult};

const MAGIC: &[u8; 4] = b"TZif";

/// A still-raw local time type record, straight off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawType {
    pub utc_offset: i32,
    pub is_dst: bool,
    pub abbr_index: u8,
}

/// Everything a TZif file contains, decoded but not yet reconciled into
/// a lookup-ready transition table.
#[derive(Debug, Clone)]
pub struct DecodedTzif {
    pub version: u8,
    pub trans_utc: Vec<i64>,
    pub trans_type_idx: Vec<u8>,
    pub types: Vec<RawType>,
    /// The raw abbreviation pool; abbreviations are NUL-terminated
    /// substrings starting at each type's `abbr_index`.
    pub abbrs: Vec<u8>,
    pub leap_table: Vec<(i64, i32)>,
    /// The POSIX TZ string from the v2+ footer, if any (without the
    /// framing newlines).
    pub tail_rule_bytes: Option<String>,
}

impl DecodedTzif {
    pub fn abbr_at(&self, index: u8) -> TzResult<&str> {
        let start = index as usize;
        let end = self.abbrs[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                TzError::malformed_data().with_message("abbreviation is not NUL-terminated")
            })?;
        std::str::from_utf8(&self.abbrs[start..end])
            .map_err(|_| TzError::malformed_data().with_message("abbreviation is not valid UTF-8"))
    }
}

/// Decode a complete TZif file already read into memory.
pub fn decode(data: &[u8]) -> TzResult<DecodedTzif> {
    let mut cursor = Cursor::new(data);

    let header = read_header(&mut cursor)?;
    let body = read_body(&mut cursor, &header, TransWidth::Four)?;

    if header.version == 1 {
        return Ok(DecodedTzif {
            version: 1,
            trans_utc: body.trans_utc,
            trans_type_idx: body.trans_type_idx,
            types: body.types,
            abbrs: body.abbrs,
            leap_table: body.leap_table,
            tail_rule_bytes: None,
        });
    }

    // The v2+ body is authoritative; re-read header and body with
    // 64-bit transition times.
    let header2 = read_header(&mut cursor)?;
    let body2 = read_body(&mut cursor, &header2, TransWidth::Eight)?;
    let tail_rule_bytes = read_footer(&mut cursor)?;

    Ok(DecodedTzif {
        version: header2.version,
        trans_utc: body2.trans_utc,
        trans_type_idx: body2.trans_type_idx,
        types: body2.types,
        abbrs: body2.abbrs,
        leap_table: body2.leap_table,
        tail_rule_bytes,
    })
}

struct Header {
    version: u8,
    isutcnt: u32,
    isstdcnt: u32,
    leapcnt: u32,
    timecnt: u32,
    typecnt: u32,
    charcnt: u32,
}

fn read_header(cursor: &mut Cursor<'_>) -> TzResult<Header> {
    let magic = cursor.read_exact(4)?;
    if magic != MAGIC {
        return Err(TzError::malformed_data().with_message("missing 'TZif' magic"));
    }

    let version_byte = cursor.read_u8()?;
    let version = match version_byte {
        0 => 1,
        b'2' => 2,
        b'3' => 3,
        other => {
            #[cfg(feature = "log")]
            log::warn!("unsupported TZif version byte {other:#x}; treating as version 2");
            #[cfg(not(feature = "log"))]
            let _ = other;
            2
        }
    };

    cursor.skip(15)?;

    let isutcnt = cursor.read_be_u32()?;
    let isstdcnt = cursor.read_be_u32()?;
    let leapcnt = cursor.read_be_u32()?;
    let timecnt = cursor.read_be_u32()?;
    let typecnt = cursor.read_be_u32()?;
    let charcnt = cursor.read_be_u32()?;

    if typecnt == 0 {
        return Err(TzError::malformed_data().with_message("typecnt must be at least 1"));
    }
    if charcnt == 0 {
        return Err(TzError::malformed_data().with_message("charcnt must be at least 1"));
    }
    if isstdcnt != 0 && isstdcnt != typecnt {
        return Err(TzError::malformed_data().with_message("isstdcnt must be 0 or typecnt"));
    }
    if isutcnt != 0 && isutcnt != typecnt {
        return Err(TzError::malformed_data().with_message("isutcnt must be 0 or typecnt"));
    }

    Ok(Header {
        version,
        isutcnt,
        isstdcnt,
        leapcnt,
        timecnt,
        typecnt,
        charcnt,
    })
}

#[derive(Clone, Copy)]
enum TransWidth {
    Four,
    Eight,
}

struct RawBody {
    trans_utc: Vec<i64>,
    trans_type_idx: Vec<u8>,
    types: Vec<RawType>,
    abbrs: Vec<u8>,
    leap_table: Vec<(i64, i32)>,
}

fn read_body(cursor: &mut Cursor<'_>, header: &Header, width: TransWidth) -> TzResult<RawBody> {
    let mut trans_utc = Vec::with_capacity(header.timecnt as usize);
    for _ in 0..header.timecnt {
        trans_utc.push(match width {
            TransWidth::Four => i64::from(cursor.read_be_i32()?),
            TransWidth::Eight => cursor.read_be_i64()?,
        });
    }

    let mut trans_type_idx = Vec::with_capacity(header.timecnt as usize);
    for _ in 0..header.timecnt {
        let idx = cursor.read_u8()?;
        if u32::from(idx) >= header.typecnt {
            return Err(TzError::malformed_data().with_message("transition type index out of range"));
        }
        trans_type_idx.push(idx);
    }

    let mut types = Vec::with_capacity(header.typecnt as usize);
    for _ in 0..header.typecnt {
        let utc_offset = cursor.read_be_i32()?;
        if !(-89999..=93599).contains(&utc_offset) {
            return Err(TzError::malformed_data().with_message("utcoff out of range"));
        }
        let is_dst = match cursor.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(TzError::malformed_data().with_message("isdst must be 0 or 1")),
        };
        let abbr_index = cursor.read_u8()?;
        if u32::from(abbr_index) >= header.charcnt {
            return Err(TzError::malformed_data().with_message("abbreviation index out of range"));
        }
        types.push(RawType {
            utc_offset,
            is_dst,
            abbr_index,
        });
    }

    let abbrs = cursor.read_exact(header.charcnt as usize)?.to_vec();
    if abbrs.last() != Some(&0) {
        return Err(TzError::malformed_data().with_message("abbreviation pool must end in NUL"));
    }

    let mut leap_table = Vec::with_capacity(header.leapcnt as usize);
    for _ in 0..header.leapcnt {
        let t = match width {
            TransWidth::Four => i64::from(cursor.read_be_i32()?),
            TransWidth::Eight => cursor.read_be_i64()?,
        };
        let correction = cursor.read_be_i32()?;
        leap_table.push((t, correction));
    }

    for _ in 0..header.isstdcnt {
        match cursor.read_u8()? {
            0 | 1 => {}
            _ => return Err(TzError::malformed_data().with_message("standard/wall indicator must be 0 or 1")),
        }
    }
    for _ in 0..header.isutcnt {
        match cursor.read_u8()? {
            0 | 1 => {}
            _ => return Err(TzError::malformed_data().with_message("UT/local indicator must be 0 or 1")),
        }
    }

    Ok(RawBody {
        trans_utc,
        trans_type_idx,
        types,
        abbrs,
        leap_table,
    })
}

fn read_footer(cursor: &mut Cursor<'_>) -> TzResult<Option<String>> {
    if cursor.read_u8()? != b'\n' {
        return Err(TzError::malformed_data().with_message("footer must start with a newline"));
    }
    let mut bytes = Vec::new();
    loop {
        let b = cursor.read_u8()?;
        if b == b'\n' {
            break;
        }
        bytes.push(b);
    }
    if bytes.is_empty() {
        return Ok(None);
    }
    let s = String::from_utf8(bytes)
        .map_err(|_| TzError::malformed_data().with_message("POSIX TZ string is not valid UTF-8"))?;
    Ok(Some(s))
}

/// A minimal, safe byte cursor. No `unsafe`, no transmutes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_exact(&mut self, n: usize) -> TzResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| TzError::malformed_data().with_message("truncated TZif data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> TzResult<()> {
        self.read_exact(n).map(|_| ())
    }

    fn read_u8(&mut self) -> TzResult<u8> {
        Ok(self.read_exact(1)?[0])
    }

    fn read_be_u32(&mut self) -> TzResult<u32> {
        let bytes: [u8; 4] = self.read_exact(4)?.try_into().expect("length checked above");
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_be_i32(&mut self) -> TzResult<i32> {
        let bytes: [u8; 4] = self.read_exact(4)?.try_into().expect("length checked above");
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_be_i64(&mut self) -> TzResult<i64> {
        let bytes: [u8; 8] = self.read_exact(8)?.try_into().expect("length checked above");
        Ok(i64::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_v1(utc_offset: i32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"TZif");
        data.push(0); // version 1
        data.extend_from_slice(&[0u8; 15]);
        data.extend_from_slice(&0u32.to_be_bytes()); // isutcnt
        data.extend_from_slice(&0u32.to_be_bytes()); // isstdcnt
        data.extend_from_slice(&0u32.to_be_bytes()); // leapcnt
        data.extend_from_slice(&0u32.to_be_bytes()); // timecnt
        data.extend_from_slice(&1u32.to_be_bytes()); // typecnt
        data.extend_from_slice(&4u32.to_be_bytes()); // charcnt
        data.extend_from_slice(&utc_offset.to_be_bytes());
        data.push(0); // isdst
        data.push(0); // abbr_index
        data.extend_from_slice(b"UTC\0");
        data
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = minimal_v1(0);
        data[0] = b'X';
        assert!(decode(&data).is_err());
    }

    #[test]
    fn decodes_minimal_v1_zone() {
        let data = minimal_v1(3600);
        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.types.len(), 1);
        assert_eq!(decoded.types[0].utc_offset, 3600);
        assert_eq!(decoded.abbr_at(0).unwrap(), "UTC");
        assert!(decoded.tail_rule_bytes.is_none());
    }

    #[test]
    fn rejects_out_of_range_utcoff() {
        let data = minimal_v1(100_000);
        assert!(decode(&data).is_err());
    }
}
