//! MessagePack-compatible binary codec.

use super::{Codec, CodecError, MAX_DEPTH};
use crate::value::{Dict, Value};

const BOOL_FALSE: u8 = 0xc2;
const BOOL_TRUE: u8 = 0xc3;
const BIN8: u8 = 0xc4;
const BIN16: u8 = 0xc5;
const BIN32: u8 = 0xc6;
const FLOAT32: u8 = 0xca;
const FLOAT64: u8 = 0xcb;
const UINT8: u8 = 0xcc;
const UINT16: u8 = 0xcd;
const UINT32: u8 = 0xce;
const UINT64: u8 = 0xcf;
const INT8: u8 = 0xd0;
const INT16: u8 = 0xd1;
const INT32: u8 = 0xd2;
const INT64: u8 = 0xd3;
const STR8: u8 = 0xd9;
const STR16: u8 = 0xda;
const STR32: u8 = 0xdb;
const ARRAY16: u8 = 0xdc;
const ARRAY32: u8 = 0xdd;
const MAP16: u8 = 0xde;
const MAP32: u8 = 0xdf;

/// Compact self-describing binary codec.
///
/// The wire format is the MessagePack subset needed for [`Value`], so
/// payloads can be inspected with any MessagePack tool. Integers are written
/// in the smallest signed form that holds them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode(&self, dict: &Dict) -> Result<Vec<u8>, CodecError> {
        if dict.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(64);
        write_map(&mut out, dict, 0)?;
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Dict, CodecError> {
        if data.is_empty() {
            return Ok(Dict::new());
        }

        let mut reader = Reader { buf: data, pos: 0 };
        let dict = match reader.read_value(0)? {
            Value::Map(dict) => dict,
            _ => return Err(CodecError::NotAMap),
        };

        let rest = data.len() - reader.pos;
        if rest > 0 {
            return Err(CodecError::TrailingBytes(rest));
        }

        Ok(dict)
    }

    fn name(&self) -> &'static str {
        "binary"
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), CodecError> {
    match value {
        Value::Bool(false) => out.push(BOOL_FALSE),
        Value::Bool(true) => out.push(BOOL_TRUE),
        Value::Int(i) => write_int(out, *i),
        Value::Float(f) => {
            out.push(FLOAT64);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Str(s) => {
            write_len(out, s.len(), Some(0xa0), [STR8, STR16, STR32])?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            write_len(out, b.len(), None, [BIN8, BIN16, BIN32])?;
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            if depth >= MAX_DEPTH {
                return Err(CodecError::TooDeep);
            }
            write_collection_len(out, items.len(), 0x90, ARRAY16, ARRAY32)?;
            for item in items {
                write_value(out, item, depth + 1)?;
            }
        }
        Value::Map(map) => write_map(out, map, depth)?,
    }
    Ok(())
}

fn write_map(out: &mut Vec<u8>, map: &Dict, depth: usize) -> Result<(), CodecError> {
    if depth >= MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }
    write_collection_len(out, map.len(), 0x80, MAP16, MAP32)?;
    for (key, value) in map {
        write_len(out, key.len(), Some(0xa0), [STR8, STR16, STR32])?;
        out.extend_from_slice(key.as_bytes());
        write_value(out, value, depth + 1)?;
    }
    Ok(())
}

fn write_int(out: &mut Vec<u8>, i: i64) {
    if (0..=0x7f).contains(&i) {
        out.push(i as u8);
    } else if (-32..0).contains(&i) {
        out.push(i as i8 as u8);
    } else if let Ok(v) = i8::try_from(i) {
        out.push(INT8);
        out.push(v as u8);
    } else if let Ok(v) = i16::try_from(i) {
        out.push(INT16);
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = i32::try_from(i) {
        out.push(INT32);
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.push(INT64);
        out.extend_from_slice(&i.to_be_bytes());
    }
}

/// Strings and binaries: optional fix form (< 32), then 8/16/32-bit lengths.
fn write_len(
    out: &mut Vec<u8>,
    len: usize,
    fix: Option<u8>,
    markers: [u8; 3],
) -> Result<(), CodecError> {
    match (fix, len) {
        (Some(base), 0..=31) => out.push(base | len as u8),
        (_, 0..=0xff) => {
            out.push(markers[0]);
            out.push(len as u8);
        }
        (_, 0x100..=0xffff) => {
            out.push(markers[1]);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            let len32 = u32::try_from(len).map_err(|_| CodecError::TooLong(len))?;
            out.push(markers[2]);
            out.extend_from_slice(&len32.to_be_bytes());
        }
    }
    Ok(())
}

/// Arrays and maps: fix form (< 16), then 16/32-bit counts.
fn write_collection_len(
    out: &mut Vec<u8>,
    len: usize,
    fix: u8,
    m16: u8,
    m32: u8,
) -> Result<(), CodecError> {
    if len < 16 {
        out.push(fix | len as u8);
    } else if let Ok(n) = u16::try_from(len) {
        out.push(m16);
        out.extend_from_slice(&n.to_be_bytes());
    } else {
        let n = u32::try_from(len).map_err(|_| CodecError::TooLong(len))?;
        out.push(m32);
        out.extend_from_slice(&n.to_be_bytes());
    }
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn u8_len(&mut self) -> Result<usize, CodecError> {
        Ok(usize::from(self.byte()?))
    }

    fn u16_len(&mut self) -> Result<usize, CodecError> {
        Ok(usize::from(u16::from_be_bytes(self.array()?)))
    }

    fn u32_len(&mut self) -> Result<usize, CodecError> {
        Ok(u32::from_be_bytes(self.array()?) as usize)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_value(&mut self, depth: usize) -> Result<Value, CodecError> {
        let marker = self.byte()?;
        let value = match marker {
            0x00..=0x7f => Value::Int(i64::from(marker)),
            0xe0..=0xff => Value::Int(i64::from(marker as i8)),
            0x80..=0x8f => self.read_map(usize::from(marker & 0x0f), depth)?,
            0x90..=0x9f => self.read_list(usize::from(marker & 0x0f), depth)?,
            0xa0..=0xbf => self.read_str(usize::from(marker & 0x1f))?,
            BOOL_FALSE => Value::Bool(false),
            BOOL_TRUE => Value::Bool(true),
            BIN8 => {
                let n = self.u8_len()?;
                Value::Bytes(self.take(n)?.to_vec())
            }
            BIN16 => {
                let n = self.u16_len()?;
                Value::Bytes(self.take(n)?.to_vec())
            }
            BIN32 => {
                let n = self.u32_len()?;
                Value::Bytes(self.take(n)?.to_vec())
            }
            FLOAT32 => Value::Float(f64::from(f32::from_be_bytes(self.array()?))),
            FLOAT64 => Value::Float(f64::from_be_bytes(self.array()?)),
            UINT8 => Value::Int(i64::from(self.byte()?)),
            UINT16 => Value::Int(i64::from(u16::from_be_bytes(self.array()?))),
            UINT32 => Value::Int(i64::from(u32::from_be_bytes(self.array()?))),
            UINT64 => {
                let v = u64::from_be_bytes(self.array()?);
                Value::Int(i64::try_from(v).map_err(|_| CodecError::IntegerOverflow(v))?)
            }
            INT8 => Value::Int(i64::from(self.byte()? as i8)),
            INT16 => Value::Int(i64::from(i16::from_be_bytes(self.array()?))),
            INT32 => Value::Int(i64::from(i32::from_be_bytes(self.array()?))),
            INT64 => Value::Int(i64::from_be_bytes(self.array()?)),
            STR8 => {
                let n = self.u8_len()?;
                self.read_str(n)?
            }
            STR16 => {
                let n = self.u16_len()?;
                self.read_str(n)?
            }
            STR32 => {
                let n = self.u32_len()?;
                self.read_str(n)?
            }
            ARRAY16 => {
                let n = self.u16_len()?;
                self.read_list(n, depth)?
            }
            ARRAY32 => {
                let n = self.u32_len()?;
                self.read_list(n, depth)?
            }
            MAP16 => {
                let n = self.u16_len()?;
                self.read_map(n, depth)?
            }
            MAP32 => {
                let n = self.u32_len()?;
                self.read_map(n, depth)?
            }
            other => return Err(CodecError::InvalidMarker(other)),
        };
        Ok(value)
    }

    fn read_str(&mut self, n: usize) -> Result<Value, CodecError> {
        let raw = self.take(n)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Value::Str(s.to_string()))
    }

    fn read_list(&mut self, n: usize, depth: usize) -> Result<Value, CodecError> {
        if depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        // Every element takes at least one byte.
        if n > self.remaining() {
            return Err(CodecError::Truncated);
        }
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self, n: usize, depth: usize) -> Result<Value, CodecError> {
        if depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        // Every entry takes at least two bytes.
        if n > self.remaining() / 2 {
            return Err(CodecError::Truncated);
        }
        let mut map = Dict::with_capacity(n);
        for _ in 0..n {
            let key = match self.read_value(depth + 1)? {
                Value::Str(key) => key,
                _ => return Err(CodecError::NonStringKey),
            };
            let value = self.read_value(depth + 1)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}
