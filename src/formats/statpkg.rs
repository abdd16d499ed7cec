//! Statistical-package adapter: Stata `.dta` files, releases 114/115.
//!
//! The container is self-describing, so column names and types come
//! straight from the embedded descriptors and nothing is inferred:
//!
//! ```text
//!  header      release, byte order, nvar, nobs, label, timestamp
//!  typlist     one type byte per variable
//!  varlist     33-byte NUL-padded variable names
//!  srtlist     sort order (ignored)
//!  fmtlist     display formats (ignored)
//!  lbllist     value-label names (ignored)
//!  var labels  81 bytes per variable (ignored)
//!  expansion   tagged blocks, zero-terminated (skipped)
//!  data        nobs rows in declared order
//! ```
//!
//! Value-label tables after the data matrix are not read.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{DataError, Result};
use crate::table::{Table, Value};

const RELEASE_114: u8 = 114;
const RELEASE_115: u8 = 115;

// Type bytes in the typlist. 1..=244 is a fixed-length string.
const TYPE_BYTE: u8 = 251;
const TYPE_INT: u8 = 252;
const TYPE_LONG: u8 = 253;
const TYPE_FLOAT: u8 = 254;
const TYPE_DOUBLE: u8 = 255;

// Everything above these thresholds encodes a missing value.
const MISSING_BYTE: i8 = 100;
const MISSING_INT: i16 = 32740;
const MISSING_LONG: i32 = 2_147_483_620;
const MISSING_FLOAT: f32 = 1.701e38;
const MISSING_DOUBLE: f64 = 8.988e307;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarType {
    Byte,
    Int,
    Long,
    Float,
    Double,
    Str(u8),
}

impl VarType {
    fn from_type_byte(b: u8) -> Result<VarType> {
        match b {
            1..=244 => Ok(VarType::Str(b)),
            TYPE_BYTE => Ok(VarType::Byte),
            TYPE_INT => Ok(VarType::Int),
            TYPE_LONG => Ok(VarType::Long),
            TYPE_FLOAT => Ok(VarType::Float),
            TYPE_DOUBLE => Ok(VarType::Double),
            other => Err(DataError::CorruptFile(format!(
                "invalid variable type byte {other}"
            ))),
        }
    }
}

/// Byte-order-aware reader over the raw stream. Truncation surfaces as
/// `CorruptFile`, not a bare I/O error.
struct Decoder<R> {
    inner: R,
    big_endian: bool,
}

impl<R: Read> Decoder<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DataError::CorruptFile("unexpected end of file".to_string())
            } else {
                DataError::Io(e)
            }
        })
    }

    fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    fn u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(if self.big_endian {
            u16::from_be_bytes(buf)
        } else {
            u16::from_le_bytes(buf)
        })
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(if self.big_endian {
            u32::from_be_bytes(buf)
        } else {
            u32::from_le_bytes(buf)
        })
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(if self.big_endian {
            f64::from_be_bytes(buf)
        } else {
            f64::from_le_bytes(buf)
        })
    }
}

/// Decode a NUL-padded fixed-width name field.
fn padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_cell<R: Read>(dec: &mut Decoder<R>, ty: VarType) -> Result<Value> {
    Ok(match ty {
        VarType::Byte => {
            let v = dec.i8()?;
            if v > MISSING_BYTE {
                Value::Null
            } else {
                Value::Int(v as i64)
            }
        }
        VarType::Int => {
            let v = dec.i16()?;
            if v > MISSING_INT {
                Value::Null
            } else {
                Value::Int(v as i64)
            }
        }
        VarType::Long => {
            let v = dec.i32()?;
            if v > MISSING_LONG {
                Value::Null
            } else {
                Value::Int(v as i64)
            }
        }
        VarType::Float => {
            let v = dec.f32()?;
            if v > MISSING_FLOAT {
                Value::Null
            } else {
                Value::Float(v as f64)
            }
        }
        VarType::Double => {
            let v = dec.f64()?;
            if v > MISSING_DOUBLE {
                Value::Null
            } else {
                Value::Float(v)
            }
        }
        VarType::Str(len) => {
            let raw = dec.bytes(len as usize)?;
            let s = padded_str(&raw);
            if s.is_empty() {
                Value::Null
            } else {
                Value::Text(s)
            }
        }
    })
}

/// Load a `.dta` file into a [`Table`]. The file handle lives only for the
/// duration of this call.
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut dec = Decoder {
        inner: BufReader::new(file),
        big_endian: false,
    };

    // -- Header --
    let release = dec.u8()?;
    match release {
        RELEASE_114 | RELEASE_115 => {}
        // Fixed-layout releases this reader does not cover
        102..=113 => {
            return Err(DataError::UnsupportedFormat(format!(
                "dta release {release}"
            )))
        }
        // Release 117+ files open with a "<stata_dta>" tag instead
        b'<' => {
            return Err(DataError::UnsupportedFormat(
                "dta release 117 or newer".to_string(),
            ))
        }
        // sas7bdat containers start with a zero byte
        0x00 => {
            return Err(DataError::UnsupportedFormat(
                "sas7bdat container (only dta is read)".to_string(),
            ))
        }
        other => {
            return Err(DataError::CorruptFile(format!(
                "not a dta file (leading byte {other})"
            )))
        }
    }
    dec.big_endian = match dec.u8()? {
        0x01 => true,
        0x02 => false,
        other => {
            return Err(DataError::CorruptFile(format!(
                "invalid byte-order marker {other:#04x}"
            )))
        }
    };
    let filetype = dec.u8()?;
    if filetype != 0x01 {
        return Err(DataError::CorruptFile(format!(
            "invalid filetype byte {filetype:#04x}"
        )));
    }
    dec.u8()?; // unused
    let nvar = dec.u16()? as usize;
    let nobs = dec.u32()? as usize;
    dec.bytes(81)?; // data label
    dec.bytes(18)?; // timestamp

    // -- Descriptors --
    let types = dec
        .bytes(nvar)?
        .into_iter()
        .map(VarType::from_type_byte)
        .collect::<Result<Vec<_>>>()?;
    let mut names = Vec::with_capacity(nvar);
    for _ in 0..nvar {
        names.push(padded_str(&dec.bytes(33)?));
    }
    dec.bytes(2 * (nvar + 1))?; // srtlist
    dec.bytes(49 * nvar)?; // fmtlist
    dec.bytes(33 * nvar)?; // lbllist
    dec.bytes(81 * nvar)?; // variable labels

    // -- Expansion fields: (type, len) pairs, both zero at the end --
    loop {
        let data_type = dec.u8()?;
        let len = dec.i32()?;
        if data_type == 0 && len == 0 {
            break;
        }
        if len < 0 {
            return Err(DataError::CorruptFile(format!(
                "negative expansion field length {len}"
            )));
        }
        dec.bytes(len as usize)?;
    }

    // -- Data matrix --
    let mut rows = Vec::with_capacity(nobs);
    for _ in 0..nobs {
        let mut row = Vec::with_capacity(nvar);
        for &ty in &types {
            row.push(read_cell(&mut dec, ty)?);
        }
        rows.push(row);
    }

    let table = Table::new(names, rows)?;
    log::debug!(
        "loaded dta release {release}: {} observations x {} variables from {}",
        table.len(),
        table.width(),
        path.display()
    );
    Ok(table)
}
