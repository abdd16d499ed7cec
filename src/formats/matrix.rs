//! Matrix-binary adapter: MAT-file level 5 containers.
//!
//! A MAT 5 file is a 128-byte header followed by tagged data elements.
//! Each `miMATRIX` element carries one named variable as sub-elements
//! (array flags, dimensions, name, real part). Numeric variables convert
//! to `f64` arrays in column-major order; everything else (cell, struct,
//! char, sparse) is skipped. `miCOMPRESSED` elements hold a zlib stream
//! wrapping further elements.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::error::{DataError, Result};

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;

// mxDOUBLE_CLASS..=mxUINT64_CLASS
const NUMERIC_CLASSES: std::ops::RangeInclusive<u32> = 6..=15;
const COMPLEX_FLAG: u32 = 0x0800;

/// Offset cursor over a raw element stream.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], big_endian: bool) -> Self {
        Cursor {
            buf,
            pos: 0,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DataError::CorruptFile(format!(
                "truncated element: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    /// Next data element: `(mi type, payload)`. Handles the packed
    /// small-element form and the 8-byte alignment of the regular form.
    fn element(&mut self) -> Result<(u32, &'a [u8])> {
        let first = self.u32()?;
        if first >> 16 != 0 {
            // small data element: size and type share the first word
            let ty = first & 0xFFFF;
            let n = (first >> 16) as usize;
            let payload = self.take(4)?;
            Ok((ty, &payload[..n]))
        } else {
            let n = self.u32()? as usize;
            let payload = self.take(n)?;
            let pad = (8 - n % 8) % 8;
            // the final element of a stream may omit its padding
            self.pos += pad.min(self.remaining());
            Ok((first, payload))
        }
    }
}

fn scalar_f64(bytes: &[u8], big_endian: bool, ty: u32) -> f64 {
    macro_rules! decode {
        ($t:ty) => {{
            let arr = bytes.try_into().expect("chunk size matches type");
            if big_endian {
                <$t>::from_be_bytes(arr) as f64
            } else {
                <$t>::from_le_bytes(arr) as f64
            }
        }};
    }
    match ty {
        MI_INT8 => bytes[0] as i8 as f64,
        MI_UINT8 => bytes[0] as f64,
        MI_INT16 => decode!(i16),
        MI_UINT16 => decode!(u16),
        MI_INT32 => decode!(i32),
        MI_UINT32 => decode!(u32),
        MI_SINGLE => decode!(f32),
        MI_DOUBLE => decode!(f64),
        MI_INT64 => decode!(i64),
        MI_UINT64 => decode!(u64),
        _ => unreachable!("caller checks the type"),
    }
}

fn numeric_to_f64(ty: u32, payload: &[u8], big_endian: bool) -> Result<Vec<f64>> {
    let size = match ty {
        MI_INT8 | MI_UINT8 => 1,
        MI_INT16 | MI_UINT16 => 2,
        MI_INT32 | MI_UINT32 | MI_SINGLE => 4,
        MI_DOUBLE | MI_INT64 | MI_UINT64 => 8,
        other => {
            return Err(DataError::CorruptFile(format!(
                "non-numeric data element type {other}"
            )))
        }
    };
    if payload.len() % size != 0 {
        return Err(DataError::CorruptFile(format!(
            "data element length {} not a multiple of {size}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(size)
        .map(|chunk| scalar_f64(chunk, big_endian, ty))
        .collect())
}

fn parse_matrix(
    payload: &[u8],
    big_endian: bool,
    vars: &mut BTreeMap<String, ArrayD<f64>>,
) -> Result<()> {
    let mut cur = Cursor::new(payload, big_endian);

    let (ty, flags) = cur.element()?;
    if ty != MI_UINT32 || flags.len() < 8 {
        return Err(DataError::CorruptFile(
            "matrix element missing array flags".to_string(),
        ));
    }
    let aflags = scalar_f64(&flags[..4], big_endian, MI_UINT32) as u32;
    let class = aflags & 0xFF;
    let complex = aflags & COMPLEX_FLAG != 0;

    let (ty, dims_raw) = cur.element()?;
    if ty != MI_INT32 {
        return Err(DataError::CorruptFile(
            "matrix element missing dimensions".to_string(),
        ));
    }
    let dims = numeric_to_f64(MI_INT32, dims_raw, big_endian)?
        .into_iter()
        .map(|d| {
            if d < 0.0 {
                Err(DataError::CorruptFile(format!("negative dimension {d}")))
            } else {
                Ok(d as usize)
            }
        })
        .collect::<Result<Vec<usize>>>()?;

    let (ty, name_raw) = cur.element()?;
    if ty != MI_INT8 && ty != MI_UTF8 {
        return Err(DataError::CorruptFile(
            "matrix element missing name".to_string(),
        ));
    }
    let name = String::from_utf8_lossy(name_raw).into_owned();

    if !NUMERIC_CLASSES.contains(&class) {
        log::debug!("skipping non-numeric variable {name:?} (class {class})");
        return Ok(());
    }

    let (ty, data_raw) = cur.element()?;
    let data = numeric_to_f64(ty, data_raw, big_endian)?;
    let expected: usize = dims.iter().product();
    if data.len() != expected {
        return Err(DataError::CorruptFile(format!(
            "variable {name:?}: {} values for dimensions {dims:?}",
            data.len()
        )));
    }
    if complex {
        log::debug!("ignoring imaginary part of {name:?}");
    }

    let array = ArrayD::from_shape_vec(IxDyn(&dims).f(), data)
        .map_err(|e| DataError::CorruptFile(format!("variable {name:?}: {e}")))?;
    vars.insert(name, array);
    Ok(())
}

fn parse_elements(
    cur: &mut Cursor<'_>,
    big_endian: bool,
    vars: &mut BTreeMap<String, ArrayD<f64>>,
) -> Result<()> {
    while cur.remaining() >= 8 {
        let (ty, payload) = cur.element()?;
        match ty {
            MI_MATRIX => parse_matrix(payload, big_endian, vars)?,
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(payload)
                    .read_to_end(&mut inflated)
                    .map_err(|e| {
                        DataError::CorruptFile(format!("bad compressed element: {e}"))
                    })?;
                let mut inner = Cursor::new(&inflated, big_endian);
                parse_elements(&mut inner, big_endian, vars)?;
            }
            other => log::debug!("skipping top-level element type {other}"),
        }
    }
    Ok(())
}

/// Load every numeric variable of a MAT 5 file into a name → array map.
pub fn load(path: impl AsRef<Path>) -> Result<BTreeMap<String, ArrayD<f64>>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    if bytes.len() < 128 {
        return Err(DataError::CorruptFile("header shorter than 128 bytes".to_string()));
    }
    if !bytes.starts_with(b"MATLAB 5.0") {
        return Err(DataError::CorruptFile(
            "missing MATLAB 5.0 signature".to_string(),
        ));
    }
    let big_endian = match &bytes[126..128] {
        b"IM" => false,
        b"MI" => true,
        other => {
            return Err(DataError::CorruptFile(format!(
                "invalid endian indicator {other:?}"
            )))
        }
    };

    let mut vars = BTreeMap::new();
    let mut cur = Cursor::new(&bytes[128..], big_endian);
    parse_elements(&mut cur, big_endian, &mut vars)?;

    log::debug!(
        "loaded {} numeric variables from {}",
        vars.len(),
        path.display()
    );
    Ok(vars)
}
