//! Append-friendly parameter checkpoints.
//!
//! A checkpoint file holds one named collection of `(name, weight)` records:
//!
//! ```text
//! magic "FCKP" | version u32 | { name_len u32 | name bytes | weight f64 }*
//! ```
//!
//! All integers and floats are little-endian. When a name occurs more than
//! once the last record wins, so appending updated weights is enough to
//! refresh a checkpoint.
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use log::{debug, warn};

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"FCKP";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 8;

/// File of the collection `collection` inside `dir`
pub fn path_for<P: AsRef<Path>>(dir: P, collection: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.ckpt", collection))
}

fn write_header<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

fn write_records<'a, W, I>(w: &mut W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut count = 0;
    for (name, weight) in records {
        let len = u32::try_from(name.len())
            .map_err(|_| Error::invalid(format!("parameter name too long: {}", name.len())))?;
        w.write_all(&len.to_le_bytes())?;
        w.write_all(name.as_bytes())?;
        w.write_all(&weight.to_le_bytes())?;
        count += 1;
    }
    Ok(count)
}

/// Write `records` as a fresh checkpoint of `collection`, replacing any
/// previous file
pub fn save<'a, P, I>(dir: P, collection: &str, records: I) -> Result<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a str, f64)>,
{
    fs::create_dir_all(dir.as_ref())?;
    let path = path_for(dir, collection);
    let mut w = BufWriter::new(File::create(&path)?);
    write_header(&mut w)?;
    let count = write_records(&mut w, records)?;
    w.flush()?;
    debug!("saved {} records to {}", count, path.display());
    Ok(path)
}

/// Append `records` to the checkpoint of `collection`, creating it if needed
pub fn append<'a, P, I>(dir: P, collection: &str, records: I) -> Result<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a str, f64)>,
{
    fs::create_dir_all(dir.as_ref())?;
    let path = path_for(dir, collection);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let is_new = file.metadata()?.len() == 0;
    let mut w = BufWriter::new(file);
    if is_new {
        write_header(&mut w)?;
    }
    let count = write_records(&mut w, records)?;
    w.flush()?;
    debug!("appended {} records to {}", count, path.display());
    Ok(path)
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
fn read_f64(buf: &[u8], offset: usize) -> Option<f64> {
    let bytes = buf.get(offset..offset + 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(f64::from_le_bytes(raw))
}

/// Read the records of a checkpoint buffer
///
/// Fails on a bad header. Stops at the first truncated or malformed record
/// and returns everything read up to that point.
pub fn parse(path: &Path, buf: &[u8]) -> Result<HashMap<String, f64>> {
    if buf.len() < HEADER_SIZE || &buf[0..4] != MAGIC {
        return Err(Error::Checkpoint {
            path: path.to_path_buf(),
            offset: 0,
            reason: "magic mismatch".to_string(),
        });
    }
    let version = read_u32(buf, 4).unwrap_or(0);
    if version != VERSION {
        return Err(Error::Checkpoint {
            path: path.to_path_buf(),
            offset: 4,
            reason: format!("unsupported version {}", version),
        });
    }

    let mut records = HashMap::new();
    let mut offset = HEADER_SIZE;
    while offset < buf.len() {
        match parse_record(buf, offset) {
            Ok((name, weight, next)) => {
                records.insert(name, weight);
                offset = next;
            }
            Err(reason) => {
                warn!(
                    "stopped reading {} at byte offset {}: {}",
                    path.display(),
                    offset,
                    reason
                );
                break;
            }
        }
    }
    Ok(records)
}

fn parse_record(buf: &[u8], offset: usize) -> std::result::Result<(String, f64, usize), String> {
    let len = read_u32(buf, offset).ok_or("truncated record length")? as usize;
    let start = offset + 4;
    let name = buf
        .get(start..start + len)
        .ok_or("truncated record name")?;
    let name = name
        .to_str()
        .map_err(|_| format!("invalid UTF-8 in name {:?}", name.as_bstr()))?;
    let weight = read_f64(buf, start + len).ok_or("truncated record weight")?;
    if !weight.is_finite() {
        return Err(format!("non-finite weight for {}", name));
    }
    Ok((name.to_string(), weight, start + len + 8))
}

/// Load a checkpoint file
pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<String, f64>> {
    let path = path.as_ref();
    let buf = fs::read(path)?;
    let records = parse(path, &buf)?;
    debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
