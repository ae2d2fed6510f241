use std::fmt;
use std::io::{self, Write};

use bstr::ByteSlice;
use cqdb::CQDB;

use crate::decoder::DecoderParams;
use crate::error::{Error, Result};
use crate::feature::FeatureMap;
use crate::params::WeightFunction;
use crate::train::model_writer::{CHUNK_SIZE, HEADER_SIZE, MAGIC};
use crate::translator::Translator;

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> io::Result<u32> {
    if buf.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u32",
        ));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
fn unpack_f64(buf: &[u8]) -> io::Result<f64> {
    if buf.len() < 8 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking f64",
        ));
    }
    Ok(f64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]))
}

#[derive(Debug, Clone)]
struct Header {
    size: u32,
    version: u32,
    num_features: u32,
    off_features: u32,
    off_dict: u32,
}

/// A frozen model for decoding
///
/// Holds the pruned weights written by `ModelWriter`. Features that are not
/// in the model weigh 0.
#[derive(Clone)]
pub struct Model<'a> {
    buffer: &'a [u8],
    header: Header,
    dict: CQDB<'a>,
}

impl<'a> fmt::Debug for Model<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("header", &self.header)
            .field("dict", &self.dict)
            .finish()
    }
}

impl<'a> Model<'a> {
    /// Create a model from its serialized form in memory
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::invalid("invalid model format"));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::invalid("invalid file format, magic mismatch"));
        }
        let header = Header {
            size: unpack_u32(&buf[4..])?,
            version: unpack_u32(&buf[8..])?,
            num_features: unpack_u32(&buf[12..])?,
            off_features: unpack_u32(&buf[16..])?,
            off_dict: unpack_u32(&buf[20..])?,
        };
        let table_end = header.off_features as usize + CHUNK_SIZE + 8 * header.num_features as usize;
        if header.size as usize > buf.len()
            || table_end > buf.len()
            || header.off_dict as usize > buf.len()
        {
            return Err(Error::invalid("invalid model format, truncated"));
        }
        let dict = CQDB::new(&buf[header.off_dict as usize..])?;
        Ok(Self {
            buffer: buf,
            header,
            dict,
        })
    }

    /// Number of features with a non-zero weight
    pub fn num_features(&self) -> u32 {
        self.header.num_features
    }

    /// Convert a feature ID to its name
    pub fn to_name(&self, fid: u32) -> Option<&str> {
        self.dict.to_str(fid).and_then(|s| s.to_str().ok())
    }

    /// Convert a feature name to its ID
    pub fn to_id(&self, name: &str) -> Option<u32> {
        self.dict.to_id(name)
    }

    fn weight_at(&self, fid: u32) -> io::Result<f64> {
        let index = self.header.off_features as usize + CHUNK_SIZE + 8 * fid as usize;
        unpack_f64(&self.buffer[index..])
    }

    /// Weight of one feature, 0 if absent
    pub fn feature_weight(&self, name: &str) -> f64 {
        self.to_id(name)
            .filter(|&fid| fid < self.header.num_features)
            .and_then(|fid| self.weight_at(fid).ok())
            .unwrap_or(0.0)
    }

    /// Dot product of a feature map with the model weights
    pub fn score(&self, features: &FeatureMap) -> f64 {
        features
            .iter()
            .map(|attr| self.feature_weight(&attr.name) * attr.value)
            .sum()
    }

    /// Get a new translator
    pub fn translator(&'a self, params: DecoderParams) -> Translator<'a> {
        Translator::new(self, params)
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let header = &self.header;
        writeln!(w, "FILEHEADER = {{")?;
        writeln!(w, "  magic: {}", MAGIC.as_bstr())?;
        writeln!(w, "  size: {}", header.size)?;
        writeln!(w, "  version: {}", header.version)?;
        writeln!(w, "  num_features: {}", header.num_features)?;
        writeln!(w, "  off_features: {:#X}", header.off_features)?;
        writeln!(w, "  off_dict: {:#X}", header.off_dict)?;
        writeln!(w, "}}\n")?;
        writeln!(w, "FEATURES = {{")?;
        for fid in 0..header.num_features {
            let name = self.to_name(fid).unwrap_or("?");
            writeln!(w, "  {:>5}: {}: {:.6}", fid, name, self.weight_at(fid)?)?;
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}

impl<'a> WeightFunction for Model<'a> {
    fn weight(&mut self, features: &FeatureMap) -> f64 {
        self.score(features)
    }
}

#[cfg(test)]
mod tests {
    use super::Model;
    use crate::params::ParameterVector;
    use crate::train::ModelWriter;
    use std::fs;

    fn write_model() -> Vec<u8> {
        let mut params = ParameterVector::with_seed(0);
        params.set("top", 0.5);
        params.set("type:binary", -1.25);
        params.set("unused", 0.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.hcrf");
        ModelWriter::write(&path, &params).unwrap();
        fs::read(&path).unwrap()
    }

    #[test]
    fn test_model_new() {
        let buf = write_model();
        let model = Model::new(&buf).unwrap();
        assert_eq!(1, model.header.version);
        assert_eq!(2, model.num_features());
        assert_eq!(model.header.size as usize, buf.len());
        assert_eq!(model.feature_weight("top"), 0.5);
        assert_eq!(model.feature_weight("type:binary"), -1.25);
        assert_eq!(model.feature_weight("unused"), 0.0);
        assert_eq!(model.feature_weight("never-seen"), 0.0);
        assert_eq!(model.to_name(0), Some("top"));

        let _debug = format!("{:?}", model);
    }

    #[test]
    fn test_invalid_model() {
        assert!(Model::new(b"").is_err());

        let mut buf = write_model();
        buf[0] = b'H';
        assert!(Model::new(&buf).is_err());
    }

    #[test]
    fn test_model_dump() {
        let buf = write_model();
        let model = Model::new(&buf).unwrap();
        let mut out = Vec::new();
        model.dump(&mut out).unwrap();
        let out_str = std::str::from_utf8(&out).unwrap();
        assert!(out_str.starts_with("FILEHEADER = {\n  magic: hCRF\n"));
        assert!(out_str.contains("FEATURES = {\n      0: top: 0.500000\n      1: type:binary: -1.250000\n}"));
    }
}
