use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use cqdb::CQDBWriter;
use log::debug;

use crate::error::Result;
use crate::params::ParameterVector;

pub(crate) const MAGIC: &[u8; 4] = b"hCRF";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 24;
pub(crate) const CHUNK_SIZE: usize = 12;

/// Write a trained model to file
pub struct ModelWriter;

impl ModelWriter {
    /// Write the non-zero weights of `params` as a frozen model
    ///
    /// Features are numbered in name order. The file holds a header, the
    /// weight table and a CQDB dictionary from feature name to id.
    pub fn write<P: AsRef<Path>>(filename: P, params: &ParameterVector) -> Result<()> {
        let features: Vec<_> = params
            .to_attributes()
            .into_iter()
            .filter(|attr| attr.value != 0.0)
            .collect();
        let num_features = u32::try_from(features.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "number of features exceeds u32::MAX")
        })?;

        let mut file = File::create(filename.as_ref())?;
        Self::write_header(&mut file, num_features, 0, 0, 0)?;

        let off_features = pos_to_u32(file.stream_position()?)?;
        file.write_all(b"FEAT")?;
        let chunk_size = CHUNK_SIZE as u64 + 8 * features.len() as u64;
        file.write_all(&pos_to_u32(chunk_size)?.to_le_bytes())?;
        file.write_all(&num_features.to_le_bytes())?;
        for attr in &features {
            file.write_all(&attr.value.to_le_bytes())?;
        }

        let off_dict = pos_to_u32(file.stream_position()?)?;
        Self::write_cqdb(&mut file, features.iter().map(|attr| attr.name.as_str()))?;

        let file_size = pos_to_u32(file.stream_position()?)?;
        file.seek(SeekFrom::Start(0))?;
        Self::write_header(&mut file, num_features, off_features, off_dict, file_size)?;
        debug!(
            "wrote {} of {} features to {}",
            num_features,
            params.len(),
            filename.as_ref().display()
        );
        Ok(())
    }

    fn write_header(
        file: &mut File,
        num_features: u32,
        off_features: u32,
        off_dict: u32,
        file_size: u32,
    ) -> io::Result<()> {
        file.write_all(MAGIC)?;
        file.write_all(&file_size.to_le_bytes())?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&num_features.to_le_bytes())?;
        file.write_all(&off_features.to_le_bytes())?;
        file.write_all(&off_dict.to_le_bytes())?;
        Ok(())
    }

    fn write_cqdb<'a, I>(file: &mut File, names: I) -> io::Result<()>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut writer = CQDBWriter::new(file)?;
        for (id, name) in names.enumerate() {
            writer.put(name, id as u32)?;
        }
        // The database is flushed when the writer drops
        Ok(())
    }
}

fn pos_to_u32(pos: u64) -> io::Result<u32> {
    u32::try_from(pos)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file position exceeds u32::MAX"))
}
