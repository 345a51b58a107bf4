use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use flate2::read::GzDecoder;
use tar::Archive;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Opens a tar archive, transparently decompressing it if it starts with the gzip magic bytes.
pub fn open_archive(path: &Path) -> io::Result<Archive<Box<dyn Read>>> {
    let file = File::open(path)?;
    wrap_archive(BufReader::new(file))
}

/// Wraps a buffered stream as a tar archive, detecting gzip compression.
pub fn wrap_archive<R>(mut reader: R) -> io::Result<Archive<Box<dyn Read>>>
where
    R: BufRead + 'static,
{
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    let stream: Box<dyn Read> = if is_gzip {
        tracing::trace!("detected gzip-compressed archive");
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    Ok(Archive::new(stream))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
