//! Chunked transfer of large-object contents.

use std::io::{self, Read, Write};

/// Reads a locator to the end, `chunk_size` bytes per round trip.
pub(crate) fn read_chunked<R: Read>(lob: &mut R, chunk_size: usize) -> io::Result<Vec<u8>> {
    let mut contents = Vec::new();
    let mut chunk = vec![0_u8; chunk_size.max(1)];
    loop {
        let read = lob.read(&mut chunk)?;
        if read == 0 {
            return Ok(contents);
        }
        contents.extend_from_slice(&chunk[..read]);
    }
}

/// Writes `data` into a temporary locator in `chunk_size` pieces.
pub(crate) fn write_chunked<W: Write>(lob: &mut W, data: &[u8], chunk_size: usize) -> io::Result<()> {
    for chunk in data.chunks(chunk_size.max(1)) {
        lob.write_all(chunk)?;
    }
    lob.flush()
}

/// Character LOB contents, which may have been split mid-character by the
/// chunking, decoded once complete.
pub(crate) fn into_text(bytes: Vec<u8>) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}
