//! Chunked gzip decoding over pull/push callbacks.
//!
//! The decoder never sees the whole payload. It pulls fixed-size chunks from
//! the caller, feeds them to a gzip-framed inflate stream and pushes every
//! non-empty output buffer back to the caller as soon as it is produced.

use std::io::{Read, Write};

use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use tracing::debug;

use super::error::DecodeError;

/// Default working chunk for both compressed and decoded buffers (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Deflate window size used by gzip streams.
const WINDOW_BITS: u8 = 15;

/// Streaming gzip decoder.
#[derive(Debug, Clone)]
pub struct Inflater {
    chunk_size: usize,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Inflater {
    /// Create a decoder with the given working chunk size (minimum 1).
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Decode one complete gzip stream.
    ///
    /// `pull` fills the buffer it is given and returns how many bytes it
    /// wrote, 0 once the source is exhausted. `push` receives decoded bytes.
    /// Returns the total number of decoded bytes.
    ///
    /// Input left over after the gzip end marker is not consumed.
    pub fn decode<P, S>(&self, mut pull: P, mut push: S) -> Result<u64, DecodeError>
    where
        P: FnMut(&mut [u8]) -> std::io::Result<usize>,
        S: FnMut(&[u8]) -> std::io::Result<()>,
    {
        let mut stream = Decompress::new_gzip(WINDOW_BITS);
        let mut input = vec![0u8; self.chunk_size];
        let mut output = vec![0u8; self.chunk_size];

        loop {
            let read = pull(&mut input)?;
            if read == 0 {
                return Err(DecodeError::Truncated);
            }
            let mut pending = &input[..read];

            loop {
                let in_before = stream.total_in();
                let out_before = stream.total_out();

                let status = stream
                    .decompress(pending, &mut output, FlushDecompress::None)
                    .map_err(|e| classify(&e))?;

                let consumed = (stream.total_in() - in_before) as usize;
                let produced = (stream.total_out() - out_before) as usize;
                pending = &pending[consumed..];

                if produced > 0 {
                    push(&output[..produced])?;
                }

                match status {
                    Status::StreamEnd => {
                        if !pending.is_empty() {
                            debug!(trailing = pending.len(), "Ignoring data after gzip end");
                        }
                        return Ok(stream.total_out());
                    }
                    Status::Ok | Status::BufError => {
                        if consumed == 0 && produced == 0 {
                            if pending.is_empty() {
                                break;
                            }
                            return Err(DecodeError::BufferUnderrun);
                        }
                        // A full output buffer may hide more pending output.
                        if pending.is_empty() && produced < output.len() {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Decode a gzip stream from `reader` into `writer`.
    pub fn decode_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<u64, DecodeError> {
        self.decode(|buf| reader.read(buf), |data| writer.write_all(data))
    }
}

/// Map a decoder failure onto the closed error taxonomy.
///
/// flate2 exposes the zlib message text but not its status code, so the
/// memory, version and stream-state arms match zlib's wording for those
/// codes. Anything unrecognised is reported as corrupt data; `Unknown` is
/// never produced through this path.
fn classify(err: &DecompressError) -> DecodeError {
    if err.needs_dictionary().is_some() {
        return DecodeError::NeedsExternalDictionary;
    }

    let message = err.to_string().to_lowercase();
    if message.contains("memory") {
        DecodeError::OutOfMemory
    } else if message.contains("version") {
        DecodeError::VersionMismatch
    } else if message.contains("stream error") || message.contains("state") {
        DecodeError::Protocol
    } else if message.contains("buffer") {
        DecodeError::BufferUnderrun
    } else {
        DecodeError::CorruptData
    }
}
