use std::io::prelude::*;

use brotli::{CompressorWriter, DecompressorWriter};
use bytes::Bytes;
use tracing::{debug, trace};

use crate::compression::options::Options;
use crate::compression::Direction;
use crate::errors::{closed_error, engine_error, ErrorKind, Result};

/// Size of the engine's internal staging buffer.
const ENGINE_BUFFER_SIZE: usize = 4096;

/// Stateful handle on one direction of the engine.
///
/// Every call hands back the bytes the engine produced while serving it, which may be nothing at
/// all. After `finish` the engine state is released and any further call fails with
/// `ErrorKind::Closed`.
pub trait Session: Send {
    fn direction(&self) -> Direction;

    fn process(&mut self, input: &[u8]) -> Result<Bytes>;

    /// Emits everything derivable from the input seen so far without ending the stream.
    fn flush(&mut self) -> Result<Bytes>;

    fn finish(&mut self) -> Result<Bytes>;
}

pub fn open(direction: Direction, options: &Options) -> Box<dyn Session> {
    match direction {
        Direction::Compress => Box::new(Compressor::new(options)),
        Direction::Decompress => Box::new(Decompressor::new()),
    }
}

fn take(buf: &mut Vec<u8>) -> Bytes {
    Bytes::from(std::mem::take(buf))
}

pub struct Compressor {
    // None once finished
    encoder: Option<CompressorWriter<Vec<u8>>>,
}

impl Compressor {
    pub fn new(options: &Options) -> Compressor {
        let params = options.to_engine_params();
        debug!(
            quality = options.quality(),
            lgwin = options.lgwin(),
            mode = options.mode().name(),
            "opening compression session"
        );
        Compressor {
            encoder: Some(CompressorWriter::with_params(
                Vec::new(),
                ENGINE_BUFFER_SIZE,
                &params,
            )),
        }
    }

    fn encoder(&mut self) -> Result<&mut CompressorWriter<Vec<u8>>> {
        self.encoder.as_mut().ok_or_else(closed_error)
    }
}

impl Session for Compressor {
    fn direction(&self) -> Direction {
        Direction::Compress
    }

    fn process(&mut self, input: &[u8]) -> Result<Bytes> {
        let encoder = self.encoder()?;
        encoder
            .write_all(input)
            .map_err(|e| engine_error(Direction::Compress, e))?;
        let output = take(encoder.get_mut());
        trace!(consumed = input.len(), produced = output.len(), "compressed chunk");
        Ok(output)
    }

    fn flush(&mut self) -> Result<Bytes> {
        let encoder = self.encoder()?;
        encoder
            .flush()
            .map_err(|e| engine_error(Direction::Compress, e))?;
        Ok(take(encoder.get_mut()))
    }

    fn finish(&mut self) -> Result<Bytes> {
        let encoder = self.encoder.take().ok_or_else(closed_error)?;
        // into_inner writes the stream trailer before handing the buffer back
        let output = Bytes::from(encoder.into_inner());
        debug!(produced = output.len(), "finished compression session");
        Ok(output)
    }
}

pub struct Decompressor {
    // None once finished
    decoder: Option<DecompressorWriter<Vec<u8>>>,
}

impl Decompressor {
    pub fn new() -> Decompressor {
        debug!("opening decompression session");
        Decompressor {
            decoder: Some(DecompressorWriter::new(Vec::new(), ENGINE_BUFFER_SIZE)),
        }
    }

    fn decoder(&mut self) -> Result<&mut DecompressorWriter<Vec<u8>>> {
        self.decoder.as_mut().ok_or_else(closed_error)
    }
}

impl Default for Decompressor {
    fn default() -> Decompressor {
        Decompressor::new()
    }
}

impl Session for Decompressor {
    fn direction(&self) -> Direction {
        Direction::Decompress
    }

    fn process(&mut self, input: &[u8]) -> Result<Bytes> {
        let decoder = self.decoder()?;
        decoder
            .write_all(input)
            .map_err(|e| engine_error(Direction::Decompress, e))?;
        let output = take(decoder.get_mut());
        trace!(consumed = input.len(), produced = output.len(), "decompressed chunk");
        Ok(output)
    }

    fn flush(&mut self) -> Result<Bytes> {
        // decoded bytes reach the buffer as soon as the engine produces them
        let decoder = self.decoder()?;
        decoder
            .flush()
            .map_err(|e| engine_error(Direction::Decompress, e))?;
        Ok(take(decoder.get_mut()))
    }

    fn finish(&mut self) -> Result<Bytes> {
        let decoder = self.decoder.take().ok_or_else(closed_error)?;
        match decoder.into_inner() {
            Ok(buf) => {
                let output = Bytes::from(buf);
                debug!(produced = output.len(), "finished decompression session");
                Ok(output)
            }
            Err(_) => Err(ErrorKind::Codec(
                "brotli failed to decompress: compressed stream is truncated".to_string(),
            )
            .into()),
        }
    }
}
