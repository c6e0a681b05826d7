//! One-shot compression of fully materialized buffers.

use bytes::Bytes;
use tracing::warn;

use crate::compression::options::Options;
use crate::compression::session::{self, Session};
use crate::compression::Direction;
use crate::errors::{ErrorKind, Result};

/// Largest slice handed to the engine in a single call.
pub const BUFFER_CHUNK_SIZE: usize = 64 * 1024;

fn run(direction: Direction, input: &[u8], options: &Options) -> Result<Vec<u8>> {
    let mut session = session::open(direction, options);
    let mut output = Vec::with_capacity(match direction {
        Direction::Compress => input.len() / 2,
        Direction::Decompress => input.len() * 4,
    });

    // The session is dropped on the error path, releasing the engine state.
    let result = drain(session.as_mut(), input, &mut output);
    if let Err(e) = &result {
        warn!(direction = direction.verb(), error = %e, "buffer codec failed");
    }
    result.map(|_| output)
}

fn drain(session: &mut dyn Session, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    for chunk in input.chunks(BUFFER_CHUNK_SIZE) {
        output.extend_from_slice(&session.process(chunk)?);
    }
    output.extend_from_slice(&session.finish()?);
    Ok(())
}

/// Compresses the whole of `input`. An empty input still yields a (tiny) valid stream.
pub fn encode(input: &[u8], options: &Options) -> Result<Vec<u8>> {
    run(Direction::Compress, input, options)
}

/// Decompresses a complete stream. Truncated or corrupt input fails with `ErrorKind::Codec` and
/// no partial output is returned.
pub fn decode(input: &[u8]) -> Result<Vec<u8>> {
    run(Direction::Decompress, input, &Options::default())
}

async fn offload<F>(work: F) -> Result<Bytes>
where
    F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map(Bytes::from),
        Err(e) => Err(ErrorKind::Codec(format!("brotli worker failed: {}", e)).into()),
    }
}

/// Compresses `input` on the blocking pool.
pub async fn compress(input: impl Into<Bytes>, options: &Options) -> Result<Bytes> {
    let input = input.into();
    let options = *options;
    offload(move || encode(&input, &options)).await
}

/// Decompresses `input` on the blocking pool.
pub async fn decompress(input: impl Into<Bytes>) -> Result<Bytes> {
    let input = input.into();
    offload(move || decode(&input)).await
}
