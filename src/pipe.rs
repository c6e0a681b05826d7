use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::debug;

use crate::errors::Result;
use crate::stream::{CodecStream, StreamInput, StreamOutput};

pub const PIPE_BUFFER_SIZE: usize = 16 * 1024;

/// Copies `reader` through `stream` into `writer` and returns the number of bytes written.
///
/// The stream is ended when the reader reaches EOF and the writer is shut down once the final
/// output is written. With `flush_each_read` every read is flushed through the stream, so the
/// output stays usable while the reader is still open.
pub async fn pipe<R, W>(
    reader: R,
    writer: W,
    stream: CodecStream,
    flush_each_read: bool,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let direction = stream.direction();
    let (input, output) = stream.split();

    let (read, written) = tokio::try_join!(
        feed(reader, input, flush_each_read),
        collect(output, writer)
    )?;
    debug!(direction = ?direction, read, written, "pipe finished");
    Ok(written)
}

async fn feed<R>(mut reader: R, mut input: StreamInput, flush_each_read: bool) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0; PIPE_BUFFER_SIZE];
    let mut read = 0u64;

    let fed: Result<()> = async {
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            read += n as u64;
            input.write_all(Bytes::copy_from_slice(&buf[..n])).await?;
            if flush_each_read {
                input.flush().await?;
            }
        }
        input.end(None).await
    }
    .await;

    match fed {
        // the output side failed or went away and reports the cause itself
        Err(e) if e.is_closed() => Ok(read),
        other => other.map(|_| read),
    }
}

async fn collect<W>(mut output: StreamOutput, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = output.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.shutdown().await?;
    Ok(written)
}
