#![allow(dead_code)]

use brotli_stream::errors::Result;
use brotli_stream::CodecStream;
use bytes::Bytes;
use futures::Stream;
use once_cell::sync::Lazy;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Routes library logs to the test harness once per test binary. Use RUST_LOG to see them.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub const LOREM_1: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";
pub const LOREM_2: &[u8] = b"Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.";

// ~2kB message
pub const LARGE_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nullam risus metus, vulputate sed erat non, maximus accumsan augue. Ut eu aliquet urna, sed mollis lectus. Vivamus eu egestas lectus. Donec commodo diam vehicula nisl iaculis, at scelerisque est efficitur. Pellentesque sed dolor arcu. Nullam semper quam risus, quis lobortis sapien mollis vitae. Fusce egestas ante nisl, ac bibendum mi faucibus ac. Phasellus eu libero orci. Cras dignissim in nibh quis eleifend. Duis mattis fermentum nulla ac aliquet. Cras et orci quis erat fermentum auctor et in mauris. Ut ornare, elit a blandit imperdiet, nibh sapien dapibus sapien, non faucibus diam arcu fermentum nunc. Proin feugiat pharetra lectus vitae semper. Fusce sit amet tortor mattis, hendrerit ex nec, iaculis risus.

Nam est nibh, semper sit amet gravida eu, efficitur in tortor. Aenean vel leo vitae enim scelerisque porta at et nibh. Nulla malesuada vel ipsum placerat varius. Aliquam facilisis, dolor quis ultrices condimentum, nisl metus consequat purus, non vulputate odio odio at justo. Fusce rhoncus neque arcu, et venenatis lacus vestibulum at. Nullam tristique tincidunt nunc. Ut mollis sem non turpis accumsan, et volutpat quam suscipit. Cras metus libero, commodo vitae purus vulputate, scelerisque molestie mi. Etiam posuere orci id turpis suscipit egestas. Nunc id faucibus risus.

Duis quis neque sit amet turpis ullamcorper pretium a et turpis. In ultrices eros sit amet odio venenatis varius. Vestibulum id sem iaculis dolor ornare egestas eu sit amet nunc. Integer elit lorem, pretium vestibulum euismod in, imperdiet porttitor nisl. In accumsan elit non rutrum euismod. Integer turpis sem, lobortis non laoreet id, mattis at metus. Sed hendrerit volutpat dui ut consectetur.

Duis efficitur, lacus a condimentum rhoncus, justo ex tristique neque, fermentum imperdiet tortor ex a ante. Mauris a tortor nec sapien volutpat porttitor. Praesent purus erat, viverra sed rhoncus eget, sodales ac felis. Integer scelerisque leo gravida.";

/// Incompressible bytes, reproducible from `seed`.
pub fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

/// Text that is long enough to span several engine blocks.
pub fn large_text(len: usize) -> Vec<u8> {
    LARGE_TEXT.bytes().cycle().take(len).collect()
}

/// Splits `data` into consecutive chunks whose sizes cycle through `sizes`.
pub fn split_by(data: &[u8], sizes: &[usize]) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    let mut sizes = sizes.iter().cycle();
    while offset < data.len() {
        let size = (*sizes.next().unwrap()).max(1);
        let end = (offset + size).min(data.len());
        chunks.push(Bytes::copy_from_slice(&data[offset..end]));
        offset = end;
    }
    chunks
}

pub async fn collect<S>(mut output: S) -> Result<Vec<u8>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut collected = Vec::new();
    while let Some(chunk) = output.next().await {
        collected.extend_from_slice(&chunk?);
    }
    Ok(collected)
}

/// Writes `chunks` into `stream` from one task while another collects the output.
pub async fn stream_through(stream: CodecStream, chunks: Vec<Bytes>) -> Result<Vec<u8>> {
    let (mut input, output) = stream.split();
    let producer = tokio::spawn(async move {
        for chunk in chunks {
            input.write_all(chunk).await?;
        }
        input.end(None).await
    });

    // the consumer sees the root cause, the producer only sees the stream close
    let collected = collect(output).await?;
    producer.await.expect("producer task panicked")?;
    Ok(collected)
}
