//! Chunked, flow-controlled compression streams.
//!
//! A [`CodecStream`] accepts input through `write`/`flush`/`end` and hands output back as a
//! [`futures::Stream`] of [`Bytes`]. Input and output chunk boundaries are unrelated: one write
//! may produce nothing, one chunk, or several.
//!
//! Backpressure runs end to end. Output waits in a bounded queue until the consumer asks for it;
//! while that queue is full the session stops ingesting input, and once the input waiting in
//! front of the session reaches the high-water mark `write` starts returning `false`. Callers
//! that respect the signal (or use `write_all`) keep memory bounded.
//!
//! Producer and consumer normally live in different tasks, see [`CodecStream::split`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use num_derive::FromPrimitive;
use tokio::sync::{mpsc, oneshot};
use tokio_util::io::StreamReader;

use crate::compression::options::Options;
use crate::compression::session;
use crate::compression::Direction;
use crate::driver::{Ack, Control, Driver, Status};
use crate::errors::{closed_error, Result};

pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;
pub const DEFAULT_OUTPUT_CAPACITY: usize = 16;

/// Buffering limits of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Queued input, in bytes, past which `write` asks the caller to wait for a drain.
    pub high_water_mark: usize,
    /// Output chunks held for the consumer before the session stops ingesting input.
    pub output_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> StreamConfig {
        StreamConfig {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

#[repr(u8)]
#[derive(FromPrimitive, PartialEq, Eq, Debug, Copy, Clone)]
pub enum StreamState {
    /// Accepting input and flushes.
    Open = 0,
    /// End requested, final output not yet handed to the consumer.
    Ending = 1,
    Closed = 2,
    Failed = 3,
}

/// Writable side of a stream.
pub struct StreamInput {
    commands: mpsc::UnboundedSender<Control>,
    status: Arc<Status>,
    ended: bool,
}

impl StreamInput {
    pub fn state(&self) -> StreamState {
        self.status.state()
    }

    /// Bytes written but not yet taken in by the session.
    pub fn queued(&self) -> usize {
        self.status.queued()
    }

    fn check_open(&self) -> Result<()> {
        if self.ended || self.status.state() != StreamState::Open {
            return Err(closed_error());
        }
        Ok(())
    }

    /// Queues `chunk` without waiting. Returns `false` once the queued input has reached the
    /// high-water mark; the chunk is still accepted, but the caller should `drain` before
    /// writing more.
    pub fn write(&mut self, chunk: impl Into<Bytes>) -> Result<bool> {
        self.check_open()?;
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(self.status.has_capacity());
        }

        let len = chunk.len();
        let below = self.status.enqueue(len);
        if self.commands.send(Control::Data(chunk)).is_err() {
            self.status.ingested(len);
            return Err(closed_error());
        }
        Ok(below)
    }

    /// Waits until the queued input is back under the high-water mark.
    pub async fn drain(&self) -> Result<()> {
        loop {
            let drained = self.status.drained().notified();
            match self.status.state() {
                StreamState::Failed | StreamState::Closed => return Err(closed_error()),
                StreamState::Open | StreamState::Ending => {}
            }
            if self.status.has_capacity() {
                return Ok(());
            }
            drained.await;
        }
    }

    /// Writes `chunk`, then waits for a drain if the write went over the high-water mark.
    pub async fn write_all(&mut self, chunk: impl Into<Bytes>) -> Result<()> {
        if !self.write(chunk)? {
            self.drain().await?;
        }
        Ok(())
    }

    fn submit_flush(&mut self, ack: Option<Ack>) -> Result<()> {
        self.check_open()?;
        self.commands
            .send(Control::Flush(ack))
            .map_err(|_| closed_error())
    }

    fn submit_end(&mut self, chunk: Option<Bytes>, ack: Option<Ack>) -> Result<()> {
        self.check_open()?;
        if let Some(chunk) = chunk {
            self.write(chunk)?;
        }
        self.ended = true;
        if !self.status.begin_end() {
            return Err(closed_error());
        }
        self.commands
            .send(Control::End(ack))
            .map_err(|_| closed_error())
    }

    /// Forces out everything derivable from the input written so far, without ending the
    /// stream. Resolves once that output has been queued for the consumer, so the output half
    /// has to be read concurrently, see [`CodecStream::split`].
    pub async fn flush(&mut self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.submit_flush(Some(ack))?;
        done.await.unwrap_or_else(|_| Err(closed_error()))
    }

    /// Writes the optional last chunk, finalizes the stream and releases the session. Moves the
    /// stream to `Ending` right away and resolves once the final output has been queued for the
    /// consumer, at which point the stream is `Closed`.
    pub async fn end(&mut self, chunk: Option<Bytes>) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.submit_end(chunk, Some(ack))?;
        done.await.unwrap_or_else(|_| Err(closed_error()))
    }

    /// Abandons the stream. The session is released and the consumer sees a closed error.
    pub fn abort(self) {
        self.status.abort();
    }
}

/// Readable side of a stream.
pub struct StreamOutput {
    output: mpsc::Receiver<Result<Bytes>>,
    status: Arc<Status>,
    done: bool,
}

impl StreamOutput {
    pub fn state(&self) -> StreamState {
        self.status.state()
    }

    /// Adapts the output to `tokio::io::AsyncRead`.
    pub fn into_async_read(self) -> StreamReader<StreamOutput, Bytes> {
        StreamReader::new(self)
    }
}

impl Stream for StreamOutput {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.output.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                match this.status.state() {
                    StreamState::Closed => Poll::Ready(None),
                    // the driver went away without finishing, e.g. after an abort
                    _ => Poll::Ready(Some(Err(closed_error()))),
                }
            }
        }
    }
}

/// Both sides of a stream in one value.
pub struct CodecStream {
    direction: Direction,
    input: StreamInput,
    output: StreamOutput,
}

impl CodecStream {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> StreamState {
        self.input.state()
    }

    pub fn write(&mut self, chunk: impl Into<Bytes>) -> Result<bool> {
        self.input.write(chunk)
    }

    pub async fn drain(&self) -> Result<()> {
        self.input.drain().await
    }

    pub async fn write_all(&mut self, chunk: impl Into<Bytes>) -> Result<()> {
        self.input.write_all(chunk).await
    }

    /// Queues a flush behind the input written so far. Resolves once it is queued, since the
    /// flushed output can only move while this same stream is being read. Failures surface
    /// through the output.
    pub async fn flush(&mut self) -> Result<()> {
        self.input.submit_flush(None)
    }

    /// Queues the optional last chunk and the end of the stream. Resolves once they are
    /// queued; the state stays `Ending` until the final output has been read.
    pub async fn end(&mut self, chunk: Option<Bytes>) -> Result<()> {
        self.input.submit_end(chunk, None)
    }

    pub fn abort(self) {
        self.input.abort();
    }

    pub fn split(self) -> (StreamInput, StreamOutput) {
        (self.input, self.output)
    }
}

impl Stream for CodecStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().output).poll_next(cx)
    }
}

fn open(direction: Direction, options: &Options, config: StreamConfig) -> CodecStream {
    let (commands, command_queue) = mpsc::unbounded_channel();
    let (output_queue, output) = mpsc::channel(config.output_capacity.max(1));
    let status = Arc::new(Status::new(config.high_water_mark));

    let driver = Driver::new(
        session::open(direction, options),
        command_queue,
        output_queue,
        Arc::clone(&status),
    );
    tokio::spawn(driver.run());

    CodecStream {
        direction,
        input: StreamInput {
            commands,
            status: Arc::clone(&status),
            ended: false,
        },
        output: StreamOutput {
            output,
            status,
            done: false,
        },
    }
}

/// Opens a compressing stream.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
pub fn compress_stream(options: &Options) -> CodecStream {
    compress_stream_with_config(options, StreamConfig::default())
}

pub fn compress_stream_with_config(options: &Options, config: StreamConfig) -> CodecStream {
    open(Direction::Compress, options, config)
}

/// Opens a decompressing stream. The compressed format carries its own parameters.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
pub fn decompress_stream() -> CodecStream {
    decompress_stream_with_config(StreamConfig::default())
}

pub fn decompress_stream_with_config(config: StreamConfig) -> CodecStream {
    open(Direction::Decompress, &Options::default(), config)
}

#[cfg(test)]
mod tests {
    use crate::compression::options::Options;
    use crate::stream::{compress_stream, decompress_stream, StreamState};
    use bytes::Bytes;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn starts_open_and_ends_closed() {
        let mut stream = compress_stream(&Options::default());
        assert_eq!(stream.state(), StreamState::Open);

        stream.end(Some(Bytes::from_static(b"abc"))).await.unwrap();
        while let Some(chunk) = stream.next().await {
            chunk.unwrap();
        }
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn operations_after_end_are_closed() {
        let mut stream = decompress_stream();
        let compressed = crate::compression::buffer::encode(b"abc", &Options::default()).unwrap();
        stream.end(Some(Bytes::from(compressed))).await.unwrap();

        assert!(stream.write(&b"more"[..]).unwrap_err().is_closed());
        assert!(stream.flush().await.unwrap_err().is_closed());
        assert!(stream.end(None).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn empty_write_is_accepted() {
        let mut stream = compress_stream(&Options::default());
        assert!(stream.write(Bytes::new()).unwrap());
        stream.end(None).await.unwrap();
    }
}
