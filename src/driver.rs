use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use num_traits::FromPrimitive;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, trace, warn};

use crate::compression::session::Session;
use crate::compression::Direction;
use crate::errors::{closed_error, Error, ErrorKind, Result};
use crate::stream::StreamState;

pub(crate) type Ack = oneshot::Sender<Result<()>>;

/// Everything the writable side can ask of a session, kept in submission order. Flush and end
/// carry an ack only when the caller waits for their output to be queued.
pub(crate) enum Control {
    Data(Bytes),
    Flush(Option<Ack>),
    End(Option<Ack>),
}

fn acknowledge(ack: Option<Ack>) {
    if let Some(ack) = ack {
        let _ = ack.send(Ok(()));
    }
}

/// Bookkeeping shared by both halves of a stream and its driver.
pub(crate) struct Status {
    state: AtomicU8,
    // bytes written but not yet ingested by the engine
    queued: AtomicUsize,
    high_water_mark: usize,
    drained: Notify,
}

impl Status {
    pub(crate) fn new(high_water_mark: usize) -> Status {
        Status {
            state: AtomicU8::new(StreamState::Open as u8),
            queued: AtomicUsize::new(0),
            high_water_mark,
            drained: Notify::new(),
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst)).unwrap_or(StreamState::Failed)
    }

    /// Moves an open stream to `Ending`. Returns `false` if it was no longer open.
    pub(crate) fn begin_end(&self) -> bool {
        let ended = self
            .state
            .compare_exchange(
                StreamState::Open as u8,
                StreamState::Ending as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if ended {
            self.drained.notify_waiters();
        }
        ended
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::SeqCst);
        self.drained.notify_waiters();
    }

    /// Moves a live stream to `Failed`. Terminal states are left alone.
    pub(crate) fn abort(&self) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            match StreamState::from_u8(current) {
                Some(StreamState::Open) | Some(StreamState::Ending) => {}
                _ => return false,
            }
            match self.state.compare_exchange(
                current,
                StreamState::Failed as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.drained.notify_waiters();
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Accounts for `len` more queued bytes and reports whether the queue is still under the
    /// high-water mark.
    pub(crate) fn enqueue(&self, len: usize) -> bool {
        self.queued.fetch_add(len, Ordering::SeqCst) + len < self.high_water_mark
    }

    pub(crate) fn ingested(&self, len: usize) {
        self.queued.fetch_sub(len, Ordering::SeqCst);
        self.drained.notify_waiters();
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.queued.load(Ordering::SeqCst) < self.high_water_mark
    }

    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub(crate) fn drained(&self) -> &Notify {
        &self.drained
    }
}

/// Owns the codec session of one stream and feeds it in command order.
///
/// Output only moves into the bounded output channel as fast as the consumer takes it. While a
/// send is parked no further commands are read, so queued input piles up in front of the driver
/// and the writable side starts reporting that it is over its high-water mark.
pub(crate) struct Driver {
    session: Option<Box<dyn Session>>,
    direction: Direction,
    commands: mpsc::UnboundedReceiver<Control>,
    output: mpsc::Sender<Result<Bytes>>,
    status: Arc<Status>,
    // input ingested since the last flush
    dirty: bool,
}

impl Driver {
    pub(crate) fn new(
        session: Box<dyn Session>,
        commands: mpsc::UnboundedReceiver<Control>,
        output: mpsc::Sender<Result<Bytes>>,
        status: Arc<Status>,
    ) -> Driver {
        Driver {
            direction: session.direction(),
            session: Some(session),
            commands,
            output,
            status,
            dirty: false,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let control = tokio::select! {
                control = self.commands.recv() => control,
                _ = self.output.closed() => {
                    debug!(direction = self.direction.verb(), "stream output dropped");
                    self.release(StreamState::Failed);
                    return;
                }
            };

            if self.status.state() == StreamState::Failed {
                debug!(direction = self.direction.verb(), "stream aborted");
                self.release(StreamState::Failed);
                return;
            }

            match control {
                Some(Control::Data(chunk)) => {
                    let len = chunk.len();
                    let produced = self.engine(move |session| session.process(&chunk)).await;
                    self.status.ingested(len);
                    self.dirty = true;
                    if let Err(e) = self.emit(produced).await {
                        self.fail(e, None).await;
                        return;
                    }
                }
                Some(Control::Flush(ack)) => {
                    let produced = if self.dirty {
                        self.engine(|session| session.flush()).await
                    } else {
                        trace!(direction = self.direction.verb(), "nothing to flush");
                        Ok(Bytes::new())
                    };
                    self.dirty = false;
                    match self.emit(produced).await {
                        Ok(()) => acknowledge(ack),
                        Err(e) => {
                            self.fail(e, ack).await;
                            return;
                        }
                    }
                }
                Some(Control::End(ack)) => {
                    // normally already Ending, moved there by the writable side
                    self.status.begin_end();
                    let produced = self.engine(|session| session.finish()).await;
                    match self.emit(produced).await {
                        Ok(()) => {
                            self.release(StreamState::Closed);
                            acknowledge(ack);
                        }
                        Err(e) => self.fail(e, ack).await,
                    }
                    return;
                }
                None => {
                    debug!(
                        direction = self.direction.verb(),
                        "stream input dropped before end"
                    );
                    self.release(StreamState::Failed);
                    return;
                }
            }
        }
    }

    /// Runs one engine call on the blocking pool. The session travels to the worker and back, so
    /// it is never reachable from two places at once.
    async fn engine<F>(&mut self, op: F) -> Result<Bytes>
    where
        F: FnOnce(&mut dyn Session) -> Result<Bytes> + Send + 'static,
    {
        let mut session = self.session.take().ok_or_else(closed_error)?;
        let worker = tokio::task::spawn_blocking(move || {
            let produced = op(session.as_mut());
            (session, produced)
        });
        match worker.await {
            Ok((session, produced)) => {
                self.session = Some(session);
                produced
            }
            Err(e) => Err(ErrorKind::Codec(format!("brotli worker failed: {}", e)).into()),
        }
    }

    async fn emit(&mut self, produced: Result<Bytes>) -> Result<()> {
        let chunk = produced?;
        if chunk.is_empty() {
            return Ok(());
        }
        self.output
            .send(Ok(chunk))
            .await
            .map_err(|_| closed_error())
    }

    async fn fail(&mut self, err: Error, ack: Option<Ack>) {
        if err.is_closed() {
            debug!(direction = self.direction.verb(), "stream output dropped");
        } else {
            warn!(direction = self.direction.verb(), error = %err, "stream failed");
        }
        self.release(StreamState::Failed);
        if let Some(ack) = ack {
            let _ = ack.send(Err(err.replicate()));
        }
        // ordered after every chunk already handed over; fails only if the consumer is gone
        let _ = self.output.send(Err(err)).await;
    }

    fn release(&mut self, state: StreamState) {
        if self.session.take().is_some() {
            debug!(direction = self.direction.verb(), ?state, "released session");
        }
        self.status.set_state(state);
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // a driver torn down mid-flight, e.g. by runtime shutdown, must not leave waiters hanging
        self.session = None;
        self.status.abort();
    }
}
