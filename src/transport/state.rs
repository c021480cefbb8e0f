//! Read-side state of a remote stream
//!
//! Arriving items are queued until read, a waiting reader is woken as soon
//! as something arrives, and the first failure or close makes the stream
//! terminal. Queued items are always delivered before the terminal event.
//! A failure is sticky: once delivered, every later read fails the same way.

use std::collections::VecDeque;
use std::task::{Context, Poll, Waker};

use super::error::TransportError;

#[derive(Debug, Default)]
enum Failure {
    #[default]
    None,
    /// Recorded but not yet read
    Pending(TransportError),
    /// Read at least once; later reads rebuild it from these parts
    Delivered {
        message: String,
        trace: Option<String>,
        code: Option<u16>,
    },
}

#[derive(Debug)]
pub struct StreamState<T> {
    queue: VecDeque<T>,
    failure: Failure,
    closed: bool,
    finished: bool,
    reader: Option<Waker>,
}

impl<T> Default for StreamState<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            failure: Failure::None,
            closed: false,
            finished: false,
            reader: None,
        }
    }
}

impl<T> StreamState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arriving item.
    pub fn push(&mut self, item: T) {
        if self.finished || self.closed || self.is_failed() {
            tracing::trace!("Dropping item that arrived after the stream ended");
            return;
        }
        self.queue.push_back(item);
        self.wake();
    }

    /// Record a failure; only the first one is kept.
    pub fn fail(&mut self, error: TransportError) {
        if self.finished || self.is_failed() {
            return;
        }
        self.failure = Failure::Pending(error);
        self.wake();
    }

    /// The peer closed; reading ends once the queue is drained.
    pub fn close(&mut self) {
        self.closed = true;
        self.wake();
    }

    /// End the stream locally, discarding anything not yet read.
    pub fn finish(&mut self) {
        self.finished = true;
        self.queue.clear();
        self.failure = Failure::None;
        self.wake();
    }

    /// True once no further item can be produced: completed, cancelled,
    /// or failed with the failure already read.
    pub fn is_finished(&self) -> bool {
        self.finished || matches!(self.failure, Failure::Delivered { .. })
    }

    fn is_failed(&self) -> bool {
        !matches!(self.failure, Failure::None)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Read the next item, registering the caller if nothing is available.
    ///
    /// Queued items come first. After that a failure is returned on this
    /// and every later read; a close without failure returns `None`.
    pub fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<T, TransportError>>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if let Some(item) = self.queue.pop_front() {
            return Poll::Ready(Some(Ok(item)));
        }
        match std::mem::take(&mut self.failure) {
            Failure::None => {}
            Failure::Pending(error) => {
                self.failure = match &error {
                    TransportError::Remote {
                        message,
                        trace,
                        code,
                    } => Failure::Delivered {
                        message: message.clone(),
                        trace: trace.clone(),
                        code: *code,
                    },
                    other => Failure::Delivered {
                        message: other.to_string(),
                        trace: None,
                        code: None,
                    },
                };
                return Poll::Ready(Some(Err(error)));
            }
            Failure::Delivered {
                message,
                trace,
                code,
            } => {
                let error = TransportError::Remote {
                    message: message.clone(),
                    trace: trace.clone(),
                    code,
                };
                self.failure = Failure::Delivered {
                    message,
                    trace,
                    code,
                };
                return Poll::Ready(Some(Err(error)));
            }
        }
        if self.closed {
            self.finished = true;
            return Poll::Ready(None);
        }
        self.reader = Some(cx.waker().clone());
        Poll::Pending
    }

    fn wake(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::poll_fn;
    use tokio_test::{assert_ready, task};

    fn read(state: &mut StreamState<u32>) -> Poll<Option<Result<u32, TransportError>>> {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        state.poll_read(&mut cx)
    }

    #[test]
    fn test_queued_items_are_read_in_order() {
        let mut state = StreamState::new();
        state.push(1);
        state.push(2);
        assert_eq!(state.queued(), 2);

        assert!(matches!(read(&mut state), Poll::Ready(Some(Ok(1)))));
        assert!(matches!(read(&mut state), Poll::Ready(Some(Ok(2)))));
        assert!(read(&mut state).is_pending());
    }

    #[test]
    fn test_pending_reader_is_woken_by_push() {
        let mut state = StreamState::<u32>::new();
        let mut reader = task::spawn(());
        let pending = reader.enter(|cx, _| state.poll_read(cx));
        assert!(pending.is_pending());

        state.push(7);
        assert!(reader.is_woken());
        assert!(matches!(read(&mut state), Poll::Ready(Some(Ok(7)))));
    }

    #[test]
    fn test_pending_reader_is_woken_by_close() {
        let mut state = StreamState::<u32>::new();
        let mut reader = task::spawn(());
        assert!(reader.enter(|cx, _| state.poll_read(cx)).is_pending());

        state.close();
        assert!(reader.is_woken());
        assert!(matches!(read(&mut state), Poll::Ready(None)));
    }

    #[test]
    fn test_failure_after_queued_items_repeats() {
        let mut state = StreamState::new();
        state.push(1);
        state.fail(TransportError::Remote {
            message: "boom".to_string(),
            trace: None,
            code: None,
        });
        state.close();

        assert!(matches!(read(&mut state), Poll::Ready(Some(Ok(1)))));
        assert!(!state.is_finished());
        for _ in 0..3 {
            match read(&mut state) {
                Poll::Ready(Some(Err(TransportError::Remote { message, .. }))) => {
                    assert_eq!(message, "boom")
                }
                other => panic!("Expected remote error, got {other:?}"),
            }
        }
        assert!(state.is_finished());
    }

    #[test]
    fn test_local_failure_repeats_with_its_message() {
        let mut state = StreamState::<u32>::new();
        state.fail(TransportError::PortClosed);
        assert!(matches!(
            read(&mut state),
            Poll::Ready(Some(Err(TransportError::PortClosed)))
        ));
        match read(&mut state) {
            Poll::Ready(Some(Err(err))) => assert_eq!(err.to_string(), "Stream port is closed"),
            other => panic!("Expected repeated failure, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_after_failure_ends_reads() {
        let mut state = StreamState::<u32>::new();
        state.fail(TransportError::PortClosed);
        assert!(matches!(read(&mut state), Poll::Ready(Some(Err(_)))));
        state.finish();
        assert!(matches!(read(&mut state), Poll::Ready(None)));
    }

    #[test]
    fn test_first_failure_wins() {
        let mut state = StreamState::<u32>::new();
        state.fail(TransportError::PortClosed);
        state.fail(TransportError::Remote {
            message: "later".to_string(),
            trace: None,
            code: None,
        });
        assert!(matches!(
            read(&mut state),
            Poll::Ready(Some(Err(TransportError::PortClosed)))
        ));
    }

    #[test]
    fn test_close_completes_after_drain() {
        let mut state = StreamState::new();
        state.push(5);
        state.close();
        state.push(6);

        assert!(matches!(read(&mut state), Poll::Ready(Some(Ok(5)))));
        assert!(matches!(read(&mut state), Poll::Ready(None)));
    }

    #[tokio::test]
    async fn test_finish_discards_queue() {
        let mut state = StreamState::new();
        state.push(1);
        state.finish();
        state.push(2);

        let next = poll_fn(|cx| state.poll_read(cx)).await;
        assert!(next.is_none());
        assert_eq!(state.queued(), 0);
        let mut again = task::spawn(poll_fn(|cx| state.poll_read(cx)));
        assert!(assert_ready!(again.poll()).is_none());
    }
}
