//! Scripted in-memory transport for tests.
//!
//! [`MockTransport`] answers requests from a queue of [`MockReply`]s and
//! hands out streams whose lines are fed through a [`MockControl`]. The
//! control is cloneable and stays with the test after the transport has
//! been moved into a client or a spawned task.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    ConnectionId, ReadLine, Request, Response, StreamHandle, Transport,
    TransportError,
};

/// One scripted answer to a request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Response),
    Fail(TransportError),
    /// Never completes. Used to wedge a call and exercise timeouts.
    Hang,
}

#[derive(Debug, Default)]
struct StreamShared {
    lines: VecDeque<ReadLine>,
    active: bool,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    stream_failures: VecDeque<TransportError>,
    open_failures: VecDeque<TransportError>,
    pending_lines: VecDeque<ReadLine>,
    stream: Option<Arc<Mutex<StreamShared>>>,
    requests: Vec<Request>,
    stream_opens: Vec<String>,
    opens: usize,
    closes: usize,
    overlaps: usize,
}

impl MockState {
    fn stream_active(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| lock(s).active)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Test-side handle for scripting and inspecting a [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

impl MockControl {
    /// Queues a response with the given status and body.
    pub fn push_response(&self, status: u16, body: &str) {
        lock(&self.state)
            .replies
            .push_back(MockReply::Respond(Response {
                status,
                body: body.to_string(),
            }));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, err: TransportError) {
        lock(&self.state).replies.push_back(MockReply::Fail(err));
    }

    /// Queues a request that never completes.
    pub fn push_hang(&self) {
        lock(&self.state).replies.push_back(MockReply::Hang);
    }

    /// Makes the next `open_stream` fail.
    pub fn fail_next_stream(&self, err: TransportError) {
        lock(&self.state).stream_failures.push_back(err);
    }

    /// Makes the next `open` fail.
    pub fn fail_next_open(&self, err: TransportError) {
        lock(&self.state).open_failures.push_back(err);
    }

    /// Feeds a line to the current stream, or to the next one opened.
    pub fn push_line(&self, line: &str) {
        self.push_item(ReadLine::Line(line.to_string()));
    }

    /// Reports an oversized line dropped by the stream's framing.
    pub fn push_overflow(&self) {
        self.push_item(ReadLine::Overflow);
    }

    fn push_item(&self, item: ReadLine) {
        let mut state = lock(&self.state);
        let live = state
            .stream
            .as_ref()
            .filter(|s| lock(s).active)
            .cloned();
        match live {
            Some(stream) => lock(&stream).lines.push_back(item),
            None => state.pending_lines.push_back(item),
        }
    }

    /// Ends the current stream from the server side.
    pub fn close_stream(&self, reason: Option<&str>) {
        let state = lock(&self.state);
        if let Some(stream) = &state.stream {
            lock(stream)
                .lines
                .push_back(ReadLine::Closed(reason.map(str::to_string)));
        }
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.state).requests.clone()
    }

    /// Paths of every stream opened so far, in order.
    pub fn stream_opens(&self) -> Vec<String> {
        lock(&self.state).stream_opens.clone()
    }

    /// Whether a stream handle is open and not yet closed or dropped.
    pub fn stream_active(&self) -> bool {
        lock(&self.state).stream_active()
    }

    /// Number of successful `open` calls.
    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    /// Number of `close` calls on an open transport.
    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    /// Requests or stream opens issued while another stream was active.
    pub fn overlaps(&self) -> usize {
        lock(&self.state).overlaps
    }

    /// Scripted replies not yet consumed.
    pub fn remaining_replies(&self) -> usize {
        lock(&self.state).replies.len()
    }
}

/// A [`Transport`] driven by a [`MockControl`].
///
/// Unscripted requests fail with [`TransportError::Connect`].
#[derive(Debug)]
pub struct MockTransport {
    control: MockControl,
    id: Option<ConnectionId>,
}

impl MockTransport {
    pub fn new() -> (Self, MockControl) {
        let control = MockControl::default();
        (
            Self {
                control: control.clone(),
                id: None,
            },
            control,
        )
    }

    /// A transport sharing an existing control.
    pub fn with_control(control: MockControl) -> Self {
        Self { control, id: None }
    }
}

impl Transport for MockTransport {
    type Stream = MockStream;

    fn open(&mut self) -> Result<(), TransportError> {
        if self.id.is_some() {
            return Ok(());
        }
        let mut state = lock(&self.control.state);
        if let Some(err) = state.open_failures.pop_front() {
            return Err(err);
        }
        state.opens += 1;
        self.id = Some(ConnectionId::next());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.id.is_some()
    }

    async fn request(
        &mut self,
        request: Request,
    ) -> Result<Response, TransportError> {
        let reply = {
            let mut state = lock(&self.control.state);
            if self.id.is_none() {
                return Err(TransportError::NotOpen);
            }
            if state.stream_active() {
                state.overlaps += 1;
            }
            state.requests.push(request);
            state.replies.pop_front()
        };

        match reply {
            Some(MockReply::Respond(resp)) => Ok(resp),
            Some(MockReply::Fail(err)) => Err(err),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Err(TransportError::Connect("no scripted reply".into())),
        }
    }

    async fn open_stream(
        &mut self,
        path: &str,
    ) -> Result<MockStream, TransportError> {
        let mut state = lock(&self.control.state);
        if self.id.is_none() {
            return Err(TransportError::NotOpen);
        }
        if state.stream_active() {
            state.overlaps += 1;
        }
        state.stream_opens.push(path.to_string());
        if let Some(err) = state.stream_failures.pop_front() {
            return Err(err);
        }
        let shared = Arc::new(Mutex::new(StreamShared {
            lines: std::mem::take(&mut state.pending_lines),
            active: true,
        }));
        state.stream = Some(Arc::clone(&shared));
        Ok(MockStream { shared })
    }

    fn close(&mut self) {
        if self.id.take().is_some() {
            lock(&self.control.state).closes += 1;
        }
    }

    fn id(&self) -> Option<ConnectionId> {
        self.id
    }
}

/// Stream handle returned by [`MockTransport::open_stream`].
#[derive(Debug)]
pub struct MockStream {
    shared: Arc<Mutex<StreamShared>>,
}

impl StreamHandle for MockStream {
    fn read_line(&mut self) -> ReadLine {
        let mut shared = lock(&self.shared);
        if !shared.active {
            return ReadLine::Closed(None);
        }
        match shared.lines.pop_front() {
            Some(ReadLine::Closed(reason)) => {
                shared.active = false;
                ReadLine::Closed(reason)
            }
            Some(item) => item,
            None => ReadLine::WouldBlock,
        }
    }

    fn close(&mut self) {
        lock(&self.shared).active = false;
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        lock(&self.shared).active = false;
    }
}
