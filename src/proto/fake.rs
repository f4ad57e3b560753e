use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use super::transport::{BoxedTransport, Connector};

pub(crate) enum Reply {
    Line(String),
    Fail(io::ErrorKind),
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Line(value.to_string())
    }
}

/// Scripted instrument. Every read hands out the next reply, everything
/// written is kept in `sent`.
pub(crate) struct FakeBuffer {
    replies: VecDeque<Reply>,
    sent: Arc<Mutex<Vec<u8>>>,
    open: Arc<AtomicUsize>,
    close_fails: bool,
}

impl FakeBuffer {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self::with_counter(replies, Arc::new(AtomicUsize::new(0)))
    }

    pub(crate) fn with_counter(replies: Vec<Reply>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            replies: replies.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
            open,
            close_fails: false,
        }
    }

    /// Shutting down the write side fails.
    pub(crate) fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub(crate) fn sent(&self) -> SentLog {
        SentLog(self.sent.clone())
    }
}

impl Drop for FakeBuffer {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Read side of the bytes a [`FakeBuffer`] received.
#[derive(Clone)]
pub(crate) struct SentLog(Arc<Mutex<Vec<u8>>>);

impl SentLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(String::from)
            .collect()
    }
}

impl tokio::io::AsyncRead for FakeBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match self.replies.pop_front() {
            Some(Reply::Line(line)) => {
                let data = format!("{}\n", line);
                let c = data.len().min(buf.remaining());
                buf.put_slice(&data.as_bytes()[0..c]);
                if c < data.len() {
                    let rest = String::from_utf8_lossy(&data.as_bytes()[c..data.len() - 1]);
                    self.replies.push_front(Reply::Line(rest.into_owned()));
                }
                std::task::Poll::Ready(Ok(()))
            }
            Some(Reply::Fail(kind)) => {
                std::task::Poll::Ready(Err(io::Error::new(kind, "simulated failure")))
            }
            None => std::task::Poll::Ready(Ok(())),
        }
    }
}

impl tokio::io::AsyncWrite for FakeBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::result::Result<usize, std::io::Error>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        if self.close_fails {
            return std::task::Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated close failure",
            )));
        }
        std::task::Poll::Ready(Ok(()))
    }
}

/// Set of fake instruments, keyed by device name.
pub(crate) struct FakeConnector {
    devices: Mutex<HashMap<String, Vec<Reply>>>,
    order: Vec<String>,
    sent: Mutex<HashMap<String, SentLog>>,
    open: Arc<AtomicUsize>,
    close_fails: HashSet<String>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            order: Vec::new(),
            sent: Mutex::new(HashMap::new()),
            open: Arc::new(AtomicUsize::new(0)),
            close_fails: HashSet::new(),
        }
    }

    pub(crate) fn device(mut self, name: &str, replies: Vec<Reply>) -> Self {
        self.order.push(name.to_string());
        self.devices
            .lock()
            .unwrap()
            .insert(name.to_string(), replies);
        self
    }

    pub(crate) fn failing_close(mut self, name: &str) -> Self {
        self.close_fails.insert(name.to_string());
        self
    }

    pub(crate) fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self, name: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .get(name)
            .map(SentLog::lines)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Id = String;

    fn candidates(&self) -> io::Result<Vec<Self::Id>> {
        Ok(self.order.clone())
    }

    async fn open(&self, id: &Self::Id) -> io::Result<BoxedTransport> {
        let replies = self
            .devices
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, id.clone()))?;
        let mut buffer = FakeBuffer::with_counter(replies, self.open.clone());
        if self.close_fails.contains(id) {
            buffer = buffer.with_failing_close();
        }
        self.sent.lock().unwrap().insert(id.clone(), buffer.sent());
        Ok(Box::new(buffer))
    }
}
