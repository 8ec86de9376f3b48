//! Shared non-blocking TCP line client used by all four sensor
//! stand-ins. Each original C component hand-rolls the same `socket()`
//! → `fcntl(O_NONBLOCK)` → `connect()` →
//! `EWOULDBLOCK`-tolerant `recv()` dance with a 1s reconnect backoff; this
//! factors that once using `mio`, the non-blocking I/O crate already in
//! the dependency stack, instead of repeating raw `libc` socket calls
//! four times.

use std::io::{ErrorKind, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const STREAM_TOKEN: Token = Token(0);

/// What changed since the last [`LineClient::poll`] call.
#[derive(Debug, Default)]
pub struct PollResult {
  pub newly_connected: bool,
  pub newly_disconnected: bool,
  /// Complete, newline-terminated frames read this tick, in order.
  pub lines: Vec<String>,
}

/// A reconnecting, non-blocking TCP client that assembles complete
/// newline-delimited ASCII frames out of whatever bytes are available.
pub struct LineClient {
  addr: SocketAddr,
  poll: Poll,
  events: Events,
  stream: Option<TcpStream>,
  last_attempt: Option<Instant>,
  read_buf: Vec<u8>,
  pending: String,
}

impl LineClient {
  pub fn new(addr: SocketAddr) -> std::io::Result<Self> {
    Ok(Self {
      addr,
      poll: Poll::new()?,
      events: Events::with_capacity(4),
      stream: None,
      last_attempt: None,
      read_buf: vec![0u8; 4096],
      pending: String::new(),
    })
  }

  pub fn is_connected(&self) -> bool {
    self.stream.is_some()
  }

  /// Drive the connection and return whatever happened this tick. Safe
  /// to call on every component tick; internally rate-limits reconnect
  /// attempts to [`RECONNECT_BACKOFF`].
  pub fn poll(&mut self) -> PollResult {
    let mut result = PollResult::default();

    if self.stream.is_none() {
      let ready = self
        .last_attempt
        .map(|t| t.elapsed() >= RECONNECT_BACKOFF)
        .unwrap_or(true);
      if ready {
        self.last_attempt = Some(Instant::now());
        self.try_connect(&mut result);
      }
      return result;
    }

    self.read_available(&mut result);
    result
  }

  fn try_connect(&mut self, result: &mut PollResult) {
    match TcpStream::connect(self.addr) {
      Ok(mut stream) => {
        if self
          .poll
          .registry()
          .register(&mut stream, STREAM_TOKEN, Interest::READABLE)
          .is_ok()
        {
          self.stream = Some(stream);
          result.newly_connected = true;
        }
      }
      Err(e) if e.kind() == ErrorKind::WouldBlock => {
        // Connect is in progress; treat as connected optimistically and
        // let the next read surface any real failure, matching the
        // original's EINPROGRESS/EALREADY tolerance.
        if let Ok(mut stream) = TcpStream::connect(self.addr) {
          let _ = self
            .poll
            .registry()
            .register(&mut stream, STREAM_TOKEN, Interest::READABLE);
          self.stream = Some(stream);
          result.newly_connected = true;
        }
      }
      Err(_) => {}
    }
  }

  fn read_available(&mut self, result: &mut PollResult) {
    let _ = self
      .poll
      .poll(&mut self.events, Some(Duration::from_millis(0)));

    let Some(stream) = self.stream.as_mut() else {
      return;
    };

    loop {
      match stream.read(&mut self.read_buf) {
        Ok(0) => {
          self.disconnect(result);
          return;
        }
        Ok(n) => {
          self
            .pending
            .push_str(&String::from_utf8_lossy(&self.read_buf[..n]));
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => break,
        Err(_) => {
          self.disconnect(result);
          return;
        }
      }
    }

    while let Some(pos) = self.pending.find('\n') {
      let line = self.pending[..pos].trim_end_matches('\r').to_string();
      self.pending.drain(..=pos);
      if !line.is_empty() {
        result.lines.push(line);
      }
    }
  }

  fn disconnect(&mut self, result: &mut PollResult) {
    if let Some(mut stream) = self.stream.take() {
      let _ = self.poll.registry().deregister(&mut stream);
    }
    result.newly_disconnected = true;
  }
}
