use std::{
  io::{
    BufRead,
    BufReader,
    BufWriter,
    Read,
    Write,
  },
  net::{
    Shutdown,
    TcpStream,
  },
  path::Path,
  process::{
    Child,
    ChildStderr,
    Command,
    Stdio,
  },
  sync::mpsc::{
    Receiver,
    Sender,
    TryRecvError,
    channel,
  },
  thread::{
    self,
    JoinHandle,
  },
};

use thiserror::Error;
use tracing::debug;

use crate::jsonrpc;

#[derive(Debug, Clone)]
pub enum TransportEvent {
  Message(jsonrpc::Message),
  Stderr(String),
  ReadError(String),
  WriteError(String),
  Closed,
}

enum Outbound {
  Message(jsonrpc::Message),
  Shutdown,
}

/// The channel a client exchanges protocol frames over. Concrete transports
/// decode frames on their own threads and hand complete messages back through
/// `try_recv_event`; nothing here blocks the caller.
pub trait Transport: Send {
  fn send(&self, message: jsonrpc::Message) -> Result<(), TransportError>;

  fn try_recv_event(&self) -> Option<TransportEvent>;

  /// Tears the connection down and returns the server process exit code,
  /// when there is a process to report on.
  fn shutdown(&mut self) -> Result<Option<i32>, TransportError>;
}

pub struct StdioTransport {
  child:         Child,
  outbound_tx:   Option<Sender<Outbound>>,
  event_rx:      Receiver<TransportEvent>,
  reader_thread: Option<JoinHandle<()>>,
  writer_thread: Option<JoinHandle<()>>,
  stderr_thread: Option<JoinHandle<()>>,
}

impl StdioTransport {
  pub fn spawn(
    command: &str,
    args: &[String],
    env: impl IntoIterator<Item = (String, String)>,
    workspace_root: &Path,
  ) -> Result<Self, TransportError> {
    let mut process = Command::new(command);
    process
      .args(args)
      .current_dir(workspace_root)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    for (key, value) in env {
      process.env(key, value);
    }

    let mut child = process.spawn().map_err(TransportError::Spawn)?;
    let stdin = child
      .stdin
      .take()
      .ok_or(TransportError::MissingPipe("stdin"))?;
    let stdout = child
      .stdout
      .take()
      .ok_or(TransportError::MissingPipe("stdout"))?;
    let stderr = child
      .stderr
      .take()
      .ok_or(TransportError::MissingPipe("stderr"))?;

    let (outbound_tx, outbound_rx) = channel();
    let (event_tx, event_rx) = channel();

    let writer_thread = Some(spawn_writer(stdin, outbound_rx, event_tx.clone()));
    let reader_thread = Some(spawn_reader(stdout, event_tx.clone()));
    let stderr_thread = Some(spawn_stderr(stderr, event_tx));

    debug!(command, "language server process spawned");
    Ok(Self {
      child,
      outbound_tx: Some(outbound_tx),
      event_rx,
      reader_thread,
      writer_thread,
      stderr_thread,
    })
  }
}

impl Transport for StdioTransport {
  fn send(&self, message: jsonrpc::Message) -> Result<(), TransportError> {
    let tx = self
      .outbound_tx
      .as_ref()
      .ok_or(TransportError::OutboundClosed)?;
    tx.send(Outbound::Message(message))
      .map_err(|_| TransportError::OutboundClosed)
  }

  fn try_recv_event(&self) -> Option<TransportEvent> {
    match self.event_rx.try_recv() {
      Ok(event) => Some(event),
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
  }

  fn shutdown(&mut self) -> Result<Option<i32>, TransportError> {
    if let Some(tx) = self.outbound_tx.take() {
      let _ = tx.send(Outbound::Shutdown);
    }

    let exit_code = match self.child.try_wait().map_err(TransportError::Wait)? {
      Some(status) => status.code(),
      None => {
        if let Err(err) = self.child.kill()
          && err.kind() != std::io::ErrorKind::InvalidInput
        {
          return Err(TransportError::Kill(err));
        }
        self.child.wait().map_err(TransportError::Wait)?.code()
      },
    };

    join(&mut self.reader_thread)?;
    join(&mut self.writer_thread)?;
    join(&mut self.stderr_thread)?;

    Ok(exit_code)
  }
}

pub struct TcpTransport {
  stream:        TcpStream,
  outbound_tx:   Option<Sender<Outbound>>,
  event_rx:      Receiver<TransportEvent>,
  reader_thread: Option<JoinHandle<()>>,
  writer_thread: Option<JoinHandle<()>>,
}

impl TcpTransport {
  pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
    let stream = TcpStream::connect((host, port)).map_err(TransportError::Connect)?;
    let read_half = stream.try_clone().map_err(TransportError::Connect)?;
    let write_half = stream.try_clone().map_err(TransportError::Connect)?;

    let (outbound_tx, outbound_rx) = channel();
    let (event_tx, event_rx) = channel();

    let writer_thread = Some(spawn_writer(write_half, outbound_rx, event_tx.clone()));
    let reader_thread = Some(spawn_reader(read_half, event_tx));

    debug!(host, port, "language server socket connected");
    Ok(Self {
      stream,
      outbound_tx: Some(outbound_tx),
      event_rx,
      reader_thread,
      writer_thread,
    })
  }
}

impl Transport for TcpTransport {
  fn send(&self, message: jsonrpc::Message) -> Result<(), TransportError> {
    let tx = self
      .outbound_tx
      .as_ref()
      .ok_or(TransportError::OutboundClosed)?;
    tx.send(Outbound::Message(message))
      .map_err(|_| TransportError::OutboundClosed)
  }

  fn try_recv_event(&self) -> Option<TransportEvent> {
    match self.event_rx.try_recv() {
      Ok(event) => Some(event),
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
  }

  fn shutdown(&mut self) -> Result<Option<i32>, TransportError> {
    if let Some(tx) = self.outbound_tx.take() {
      let _ = tx.send(Outbound::Shutdown);
    }
    // Unblocks the reader thread; double shutdown reports NotConnected.
    if let Err(err) = self.stream.shutdown(Shutdown::Both)
      && err.kind() != std::io::ErrorKind::NotConnected
    {
      return Err(TransportError::Close(err));
    }

    join(&mut self.reader_thread)?;
    join(&mut self.writer_thread)?;

    Ok(None)
  }
}

fn spawn_reader<R>(source: R, event_tx: Sender<TransportEvent>) -> JoinHandle<()>
where
  R: Read + Send + 'static,
{
  thread::Builder::new()
    .name("quill-lsp-reader".into())
    .spawn(move || {
      let mut reader = BufReader::new(source);
      let mut header = String::new();
      let mut body = Vec::new();

      loop {
        match read_frame(&mut reader, &mut header, &mut body) {
          Ok(Some(message)) => {
            let _ = event_tx.send(TransportEvent::Message(message));
          },
          Ok(None) => {
            let _ = event_tx.send(TransportEvent::Closed);
            break;
          },
          Err(err) => {
            let _ = event_tx.send(TransportEvent::ReadError(err.to_string()));
            break;
          },
        }
      }
    })
    .expect("failed to spawn lsp reader thread")
}

fn spawn_writer<W>(
  sink: W,
  outbound_rx: Receiver<Outbound>,
  event_tx: Sender<TransportEvent>,
) -> JoinHandle<()>
where
  W: Write + Send + 'static,
{
  thread::Builder::new()
    .name("quill-lsp-writer".into())
    .spawn(move || {
      let mut writer = BufWriter::new(sink);
      while let Ok(outbound) = outbound_rx.recv() {
        match outbound {
          Outbound::Message(message) => {
            if let Err(err) = write_frame(&mut writer, &message) {
              let _ = event_tx.send(TransportEvent::WriteError(err.to_string()));
              break;
            }
          },
          Outbound::Shutdown => break,
        }
      }
    })
    .expect("failed to spawn lsp writer thread")
}

fn spawn_stderr(stderr: ChildStderr, event_tx: Sender<TransportEvent>) -> JoinHandle<()> {
  thread::Builder::new()
    .name("quill-lsp-stderr".into())
    .spawn(move || {
      let mut reader = BufReader::new(stderr);
      let mut line = String::new();
      loop {
        line.clear();
        match reader.read_line(&mut line) {
          Ok(0) => break,
          Ok(_) => {
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if !line.is_empty() {
              let _ = event_tx.send(TransportEvent::Stderr(line));
            }
          },
          Err(err) => {
            debug!(error = %err, "lsp stderr stream closed with error");
            break;
          },
        }
      }
    })
    .expect("failed to spawn lsp stderr thread")
}

fn read_frame<R: BufRead>(
  reader: &mut R,
  header: &mut String,
  body: &mut Vec<u8>,
) -> Result<Option<jsonrpc::Message>, TransportError> {
  let mut content_length: Option<usize> = None;
  loop {
    header.clear();
    let read = reader.read_line(header).map_err(TransportError::Read)?;
    if read == 0 {
      return Ok(None);
    }

    let line = header.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
      // Blank line terminates the header block once a length was seen;
      // stray blank lines before any header are skipped.
      if content_length.is_some() {
        break;
      }
      continue;
    }

    if let Some((name, value)) = line.split_once(':')
      && name.eq_ignore_ascii_case("content-length")
    {
      let value = value.trim();
      let parsed = value
        .parse::<usize>()
        .map_err(|_| TransportError::InvalidContentLength(value.to_string()))?;
      content_length = Some(parsed);
    }
  }

  let content_length = content_length.ok_or(TransportError::MissingContentLength)?;
  body.resize(content_length, 0);
  reader.read_exact(body).map_err(TransportError::ReadBody)?;
  let message = serde_json::from_slice(body).map_err(TransportError::ParseJson)?;
  body.clear();
  Ok(Some(message))
}

fn write_frame<W: Write>(writer: &mut W, message: &jsonrpc::Message) -> Result<(), TransportError> {
  let body = serde_json::to_vec(message).map_err(TransportError::SerializeJson)?;
  write!(writer, "Content-Length: {}\r\n\r\n", body.len()).map_err(TransportError::WriteHeader)?;
  writer.write_all(&body).map_err(TransportError::WriteBody)?;
  writer.flush().map_err(TransportError::Flush)?;
  Ok(())
}

fn join(handle: &mut Option<JoinHandle<()>>) -> Result<(), TransportError> {
  if let Some(handle) = handle.take() {
    handle.join().map_err(|_| TransportError::ThreadPanicked)?;
  }
  Ok(())
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("failed to spawn lsp process: {0}")]
  Spawn(std::io::Error),
  #[error("failed to connect to lsp socket: {0}")]
  Connect(std::io::Error),
  #[error("missing child {0} pipe")]
  MissingPipe(&'static str),
  #[error("transport outbound channel is closed")]
  OutboundClosed,
  #[error("failed to read frame header: {0}")]
  Read(std::io::Error),
  #[error("invalid content-length header value: {0}")]
  InvalidContentLength(String),
  #[error("missing content-length header")]
  MissingContentLength,
  #[error("failed to read frame body: {0}")]
  ReadBody(std::io::Error),
  #[error("failed to parse json-rpc message: {0}")]
  ParseJson(serde_json::Error),
  #[error("failed to serialize json-rpc message: {0}")]
  SerializeJson(serde_json::Error),
  #[error("failed to write frame header: {0}")]
  WriteHeader(std::io::Error),
  #[error("failed to write frame body: {0}")]
  WriteBody(std::io::Error),
  #[error("failed to flush frame body: {0}")]
  Flush(std::io::Error),
  #[error("failed to kill lsp process: {0}")]
  Kill(std::io::Error),
  #[error("failed to wait for lsp process: {0}")]
  Wait(std::io::Error),
  #[error("failed to close lsp socket: {0}")]
  Close(std::io::Error),
  #[error("transport thread panicked")]
  ThreadPanicked,
}
