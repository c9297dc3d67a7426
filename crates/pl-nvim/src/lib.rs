//! Msgpack-rpc client for a running Neovim instance.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use pl_core::{CoreError, CoreResult, Cursor, EditorControl, WindowMetrics};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Result type for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("malformed rpc message: {0}")]
    Protocol(String),
    /// The editor answered with an error object.
    #[error("{0}")]
    Remote(String),
}

impl From<RpcError> for CoreError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(message) => CoreError::Editor(message),
            other => CoreError::Connection(other.to_string()),
        }
    }
}

/// Where the editor listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Unix(PathBuf),
    Tcp(String),
}

impl Address {
    /// `host:port` is TCP, anything else is a socket path.
    pub fn parse(address: &str) -> Self {
        match address.rsplit_once(':') {
            Some((host, port))
                if !host.is_empty()
                    && !address.contains('/')
                    && port.parse::<u16>().is_ok() =>
            {
                Address::Tcp(address.to_string())
            }
            _ => Address::Unix(PathBuf::from(address)),
        }
    }

    fn connect(&self) -> RpcResult<Box<dyn Transport>> {
        match self {
            Address::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(Some(IO_TIMEOUT))?;
                Ok(Box::new(stream))
            }
            Address::Tcp(addr) => {
                let stream = TcpStream::connect(addr)?;
                stream.set_read_timeout(Some(IO_TIMEOUT))?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
        }
    }
}

/// A bidirectional byte stream to the editor.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Lazily connected request/response client.
///
/// A connection that fails mid-call is dropped; the next call dials again.
pub struct NvimClient {
    address: Option<Address>,
    stream: Option<Box<dyn Transport>>,
    next_id: u32,
}

impl std::fmt::Debug for NvimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvimClient")
            .field("address", &self.address)
            .field("connected", &self.stream.is_some())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl NvimClient {
    pub fn new(address: &str) -> Self {
        Self {
            address: Some(Address::parse(address)),
            stream: None,
            next_id: 0,
        }
    }

    /// A client over an already open stream that never redials.
    pub fn with_stream(stream: impl Transport + 'static) -> Self {
        Self {
            address: None,
            stream: Some(Box::new(stream)),
            next_id: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one request and wait for its response.
    pub fn call(&mut self, method: &str, params: Value) -> RpcResult<Value> {
        let result = self.exchange(method, params);
        if matches!(
            result,
            Err(RpcError::Io(_) | RpcError::Decode(_) | RpcError::Protocol(_))
        ) && self.stream.take().is_some()
        {
            warn!(method, "dropping editor connection after failure");
        }
        result
    }

    fn exchange(&mut self, method: &str, params: Value) -> RpcResult<Value> {
        if self.stream.is_none() {
            let address = self
                .address
                .as_ref()
                .ok_or_else(|| RpcError::Protocol("connection closed".into()))?;
            debug!(?address, "connecting to editor");
            self.stream = Some(address.connect()?);
        }
        let msgid = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| RpcError::Protocol("connection closed".into()))?;

        rmp_serde::encode::write(stream, &(REQUEST, msgid, method, &params))
            .map_err(|err| RpcError::Encode(err.to_string()))?;
        stream.flush()?;
        debug!(method, msgid, "sent request");

        loop {
            let message: Value = rmp_serde::from_read(&mut *stream).map_err(decode_error)?;
            let Value::Array(parts) = message else {
                return Err(RpcError::Protocol("message is not an array".into()));
            };
            match parts.first().and_then(Value::as_u64) {
                Some(RESPONSE) => {
                    let [_, id, error, result] = <[Value; 4]>::try_from(parts)
                        .map_err(|_| RpcError::Protocol("response must have 4 fields".into()))?;
                    if id.as_u64() != Some(u64::from(msgid)) {
                        debug!(?id, msgid, "skipping response to another request");
                        continue;
                    }
                    if !error.is_null() {
                        return Err(RpcError::Remote(remote_message(&error)));
                    }
                    return Ok(result);
                }
                Some(NOTIFICATION) => continue,
                _ => return Err(RpcError::Protocol("unexpected message type".into())),
            }
        }
    }

    fn call_function(&mut self, name: &str, args: Value) -> RpcResult<Value> {
        self.call("nvim_call_function", json!([name, args]))
    }
}

fn decode_error(err: rmp_serde::decode::Error) -> RpcError {
    match err {
        rmp_serde::decode::Error::InvalidMarkerRead(io)
        | rmp_serde::decode::Error::InvalidDataRead(io) => RpcError::Io(io),
        other => RpcError::Decode(other.to_string()),
    }
}

/// Neovim errors arrive as `[type, message]`.
fn remote_message(error: &Value) -> String {
    match error {
        Value::Array(parts) => parts
            .get(1)
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

fn as_u64(value: &Value, what: &str) -> RpcResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| RpcError::Protocol(format!("{what} is not an unsigned integer")))
}

/// Escape a path for use as an ex command argument.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, ' ' | '\\' | '%' | '#' | '|' | '"') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Ex command that reloads `path`, optionally jumping to `line`.
pub fn edit_command(path: &str, line: Option<u64>) -> String {
    match line {
        Some(line) => format!("e! +{line} {}", escape_path(path)),
        None => format!("e! {}", escape_path(path)),
    }
}

impl EditorControl for NvimClient {
    fn cursor(&mut self) -> CoreResult<Cursor> {
        let value = self.call("nvim_win_get_cursor", json!([0]))?;
        let pair = value
            .as_array()
            .filter(|pair| pair.len() == 2)
            .ok_or_else(|| RpcError::Protocol("cursor is not a pair".into()))?;
        Ok(Cursor::new(as_u64(&pair[0], "row")?, as_u64(&pair[1], "col")?))
    }

    fn buffer_name(&mut self) -> CoreResult<String> {
        let value = self.call("nvim_buf_get_name", json!([0]))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn buffer_lines(&mut self) -> CoreResult<Vec<String>> {
        let value = self.call("nvim_buf_get_lines", json!([0, 0, -1, false]))?;
        let lines = value
            .as_array()
            .ok_or_else(|| RpcError::Protocol("buffer lines are not an array".into()))?;
        Ok(lines
            .iter()
            .map(|line| line.as_str().unwrap_or_default().to_string())
            .collect())
    }

    fn set_cursor(&mut self, cursor: Cursor) -> CoreResult<()> {
        self.call("nvim_win_set_cursor", json!([0, [cursor.row, cursor.col]]))?;
        Ok(())
    }

    fn edit_file(&mut self, path: &str, line: Option<u64>) -> CoreResult<()> {
        self.command(&edit_command(path, line))
    }

    fn command(&mut self, command: &str) -> CoreResult<()> {
        self.call("nvim_command", json!([command]))?;
        Ok(())
    }

    fn window_metrics(&mut self) -> CoreResult<WindowMetrics> {
        let height = self.call_function("winheight", json!([0]))?;
        let winline = self.call_function("winline", json!([]))?;
        Ok(WindowMetrics {
            height: as_u64(&height, "winheight")?,
            winline: as_u64(&winline, "winline")?,
        })
    }

    fn set_var(&mut self, name: &str, value: &str) -> CoreResult<()> {
        self.call("nvim_set_var", json!([name, value]))?;
        Ok(())
    }
}
