//! Line-delimited transport for MCP.
//!
//! Messages travel as newline-delimited JSON-RPC:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! [`LineTransport`] is the async flavour used by the cooperative loop;
//! [`BlockingTransport`] is the same framing over `std::io` for the blocking
//! loop. Both are generic over the underlying streams so tests can drive
//! them from in-memory buffers.

use std::io::{self, BufRead, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::mcp::protocol::OutgoingMessage;

/// Turns one raw input line into text, without its line ending.
///
/// Bytes that are not UTF-8 are replaced with U+FFFD so the line still
/// reaches the parser and is answered with a parse error.
fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(at = e.utf8_error().valid_up_to(), "Input line is not valid UTF-8");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

fn encode(message: &OutgoingMessage) -> io::Result<String> {
    let json =
        serde_json::to_string(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // MCP: messages must not contain embedded newlines
    debug_assert!(
        !json.contains('\n'),
        "JSON message must not contain embedded newlines"
    );
    Ok(json)
}

/// Async newline-delimited transport.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// The transport over the process's stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over arbitrary streams.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        if self.reader.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(None);
        }
        Ok(Some(decode_line(raw)))
    }

    /// Writes one message followed by a newline, then flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        let json = encode(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Consumes the transport, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Blocking newline-delimited transport.
pub struct BlockingTransport<R, W> {
    reader: R,
    writer: W,
}

impl BlockingTransport<io::StdinLock<'static>, io::Stdout> {
    /// Creates a transport over stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> BlockingTransport<R, W> {
    /// Creates a transport over arbitrary streams.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line, blocking until one arrives.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        if self.reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        Ok(Some(decode_line(raw)))
    }

    /// Writes one message followed by a newline, then flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        let json = encode(message)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Consumes the transport, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

    fn nested_response() -> OutgoingMessage {
        JsonRpcResponse::success(
            RequestId::from(1),
            serde_json::json!({
                "message": "line one\nline two",
                "nested": {"key": "value"}
            }),
        )
        .into()
    }

    #[tokio::test]
    async fn reads_lines_without_terminators() {
        let input: &[u8] = b"first\r\nsecond\nthird";
        let mut transport = LineTransport::new(input, Vec::new());

        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_one_line_per_message() {
        let input: &[u8] = b"";
        let mut transport = LineTransport::new(input, Vec::new());
        transport.write_message(&nested_response()).await.unwrap();
        transport
            .write_message(&JsonRpcError::parse_error().into())
            .await
            .unwrap();

        let output = String::from_utf8(transport.into_writer()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(output.ends_with('\n'));
        assert!(lines[0].contains(r"line one\nline two"));
        assert!(lines[1].contains("-32700"));
    }

    #[test]
    fn blocking_round_trip_framing() {
        let input: &[u8] = b"{\"a\":1}\n\n";
        let mut transport = BlockingTransport::new(input, Vec::new());
        assert_eq!(transport.read_line().unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(transport.read_line().unwrap(), None);

        transport.write_message(&nested_response()).unwrap();
        let output = String::from_utf8(transport.into_writer()).unwrap();
        assert_eq!(output.matches('\n').count(), 1);
    }

    #[test]
    fn invalid_utf8_line_is_decoded_lossily() {
        let input: &[u8] = b"\xff\xfe garbage\r\nnext\n";
        let mut transport = BlockingTransport::new(input, Vec::new());
        assert_eq!(
            transport.read_line().unwrap().as_deref(),
            Some("\u{fffd}\u{fffd} garbage")
        );
        assert_eq!(transport.read_line().unwrap().as_deref(), Some("next"));
    }
}
