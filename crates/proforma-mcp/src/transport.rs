//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over stdin/stdout.

use std::io::{self, BufRead, Write};

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Message that can be received from the client.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Transport for reading/writing JSON-RPC messages.
pub struct StdioTransport {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
}

impl StdioTransport {
    /// Create a transport using stdin/stdout.
    pub fn stdio() -> Self {
        Self {
            reader: Box::new(io::BufReader::new(io::stdin())),
            writer: Box::new(io::stdout()),
        }
    }

    /// Create a transport with custom reader/writer (for testing).
    #[cfg(test)]
    pub fn new(reader: Box<dyn BufRead + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }

    /// Read a single JSON-RPC message from the transport.
    pub fn read_message(&mut self) -> io::Result<Option<IncomingMessage>> {
        let mut line = String::new();

        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None), // EOF
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    return Ok(None);
                }

                tracing::debug!("Received: {}", line);

                // Requests carry an id field, notifications do not.
                if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) {
                    return Ok(Some(IncomingMessage::Request(request)));
                }

                if let Ok(notification) = serde_json::from_str::<JsonRpcNotification>(line) {
                    return Ok(Some(IncomingMessage::Notification(notification)));
                }

                tracing::warn!("Failed to parse message: {}", line);
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid JSON-RPC message: {}", line),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Write a JSON-RPC response to the transport.
    pub fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        tracing::debug!("Sending: {}", json);

        writeln!(self.writer, "{}", json)?;
        self.writer.flush()
    }
}
