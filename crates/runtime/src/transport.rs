//! Line-delimited JSON transport.
//!
//! The engine pipe carries one JSON object per line, UTF-8, newline
//! terminated, with no length prefix: the line boundary is the only framing.
//! The codec is generic over the underlying byte stream so it can run over
//! the named pipe in production and `tokio::io::duplex` in tests.
//!
//! Reads may deliver zero, one, or many complete lines, or a fragment of
//! one; the receiver keeps a trailing partial line buffered across reads.
//! A line that fails to decode is discarded with a warning - a malformed
//! peer message must never terminate the stream.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::Result;

#[cfg(test)]
mod tests;

/// Both halves of the codec, produced from a freshly split stream.
pub struct LineTransport<W, R> {
	sender: LineSender<W>,
	receiver: LineReceiver<R>,
}

impl<W, R> LineTransport<W, R>
where
	W: AsyncWrite + Unpin,
	R: AsyncRead + Unpin,
{
	/// Wraps a writer/reader pair. Decoded values arrive on the returned
	/// channel once [`LineReceiver::run`] is driven.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: LineSender { writer },
			receiver: LineReceiver { reader, buf: Vec::new(), tx },
		};
		(transport, rx)
	}

	/// Splits into independent halves so reading and writing can live on
	/// different tasks. Writes must still be serialized through the single
	/// sender: the wire has no message IDs, so interleaved writers would
	/// corrupt the framing.
	pub fn into_parts(self) -> (LineSender<W>, LineReceiver<R>) {
		(self.sender, self.receiver)
	}
}

/// Writing half: one envelope per call, one line per envelope.
pub struct LineSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin> LineSender<W> {
	/// Serializes `envelope` to a single JSON line and writes it as one
	/// newline-terminated frame.
	pub async fn send<T: Serialize>(&mut self, envelope: &T) -> Result<()> {
		let mut frame = serde_json::to_vec(envelope)?;
		frame.push(b'\n');
		self.writer.write_all(&frame).await?;
		self.writer.flush().await?;
		Ok(())
	}
}

/// Reading half: accumulates bytes and emits decoded lines.
pub struct LineReceiver<R> {
	reader: R,
	buf: Vec<u8>,
	tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin> LineReceiver<R> {
	/// Runs the read loop until EOF, an I/O error, or the receiving side of
	/// the decoded-value channel is dropped.
	///
	/// Returns `Ok(())` on clean EOF or channel close; I/O errors propagate.
	pub async fn run(mut self) -> Result<()> {
		let mut chunk = [0u8; 8192];
		loop {
			let n = self.reader.read(&mut chunk).await?;
			if n == 0 {
				// EOF; a trailing unterminated fragment is dropped.
				if !self.buf.is_empty() {
					tracing::debug!(bytes = self.buf.len(), "pipe closed mid-line");
				}
				return Ok(());
			}
			self.buf.extend_from_slice(&chunk[..n]);
			if !self.drain_lines() {
				return Ok(());
			}
		}
	}

	/// Decodes every complete line currently buffered. Returns `false` when
	/// the consumer is gone and reading should stop.
	fn drain_lines(&mut self) -> bool {
		while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = self.buf.drain(..=pos).collect();
			let mut line = &line[..line.len() - 1];
			if line.last() == Some(&b'\r') {
				line = &line[..line.len() - 1];
			}
			if line.is_empty() {
				continue;
			}
			match serde_json::from_slice::<Value>(line) {
				Ok(value) => {
					if self.tx.send(value).is_err() {
						return false;
					}
				}
				Err(err) => {
					tracing::warn!(
						error = %err,
						line = %String::from_utf8_lossy(line),
						"discarding malformed pipe line"
					);
				}
			}
		}
		true
	}
}
