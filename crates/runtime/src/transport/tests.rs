use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use super::*;

fn transport_over_duplex() -> (
	LineSender<tokio::io::DuplexStream>,
	LineReceiver<tokio::io::DuplexStream>,
	mpsc::UnboundedReceiver<Value>,
	tokio::io::DuplexStream,
	tokio::io::DuplexStream,
) {
	// Two pipes: one the sender writes into, one we feed the receiver from.
	let (sent_read, sent_write) = tokio::io::duplex(64 * 1024);
	let (recv_read, recv_write) = tokio::io::duplex(64 * 1024);
	let (transport, rx) = LineTransport::new(sent_write, recv_read);
	let (sender, receiver) = transport.into_parts();
	(sender, receiver, rx, sent_read, recv_write)
}

#[tokio::test]
async fn send_writes_one_newline_terminated_frame() {
	let (mut sender, _receiver, _rx, sent_read, _w) = transport_over_duplex();

	sender.send(&serde_json::json!({"type": "close"})).await.unwrap();
	drop(sender);

	let mut raw = Vec::new();
	let mut read = sent_read;
	tokio::io::AsyncReadExt::read_to_end(&mut read, &mut raw).await.unwrap();
	assert_eq!(raw, b"{\"type\":\"close\"}\n");
}

#[tokio::test]
async fn many_lines_in_one_chunk() {
	let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
	let task = tokio::spawn(receiver.run());

	feed.write_all(b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n").await.unwrap();
	drop(feed);

	for id in 1..=3 {
		let value = rx.recv().await.unwrap();
		assert_eq!(value["id"], id);
	}
	assert!(rx.recv().await.is_none());
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn line_split_across_chunks() {
	let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
	let task = tokio::spawn(receiver.run());

	feed.write_all(b"{\"url\":\"https://exa").await.unwrap();
	feed.flush().await.unwrap();
	// A chunk with zero newlines must leave the fragment buffered.
	tokio::task::yield_now().await;
	feed.write_all(b"mple.com\"}\n").await.unwrap();
	drop(feed);

	let value = rx.recv().await.unwrap();
	assert_eq!(value["url"], "https://example.com");
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn chunk_concatenation_matches_line_split() {
	// Feed the same byte sequence in awkward chunk sizes and verify the
	// decoded sequence is exactly the lines of the concatenation.
	let lines = [
		serde_json::json!({"type": "ready"}),
		serde_json::json!({"type": "navigated", "url": "https://a.example"}),
		serde_json::json!({"type": "mediaStateChanged", "payload": {"state": "playing"}}),
	];
	let mut wire = Vec::new();
	for line in &lines {
		wire.extend_from_slice(serde_json::to_string(line).unwrap().as_bytes());
		wire.push(b'\n');
	}

	for chunk_size in [1, 2, 7, wire.len()] {
		let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
		let task = tokio::spawn(receiver.run());

		for chunk in wire.chunks(chunk_size) {
			feed.write_all(chunk).await.unwrap();
			feed.flush().await.unwrap();
		}
		drop(feed);

		for expected in &lines {
			assert_eq!(&rx.recv().await.unwrap(), expected, "chunk size {chunk_size}");
		}
		assert!(rx.recv().await.is_none());
		task.await.unwrap().unwrap();
	}
}

#[tokio::test]
async fn malformed_line_is_skipped() {
	let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
	let task = tokio::spawn(receiver.run());

	feed.write_all(b"{\"id\":1}\nnot json at all\n{\"id\":2}\n").await.unwrap();
	drop(feed);

	assert_eq!(rx.recv().await.unwrap()["id"], 1);
	// The malformed line produces nothing; decoding continues.
	assert_eq!(rx.recv().await.unwrap()["id"], 2);
	assert!(rx.recv().await.is_none());
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn blank_and_crlf_lines() {
	let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
	let task = tokio::spawn(receiver.run());

	feed.write_all(b"\n{\"id\":1}\r\n\n").await.unwrap();
	drop(feed);

	assert_eq!(rx.recv().await.unwrap()["id"], 1);
	assert!(rx.recv().await.is_none());
	task.await.unwrap().unwrap();
}

#[tokio::test]
async fn eof_drops_trailing_fragment() {
	let (_sender, receiver, mut rx, _r, mut feed) = transport_over_duplex();
	let task = tokio::spawn(receiver.run());

	feed.write_all(b"{\"id\":1}\n{\"trunc").await.unwrap();
	drop(feed);

	assert_eq!(rx.recv().await.unwrap()["id"], 1);
	assert!(rx.recv().await.is_none());
	task.await.unwrap().unwrap();
}
