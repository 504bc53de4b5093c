//! Bounded in-memory handoff between a blocking producer and an async consumer.
//!
//! The producer side implements [`std::io::Write`] so the archive writer can
//! stream straight into it from a blocking task. Sends block once `capacity`
//! chunks are queued. Dropping the writer closes the stream; a producer
//! failure travels down the same channel and becomes the consumer's error.

use bytes::{Bytes, BytesMut};
use relay_core::{Error, Result};
use std::io::{self, Write};
use tokio::sync::mpsc;

/// Bytes buffered before a chunk is handed to the consumer.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks queued before the producer blocks.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

type Chunk = Result<Bytes>;

/// Create a connected writer/reader pair holding at most `capacity` chunks.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter {
            tx,
            buffer: BytesMut::with_capacity(CHUNK_SIZE),
        },
        PipeReader { rx },
    )
}

/// Producer end. Must be driven from a blocking context.
pub struct PipeWriter {
    tx: mpsc::Sender<Chunk>,
    buffer: BytesMut,
}

/// Handle for reporting a producer failure after the writer has been moved.
#[derive(Clone)]
pub struct PipeFailure {
    tx: mpsc::Sender<Chunk>,
}

/// Consumer end.
pub struct PipeReader {
    rx: mpsc::Receiver<Chunk>,
}

impl PipeWriter {
    pub fn failure_handle(&self) -> PipeFailure {
        PipeFailure {
            tx: self.tx.clone(),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

impl PipeFailure {
    /// Forward `err` to the consumer. Ignored if the consumer is gone.
    pub fn fail(&self, err: Error) {
        let _ = self.tx.blocking_send(Err(err));
    }
}

impl PipeReader {
    /// Next chunk, `None` once every writer handle is dropped.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        self.rx.recv().await
    }

    /// Drain the stream, failing with the first error the producer reported.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bytes_arrive_in_order() {
        let (mut writer, reader) = pipe(2);
        let producer = tokio::task::spawn_blocking(move || {
            for i in 0..200u32 {
                writer.write_all(&vec![(i % 251) as u8; 1024]).unwrap();
            }
            writer.flush().unwrap();
        });

        let body = reader.read_to_end().await.unwrap();
        producer.await.unwrap();

        assert_eq!(body.len(), 200 * 1024);
        assert_eq!(body[0], 0);
        assert_eq!(body[199 * 1024], 199);
    }

    #[tokio::test]
    async fn test_producer_error_reaches_consumer() {
        let (mut writer, reader) = pipe(1);
        let failure = writer.failure_handle();
        tokio::task::spawn_blocking(move || {
            writer.write_all(b"partial").unwrap();
            writer.flush().unwrap();
            drop(writer);
            failure.fail(Error::Internal("disk vanished".into()));
        });

        let err = reader.read_to_end().await.unwrap_err();
        assert!(err.to_string().contains("disk vanished"));
    }

    #[tokio::test]
    async fn test_writer_sees_dropped_reader() {
        let (mut writer, reader) = pipe(1);
        drop(reader);
        let result = tokio::task::spawn_blocking(move || {
            writer.write_all(&vec![0u8; CHUNK_SIZE])
        })
        .await
        .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_producer_blocks_when_full() {
        let (mut writer, mut reader) = pipe(1);
        let producer = tokio::task::spawn_blocking(move || {
            for _ in 0..3 {
                writer.write_all(&vec![1u8; CHUNK_SIZE]).unwrap();
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!producer.is_finished(), "producer should wait for the consumer");

        let mut received = 0;
        while let Some(chunk) = reader.next_chunk().await {
            received += chunk.unwrap().len();
        }
        producer.await.unwrap();
        assert_eq!(received, 3 * CHUNK_SIZE);
    }
}
