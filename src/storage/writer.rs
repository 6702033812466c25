//! Non-blocking point writer facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::model::Point;
use crate::sink::{PointSink, SinkError};
use crate::storage::actor::Command;

/// Non-blocking storage writer.
///
/// Uses `try_send`: a batch is dropped (and counted) if the channel is full.
/// Points are buffered by the actor and flushed by size or time.
#[derive(Clone)]
pub struct StorageWriter {
    tx: mpsc::Sender<Command>,
    dropped_batches: Arc<AtomicU64>,
}

impl std::fmt::Debug for StorageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWriter")
            .field("dropped_batches", &self.dropped_batches())
            .finish_non_exhaustive()
    }
}

impl StorageWriter {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self {
            tx,
            dropped_batches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total batches dropped because the channel was full.
    pub fn dropped_batches(&self) -> u64 {
        self.dropped_batches.load(Ordering::Relaxed)
    }

    /// Queue points for insertion without waiting.
    pub fn insert_points(&self, points: Vec<Point>) -> Result<(), SinkError> {
        match self.tx.try_send(Command::Insert(points)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_batches.fetch_add(1, Ordering::Relaxed);
                Err(SinkError::ChannelFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    /// Flush everything queued so far and wait until it is written.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .await
            .map_err(|_| SinkError::Closed)?;
        ack_rx.await.map_err(|_| SinkError::Closed)
    }

    /// Ask the actor to flush and stop.
    pub(crate) fn shutdown(&self) -> Result<(), SinkError> {
        self.tx
            .try_send(Command::Shutdown)
            .map_err(|_| SinkError::Closed)
    }
}

#[async_trait::async_trait]
impl PointSink for StorageWriter {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        self.insert_points(points.to_vec())
    }
}
