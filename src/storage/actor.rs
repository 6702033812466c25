//! Point writer actor with MPSC channel.
//!
//! Single-writer pattern: one tokio task owns all appends to the `points`
//! table and processes commands via MPSC. Points are buffered and flushed
//! when the buffer reaches the batch size or the flush interval elapses.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::model::Point;
use crate::storage::StorageError;
use crate::storage::db::SqlitePool;

// =============================================================================
// Constants
// =============================================================================

/// Default maximum points in buffer before flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default maximum time before buffer flush.
pub const DEFAULT_BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// How long the actor sleeps when there is nothing to flush.
const IDLE_WAIT: Duration = Duration::from_secs(60);

// =============================================================================
// Commands
// =============================================================================

/// Commands sent to the writer actor.
#[derive(Debug)]
pub enum Command {
    /// Append a batch of points (buffered).
    Insert(Vec<Point>),
    /// Flush the buffer, then acknowledge.
    Flush(oneshot::Sender<()>),
    /// Flush and stop.
    Shutdown,
}

// =============================================================================
// Buffer
// =============================================================================

/// Buffer for batch inserts with time-based and size-based flushing.
struct BatchBuffer<T> {
    items: Vec<T>,
    last_flush: Instant,
    batch_size: usize,
    flush_interval: Duration,
}

impl<T> BatchBuffer<T> {
    fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            items: Vec::with_capacity(batch_size),
            last_flush: Instant::now(),
            batch_size,
            flush_interval,
        }
    }

    fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        // Reset flush timer on first item to avoid treating long-idle buffers as overdue
        if self.items.is_empty() {
            self.last_flush = Instant::now();
        }
        self.items.extend(items);
    }

    fn should_flush(&self) -> bool {
        self.items.len() >= self.batch_size
            || (!self.items.is_empty() && self.last_flush.elapsed() >= self.flush_interval)
    }

    fn deadline(&self) -> Instant {
        if self.items.is_empty() {
            Instant::now() + IDLE_WAIT
        } else {
            self.last_flush + self.flush_interval
        }
    }

    fn take(&mut self) -> Vec<T> {
        self.last_flush = Instant::now();
        std::mem::take(&mut self.items)
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Database writer actor for measurement points.
pub struct PointWriterActor {
    pool: SqlitePool,
    rx: mpsc::Receiver<Command>,
    buffer: BatchBuffer<Point>,
}

impl PointWriterActor {
    /// Spawn the writer actor task.
    ///
    /// The schema must already exist on `pool`.
    pub fn spawn(
        pool: SqlitePool,
        channel_capacity: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (JoinHandle<()>, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let actor = Self {
            pool,
            rx,
            buffer: BatchBuffer::new(batch_size.max(1), flush_interval),
        };
        let handle = tokio::spawn(actor.run());
        (handle, tx)
    }

    async fn run(mut self) {
        tracing::info!("Point writer started");

        loop {
            let deadline = self.buffer.deadline();

            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(cmd)) => {
                    if self.handle_command(cmd).await {
                        break; // Shutdown requested
                    }
                }
                Ok(None) => {
                    tracing::warn!("Channel disconnected, shutting down");
                    self.flush().await;
                    break;
                }
                Err(_) => {
                    // Timeout: flush overdue
                }
            }

            if self.buffer.should_flush() {
                self.flush().await;
            }
        }

        tracing::info!("Point writer stopped");
    }

    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Insert(points) => {
                self.buffer.extend(points);
            }
            Command::Flush(ack) => {
                self.flush().await;
                let _ = ack.send(());
            }
            Command::Shutdown => {
                tracing::info!("Point writer shutting down");
                self.flush().await;
                return true;
            }
        }
        false
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let points = self.buffer.take();
        if let Err(e) = insert_batch(&self.pool, &points).await {
            tracing::error!(error = %e, count = points.len(), "Points batch insert failed");
        }
    }
}

/// Append points in one transaction.
async fn insert_batch(pool: &SqlitePool, points: &[Point]) -> Result<(), StorageError> {
    let mut tx = pool.inner().begin().await?;
    for p in points {
        sqlx::query("INSERT INTO points (ts, name, tags, value) VALUES (?, ?, ?, ?)")
            .bind(p.time.timestamp_micros())
            .bind(&p.name)
            .bind(serde_json::to_string(&p.tags)?)
            .bind(p.value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::debug!(count = points.len(), "Points batch inserted");
    Ok(())
}
