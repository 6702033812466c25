//! Time-series sinks.
//!
//! The scheduler forwards every batch of gathered points to one
//! [`PointSink`]. Sink failures are logged by the caller and never retried.
//!
//! - [`StorageWriter`](crate::storage::StorageWriter): batching writer into
//!   the local SQLite `points` table
//! - [`InfluxSink`]: InfluxDB HTTP line protocol

mod influx;

use thiserror::Error;

use crate::model::Point;

pub use influx::{InfluxSink, escape_key, escape_measurement, line_protocol};

/// Errors that can occur while writing points.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writer queue is full; the batch was dropped.
    #[error("sink channel full, batch dropped")]
    ChannelFull,

    /// Writer has shut down.
    #[error("sink closed")]
    Closed,

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote endpoint refused the write.
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for measurement points.
#[async_trait::async_trait]
pub trait PointSink: Send + Sync {
    /// Write one batch of points.
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError>;
}
