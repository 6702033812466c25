//! Domain model.
//!
//! - [`Host`]: a target system, reached through a transport
//! - [`Monitor`]: a job bound to a host on a fixed interval, with schedule state
//! - [`Job`]: agent selection plus configuration
//! - [`Point`]: a single timestamped, tagged measurement
//! - [`ObjectId`]: 24-hex-character document identifier

mod host;
mod id;
mod monitor;
mod point;

pub use host::{Host, LOCAL_HOST_NAME, LOCAL_TRANSPORT_ID};
pub use id::{InvalidIdError, LOCAL_HOST_ID, ObjectId};
pub use monitor::{Job, Monitor, Readiness};
pub use point::{Point, round};
