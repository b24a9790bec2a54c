pub mod batch;
pub mod client;
mod command;
pub mod config;
pub mod constraint;
pub mod error;
pub mod geopoint;
pub mod installation;
pub mod object;
pub mod pointer;
pub mod polygon;
pub mod query;
pub mod storage;
pub mod transport;
pub mod types;
pub mod user;

pub use client::CairnClient as Cairn; // Alias for convenience
pub use client::CairnClient;
pub use error::CairnError;

pub use batch::BATCH_SIZE;
pub use config::CairnConfig;
pub use constraint::{QueryConstraint, QueryWhere};
pub use geopoint::CairnGeoPoint;
pub use installation::{CairnInstallation, DeviceType};
pub use object::CairnObject;
pub use pointer::Pointer;
pub use polygon::CairnPolygon;
pub use query::{Order, Query, DEFAULT_LIMIT, FIND_ALL_BATCH_SIZE};
pub use storage::{LocalStore, MemoryStore};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use user::CairnUser;

// Re-export key types from the types module if needed directly
pub use types::CairnDate;
