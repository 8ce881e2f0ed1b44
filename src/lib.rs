//! Pinboard: a local, persisted record store with derived dashboard tables.
//!
//! Data flows one way:
//! user action -> `RecordStore` mutation -> persisted snapshot -> change event
//! -> `view` recomputes the derived tables -> the host re-renders.
//!
//! The presentation layer, camera/gallery access and geocoding live in the host.

pub mod region;
pub mod state;
pub mod view;

pub use state::config::StoreConfig;
pub use state::data::{GeoFix, NewRecord, Record, RecordFilter, RecordId, RecordPatch, Status};
pub use state::error::{ParseError, StorageError, StoreError};
pub use state::slot::{MemorySlot, SnapshotSlot, SqliteSlot};
pub use state::store::{RecordStore, Snapshot};
pub use view::dashboard::{Dashboard, DashboardOptions};
pub use view::refresh::{spawn_refresh, RefreshHandle};
