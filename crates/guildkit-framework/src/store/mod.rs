//! Per-community configuration storage.
//!
//! - [`GuildRecord`] is the configuration for one community.
//! - [`GuildStore`] owns every record and serialises mutation per community.
//! - [`GlobalConfig`] / [`SnapshotFile`] are the persisted form.

mod guild;
mod record;
mod snapshot;

pub use guild::{GuildStore, StoreStats};
pub use record::GuildRecord;
pub use snapshot::{GlobalConfig, SnapshotFile};

pub(crate) use snapshot::write_atomically;
