//! Snapshot Engine
//!
//! Rendering of an event log into a raster image with a world-space offset
//! ([`render`]) and the asynchronous trigger that folds long logs into a
//! stored snapshot ([`compactor`]). Snapshots are advisory: they shorten
//! initial sync but never change replay semantics.

pub mod compactor;
pub mod render;

pub use compactor::Compactor;
pub use render::{render_snapshot, SnapshotImage};
