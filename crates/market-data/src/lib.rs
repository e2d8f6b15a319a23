//! Market-data boundary: where snapshots come from and which tickers to scan.

pub mod provider;
pub mod universe;

pub use provider::{FileSnapshotProvider, SnapshotProvider};
pub use universe::{normalize_symbol, parse_tickers};
