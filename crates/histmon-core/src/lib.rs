//! # histmon-core
//!
//! **Turn periodic monitor snapshots into interval reports.**
//!
//! A collector writes one comma-delimited file per counter-group every few
//! minutes, into hourly directories. Counters in those files are cumulative;
//! `histmon-core` turns them back into per-interval activity.
//!
//! ## Quick Start
//!
//! ```no_run
//! use histmon_core::{
//!     Detail, FixedDecision, LobResolver, RenderOptions, Renderer, ReportKind, ReportParams,
//! };
//!
//! let params = ReportParams::new("/var/db2dump/IBMHIST_SAMPLE", ReportKind::DbSummary);
//! let lobs = LobResolver::for_dir(&params.base);
//! let mut renderer = Renderer::new(std::io::stdout(), RenderOptions::default(), lobs);
//! let _data = histmon_core::report::run(&mut renderer, &params, &mut FixedDecision(Detail::Full))
//!     .expect("report");
//! ```
//!
//! ## Architecture
//!
//! Loader → Normalizer → Differencer → Renderer
//!
//! - The **loader** finds the `<group>_*.del` files of one counter-group and
//!   parses them into typed records keyed by context (member, connection,
//!   statement).
//! - The **normalizer** sums contexts that collapse onto one key, builds the
//!   shared time axis and fills gaps so every context has one row per bucket.
//! - The **differencer** subtracts each row from the row `period` buckets later.
//! - The **renderer** prints series with leave-one-out outlier flags and
//!   resolves large-object references into inline text.
//!
//! The `report` module wires those stages into the `dbsummary`, `connection`
//! and `pkgcache` sections; `tabulate` prints raw rows without any of them.

pub mod diff;
pub mod error;
pub mod loader;
pub mod lob;
pub mod normalize;
pub mod render;
pub mod report;
pub mod snapshot;
pub mod tabulate;
pub mod tasks;
pub mod timestamp;

pub use diff::{Differenced, DifferencedFrame, DifferencedRecord, difference};
pub use error::{ReportError, Result};
pub use loader::{LoadOptions, RawTable, load_group, read_group};
pub use lob::{BlobSource, DirBlobSource, LobResolver};
pub use normalize::{Normalized, TimeAxis, fold_contexts, normalize};
pub use render::{OutputSink, RenderOptions, Renderer, Separator, Table};
pub use report::{
    Detail, DetailDecision, FixedDecision, ReportData, ReportKind, ReportParams, StatementPeak,
};
pub use snapshot::{ContextKey, FieldKind, RecordFilter, Schema, SnapshotSet, Value};
pub use tabulate::{ParseDisplay, ParseOptions, Tabulated, tabulate};
pub use timestamp::TimeRange;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
