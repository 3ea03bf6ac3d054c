//! Core library entry point for object lifecycle accounting.
//!
//! Tracked objects report `attached`, `updated`, `detached` and `destroyed`
//! events to a [`Tracker`]. The bundled [`TrackingRegistry`] keeps per-kind
//! counters, optionally indexes live instances, and produces reports that are
//! diffed against the previous report.

mod config;
mod event;
mod export;
mod ledger;
mod registry;
mod report;
mod trackable;
mod tracker;

use {
  serde::{Serialize, Serializer, ser::SerializeStruct},
  std::{
    fmt::{self, Display, Formatter},
    io::{self, Write},
    sync::Arc,
    time::SystemTime,
  },
};

pub use {
  config::{TRACK_ENV_VAR, TrackerConfig},
  event::{Bundle, EventKind, KindDescriptor, Notification, Serial},
  export::{ExportError, JsonLinesWriter, ReportSink, TextWriter},
  ledger::{KindLedger, LedgerCounters},
  registry::{TrackerBuilder, TrackingRegistry},
  report::{Delta, LiveInstance, Report, ReportRow, ReportWarning},
  trackable::{SerialSource, Trackable, TrackerSlot},
  tracker::Tracker,
};
