use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::config::TrackerConfig;
use crate::event::{Bundle, EventKind, KindDescriptor, Notification, Serial};
use crate::ledger::{KindLedger, LedgerCounters};
use crate::report::{Delta, LiveInstance, Report, ReportRow, ReportWarning};
use crate::tracker::Tracker;

/// Builder over `TrackerConfig` for the common knobs.
#[derive(Debug, Default)]
pub struct TrackerBuilder {
  config: TrackerConfig,
}

impl TrackerBuilder {
  #[must_use]
  pub fn new() -> Self {
    Self {
      config: TrackerConfig::default(),
    }
  }

  #[must_use]
  pub fn with_config(mut self, config: TrackerConfig) -> Self {
    self.config = config;
    self
  }

  #[must_use]
  pub fn track(mut self, kind_name: impl Into<String>) -> Self {
    self.config.tracked_kinds.push(kind_name.into());
    self
  }

  #[must_use]
  pub fn name_width(mut self, width: usize) -> Self {
    self.config.name_width = width;
    self
  }

  #[must_use]
  pub fn warn_on_negative(mut self, warn: bool) -> Self {
    self.config.warn_on_negative = warn;
    self
  }

  #[must_use]
  pub fn finish(self) -> TrackingRegistry {
    TrackingRegistry::with_config(self.config)
  }
}

type Baseline = HashMap<Arc<str>, LedgerCounters>;

#[derive(Debug, Default)]
struct RegistryState {
  ledgers: BTreeMap<Arc<str>, KindLedger>,
  last_snapshot: Option<Baseline>,
}

impl RegistryState {
  fn capture(&self) -> Baseline {
    self
      .ledgers
      .iter()
      .map(|(name, ledger)| (Arc::clone(name), ledger.counters()))
      .collect()
  }

  fn compose(&self, config: &TrackerConfig) -> Report {
    let baseline = self.last_snapshot.as_ref();
    let mut rows = Vec::with_capacity(self.ledgers.len());
    let mut warnings = Vec::new();

    for (name, ledger) in &self.ledgers {
      let previous = baseline.and_then(|baseline| baseline.get(name));
      let counters = ledger.counters();

      if counters.allocated < 0 {
        if config.warn_on_negative {
          tracing::warn!(
            kind = %name,
            allocated = counters.allocated,
            "allocated count went negative"
          );
        }

        warnings.push(ReportWarning::NegativeAllocated {
          kind_name: Arc::clone(name),
          allocated: counters.allocated,
        });
      }

      rows.push(ReportRow {
        kind_name: Arc::clone(name),
        allocated: Delta::new(
          counters.allocated,
          previous.map(|previous| previous.allocated),
        ),
        deallocated: Delta::new(
          counters.deallocated,
          previous.map(|previous| previous.deallocated),
        ),
        live_instances: live_instances(ledger),
      });
    }

    Report::new(rows, warnings, config.name_width)
  }

  fn ledger_mut(&mut self, kind: &KindDescriptor) -> &mut KindLedger {
    self.ledgers.entry(kind.shared_name()).or_insert_with(|| {
      tracing::debug!(kind = %kind, "creating ledger");
      KindLedger::new(kind.clone())
    })
  }
}

fn live_instances(ledger: &KindLedger) -> Option<Vec<LiveInstance>> {
  ledger.track_instances().then(|| {
    ledger
      .enumerate_live()
      .map(|(serial, bundle)| LiveInstance {
        serial,
        bundle: bundle.cloned(),
      })
      .collect()
  })
}

#[derive(Debug)]
struct RegistryInner {
  config: TrackerConfig,
  state: Mutex<RegistryState>,
}

/// Per-kind lifecycle accounting with snapshot-diff reports.
///
/// Handles are cheap to clone and share one underlying state; every call to
/// [`TrackingRegistry::new`] allocates a fresh, independent one. All reads and
/// writes go through a single mutex, so a report never observes half of a
/// concurrent notification.
#[derive(Clone, Debug)]
pub struct TrackingRegistry {
  inner: Arc<RegistryInner>,
}

impl Default for TrackingRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl TrackingRegistry {
  #[must_use]
  pub fn builder() -> TrackerBuilder {
    TrackerBuilder::new()
  }

  #[must_use]
  pub fn config(&self) -> &TrackerConfig {
    &self.inner.config
  }

  /// Stop indexing live instances of `kind`. Unknown kinds are ignored.
  pub fn disable_tracking_for(&self, kind: &KindDescriptor) {
    let mut state = self.lock();

    if let Some(ledger) = state.ledgers.get_mut(kind.name()) {
      ledger.set_track_instances(false);
      tracing::debug!(kind = %kind, "instance tracking disabled");
    }
  }

  /// Index live instances of `kind` from now on.
  ///
  /// Counting works for every kind without this call; it only adds the
  /// per-instance detail to reports.
  pub fn enable_tracking_for(&self, kind: &KindDescriptor) {
    let mut state = self.lock();
    state.ledger_mut(kind).set_track_instances(true);
    tracing::debug!(kind = %kind, "instance tracking enabled");
  }

  /// Compose a report diffed against the previous one, then make the current
  /// counters the baseline for the next call.
  #[must_use]
  pub fn generate_report(&self) -> Report {
    let mut state = self.lock();
    let report = state.compose(&self.inner.config);
    state.last_snapshot = Some(state.capture());

    tracing::trace!(rows = report.rows().len(), "report generated");

    report
  }

  #[must_use]
  pub fn kind_names(&self) -> Vec<String> {
    self.lock().ledgers.keys().map(|name| name.to_string()).collect()
  }

  #[must_use]
  pub fn ledger_counters(&self, kind_name: &str) -> Option<LedgerCounters> {
    self.lock().ledgers.get(kind_name).map(KindLedger::counters)
  }

  /// Live instances of a kind, or `None` if the kind is unknown or untracked.
  #[must_use]
  pub fn live_instances(&self, kind_name: &str) -> Option<Vec<LiveInstance>> {
    self.lock().ledgers.get(kind_name).and_then(live_instances)
  }

  #[must_use]
  pub fn new() -> Self {
    Self::with_config(TrackerConfig::default())
  }

  /// Compose a report without moving the baseline.
  #[must_use]
  pub fn peek_report(&self) -> Report {
    self.lock().compose(&self.inner.config)
  }

  /// Forget the last baseline; the next report shows plain values.
  pub fn reset_baseline(&self) {
    self.lock().last_snapshot = None;
  }

  #[must_use]
  pub fn with_config(config: TrackerConfig) -> Self {
    let mut state = RegistryState::default();

    for name in &config.tracked_kinds {
      state
        .ledger_mut(&KindDescriptor::new(name.as_str()))
        .set_track_instances(true);
    }

    let inner = RegistryInner {
      config,
      state: Mutex::new(state),
    };

    Self {
      inner: Arc::new(inner),
    }
  }

  fn lock(&self) -> MutexGuard<'_, RegistryState> {
    // Poisoning is ignored: ledger updates are single statements.
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn with_ledger(
    &self,
    kind: &KindDescriptor,
    apply: impl FnOnce(&mut KindLedger),
  ) {
    apply(self.lock().ledger_mut(kind));
  }
}

impl Tracker for TrackingRegistry {
  /// Applies the whole batch under a single lock acquisition.
  fn ingest(&self, notifications: &[Notification]) {
    let mut state = self.lock();

    for notification in notifications {
      let bundle = notification.bundle.as_ref();
      let ledger = state.ledger_mut(&notification.kind);
      let serial = notification.serial;

      match notification.event {
        EventKind::Attached => ledger.record_attach(serial, bundle),
        EventKind::Detached => ledger.record_detach(serial, bundle),
        EventKind::Updated => ledger.record_update(serial, bundle),
        EventKind::Destroyed => ledger.record_destroy(serial, bundle),
      }
    }
  }

  fn on_attached(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  ) {
    self.with_ledger(kind, |ledger| ledger.record_attach(serial, bundle));
  }

  fn on_detached(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  ) {
    self.with_ledger(kind, |ledger| ledger.record_detach(serial, bundle));
  }

  fn on_destroyed(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  ) {
    self.with_ledger(kind, |ledger| ledger.record_destroy(serial, bundle));
  }

  fn on_updated(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  ) {
    self.with_ledger(kind, |ledger| ledger.record_update(serial, bundle));
  }
}
