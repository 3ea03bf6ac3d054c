use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::{Bundle, KindDescriptor, Serial};

/// Aggregate counters for one kind.
///
/// `allocated` is signed: malformed notification sequences (a detach or
/// destroy without a matching attach) push it below zero, and reports surface
/// that as a warning instead of hiding it.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct LedgerCounters {
  pub allocated: i64,
  pub deallocated: u64,
}

impl LedgerCounters {
  fn on_attach(&mut self) {
    self.allocated = self.allocated.saturating_add(1);
  }

  fn on_detach(&mut self) {
    self.allocated = self.allocated.saturating_sub(1);
  }

  fn on_destroy(&mut self) {
    self.allocated = self.allocated.saturating_sub(1);
    self.deallocated = self.deallocated.saturating_add(1);
  }
}

/// Per-kind accounting: counters plus an optional index of live instances.
#[derive(Debug, Clone)]
pub struct KindLedger {
  counters: LedgerCounters,
  instances: Option<BTreeMap<Serial, Option<Bundle>>>,
  kind: KindDescriptor,
}

impl KindLedger {
  #[must_use]
  pub fn allocated(&self) -> i64 {
    self.counters.allocated
  }

  #[must_use]
  pub fn counters(&self) -> LedgerCounters {
    self.counters
  }

  #[must_use]
  pub fn deallocated(&self) -> u64 {
    self.counters.deallocated
  }

  /// Live `(serial, bundle)` pairs in ascending serial order.
  ///
  /// Empty when instance tracking is disabled.
  pub fn enumerate_live(
    &self,
  ) -> impl Iterator<Item = (Serial, Option<&Bundle>)> + '_ {
    self
      .instances
      .iter()
      .flat_map(BTreeMap::iter)
      .map(|(serial, bundle)| (*serial, bundle.as_ref()))
  }

  #[must_use]
  pub fn kind(&self) -> &KindDescriptor {
    &self.kind
  }

  /// Number of indexed instances, or `None` when tracking is disabled.
  #[must_use]
  pub fn live_count(&self) -> Option<usize> {
    self.instances.as_ref().map(BTreeMap::len)
  }

  #[must_use]
  pub fn new(kind: KindDescriptor) -> Self {
    Self {
      counters: LedgerCounters::default(),
      instances: None,
      kind,
    }
  }

  pub fn record_attach(&mut self, serial: Serial, bundle: Option<&Bundle>) {
    self.index(serial, bundle);
    self.counters.on_attach();
  }

  /// The instance leaves this ledger without being destroyed.
  pub fn record_detach(&mut self, serial: Serial, _bundle: Option<&Bundle>) {
    self.forget(serial);
    self.counters.on_detach();
  }

  pub fn record_destroy(&mut self, serial: Serial, _bundle: Option<&Bundle>) {
    self.forget(serial);
    self.counters.on_destroy();
  }

  pub fn record_update(&mut self, serial: Serial, bundle: Option<&Bundle>) {
    self.index(serial, bundle);
  }

  /// Turn the live-instance index on or off.
  ///
  /// Enabling starts from an empty index; instances attached while tracking
  /// was off are not recovered. Disabling discards the index. Counters are
  /// never touched.
  pub fn set_track_instances(&mut self, enabled: bool) {
    match (enabled, self.instances.is_some()) {
      (true, false) => self.instances = Some(BTreeMap::new()),
      (false, true) => self.instances = None,
      _ => {}
    }
  }

  #[must_use]
  pub fn track_instances(&self) -> bool {
    self.instances.is_some()
  }

  fn forget(&mut self, serial: Serial) {
    if let Some(instances) = self.instances.as_mut() {
      instances.remove(&serial);
    }
  }

  fn index(&mut self, serial: Serial, bundle: Option<&Bundle>) {
    if let Some(instances) = self.instances.as_mut() {
      instances.insert(serial, bundle.cloned());
    }
  }
}

#[cfg(test)]
mod tests {
  use {super::*, proptest::prelude::*, std::collections::BTreeSet};

  fn widget_ledger() -> KindLedger {
    KindLedger::new(KindDescriptor::new("Widget"))
  }

  fn live(ledger: &KindLedger) -> Vec<(Serial, Option<String>)> {
    ledger
      .enumerate_live()
      .map(|(serial, bundle)| (serial, bundle.map(|b| b.as_str().to_owned())))
      .collect()
  }

  #[test]
  fn attach_then_detach_does_not_count_as_deallocation() {
    let mut ledger = widget_ledger();

    ledger.record_attach(1, None);
    ledger.record_detach(1, None);

    assert_eq!(ledger.allocated(), 0);
    assert_eq!(ledger.deallocated(), 0);
  }

  #[test]
  fn destroy_moves_both_counters() {
    let mut ledger = widget_ledger();

    ledger.record_attach(1, None);
    ledger.record_attach(2, None);
    ledger.record_destroy(1, None);

    assert_eq!(
      ledger.counters(),
      LedgerCounters {
        allocated: 1,
        deallocated: 1,
      }
    );
  }

  #[test]
  fn update_leaves_counters_alone() {
    let mut ledger = widget_ledger();

    ledger.record_update(4, Some(&Bundle::from("x")));

    assert_eq!(ledger.counters(), LedgerCounters::default());
  }

  #[test]
  fn tracked_instances_follow_attach_and_destroy() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);

    ledger.record_attach(5, Some(&Bundle::from("x")));
    assert_eq!(live(&ledger), vec![(5, Some("x".to_owned()))]);

    ledger.record_destroy(5, Some(&Bundle::from("x")));
    assert!(live(&ledger).is_empty());
  }

  #[test]
  fn update_replaces_bundle() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);

    ledger.record_attach(5, Some(&Bundle::from("old")));
    ledger.record_update(5, Some(&Bundle::from("new")));

    assert_eq!(live(&ledger), vec![(5, Some("new".to_owned()))]);
    assert_eq!(ledger.allocated(), 1);
  }

  #[test]
  fn untracked_ledger_enumerates_nothing() {
    let mut ledger = widget_ledger();

    ledger.record_attach(1, Some(&Bundle::from("x")));

    assert!(!ledger.track_instances());
    assert_eq!(ledger.live_count(), None);
    assert_eq!(ledger.enumerate_live().count(), 0);
  }

  #[test]
  fn toggling_tracking_resets_the_index_but_not_counters() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);
    ledger.record_attach(1, None);
    ledger.record_attach(2, None);

    ledger.set_track_instances(false);
    ledger.set_track_instances(true);

    assert_eq!(ledger.live_count(), Some(0));
    assert_eq!(ledger.allocated(), 2);
  }

  #[test]
  fn enabling_twice_keeps_existing_instances() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);
    ledger.record_attach(1, None);

    ledger.set_track_instances(true);

    assert_eq!(ledger.live_count(), Some(1));
  }

  #[test]
  fn unknown_serial_still_moves_counters() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);

    ledger.record_detach(99, None);
    ledger.record_destroy(100, None);

    assert_eq!(ledger.allocated(), -2);
    assert_eq!(ledger.deallocated(), 1);
    assert_eq!(ledger.live_count(), Some(0));
  }

  #[test]
  fn live_instances_are_sorted_by_serial() {
    let mut ledger = widget_ledger();
    ledger.set_track_instances(true);

    for serial in [30, 10, 20] {
      ledger.record_attach(serial, None);
    }

    let serials: Vec<_> = ledger.enumerate_live().map(|(s, _)| s).collect();
    assert_eq!(serials, vec![10, 20, 30]);
  }

  proptest! {
    #[test]
    fn attach_destroy_pairs_balance(
      serials in prop::collection::btree_set(any::<Serial>(), 0..64)
    ) {
      let mut ledger = widget_ledger();
      ledger.set_track_instances(true);

      for serial in &serials {
        ledger.record_attach(*serial, None);
      }
      for serial in &serials {
        ledger.record_destroy(*serial, None);
      }

      prop_assert_eq!(ledger.allocated(), 0);
      prop_assert_eq!(ledger.deallocated(), serials.len() as u64);
      prop_assert_eq!(ledger.live_count(), Some(0));
    }

    #[test]
    fn index_matches_outstanding_serials(
      attached in prop::collection::btree_set(0u64..256, 0..64),
      destroyed in prop::collection::btree_set(0u64..256, 0..64),
    ) {
      let mut ledger = widget_ledger();
      ledger.set_track_instances(true);

      for serial in &attached {
        ledger.record_attach(*serial, None);
      }
      let gone: BTreeSet<_> =
        attached.intersection(&destroyed).copied().collect();
      for serial in &gone {
        ledger.record_destroy(*serial, None);
      }

      let expected: Vec<_> = attached.difference(&gone).copied().collect();
      let actual: Vec<_> = ledger.enumerate_live().map(|(s, _)| s).collect();
      prop_assert_eq!(actual, expected);
      prop_assert_eq!(ledger.allocated(), (attached.len() - gone.len()) as i64);
    }
  }
}
