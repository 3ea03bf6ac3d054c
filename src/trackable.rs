use std::{
  fmt::{self, Debug, Formatter},
  sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
  },
};

use crate::event::{Bundle, KindDescriptor, Serial};
use crate::tracker::Tracker;

/// Hands out serials, starting at 1.
#[derive(Debug)]
pub struct SerialSource {
  next: AtomicU64,
}

impl Default for SerialSource {
  fn default() -> Self {
    Self::new()
  }
}

impl SerialSource {
  #[must_use]
  pub fn new() -> Self {
    Self {
      next: AtomicU64::new(1),
    }
  }

  pub fn next_serial(&self) -> Serial {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

/// A tracked object's lifecycle identity.
///
/// Embed one in a domain object (or wrap the object's lifetime in one) to
/// report it to a tracker: construction attaches, [`Trackable::set_tracker`]
/// hands the object over, [`Trackable::set_bundle`] updates it, and dropping
/// the value reports it destroyed.
pub struct Trackable {
  bundle: Option<Bundle>,
  kind: KindDescriptor,
  serial: Serial,
  tracker: Option<Arc<dyn Tracker>>,
}

impl Debug for Trackable {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Trackable")
      .field("bundle", &self.bundle)
      .field("kind", &self.kind)
      .field("serial", &self.serial)
      .field("tracked", &self.tracker.is_some())
      .finish()
  }
}

impl Trackable {
  #[must_use]
  pub fn bundle(&self) -> Option<&Bundle> {
    self.bundle.as_ref()
  }

  #[must_use]
  pub fn kind(&self) -> &KindDescriptor {
    &self.kind
  }

  /// Create the identity and report it attached to `tracker`, if any.
  #[must_use]
  pub fn new(
    serial: Serial,
    kind: KindDescriptor,
    bundle: Option<Bundle>,
    tracker: Option<Arc<dyn Tracker>>,
  ) -> Self {
    let trackable = Self {
      bundle,
      kind,
      serial,
      tracker,
    };

    if let Some(tracker) = &trackable.tracker {
      tracker.on_attached(
        trackable.serial,
        &trackable.kind,
        trackable.bundle.as_ref(),
      );
    }

    trackable
  }

  #[must_use]
  pub fn of<T: ?Sized>(
    serial: Serial,
    bundle: Option<Bundle>,
    tracker: Option<Arc<dyn Tracker>>,
  ) -> Self {
    Self::new(serial, KindDescriptor::of::<T>(), bundle, tracker)
  }

  #[must_use]
  pub fn serial(&self) -> Serial {
    self.serial
  }

  /// Replace the bundle and report the update to the current tracker.
  pub fn set_bundle(&mut self, bundle: Option<Bundle>) {
    self.bundle = bundle;

    if let Some(tracker) = &self.tracker {
      tracker.on_updated(self.serial, &self.kind, self.bundle.as_ref());
    }
  }

  /// Hand the object to another tracker (or to none).
  ///
  /// The previous tracker sees `detached` before the new one sees `attached`.
  /// Returns the previous tracker.
  pub fn set_tracker(
    &mut self,
    tracker: Option<Arc<dyn Tracker>>,
  ) -> Option<Arc<dyn Tracker>> {
    if let Some(previous) = &self.tracker {
      previous.on_detached(self.serial, &self.kind, self.bundle.as_ref());
    }

    let previous = std::mem::replace(&mut self.tracker, tracker);

    if let Some(current) = &self.tracker {
      current.on_attached(self.serial, &self.kind, self.bundle.as_ref());
    }

    previous
  }

  #[must_use]
  pub fn tracker(&self) -> Option<&Arc<dyn Tracker>> {
    self.tracker.as_ref()
  }
}

impl Drop for Trackable {
  fn drop(&mut self) {
    if let Some(tracker) = self.tracker.take() {
      tracker.on_destroyed(self.serial, &self.kind, self.bundle.as_ref());
    }
  }
}

/// Injectable default tracker for newly created objects.
///
/// Owners pass a slot to whatever constructs tracked objects; replacing the
/// tracker affects objects spawned afterwards, never existing ones.
#[derive(Default)]
pub struct TrackerSlot {
  serials: SerialSource,
  tracker: RwLock<Option<Arc<dyn Tracker>>>,
}

impl Debug for TrackerSlot {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("TrackerSlot")
      .field("serials", &self.serials)
      .field("installed", &self.get().is_some())
      .finish()
  }
}

impl TrackerSlot {
  #[must_use]
  pub fn get(&self) -> Option<Arc<dyn Tracker>> {
    self
      .tracker
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  #[must_use]
  pub fn new(tracker: Option<Arc<dyn Tracker>>) -> Self {
    Self {
      serials: SerialSource::new(),
      tracker: RwLock::new(tracker),
    }
  }

  /// Install a new default tracker, returning the previous one.
  pub fn set(
    &self,
    tracker: Option<Arc<dyn Tracker>>,
  ) -> Option<Arc<dyn Tracker>> {
    let mut guard =
      self.tracker.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *guard, tracker)
  }

  /// Create a trackable with the next serial, attached to the current default.
  #[must_use]
  pub fn spawn(
    &self,
    kind: KindDescriptor,
    bundle: Option<Bundle>,
  ) -> Trackable {
    Trackable::new(self.serials.next_serial(), kind, bundle, self.get())
  }
}
