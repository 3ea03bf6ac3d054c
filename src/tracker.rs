use crate::event::{Bundle, EventKind, KindDescriptor, Notification, Serial};

/// Receiver of lifecycle notifications from tracked objects.
///
/// Implementations must tolerate malformed sequences (a detach for a serial
/// that was never attached, a destroy after a detach, and so on); a tracker is
/// a diagnostic aid and must never fail the object that reports to it.
pub trait Tracker: Send + Sync {
  fn on_attached(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  );

  fn on_detached(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  );

  fn on_destroyed(
    &self,
    serial: Serial,
    kind: &KindDescriptor,
    bundle: Option<&Bundle>,
  );

  /// Producers are not required to emit updates, so the default ignores them.
  fn on_updated(
    &self,
    _serial: Serial,
    _kind: &KindDescriptor,
    _bundle: Option<&Bundle>,
  ) {
  }

  /// Route a pre-built notification to the matching callback.
  fn notify(&self, notification: &Notification) {
    let Notification {
      bundle,
      event,
      kind,
      serial,
    } = notification;

    let bundle = bundle.as_ref();

    match event {
      EventKind::Attached => self.on_attached(*serial, kind, bundle),
      EventKind::Detached => self.on_detached(*serial, kind, bundle),
      EventKind::Updated => self.on_updated(*serial, kind, bundle),
      EventKind::Destroyed => self.on_destroyed(*serial, kind, bundle),
    }
  }

  /// Replay a batch of notifications in order.
  ///
  /// The default routes each one through [`Tracker::notify`]; implementations
  /// with shared state can override it to apply the batch atomically.
  fn ingest(&self, notifications: &[Notification]) {
    for notification in notifications {
      self.notify(notification);
    }
  }
}
