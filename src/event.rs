use super::*;

/// Caller-supplied identifier for one tracked instance.
///
/// Unique among the live instances of a kind; may be reused once the previous
/// holder has been destroyed or detached.
pub type Serial = u64;

/// Opaque diagnostic payload attached to a tracked instance.
///
/// The tracker never interprets a bundle; it only stores it next to the
/// serial while the instance is live and hands it back in reports.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct Bundle(Arc<str>);

impl Bundle {
  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Display for Bundle {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Bundle {
  fn from(value: &str) -> Self {
    Self(Arc::from(value))
  }
}

impl From<String> for Bundle {
  fn from(value: String) -> Self {
    Self(Arc::from(value))
  }
}

/// Identifies a kind of tracked object. The name is the ledger key.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct KindDescriptor {
  name: Arc<str>,
}

impl KindDescriptor {
  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn shared_name(&self) -> Arc<str> {
    Arc::clone(&self.name)
  }

  #[must_use]
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: Arc::from(name.into()),
    }
  }

  /// Descriptor named after `T`, with every module path shortened to its
  /// last segment.
  ///
  /// Only paths are rewritten, so `&Widget`, `(Widget, u8)` and
  /// `Vec<Widget>` all keep distinct names.
  #[must_use]
  pub fn of<T: ?Sized>() -> Self {
    Self::new(short_type_name(std::any::type_name::<T>()))
  }
}

impl Display for KindDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

fn short_type_name(full: &str) -> String {
  let mut short = String::with_capacity(full.len());
  let mut rest = full;

  while let Some(start) = rest.find(is_path_char) {
    short.push_str(&rest[..start]);
    rest = &rest[start..];

    let end = rest.find(|c: char| !is_path_char(c)).unwrap_or(rest.len());
    let path = &rest[..end];
    short.push_str(path.rsplit("::").next().unwrap_or(path));
    rest = &rest[end..];
  }

  short.push_str(rest);
  short
}

fn is_path_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == ':'
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  /// First registration with a tracker.
  Attached,
  /// About to be handed to a different tracker, or to none.
  Detached,
  /// Bundle content changed; serial and kind are unchanged.
  Updated,
  /// About to be permanently freed.
  Destroyed,
}

/// A single lifecycle event, as delivered to a tracker.
#[derive(Debug, Clone)]
pub struct Notification {
  pub bundle: Option<Bundle>,
  pub event: EventKind,
  pub kind: KindDescriptor,
  pub serial: Serial,
}

impl Notification {
  #[must_use]
  pub fn attached(serial: Serial, kind: KindDescriptor) -> Self {
    Self::new(EventKind::Attached, serial, kind)
  }

  #[must_use]
  pub fn bundle(mut self, bundle: impl Into<Bundle>) -> Self {
    self.bundle = Some(bundle.into());
    self
  }

  #[must_use]
  pub fn destroyed(serial: Serial, kind: KindDescriptor) -> Self {
    Self::new(EventKind::Destroyed, serial, kind)
  }

  #[must_use]
  pub fn detached(serial: Serial, kind: KindDescriptor) -> Self {
    Self::new(EventKind::Detached, serial, kind)
  }

  /// Deliver this notification to `tracker`.
  pub fn dispatch(&self, tracker: &dyn Tracker) {
    tracker.notify(self);
  }

  #[must_use]
  pub fn new(event: EventKind, serial: Serial, kind: KindDescriptor) -> Self {
    Self {
      bundle: None,
      event,
      kind,
      serial,
    }
  }

  #[must_use]
  pub fn updated(serial: Serial, kind: KindDescriptor) -> Self {
    Self::new(EventKind::Updated, serial, kind)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Widget;

  mod nested {
    pub struct Gadget<T>(pub T);
  }

  #[test]
  fn kind_of_strips_module_path() {
    assert_eq!(KindDescriptor::of::<Widget>().name(), "Widget");
    assert_eq!(KindDescriptor::of::<u32>().name(), "u32");
  }

  #[test]
  fn kind_of_keeps_generic_arguments() {
    let kind = KindDescriptor::of::<nested::Gadget<String>>();
    assert!(kind.name().starts_with("Gadget<"));
    assert!(kind.name().ends_with("String>"));
  }

  #[test]
  fn kind_of_keeps_reference_and_compound_shapes() {
    assert_eq!(KindDescriptor::of::<&String>().name(), "&String");
    assert_eq!(KindDescriptor::of::<(String, u8)>().name(), "(String, u8)");
    assert_eq!(KindDescriptor::of::<[String; 2]>().name(), "[String; 2]");
    assert_eq!(
      KindDescriptor::of::<dyn std::fmt::Debug>().name(),
      "dyn Debug"
    );
    assert_eq!(
      KindDescriptor::of::<nested::Gadget<String>>().name(),
      "Gadget<String>"
    );
  }

  #[test]
  fn references_do_not_share_the_owned_kind() {
    assert_ne!(
      KindDescriptor::of::<&Widget>(),
      KindDescriptor::of::<Widget>()
    );
    assert_eq!(KindDescriptor::of::<&Widget>().name(), "&Widget");
  }

  #[test]
  fn notification_builder_sets_bundle() {
    let notification =
      Notification::attached(7, KindDescriptor::new("Widget")).bundle("blue");

    assert_eq!(notification.event, EventKind::Attached);
    assert_eq!(notification.serial, 7);
    assert_eq!(
      notification.bundle.as_ref().map(Bundle::as_str),
      Some("blue")
    );
  }
}
