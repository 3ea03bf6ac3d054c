use {
  objtracker::{
    Bundle, ExportError, KindDescriptor, ReportSink, TextWriter, TrackerConfig,
    TrackerSlot, TrackingRegistry,
  },
  std::{io, sync::Arc, time::SystemTime},
};

struct Widget;
struct Gadget;

fn main() -> Result<(), ExportError> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let registry =
    TrackingRegistry::with_config(TrackerConfig::from_env().track("Widget"));
  let slot = TrackerSlot::new(Some(Arc::new(registry.clone())));
  let mut out = TextWriter::new(io::stdout());

  let first = slot.spawn(KindDescriptor::of::<Widget>(), None);
  let _gadget = slot.spawn(KindDescriptor::of::<Gadget>(), None);

  out.write_report(&registry.generate_report(), Some(SystemTime::now()))?;

  let mut second =
    slot.spawn(KindDescriptor::of::<Widget>(), Some(Bundle::from("spare")));
  second.set_bundle(Some(Bundle::from("in use")));

  out.write_report(&registry.generate_report(), Some(SystemTime::now()))?;

  drop(first);
  let mut handed_off = slot.spawn(KindDescriptor::of::<Gadget>(), None);
  let _ = handed_off.set_tracker(None);

  out.write_report(&registry.generate_report(), Some(SystemTime::now()))?;

  Ok(())
}
