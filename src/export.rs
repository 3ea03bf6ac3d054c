use super::*;

/// Errors that can occur when exporting or streaming reports.
#[derive(Debug)]
pub enum ExportError {
  Io(io::Error),
  Json(serde_json::Error),
}

impl Display for ExportError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => write!(f, "could not write report: {err}"),
      Self::Json(err) => write!(f, "could not serialize report: {err}"),
    }
  }
}

impl std::error::Error for ExportError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(err) => Some(err),
      Self::Json(err) => Some(err),
    }
  }
}

impl From<io::Error> for ExportError {
  fn from(value: io::Error) -> Self {
    Self::Io(value)
  }
}

impl From<serde_json::Error> for ExportError {
  fn from(value: serde_json::Error) -> Self {
    Self::Json(value)
  }
}

/// Streaming interface for report consumers.
pub trait ReportSink {
  /// # Errors
  ///
  /// Returns an `ExportError` if the report cannot be serialized or if
  /// the underlying writer fails to persist the data.
  fn write_report(
    &mut self,
    report: &Report,
    timestamp: Option<SystemTime>,
  ) -> Result<(), ExportError>;
}

/// JSON lines exporter that writes one JSON object per report.
///
/// Each line carries a per-stream sequence number starting at 1, so gaps are
/// visible when lines are shipped elsewhere.
pub struct JsonLinesWriter<W: Write> {
  sequence: u64,
  writer: W,
}

impl<W: Write> ReportSink for JsonLinesWriter<W> {
  fn write_report(
    &mut self,
    report: &Report,
    timestamp: Option<SystemTime>,
  ) -> Result<(), ExportError> {
    self.sequence += 1;

    let line = ReportLine::new(self.sequence, report, timestamp);
    serde_json::to_writer(&mut self.writer, &line)?;
    self.writer.write_all(b"\n")?;
    Ok(())
  }
}

impl<W: Write> JsonLinesWriter<W> {
  pub fn into_inner(self) -> W {
    self.writer
  }

  pub fn new(writer: W) -> Self {
    Self {
      sequence: 0,
      writer,
    }
  }
}

/// Console-style exporter.
///
/// Every report is preceded by a numbered header and followed by a blank line.
pub struct TextWriter<W: Write> {
  sequence: u64,
  writer: W,
}

impl<W: Write> ReportSink for TextWriter<W> {
  fn write_report(
    &mut self,
    report: &Report,
    _timestamp: Option<SystemTime>,
  ) -> Result<(), ExportError> {
    self.sequence += 1;

    writeln!(self.writer, "=== report {} ===", self.sequence)?;
    write!(self.writer, "{report}")?;
    self.writer.write_all(b"\n")?;
    self.writer.flush()?;
    Ok(())
  }
}

impl<W: Write> TextWriter<W> {
  pub fn into_inner(self) -> W {
    self.writer
  }

  pub fn new(writer: W) -> Self {
    Self {
      sequence: 0,
      writer,
    }
  }
}

#[derive(Serialize)]
struct ReportLine<'a> {
  sequence: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  timestamp_ns: Option<u128>,
  kinds: usize,
  live_instances: usize,
  report: &'a Report,
}

impl<'a> ReportLine<'a> {
  fn new(
    sequence: u64,
    report: &'a Report,
    timestamp: Option<SystemTime>,
  ) -> Self {
    let live_instances = report
      .rows()
      .iter()
      .filter_map(|row| row.live_instances.as_ref())
      .map(Vec::len)
      .sum();

    Self {
      sequence,
      timestamp_ns: timestamp
        .and_then(|ts| ts.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|since_epoch| since_epoch.as_nanos()),
      kinds: report.rows().len(),
      live_instances,
      report,
    }
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::Tracker, std::time::Duration};

  fn sample_report() -> Report {
    let registry = TrackingRegistry::builder().track("Widget").finish();
    registry.on_attached(1, &KindDescriptor::new("Widget"), None);
    registry.generate_report()
  }

  #[test]
  fn json_lines_writes_one_object_per_report() {
    let report = sample_report();
    let mut writer = JsonLinesWriter::new(Vec::new());

    writer.write_report(&report, None).unwrap();
    writer
      .write_report(
        &report,
        Some(SystemTime::UNIX_EPOCH + Duration::from_nanos(42)),
      )
      .unwrap();

    let output = String::from_utf8(writer.into_inner()).unwrap();
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["sequence"], 1);
    assert!(first.get("timestamp_ns").is_none());
    assert_eq!(first["kinds"], 1);
    assert_eq!(first["live_instances"], 1);
    assert_eq!(
      first["report"]["rows"][0]["live_instances"][0]["serial"],
      1
    );

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["sequence"], 2);
    assert_eq!(second["timestamp_ns"], 42);
  }

  #[test]
  fn text_writer_numbers_and_separates_reports() {
    let report = sample_report();
    let mut writer = TextWriter::new(Vec::new());

    writer.write_report(&report, None).unwrap();
    writer.write_report(&report, None).unwrap();

    let output = String::from_utf8(writer.into_inner()).unwrap();
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines[0], "=== report 1 ===");
    assert!(lines[1].starts_with("Widget "));
    assert!(lines[2].starts_with("   obj#1 "));
    assert_eq!(lines[3], "");
    assert_eq!(lines[4], "=== report 2 ===");
    assert!(output.ends_with("\n\n"));
  }

  #[test]
  fn io_errors_are_wrapped() {
    let err = ExportError::from(io::Error::other("disk full"));

    assert_eq!(err.to_string(), "could not write report: disk full");
    assert!(std::error::Error::source(&err).is_some());
  }
}
