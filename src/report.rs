use super::*;

/// Column width used for kind names when rendering a report as text.
pub(crate) const DEFAULT_NAME_WIDTH: usize = 40;

/// A counter value paired with the value from the previous report, if any.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Delta<T> {
  pub current: T,
  pub previous: Option<T>,
}

impl<T> Delta<T>
where
  T: Copy + Into<i128>,
{
  /// Signed change since the previous report, `None` without a baseline.
  #[must_use]
  pub fn change(&self) -> Option<i128> {
    self
      .previous
      .map(|previous| self.current.into() - previous.into())
  }

  #[must_use]
  pub fn new(current: T, previous: Option<T>) -> Self {
    Self { current, previous }
  }
}

/// Renders `current` alone, or `current (+n)` when it moved since the last
/// report.
impl<T> Display for Delta<T>
where
  T: Copy + Display + Into<i128>,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self.change() {
      None | Some(0) => write!(f, "{}", self.current),
      Some(change) => write!(f, "{} ({change:+})", self.current),
    }
  }
}

impl<T> Serialize for Delta<T>
where
  T: Copy + Display + Into<i128> + Serialize,
{
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut state = serializer.serialize_struct("Delta", 3)?;
    state.serialize_field("current", &self.current)?;
    state.serialize_field("change", &self.change())?;
    state.serialize_field("display", &self.to_string())?;
    state.end()
  }
}

/// One live instance listed under a tracked kind.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct LiveInstance {
  pub serial: Serial,
  pub bundle: Option<Bundle>,
}

/// Report line for a single kind.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
  pub kind_name: Arc<str>,
  pub allocated: Delta<i64>,
  pub deallocated: Delta<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub live_instances: Option<Vec<LiveInstance>>,
}

/// Non-fatal anomalies noticed while composing a report.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
  /// More detaches/destroys than attaches were seen for this kind.
  NegativeAllocated { kind_name: Arc<str>, allocated: i64 },
}

impl Display for ReportWarning {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::NegativeAllocated {
        kind_name,
        allocated,
      } => write!(
        f,
        "warning: {kind_name} has a negative allocated count ({allocated}); \
         notifications were lost or arrived out of order"
      ),
    }
  }
}

/// Rows for every known kind, sorted by kind name.
#[derive(Debug, Clone, Default)]
pub struct Report {
  name_width: usize,
  rows: Vec<ReportRow>,
  warnings: Vec<ReportWarning>,
}

impl Serialize for Report {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut state = serializer.serialize_struct("Report", 2)?;
    state.serialize_field("rows", &self.rows)?;
    state.serialize_field("warnings", &self.warnings)?;
    state.end()
  }
}

impl Report {
  /// Serialize the report to JSON using the provided writer.
  ///
  /// # Errors
  ///
  /// Returns an error if serialization to JSON fails.
  pub fn export_json<W: Write>(&self, writer: W) -> Result<(), ExportError> {
    serde_json::to_writer(writer, self)?;
    Ok(())
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  #[must_use]
  pub(crate) fn new(
    rows: Vec<ReportRow>,
    warnings: Vec<ReportWarning>,
    name_width: usize,
  ) -> Self {
    Self {
      name_width,
      rows,
      warnings,
    }
  }

  /// Look up the row for a kind by name.
  #[must_use]
  pub fn row(&self, kind_name: &str) -> Option<&ReportRow> {
    self
      .rows
      .binary_search_by(|row| (*row.kind_name).cmp(kind_name))
      .ok()
      .map(|index| &self.rows[index])
  }

  #[must_use]
  pub fn rows(&self) -> &[ReportRow] {
    &self.rows
  }

  #[must_use]
  pub fn warnings(&self) -> &[ReportWarning] {
    &self.warnings
  }
}

impl Display for Report {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    let width = self.name_width;

    for row in &self.rows {
      let line = format!(
        "{name:<width$} allocated: {alloc:<12} retired: {dealloc:<12}",
        name = row.kind_name,
        alloc = row.allocated.to_string(),
        dealloc = row.deallocated.to_string(),
      );
      writeln!(f, "{}", line.trim_end())?;

      for instance in row.live_instances.iter().flatten() {
        let bundle = instance.bundle.as_ref().map_or("", Bundle::as_str);
        writeln!(f, "   obj#{:<8} bundle:'{bundle}'", instance.serial)?;
      }
    }

    for warning in &self.warnings {
      writeln!(f, "{warning}")?;
    }

    Ok(())
  }
}
