use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::calendar::AcademicWindow;
use crate::error::{SourceError, SourceResult};
use crate::models::{AggregateRow, AggregatedCell, CalendarMonth, ContactRecord, ContactType, Scope};

pub const UNKNOWN_COUNSELOR: &str = "Unknown";

#[async_trait]
pub trait AggregateProvider: Send + Sync {
    async fn monthly_counts(&self, scope: Scope) -> anyhow::Result<Vec<AggregateRow>>;
}

#[async_trait]
pub trait RecordProvider: Send + Sync {
    async fn contact_records(
        &self,
        scope: Scope,
        lower_bound: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ContactRecord>>;
}

#[async_trait]
pub trait CountSource: Send + Sync {
    fn source_tag(&self) -> &'static str;

    async fn fetch_cells(
        &self,
        window: &AcademicWindow,
        scope: Scope,
    ) -> SourceResult<Vec<AggregatedCell>>;
}

/// Accumulates counts keyed by (counselor, month, type) so each triple is
/// emitted once. On a name conflict the smallest name wins, which keeps the
/// output independent of input order.
#[derive(Debug, Default)]
struct CellFold {
    cells: BTreeMap<(Uuid, CalendarMonth, ContactType), (String, u64)>,
}

impl CellFold {
    fn add(&mut self, counselor_id: Uuid, name: &str, month: CalendarMonth, kind: ContactType, count: u64) {
        let entry = self
            .cells
            .entry((counselor_id, month, kind))
            .or_insert_with(|| (name.to_string(), 0));
        if name < entry.0.as_str() {
            entry.0 = name.to_string();
        }
        entry.1 += count;
    }

    fn into_cells(self) -> Vec<AggregatedCell> {
        self.cells
            .into_iter()
            .map(|((counselor_id, month, contact_type), (counselor_name, count))| AggregatedCell {
                counselor_id,
                counselor_name,
                month,
                contact_type,
                count,
            })
            .collect()
    }
}

pub struct PrecomputedSource {
    provider: Arc<dyn AggregateProvider>,
}

impl PrecomputedSource {
    pub fn new(provider: Arc<dyn AggregateProvider>) -> Self {
        Self { provider }
    }
}

/// Normalizes precomputed rows: out-of-window months and non-positive counts
/// are ignored, repeated triples are summed.
pub fn normalize_aggregates(rows: Vec<AggregateRow>, window: &AcademicWindow) -> Vec<AggregatedCell> {
    let mut fold = CellFold::default();
    let mut ignored = 0usize;

    for row in rows {
        if !window.contains(row.month) || row.count < 1 {
            ignored += 1;
            continue;
        }
        let kind = ContactType::parse_or_general(row.contact_type.as_deref());
        fold.add(row.counselor_id, &row.counselor_name, row.month, kind, row.count as u64);
    }

    if ignored > 0 {
        log::debug!("ignored {ignored} precomputed rows outside {}", window.label());
    }
    fold.into_cells()
}

#[async_trait]
impl CountSource for PrecomputedSource {
    fn source_tag(&self) -> &'static str {
        "precomputed"
    }

    async fn fetch_cells(
        &self,
        window: &AcademicWindow,
        scope: Scope,
    ) -> SourceResult<Vec<AggregatedCell>> {
        if scope == Scope::Nobody {
            return Ok(Vec::new());
        }
        let rows = self
            .provider
            .monthly_counts(scope)
            .await
            .map_err(SourceError::primary)?;
        Ok(normalize_aggregates(rows, window))
    }
}

pub struct RawRecordSource {
    provider: Arc<dyn RecordProvider>,
}

impl RawRecordSource {
    pub fn new(provider: Arc<dyn RecordProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default)]
pub struct RecordFold {
    pub cells: Vec<AggregatedCell>,
    pub malformed: usize,
    pub outside_window: usize,
    pub out_of_scope: usize,
}

fn record_month(record: &ContactRecord) -> SourceResult<CalendarMonth> {
    record
        .occurred_at
        .map(|at| CalendarMonth::of(&at))
        .ok_or(SourceError::MalformedRecord {
            counselor_id: record.counselor_id,
        })
}

pub fn fold_records(records: &[ContactRecord], window: &AcademicWindow, scope: Scope) -> RecordFold {
    let mut fold = CellFold::default();
    let mut malformed = 0usize;
    let mut outside_window = 0usize;
    let mut out_of_scope = 0usize;

    for record in records {
        let month = match record_month(record) {
            Ok(month) => month,
            Err(err) => {
                log::debug!("skipping contact record: {err}");
                malformed += 1;
                continue;
            }
        };
        if !window.contains(month) {
            outside_window += 1;
            continue;
        }
        if !scope.includes(record.counselor_id) {
            out_of_scope += 1;
            continue;
        }

        let name = record
            .counselor_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_COUNSELOR);
        let kind = ContactType::parse_or_general(record.contact_type.as_deref());
        fold.add(record.counselor_id, name, month, kind, 1);
    }

    RecordFold {
        cells: fold.into_cells(),
        malformed,
        outside_window,
        out_of_scope,
    }
}

#[async_trait]
impl CountSource for RawRecordSource {
    fn source_tag(&self) -> &'static str {
        "raw_records"
    }

    async fn fetch_cells(
        &self,
        window: &AcademicWindow,
        scope: Scope,
    ) -> SourceResult<Vec<AggregatedCell>> {
        if scope == Scope::Nobody {
            return Ok(Vec::new());
        }
        let records = self
            .provider
            .contact_records(scope, window.first_month_start())
            .await
            .map_err(SourceError::records)?;

        let folded = fold_records(&records, window, scope);
        log::debug!(
            "folded {} contact records into {} cells ({} malformed, {} outside window, {} out of scope)",
            records.len(),
            folded.cells.len(),
            folded.malformed,
            folded.outside_window,
            folded.out_of_scope
        );
        Ok(folded.cells)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    Precomputed,
    RawRecords,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub cells: Vec<AggregatedCell>,
    pub path: ResolutionPath,
}

pub struct AggregationResolver {
    primary: Box<dyn CountSource>,
    fallback: Box<dyn CountSource>,
}

impl AggregationResolver {
    pub fn new(primary: impl CountSource + 'static, fallback: impl CountSource + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }
    }

    /// Resolves counts for the window. The fallback runs only after the
    /// primary call has failed; an empty primary result is still a result.
    pub async fn resolve(&self, window: &AcademicWindow, scope: Scope) -> SourceResult<Resolution> {
        match self.primary.fetch_cells(window, scope).await {
            Ok(cells) => {
                log::info!(
                    "resolved {} cells for {scope} from {} source",
                    cells.len(),
                    self.primary.source_tag()
                );
                return Ok(Resolution {
                    cells,
                    path: ResolutionPath::Precomputed,
                });
            }
            Err(err) => {
                log::warn!("{err}; recomputing from {} source", self.fallback.source_tag());
            }
        }

        let cells = self.fallback.fetch_cells(window, scope).await?;
        log::info!(
            "resolved {} cells for {scope} from {} source",
            cells.len(),
            self.fallback.source_tag()
        );
        Ok(Resolution {
            cells,
            path: ResolutionPath::RawRecords,
        })
    }
}

#[async_trait]
impl CountSource for AggregationResolver {
    fn source_tag(&self) -> &'static str {
        "resolver"
    }

    async fn fetch_cells(
        &self,
        window: &AcademicWindow,
        scope: Scope,
    ) -> SourceResult<Vec<AggregatedCell>> {
        let resolution = self.resolve(window, scope).await?;
        log::debug!("{scope} resolved via {:?}", resolution.path);
        Ok(resolution.cells)
    }
}
