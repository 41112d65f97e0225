use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::SourceError;
use crate::models::{AggregatedCell, CalendarMonth, ContactType, Scope, ViewerContext};
use crate::pivot::PivotModel;

/// Presentation-only selection. Has no effect on pivot contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub expanded_counselor: Option<Uuid>,
    pub selected_month: Option<CalendarMonth>,
}

impl ViewState {
    /// Expands the row, or collapses it if it is already the expanded one.
    pub fn toggle_expanded(&mut self, counselor_id: Uuid) {
        if self.expanded_counselor == Some(counselor_id) {
            self.expanded_counselor = None;
        } else {
            self.expanded_counselor = Some(counselor_id);
        }
    }

    pub fn select_month(&mut self, month: Option<CalendarMonth>) {
        self.selected_month = month;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBreakdown {
    pub contact_type: ContactType,
    pub per_month: BTreeMap<CalendarMonth, u64>,
    pub total: u64,
}

/// Per-type rows for one counselor, in canonical type order. Types with no
/// contacts anywhere in the window are left out.
pub fn type_breakdown(model: &PivotModel, counselor_id: Uuid) -> Vec<TypeBreakdown> {
    let mut rows: BTreeMap<ContactType, TypeBreakdown> = BTreeMap::new();

    for (month, cell) in model.months_for(counselor_id) {
        for (kind, count) in cell.by_type.iter().filter(|(_, count)| **count > 0) {
            let row = rows.entry(*kind).or_insert_with(|| TypeBreakdown {
                contact_type: *kind,
                per_month: BTreeMap::new(),
                total: 0,
            });
            *row.per_month.entry(*month).or_insert(0) += count;
            row.total += count;
        }
    }

    rows.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    id: u64,
    viewer: ViewerContext,
}

impl FetchTicket {
    pub fn scope(&self) -> Scope {
        self.viewer.scope()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PivotDisplay {
    #[default]
    Idle,
    Loading,
    Ready(PivotModel),
    Failed(SourceError),
}

/// Owns what is currently displayed. Fetch results are applied only when
/// they answer the most recently issued ticket.
#[derive(Debug, Default)]
pub struct ViewController {
    viewer: ViewerContext,
    state: ViewState,
    display: PivotDisplay,
    latest_ticket: u64,
}

impl ViewController {
    pub fn scope(&self) -> Scope {
        self.viewer.scope()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn display(&self) -> &PivotDisplay {
        &self.display
    }

    pub fn model(&self) -> Option<&PivotModel> {
        match &self.display {
            PivotDisplay::Ready(model) => Some(model),
            _ => None,
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_ticket += 1;
        self.display = PivotDisplay::Loading;
        FetchTicket {
            id: self.latest_ticket,
            viewer: self.viewer,
        }
    }

    /// Returns false when the ticket has been superseded and the result was
    /// discarded.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<AggregatedCell>, SourceError>,
    ) -> bool {
        if ticket.id != self.latest_ticket {
            log::debug!(
                "discarding result of superseded fetch {} (latest {})",
                ticket.id,
                self.latest_ticket
            );
            return false;
        }

        self.display = match result {
            Ok(cells) => PivotDisplay::Ready(PivotModel::build(&cells, &ticket.viewer)),
            Err(err) => {
                log::warn!("contact pivot unavailable: {err}");
                PivotDisplay::Failed(err)
            }
        };
        if let Some(expanded) = self.state.expanded_counselor {
            if self.model().is_some_and(|model| model.counselor(expanded).is_none()) {
                self.state.expanded_counselor = None;
            }
        }
        true
    }

    /// Switches role or identity and starts a fetch that supersedes any
    /// outstanding one.
    pub fn change_viewer(&mut self, viewer: ViewerContext) -> FetchTicket {
        self.viewer = viewer;
        if let Some(expanded) = self.state.expanded_counselor {
            if !viewer.can_see(expanded) {
                self.state.expanded_counselor = None;
            }
        }
        self.begin_fetch()
    }

    pub fn toggle_expanded(&mut self, counselor_id: Uuid) {
        self.state.toggle_expanded(counselor_id);
    }

    pub fn select_month(&mut self, month: Option<CalendarMonth>) {
        self.state.select_month(month);
    }

    pub fn breakdown_for_expanded(&self) -> Option<(Uuid, Vec<TypeBreakdown>)> {
        let counselor_id = self.state.expanded_counselor?;
        let model = self.model()?;
        Some((counselor_id, type_breakdown(model, counselor_id)))
    }
}
