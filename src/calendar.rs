use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::models::CalendarMonth;

pub const ACADEMIC_START_MONTH: u32 = 8;
pub const WINDOW_LEN: usize = 11;

/// The August through June reporting window of one academic year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademicWindow {
    start_year: i32,
    months: Vec<CalendarMonth>,
}

impl AcademicWindow {
    pub fn months(&self) -> &[CalendarMonth] {
        &self.months
    }

    pub fn first(&self) -> CalendarMonth {
        self.months[0]
    }

    pub fn last(&self) -> CalendarMonth {
        self.months[WINDOW_LEN - 1]
    }

    pub fn contains(&self, month: CalendarMonth) -> bool {
        self.months.binary_search(&month).is_ok()
    }

    pub fn require_month(&self, month: CalendarMonth) -> anyhow::Result<CalendarMonth> {
        anyhow::ensure!(
            self.contains(month),
            "{month} is outside the {} academic year ({} to {})",
            self.label(),
            self.first(),
            self.last()
        );
        Ok(month)
    }

    /// Midnight UTC on the first day of the window.
    pub fn first_month_start(&self) -> DateTime<Utc> {
        self.first()
            .first_day()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
    }

    /// e.g. `2024-25`
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1) % 100)
    }
}

pub fn academic_start_year(reference: NaiveDate) -> i32 {
    if reference.month() >= ACADEMIC_START_MONTH {
        reference.year()
    } else {
        reference.year() - 1
    }
}

pub fn generate_window(reference: NaiveDate) -> AcademicWindow {
    let start_year = academic_start_year(reference);
    let months = std::iter::successors(
        Some(CalendarMonth::new(start_year, ACADEMIC_START_MONTH)),
        |month| Some(month.succ()),
    )
    .take(WINDOW_LEN)
    .collect();

    AcademicWindow { start_year, months }
}

pub fn current_window() -> AcademicWindow {
    generate_window(Utc::now().date_naive())
}
