use std::fmt::Write;

use crate::calendar::AcademicWindow;
use crate::error::SourceError;
use crate::models::{CalendarMonth, ContactType};
use crate::view::ViewController;

const NAME_WIDTH: usize = 22;
const COUNT_WIDTH: usize = 5;

fn count_cell(count: u64) -> String {
    if count == 0 {
        "-".to_string()
    } else {
        count.to_string()
    }
}

fn push_row(output: &mut String, label: &str, counts: impl IntoIterator<Item = u64>, total: u64) {
    let _ = write!(output, "{label:<NAME_WIDTH$}");
    for count in counts {
        let _ = write!(output, " {:>COUNT_WIDTH$}", count_cell(count));
    }
    let _ = writeln!(output, " {:>COUNT_WIDTH$}", total);
}

fn header(output: &mut String, window: &AcademicWindow, selected: Option<CalendarMonth>) {
    let _ = write!(output, "{:<NAME_WIDTH$}", "Counselor");
    for month in window.months() {
        let label = if selected == Some(*month) {
            format!("*{}", month.short_label())
        } else {
            month.short_label()
        };
        let _ = write!(output, " {label:>COUNT_WIDTH$}");
    }
    let _ = writeln!(output, " {:>COUNT_WIDTH$}", "Total");
}

pub fn render_pivot(controller: &ViewController, window: &AcademicWindow) -> String {
    let mut output = String::new();
    let state = controller.state();

    let _ = writeln!(output, "Counselor Contacts {} ({})", window.label(), controller.scope());
    let _ = writeln!(
        output,
        "{} through {}",
        window.first().long_label(),
        window.last().long_label()
    );
    let _ = writeln!(output);

    let Some(model) = controller.model().filter(|model| !model.is_empty()) else {
        let _ = writeln!(output, "No contacts recorded for this window.");
        return output;
    };

    header(&mut output, window, state.selected_month);
    let expanded = controller.breakdown_for_expanded();

    for counselor in model.counselors() {
        let marker = if state.expanded_counselor == Some(counselor.id) { "v" } else { ">" };
        let counts = window
            .months()
            .iter()
            .map(|month| model.cell(counselor.id, *month).map_or(0, |cell| cell.total));
        push_row(
            &mut output,
            &format!("{marker} {}", counselor.name),
            counts,
            model.counselor_total(counselor.id),
        );

        let breakdown = expanded
            .as_ref()
            .filter(|(expanded_id, _)| *expanded_id == counselor.id);
        if let Some((_, rows)) = breakdown {
            for row in rows {
                let counts = window
                    .months()
                    .iter()
                    .map(|month| row.per_month.get(month).copied().unwrap_or(0));
                push_row(&mut output, &format!("    {}", row.contact_type.label()), counts, row.total);
            }
        }
    }

    let month_totals = window.months().iter().map(|month| model.month_total(*month));
    push_row(&mut output, "Total", month_totals, model.grand_total());

    let by_type: Vec<String> = ContactType::ALL
        .into_iter()
        .filter(|kind| model.type_total(*kind) > 0)
        .map(|kind| format!("{} {}", kind.label(), model.type_total(kind)))
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "By type: {}", by_type.join(", "));

    if let Some(month) = state.selected_month {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}: {} contacts", month.long_label(), model.month_total(month));
    }

    output
}

pub fn render_failure(err: &SourceError) -> String {
    format!("Unable to load counselor contacts: {err}\nRun the command again to retry.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::generate_window;
    use crate::models::{AggregatedCell, ViewerContext};
    use crate::view::PivotDisplay;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn window() -> AcademicWindow {
        generate_window(NaiveDate::from_ymd_opt(2024, 9, 15).unwrap())
    }

    #[test]
    fn renders_rows_totals_and_expanded_breakdown() {
        let ann = Uuid::new_v4();
        let cells = vec![
            AggregatedCell {
                counselor_id: ann,
                counselor_name: "Ann".to_string(),
                month: CalendarMonth::new(2024, 9),
                contact_type: ContactType::Meeting,
                count: 3,
            },
            AggregatedCell {
                counselor_id: ann,
                counselor_name: "Ann".to_string(),
                month: CalendarMonth::new(2024, 9),
                contact_type: ContactType::Email,
                count: 2,
            },
        ];
        let mut controller = ViewController::default();
        let ticket = controller.change_viewer(ViewerContext::admin());
        controller.complete_fetch(ticket, Ok(cells));
        controller.toggle_expanded(ann);
        controller.select_month(Some(CalendarMonth::new(2024, 9)));

        let output = render_pivot(&controller, &window());

        assert!(output.contains("2024-25 (all counselors)"));
        assert!(output.contains("*Sep"));
        assert!(output.contains("v Ann"));
        assert!(output.contains("    Meeting"));
        assert!(output.contains("    Email"));
        assert!(!output.contains("Phone call"));
        assert!(output.contains("Sep 2024: 5 contacts"));
        assert!(output.contains("Aug 2024 through Jun 2025"));
        assert!(output.contains("By type: Meeting 3, Email 2"));
    }

    #[test]
    fn empty_model_renders_placeholder() {
        let mut controller = ViewController::default();
        let ticket = controller.change_viewer(ViewerContext::admin());
        controller.complete_fetch(ticket, Ok(Vec::new()));
        assert!(matches!(controller.display(), PivotDisplay::Ready(_)));

        let output = render_pivot(&controller, &window());
        assert!(output.contains("No contacts recorded"));
    }
}
