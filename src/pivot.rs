use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::models::{AggregatedCell, CalendarMonth, ContactType, Counselor, ViewerContext};

/// Contacts logged by one counselor in one month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthCell {
    pub total: u64,
    pub by_type: BTreeMap<ContactType, u64>,
}

/// Counselor × month × type counts with row, column and grand totals.
/// Built once from a resolved cell set and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotModel {
    counselors: Vec<Counselor>,
    cells_by_counselor: HashMap<Uuid, BTreeMap<CalendarMonth, MonthCell>>,
    month_totals: BTreeMap<CalendarMonth, u64>,
    counselor_totals: HashMap<Uuid, u64>,
    type_totals: BTreeMap<ContactType, u64>,
    grand_total: u64,
}

impl PivotModel {
    pub fn build(cells: &[AggregatedCell], viewer: &ViewerContext) -> PivotModel {
        let mut model = PivotModel::default();
        let mut names: HashMap<Uuid, &str> = HashMap::new();

        for cell in cells.iter().filter(|cell| viewer.can_see(cell.counselor_id)) {
            let month_cell = model
                .cells_by_counselor
                .entry(cell.counselor_id)
                .or_default()
                .entry(cell.month)
                .or_default();
            month_cell.total += cell.count;
            *month_cell.by_type.entry(cell.contact_type).or_insert(0) += cell.count;

            *model.month_totals.entry(cell.month).or_insert(0) += cell.count;
            *model.counselor_totals.entry(cell.counselor_id).or_insert(0) += cell.count;
            *model.type_totals.entry(cell.contact_type).or_insert(0) += cell.count;
            model.grand_total += cell.count;

            let name = names.entry(cell.counselor_id).or_insert(cell.counselor_name.as_str());
            if cell.counselor_name.as_str() < *name {
                *name = cell.counselor_name.as_str();
            }
        }

        let mut counselors: Vec<Counselor> = names
            .into_iter()
            .map(|(id, name)| Counselor {
                id,
                name: name.to_string(),
            })
            .collect();
        counselors.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        model.counselors = counselors;
        model
    }

    pub fn counselors(&self) -> &[Counselor] {
        &self.counselors
    }

    pub fn counselor(&self, id: Uuid) -> Option<&Counselor> {
        self.counselors.iter().find(|counselor| counselor.id == id)
    }

    pub fn cell(&self, counselor_id: Uuid, month: CalendarMonth) -> Option<&MonthCell> {
        self.cells_by_counselor.get(&counselor_id)?.get(&month)
    }

    pub fn months_for(&self, counselor_id: Uuid) -> impl Iterator<Item = (&CalendarMonth, &MonthCell)> {
        self.cells_by_counselor
            .get(&counselor_id)
            .into_iter()
            .flat_map(|months| months.iter())
    }

    pub fn month_total(&self, month: CalendarMonth) -> u64 {
        self.month_totals.get(&month).copied().unwrap_or(0)
    }

    pub fn counselor_total(&self, counselor_id: Uuid) -> u64 {
        self.counselor_totals.get(&counselor_id).copied().unwrap_or(0)
    }

    pub fn type_total(&self, kind: ContactType) -> u64 {
        self.type_totals.get(&kind).copied().unwrap_or(0)
    }

    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }

    pub fn is_empty(&self) -> bool {
        self.counselors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn cell(id: Uuid, name: &str, month: (i32, u32), kind: ContactType, count: u64) -> AggregatedCell {
        AggregatedCell {
            counselor_id: id,
            counselor_name: name.to_string(),
            month: CalendarMonth::new(month.0, month.1),
            contact_type: kind,
            count,
        }
    }

    fn sample() -> (Uuid, Uuid, Vec<AggregatedCell>) {
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let cells = vec![
            cell(c1, "Ann", (2024, 9), ContactType::Meeting, 3),
            cell(c1, "Ann", (2024, 9), ContactType::Email, 2),
            cell(c2, "Bob", (2024, 10), ContactType::Meeting, 5),
        ];
        (c1, c2, cells)
    }

    #[test]
    fn admin_sees_every_counselor_with_rollups() {
        let (c1, c2, cells) = sample();
        let model = PivotModel::build(&cells, &ViewerContext::admin());

        let names: Vec<&str> = model.counselors().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob"]);
        assert_eq!(model.month_total(CalendarMonth::new(2024, 9)), 5);
        assert_eq!(model.month_total(CalendarMonth::new(2024, 10)), 5);
        assert_eq!(model.grand_total(), 10);
        assert_eq!(model.cell(c1, CalendarMonth::new(2024, 9)).unwrap().total, 5);
        assert_eq!(model.counselor_total(c2), 5);
        assert_eq!(model.type_total(ContactType::Meeting), 8);
    }

    #[test]
    fn counselor_role_sees_only_own_row() {
        let (_, c2, cells) = sample();
        let model = PivotModel::build(&cells, &ViewerContext::counselor(c2));

        assert_eq!(model.counselors().len(), 1);
        assert_eq!(model.counselors()[0].id, c2);
        assert_eq!(model.counselors()[0].name, "Bob");
        assert_eq!(model.grand_total(), 5);
    }

    #[test]
    fn counselor_without_identity_gets_empty_model() {
        let (_, _, cells) = sample();
        let viewer = ViewerContext {
            role: Role::Counselor,
            identity: None,
        };
        let model = PivotModel::build(&cells, &viewer);
        assert!(model.is_empty());
        assert_eq!(model.grand_total(), 0);
    }

    #[test]
    fn empty_input_builds_empty_model() {
        let model = PivotModel::build(&[], &ViewerContext::admin());
        assert!(model.is_empty());
        assert_eq!(model.grand_total(), 0);
        assert!(model.month_totals.is_empty());
    }

    #[test]
    fn totals_agree_at_every_level() {
        let (_, _, mut cells) = sample();
        let c3 = Uuid::new_v4();
        cells.push(cell(c3, "cara", (2025, 2), ContactType::PhoneCall, 7));
        cells.push(cell(c3, "cara", (2025, 2), ContactType::General, 1));
        let model = PivotModel::build(&cells, &ViewerContext::admin());

        let input_sum: u64 = cells.iter().map(|c| c.count).sum();
        let month_sum: u64 = model.month_totals.values().sum();
        let row_sum: u64 = model.counselors().iter().map(|c| model.counselor_total(c.id)).sum();
        assert_eq!(model.grand_total(), input_sum);
        assert_eq!(model.grand_total(), month_sum);
        assert_eq!(model.grand_total(), row_sum);

        for counselor in model.counselors() {
            for (_, month_cell) in model.months_for(counselor.id) {
                assert_eq!(month_cell.total, month_cell.by_type.values().sum::<u64>());
            }
        }
    }

    #[test]
    fn input_order_does_not_change_model() {
        let (_, _, cells) = sample();
        let mut reversed = cells.clone();
        reversed.reverse();
        let mut rotated = cells.clone();
        rotated.rotate_left(1);

        let viewer = ViewerContext::admin();
        let model = PivotModel::build(&cells, &viewer);
        assert_eq!(model, PivotModel::build(&reversed, &viewer));
        assert_eq!(model, PivotModel::build(&rotated, &viewer));
    }

    #[test]
    fn counselors_sort_case_insensitively_then_by_id() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let cells = vec![
            cell(c, "bob", (2024, 9), ContactType::Email, 1),
            cell(b, "Alex", (2024, 9), ContactType::Email, 1),
            cell(a, "bob", (2024, 9), ContactType::Email, 1),
        ];
        let model = PivotModel::build(&cells, &ViewerContext::admin());
        let ids: Vec<Uuid> = model.counselors().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b, a, c]);
    }
}
