use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ContactRecord, Scope};
use crate::source::RecordProvider;

/// Raw contact records exported to CSV, for running the report without a
/// database. Expected header: `counselor_id,counselor_name,occurred_at,contact_type`.
pub struct CsvRecordProvider {
    path: PathBuf,
}

#[derive(serde::Deserialize)]
struct CsvRow {
    counselor_id: Uuid,
    counselor_name: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    occurred_at: Option<DateTime<Utc>>,
    contact_type: Option<String>,
}

impl CsvRecordProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn read_records<R: std::io::Read>(
    reader: R,
    scope: Scope,
    lower_bound: DateTime<Utc>,
) -> anyhow::Result<Vec<ContactRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid contact row {}", index + 1))?;
        if !scope.includes(row.counselor_id) {
            continue;
        }
        // Rows without a timestamp are kept so the fold can count them as malformed.
        if row.occurred_at.is_some_and(|at| at < lower_bound) {
            continue;
        }
        records.push(ContactRecord {
            counselor_id: row.counselor_id,
            counselor_name: row.counselor_name,
            occurred_at: row.occurred_at,
            contact_type: row.contact_type,
        });
    }

    Ok(records)
}

#[async_trait]
impl RecordProvider for CsvRecordProvider {
    async fn contact_records(
        &self,
        scope: Scope,
        lower_bound: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ContactRecord>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        read_records(file, scope, lower_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::generate_window;
    use crate::source::fold_records;
    use chrono::{NaiveDate, TimeZone};

    const SAMPLE: &str = "\
counselor_id,counselor_name,occurred_at,contact_type
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,2024-11-04T15:00:00Z,phone_call
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,2024-11-05T15:00:00Z,
0c22f1f1-9184-4fd4-9b21-28c68a6a89dc,,2024-12-01T09:00:00Z,email
0c22f1f1-9184-4fd4-9b21-28c68a6a89dc,Jules Moreno,,meeting
0c22f1f1-9184-4fd4-9b21-28c68a6a89dc,Jules Moreno,2024-06-30T09:00:00Z,meeting
";

    fn lower_bound() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let records = read_records(SAMPLE.as_bytes(), Scope::All, lower_bound()).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[1].contact_type, None);
        assert_eq!(records[2].counselor_name, None);
        assert_eq!(records[3].occurred_at, None);
    }

    #[test]
    fn scope_filters_rows() {
        let avery = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2").unwrap();
        let records = read_records(SAMPLE.as_bytes(), Scope::Counselor(avery), lower_bound()).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.counselor_id == avery));
    }

    #[test]
    fn unparseable_timestamp_is_kept_for_the_fold_to_skip() {
        let input = "\
counselor_id,counselor_name,occurred_at,contact_type
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,2024-11-04T15:00:00Z,meeting
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,Avery Lee,11/05/2024,meeting
";
        let records = read_records(input.as_bytes(), Scope::All, lower_bound()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].occurred_at, None);

        let window = generate_window(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        let folded = fold_records(&records, &window, Scope::All);
        assert_eq!(folded.malformed, 1);
        assert_eq!(folded.cells.len(), 1);
        assert_eq!(folded.cells[0].count, 1);
    }

    #[test]
    fn bad_counselor_id_is_an_error() {
        let input = "counselor_id,counselor_name,occurred_at,contact_type\nnot-a-uuid,Ann,,email\n";
        assert!(read_records(input.as_bytes(), Scope::All, lower_bound()).is_err());
    }
}
