use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::calendar::current_window;
use crate::models::{AggregateRow, CalendarMonth, ContactRecord, Scope};
use crate::source::{AggregateProvider, RecordProvider};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Reads contact counts and raw contacts from the `counselor_contacts` schema.
#[derive(Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregateProvider for PgContactStore {
    async fn monthly_counts(&self, scope: Scope) -> anyhow::Result<Vec<AggregateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT counselor_id, counselor_name, month_start, contact_type, contact_count
            FROM counselor_contacts.monthly_contact_counts
            WHERE ($1::uuid IS NULL OR counselor_id = $1)
            "#,
        )
        .bind(scope.counselor_filter())
        .fetch_all(&self.pool)
        .await
        .context("failed to query monthly_contact_counts")?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let month_start: NaiveDate = row.try_get("month_start")?;
            counts.push(AggregateRow {
                counselor_id: row.try_get("counselor_id")?,
                counselor_name: row.try_get("counselor_name")?,
                month: CalendarMonth::of(&month_start),
                contact_type: row.try_get("contact_type")?,
                count: row.try_get("contact_count")?,
            });
        }

        Ok(counts)
    }
}

#[async_trait]
impl RecordProvider for PgContactStore {
    async fn contact_records(
        &self,
        scope: Scope,
        lower_bound: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ContactRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.counselor_id, co.full_name, c.occurred_at, c.contact_type
            FROM counselor_contacts.contacts c
            LEFT JOIN counselor_contacts.counselors co ON co.id = c.counselor_id
            WHERE c.occurred_at >= $1
              AND ($2::uuid IS NULL OR c.counselor_id = $2)
            "#,
        )
        .bind(lower_bound)
        .bind(scope.counselor_filter())
        .fetch_all(&self.pool)
        .await
        .context("failed to query contacts")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(ContactRecord {
                counselor_id: row.try_get("counselor_id")?,
                counselor_name: row.try_get("full_name")?,
                occurred_at: row.try_get("occurred_at")?,
                contact_type: row.try_get("contact_type")?,
            });
        }

        Ok(records)
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let counselors = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@groupscholar.com",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@groupscholar.com",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@groupscholar.com",
        ),
    ];

    for &(id, name, email) in &counselors {
        sqlx::query(
            r#"
            INSERT INTO counselor_contacts.counselors (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    // Spread contacts across the first months of the current academic year.
    let start = current_window().first_month_start();
    let contacts = [
        ("seed-001", 0usize, 4i64, Some("meeting")),
        ("seed-002", 0, 11, Some("email")),
        ("seed-003", 0, 40, Some("phone_call")),
        ("seed-004", 1, 9, Some("meeting")),
        ("seed-005", 1, 38, Some("video_call")),
        ("seed-006", 1, 70, None),
        ("seed-007", 2, 15, Some("text_message")),
        ("seed-008", 2, 16, Some("text_message")),
        ("seed-009", 2, 95, Some("meeting")),
    ];

    let mut inserted = 0u64;
    for (source_key, counselor, day_offset, contact_type) in contacts {
        let occurred_at = start + Duration::days(day_offset) + Duration::hours(14);
        let result = sqlx::query(
            r#"
            INSERT INTO counselor_contacts.contacts
            (id, counselor_id, occurred_at, contact_type, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(counselors[counselor].0)
        .bind(occurred_at)
        .bind(contact_type)
        .bind(source_key)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    log::info!("seeded {} counselors and {inserted} new contacts", counselors.len());
    Ok(())
}
