use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

/// Kinds of logged counselor contact, declared in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContactType {
    Meeting,
    PhoneCall,
    VideoCall,
    Email,
    TextMessage,
    General,
}

impl ContactType {
    pub const ALL: [ContactType; 6] = [
        ContactType::Meeting,
        ContactType::PhoneCall,
        ContactType::VideoCall,
        ContactType::Email,
        ContactType::TextMessage,
        ContactType::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContactType::Meeting => "meeting",
            ContactType::PhoneCall => "phone_call",
            ContactType::VideoCall => "video_call",
            ContactType::Email => "email",
            ContactType::TextMessage => "text_message",
            ContactType::General => "general",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContactType::Meeting => "Meeting",
            ContactType::PhoneCall => "Phone call",
            ContactType::VideoCall => "Video call",
            ContactType::Email => "Email",
            ContactType::TextMessage => "Text",
            ContactType::General => "General",
        }
    }

    /// Missing, blank and unrecognized values all land in `General`.
    pub fn parse_or_general(value: Option<&str>) -> ContactType {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return ContactType::General;
        };

        ContactType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or_else(|| {
                log::debug!("unrecognized contact type {raw:?}, counting as general");
                ContactType::General
            })
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar month with no day component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Three-letter month name, e.g. `Sep`.
    pub fn short_label(self) -> String {
        self.first_day().format("%b").to_string()
    }

    pub fn long_label(self) -> String {
        self.first_day().format("%b %Y").to_string()
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for CalendarMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
            .map_err(|err| anyhow::anyhow!("expected YYYY-MM, got {s:?}: {err}"))?;
        Ok(CalendarMonth::of(&date))
    }
}

/// A single logged contact as it comes back from a raw record provider.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub counselor_id: Uuid,
    pub counselor_name: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub contact_type: Option<String>,
}

/// A row from the precomputed monthly aggregate, before normalization.
#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub counselor_id: Uuid,
    pub counselor_name: String,
    pub month: CalendarMonth,
    pub contact_type: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedCell {
    pub counselor_id: Uuid,
    pub counselor_name: String,
    pub month: CalendarMonth,
    pub contact_type: ContactType,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counselor {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Admin,
    Counselor,
}

/// Who is looking at the report. Trusted as supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerContext {
    pub role: Role,
    pub identity: Option<Uuid>,
}

impl ViewerContext {
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            identity: None,
        }
    }

    pub fn counselor(id: Uuid) -> Self {
        Self {
            role: Role::Counselor,
            identity: Some(id),
        }
    }

    pub fn scope(&self) -> Scope {
        match self.role {
            Role::Admin => Scope::All,
            Role::Counselor => match self.identity {
                Some(id) => Scope::Counselor(id),
                None => Scope::Nobody,
            },
        }
    }

    pub fn can_see(&self, counselor_id: Uuid) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Counselor => self.identity == Some(counselor_id),
        }
    }
}

/// A viewer with no identity sees no counselors.
impl Default for ViewerContext {
    fn default() -> Self {
        Self {
            role: Role::Counselor,
            identity: None,
        }
    }
}

/// Which counselors a fetch is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Counselor(Uuid),
    Nobody,
}

impl Scope {
    pub fn counselor_filter(&self) -> Option<Uuid> {
        match self {
            Scope::Counselor(id) => Some(*id),
            _ => None,
        }
    }

    pub fn includes(&self, counselor_id: Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Counselor(id) => *id == counselor_id,
            Scope::Nobody => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all counselors"),
            Scope::Counselor(id) => write!(f, "counselor {id}"),
            Scope::Nobody => f.write_str("no counselors"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_type_parsing_defaults_to_general() {
        assert_eq!(ContactType::parse_or_general(Some("phone_call")), ContactType::PhoneCall);
        assert_eq!(ContactType::parse_or_general(Some(" EMAIL ")), ContactType::Email);
        assert_eq!(ContactType::parse_or_general(Some("")), ContactType::General);
        assert_eq!(ContactType::parse_or_general(Some("carrier pigeon")), ContactType::General);
        assert_eq!(ContactType::parse_or_general(None), ContactType::General);
    }

    #[test]
    fn months_order_across_year_boundary() {
        let dec = CalendarMonth::new(2024, 12);
        assert_eq!(dec.succ(), CalendarMonth::new(2025, 1));
        assert!(dec < dec.succ());
        assert_eq!(dec.to_string(), "2024-12");
        assert_eq!("2025-03".parse::<CalendarMonth>().unwrap(), CalendarMonth::new(2025, 3));
        assert!("2025-13".parse::<CalendarMonth>().is_err());
    }

    #[test]
    fn counselor_without_identity_sees_nobody() {
        let viewer = ViewerContext::default();
        assert_eq!(viewer.role, Role::Counselor);
        assert_eq!(viewer.scope(), Scope::Nobody);
        assert!(!viewer.can_see(Uuid::new_v4()));
        assert!(ViewerContext::admin().can_see(Uuid::new_v4()));
    }
}
