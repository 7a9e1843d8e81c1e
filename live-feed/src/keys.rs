/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Canonical logical keys for live feeds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter, Write as _};

const SEPARATOR: char = ':';
const DATE_FORMAT: &str = "%Y-%m-%d";
const OPEN_RANGE: &str = "all";
const TODAY: &str = "today";
const UNREAD: &str = "unread";

/// Resource descriptor for one live feed.
///
/// Every variant serializes to a canonical `resourceType:param:...` string through
/// [`Display`]. Equal descriptors always yield byte-identical keys, which is what lets
/// the registry deduplicate listeners across independent consumers.
///
/// ```
/// use chrono::NaiveDate;
/// use live_feed::FeedKey;
///
/// let key = FeedKey::TodayWorkStatus {
///     staff_id: "staff1".to_string(),
///     date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
/// };
/// assert_eq!(key.to_string(), "workLogs:today:staff1:2026-02-11");
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum FeedKey {
    Notifications {
        user_id: String,
    },
    UnreadCount {
        user_id: String,
    },
    Schedules {
        user_id: String,
    },
    SchedulesByMonth {
        user_id: String,
        year: i32,
        month: u32,
    },
    WorkLog {
        work_log_id: String,
    },
    WorkLogs {
        staff_id: String,
    },
    WorkLogsByRange {
        staff_id: String,
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
    TodayWorkStatus {
        staff_id: String,
        date: NaiveDate,
    },
    ConfirmedStaff {
        job_posting_id: String,
    },
    JobPosting {
        job_posting_id: String,
    },
}

impl FeedKey {
    pub fn notifications(user_id: impl Into<String>) -> Self {
        Self::Notifications {
            user_id: user_id.into(),
        }
    }

    pub fn unread_count(user_id: impl Into<String>) -> Self {
        Self::UnreadCount {
            user_id: user_id.into(),
        }
    }

    pub fn schedules(user_id: impl Into<String>) -> Self {
        Self::Schedules {
            user_id: user_id.into(),
        }
    }

    pub fn schedules_by_month(user_id: impl Into<String>, year: i32, month: u32) -> Self {
        Self::SchedulesByMonth {
            user_id: user_id.into(),
            year,
            month,
        }
    }

    pub fn work_log(work_log_id: impl Into<String>) -> Self {
        Self::WorkLog {
            work_log_id: work_log_id.into(),
        }
    }

    pub fn work_logs(staff_id: impl Into<String>) -> Self {
        Self::WorkLogs {
            staff_id: staff_id.into(),
        }
    }

    /// Work logs of one staff member, optionally bounded. Missing bounds render as `all`.
    pub fn work_logs_by_range(
        staff_id: impl Into<String>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self::WorkLogsByRange {
            staff_id: staff_id.into(),
            start,
            end,
        }
    }

    pub fn today_work_status(staff_id: impl Into<String>, date: NaiveDate) -> Self {
        Self::TodayWorkStatus {
            staff_id: staff_id.into(),
            date,
        }
    }

    pub fn confirmed_staff(job_posting_id: impl Into<String>) -> Self {
        Self::ConfirmedStaff {
            job_posting_id: job_posting_id.into(),
        }
    }

    pub fn job_posting(job_posting_id: impl Into<String>) -> Self {
        Self::JobPosting {
            job_posting_id: job_posting_id.into(),
        }
    }

    /// Leading namespace segment of the canonical key.
    pub fn resource_type(&self) -> &'static str {
        match self {
            FeedKey::Notifications { .. } | FeedKey::UnreadCount { .. } => "notifications",
            FeedKey::Schedules { .. } | FeedKey::SchedulesByMonth { .. } => "schedules",
            FeedKey::WorkLog { .. } => "workLog",
            FeedKey::WorkLogs { .. }
            | FeedKey::WorkLogsByRange { .. }
            | FeedKey::TodayWorkStatus { .. } => "workLogs",
            FeedKey::ConfirmedStaff { .. } => "confirmedStaff",
            FeedKey::JobPosting { .. } => "jobPosting",
        }
    }

    /// Canonical registry key.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

struct KeyWriter<'a, 'b> {
    f: &'a mut Formatter<'b>,
}

impl KeyWriter<'_, '_> {
    fn literal(&mut self, segment: &str) -> fmt::Result {
        write!(self.f, "{SEPARATOR}{segment}")
    }

    fn param(&mut self, value: &str) -> fmt::Result {
        self.f.write_char(SEPARATOR)?;
        write_escaped(self.f, value)
    }

    fn date(&mut self, date: &NaiveDate) -> fmt::Result {
        write!(self.f, "{SEPARATOR}{}", date.format(DATE_FORMAT))
    }

    fn optional_date(&mut self, date: Option<&NaiveDate>) -> fmt::Result {
        match date {
            Some(date) => self.date(date),
            None => self.literal(OPEN_RANGE),
        }
    }
}

/// Escapes `%` and the separator so identifiers cannot forge extra segments.
///
/// Identifiers spelled like a literal segment get their first byte percent-encoded,
/// so a staff id of `today` never lines up with the today-status layout.
fn write_escaped(f: &mut Formatter<'_>, value: &str) -> fmt::Result {
    let mut chars = value.chars();
    if matches!(value, TODAY | UNREAD | OPEN_RANGE) {
        if let Some(first) = chars.next() {
            write!(f, "%{:02X}", first as u32)?;
        }
    }
    for ch in chars {
        match ch {
            '%' => f.write_str("%25")?,
            SEPARATOR => f.write_str("%3A")?,
            other => f.write_char(other)?,
        }
    }
    Ok(())
}

impl Display for FeedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_type())?;
        let mut w = KeyWriter { f };
        match self {
            FeedKey::Notifications { user_id } => w.param(user_id),
            FeedKey::UnreadCount { user_id } => {
                w.literal(UNREAD)?;
                w.param(user_id)
            }
            FeedKey::Schedules { user_id } => w.param(user_id),
            FeedKey::SchedulesByMonth {
                user_id,
                year,
                month,
            } => {
                w.param(user_id)?;
                w.literal(&format!("{year}-{month}"))
            }
            FeedKey::WorkLog { work_log_id } => w.param(work_log_id),
            FeedKey::WorkLogs { staff_id } => w.param(staff_id),
            FeedKey::WorkLogsByRange {
                staff_id,
                start,
                end,
            } => {
                w.param(staff_id)?;
                w.optional_date(start.as_ref())?;
                w.optional_date(end.as_ref())
            }
            FeedKey::TodayWorkStatus { staff_id, date } => {
                w.literal(TODAY)?;
                w.param(staff_id)?;
                w.date(date)
            }
            FeedKey::ConfirmedStaff { job_posting_id } => w.param(job_posting_id),
            FeedKey::JobPosting { job_posting_id } => w.param(job_posting_id),
        }
    }
}

impl From<FeedKey> for String {
    fn from(key: FeedKey) -> Self {
        key.to_string()
    }
}

impl From<&FeedKey> for String {
    fn from(key: &FeedKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::FeedKey;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn canonical_keys_match_namespace_layout() {
        assert_eq!(FeedKey::notifications("user1").as_key(), "notifications:user1");
        assert_eq!(
            FeedKey::unread_count("user1").as_key(),
            "notifications:unread:user1"
        );
        assert_eq!(FeedKey::schedules("user1").as_key(), "schedules:user1");
        assert_eq!(
            FeedKey::schedules_by_month("user1", 2026, 2).as_key(),
            "schedules:user1:2026-2"
        );
        assert_eq!(FeedKey::work_log("log9").as_key(), "workLog:log9");
        assert_eq!(FeedKey::work_logs("staff1").as_key(), "workLogs:staff1");
        assert_eq!(
            FeedKey::confirmed_staff("job1").as_key(),
            "confirmedStaff:job1"
        );
        assert_eq!(FeedKey::job_posting("job1").as_key(), "jobPosting:job1");
        assert_eq!(
            FeedKey::today_work_status("staff1", date(2026, 2, 11)).as_key(),
            "workLogs:today:staff1:2026-02-11"
        );
    }

    #[test]
    fn work_logs_by_range_renders_open_bounds_as_all() {
        assert_eq!(
            FeedKey::work_logs_by_range("staff1", None, None).as_key(),
            "workLogs:staff1:all:all"
        );
        assert_eq!(
            FeedKey::work_logs_by_range("staff1", Some(date(2025, 1, 1)), Some(date(2025, 1, 31)))
                .as_key(),
            "workLogs:staff1:2025-01-01:2025-01-31"
        );
        assert_eq!(
            FeedKey::work_logs_by_range("staff1", None, Some(date(2025, 1, 31))).as_key(),
            "workLogs:staff1:all:2025-01-31"
        );
    }

    #[test]
    fn equal_descriptors_produce_identical_keys() {
        let a = FeedKey::work_logs_by_range("staff1", Some(date(2025, 3, 1)), None);
        let b = FeedKey::work_logs_by_range(String::from("staff1"), Some(date(2025, 3, 1)), None);
        assert_eq!(a.as_key().as_bytes(), b.as_key().as_bytes());
    }

    #[test]
    fn separator_in_identifiers_cannot_forge_other_keys() {
        let forged = FeedKey::work_logs("today:staff1:2026-02-11");
        let genuine = FeedKey::today_work_status("staff1", date(2026, 2, 11));
        assert_ne!(forged.as_key(), genuine.as_key());
        assert_eq!(forged.as_key(), "workLogs:today%3Astaff1%3A2026-02-11");

        let by_range = FeedKey::work_logs_by_range("today", None, Some(date(2026, 2, 11)));
        let today = FeedKey::today_work_status("all", date(2026, 2, 11));
        assert_ne!(by_range.as_key(), today.as_key());
        assert_eq!(by_range.as_key(), "workLogs:%74oday:all:2026-02-11");
        assert_eq!(today.as_key(), "workLogs:today:%61ll:2026-02-11");

        let percent = FeedKey::notifications("a%3Ab");
        let colon = FeedKey::notifications("a:b");
        assert_ne!(percent.as_key(), colon.as_key());
    }

    #[test]
    fn distinct_parameters_never_collide() {
        let keys = [
            FeedKey::notifications("u1"),
            FeedKey::notifications("u2"),
            FeedKey::unread_count("u1"),
            FeedKey::schedules("u1"),
            FeedKey::schedules_by_month("u1", 2026, 1),
            FeedKey::schedules_by_month("u1", 2026, 11),
            FeedKey::schedules_by_month("u1", 202, 61),
            FeedKey::work_logs("u1"),
            FeedKey::work_logs_by_range("u1", None, None),
            FeedKey::work_logs_by_range("u1", Some(date(2026, 1, 1)), None),
            FeedKey::today_work_status("u1", date(2026, 1, 1)),
            FeedKey::confirmed_staff("u1"),
            FeedKey::job_posting("u1"),
            FeedKey::work_log("u1"),
        ];

        let rendered: HashSet<String> = keys.iter().map(FeedKey::as_key).collect();
        assert_eq!(rendered.len(), keys.len());
    }

    #[test]
    fn feed_key_deserializes_from_tagged_json5() {
        let key: FeedKey = json5::from_str(
            r#"{ resource: "work_logs_by_range", staff_id: "staff1", start: "2025-01-01" }"#,
        )
        .expect("valid feed key");

        assert_eq!(key.as_key(), "workLogs:staff1:2025-01-01:all");
    }
}
