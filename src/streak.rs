//! Daily-visit streak.
//!
//! Days are calendar days in the timezone of `now`, so a visit at 23:59 and
//! one at 00:01 are on different days.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Compute the new (last-access timestamp, streak) for a visit at `now`.
///
/// Same calendar day as the last access: streak unchanged. Exactly one day
/// later: streak + 1. Anything else, including a missing or unparseable last
/// access or a clock that went backwards: streak restarts at 1.
/// The stamp is always written in UTC.
pub fn touch<Tz: TimeZone>(now: &DateTime<Tz>, last_access: Option<&str>, streak: u32) -> (String, u32) {
  let stamp = now.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true);
  let last = last_access
    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    .map(|t| t.with_timezone(&now.timezone()));

  let next = match last {
    Some(last) => {
      let days = (now.date_naive() - last.date_naive()).num_days();
      match days {
        0 => streak,
        1 => streak.saturating_add(1),
        _ => 1,
      }
    }
    None => 1,
  };
  (stamp, next)
}

/// Human wording for how long ago `last_access` was, relative to `now`.
pub fn recency<Tz: TimeZone>(now: &DateTime<Tz>, last_access: Option<&str>) -> String {
  let Some(last) = last_access.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) else {
    return "never".into();
  };
  let days = (now.date_naive() - last.with_timezone(&now.timezone()).date_naive()).num_days();
  match days {
    i64::MIN..=0 => "today".into(),
    1 => "yesterday".into(),
    n => format!("{n} days ago"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::FixedOffset;

  fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
  }

  #[test]
  fn first_visit_starts_at_one() {
    let (stamp, streak) = touch(&at("2024-03-10T08:00:00Z"), None, 0);
    assert_eq!(streak, 1);
    assert_eq!(stamp, "2024-03-10T08:00:00.000Z");
  }

  #[test]
  fn same_day_visit_keeps_streak() {
    let (_, streak) = touch(&at("2024-03-10T22:00:00Z"), Some("2024-03-10T01:00:00.000Z"), 4);
    assert_eq!(streak, 4);
  }

  #[test]
  fn next_day_visit_increments() {
    let (_, streak) = touch(&at("2024-03-11T00:05:00Z"), Some("2024-03-10T23:55:00.000Z"), 4);
    assert_eq!(streak, 5);
  }

  #[test]
  fn gap_resets_to_one() {
    let (_, streak) = touch(&at("2024-03-12T09:00:00Z"), Some("2024-03-10T09:00:00.000Z"), 9);
    assert_eq!(streak, 1);
    let (_, streak) = touch(&at("2024-04-30T09:00:00Z"), Some("2024-03-10T09:00:00.000Z"), 9);
    assert_eq!(streak, 1);
  }

  #[test]
  fn unparseable_or_future_last_access_resets() {
    assert_eq!(touch(&at("2024-03-10T09:00:00Z"), Some("yesterday-ish"), 7).1, 1);
    assert_eq!(touch(&at("2024-03-10T09:00:00Z"), Some("2024-03-12T09:00:00Z"), 7).1, 1);
  }

  #[test]
  fn calendar_day_uses_local_offset() {
    // 23:30 and 00:30 the next day in UTC+2, though both are the same UTC day.
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = tz.with_ymd_and_hms(2024, 3, 11, 0, 30, 0).unwrap();
    let (stamp, streak) = touch(&now, Some("2024-03-10T21:30:00Z"), 2);
    assert_eq!(streak, 3);
    assert_eq!(stamp, "2024-03-10T22:30:00.000Z");
  }

  #[test]
  fn recency_wording() {
    let now = at("2024-03-10T12:00:00Z");
    assert_eq!(recency(&now, None), "never");
    assert_eq!(recency(&now, Some("2024-03-10T01:00:00Z")), "today");
    assert_eq!(recency(&now, Some("2024-03-09T01:00:00Z")), "yesterday");
    assert_eq!(recency(&now, Some("2024-03-01T01:00:00Z")), "9 days ago");
  }
}
