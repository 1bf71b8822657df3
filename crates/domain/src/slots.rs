//! Wall-clock publication slots and their placement in a named timezone

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Most slots a single day can carry
pub const MAX_SLOTS_PER_DAY: usize = 6;

/// A fixed time of day, rendered as zero-padded `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour <= 23 && minute <= 59 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot time '{0}': expected HH:MM")]
pub struct InvalidSlotTime(pub String);

impl FromStr for SlotTime {
    type Err = InvalidSlotTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSlotTime(s.to_string());
        let (hh, mm) = s.trim().split_once(':').ok_or_else(invalid)?;
        if mm.contains(':') {
            return Err(invalid());
        }

        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(hh) || !digits(mm) {
            return Err(invalid());
        }

        let hour: u8 = hh.parse().map_err(|_| invalid())?;
        let minute: u8 = mm.parse().map_err(|_| invalid())?;
        SlotTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse configured post times, dropping invalid entries and duplicates
pub fn parse_post_times<S: AsRef<str>>(values: &[S]) -> Vec<SlotTime> {
    let mut out: Vec<SlotTime> = Vec::new();
    for raw in values {
        match raw.as_ref().parse::<SlotTime>() {
            Ok(slot) if !out.contains(&slot) => out.push(slot),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Dropping invalid post time"),
        }
    }
    out
}

/// The calendar day in `tz` at instant `now`
pub fn local_day(tz: &Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

/// The first instant strictly after `after` at which `slot` occurs in `tz`
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// nonexistent ones (spring-forward gap) shift forward by an hour.
pub fn next_fire(slot: SlotTime, tz: &Tz, after: DateTime<Utc>) -> DateTime<Utc> {
    let start = local_day(tz, after);
    for offset in 0..=2 {
        let date = start + Duration::days(offset);
        if let Some(candidate) = resolve_local(tz, date.and_time(slot.to_naive_time())) {
            if candidate > after {
                return candidate;
            }
        }
    }
    after + Duration::days(1)
}

fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|t| t.with_timezone(&Utc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(s: &str) -> SlotTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_post_times_drops_invalid_entries() {
        let got = parse_post_times(&["09:00", "9:aa", "25:00", "18:30", "xx", "00:00"]);
        let rendered: Vec<String> = got.iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered, vec!["09:00", "18:30", "00:00"]);
    }

    #[test]
    fn test_parse_pads_single_digit_hour() {
        assert_eq!(slot("9:05").to_string(), "09:05");
        assert!("09:60".parse::<SlotTime>().is_err());
        assert!("09:00:00".parse::<SlotTime>().is_err());
        assert!(":30".parse::<SlotTime>().is_err());
        assert!("-1:30".parse::<SlotTime>().is_err());
    }

    #[test]
    fn test_parse_post_times_removes_duplicates() {
        let got = parse_post_times(&["09:00", "9:00", "12:00"]);
        assert_eq!(got, vec![slot("09:00"), slot("12:00")]);
    }

    #[test]
    fn test_next_fire_later_today() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        // 07:00 UTC is 09:00 in Berlin during summer time
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 6, 0, 0).unwrap();
        let fire = next_fire(slot("09:00"), &tz, now);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 7, 1, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();
        let fire = next_fire(slot("09:00"), &tz, now);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 7, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_skips_dst_gap() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        // 2026-03-29 02:30 does not exist in Berlin
        let now = Utc.with_ymd_and_hms(2026, 3, 28, 23, 0, 0).unwrap();
        let fire = next_fire(slot("02:30"), &tz, now);
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_local_day_uses_timezone() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 20, 0, 0).unwrap();
        assert_eq!(local_day(&tz, now), NaiveDate::from_ymd_opt(2026, 7, 2).unwrap());
    }

    #[test]
    fn test_slot_serde_as_string() {
        let json = serde_json::to_string(&slot("18:30")).unwrap();
        assert_eq!(json, "\"18:30\"");
        let back: SlotTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot("18:30"));
    }
}
