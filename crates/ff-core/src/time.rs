//! Lightweight UTC date/time utilities (no chrono dependency).
//!
//! Uses Howard Hinnant's civil_from_days / days_from_civil algorithms for
//! Unix-to-date conversion in both directions. Every timestamp the counter
//! sees is a [`Timestamp`]: elapsed-time checks and calendar keys are derived
//! from the same value, so the two can never disagree about which clock
//! was read.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_DAY: i64 = 86_400 * MS_PER_SECOND;

/// Milliseconds since the Unix epoch, UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    pub fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn unix_millis(self) -> i64 {
        self.0
    }

    /// Build a timestamp from UTC calendar fields. Returns `None` when any
    /// field is out of range.
    pub fn from_civil(
        year: i64,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return None;
        }
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        let days = days_from_civil(year, month, day);
        let secs = i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
        Some(Self(days * MS_PER_DAY + secs * MS_PER_SECOND))
    }

    /// Shift by a signed number of milliseconds.
    pub fn offset_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    pub fn plus_minutes(self, minutes: i64) -> Self {
        self.offset_millis(minutes.saturating_mul(MS_PER_MINUTE))
    }

    pub fn plus_days(self, days: i64) -> Self {
        self.offset_millis(days.saturating_mul(MS_PER_DAY))
    }

    /// Signed milliseconds from `earlier` to `self`. Negative when the clock
    /// went backwards.
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// `(year, month, day)` of this instant in UTC.
    pub fn civil_date(self) -> (i64, u32, u32) {
        civil_from_days(self.0.div_euclid(MS_PER_DAY))
    }

    /// ISO-8601 with millisecond precision: `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub fn to_iso8601(self) -> String {
        let (y, m, d) = self.civil_date();
        let ms_of_day = self.0.rem_euclid(MS_PER_DAY);
        let hours = ms_of_day / 3_600_000;
        let minutes = (ms_of_day % 3_600_000) / MS_PER_MINUTE;
        let seconds = (ms_of_day % MS_PER_MINUTE) / MS_PER_SECOND;
        let millis = ms_of_day % MS_PER_SECOND;
        format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z")
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS[.fff][Z|±HH:MM]`. Returns `None` on anything
    /// else, including out-of-range fields.
    pub fn parse_iso8601(text: &str) -> Option<Self> {
        let s = text.trim();
        let year: i64 = digits(s.get(0..4)?)?.into();
        let month = digits(s.get(5..7)?)?;
        let day = digits(s.get(8..10)?)?;
        let hour = digits(s.get(11..13)?)?;
        let minute = digits(s.get(14..16)?)?;
        let second = digits(s.get(17..19)?)?;

        let sep_ok = s.get(4..5)? == "-"
            && s.get(7..8)? == "-"
            && matches!(s.get(10..11)?, "T" | "t" | " ")
            && s.get(13..14)? == ":"
            && s.get(16..17)? == ":";
        if !sep_ok {
            return None;
        }

        let base = Self::from_civil(year, month, day, hour, minute, second)?;
        let mut rest = s.get(19..)?;

        let mut millis = 0i64;
        if let Some(frac) = rest.strip_prefix('.') {
            let len = frac.bytes().take_while(u8::is_ascii_digit).count();
            if len == 0 {
                return None;
            }
            // Keep millisecond precision, right-padding short fractions.
            let mut scale = 100;
            for b in frac.bytes().take(len.min(3)) {
                millis += i64::from(b - b'0') * scale;
                scale /= 10;
            }
            rest = &frac[len..];
        }

        let offset_ms = match rest {
            "Z" | "z" => 0,
            _ => {
                let sign = match rest.get(0..1)? {
                    "+" => 1,
                    "-" => -1,
                    _ => return None,
                };
                if rest.len() != 6 || rest.get(3..4)? != ":" {
                    return None;
                }
                let oh = digits(rest.get(1..3)?)?;
                let om = digits(rest.get(4..6)?)?;
                if oh > 23 || om > 59 {
                    return None;
                }
                sign * (i64::from(oh) * 3_600_000 + i64::from(om) * MS_PER_MINUTE)
            }
        };

        Some(base.offset_millis(millis - offset_ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Calendar day key, `YYYY-MM-DD`.
pub fn date_key(ts: Timestamp) -> String {
    let (y, m, d) = ts.civil_date();
    format!("{y:04}-{m:02}-{d:02}")
}

/// Calendar month key, `YYYY-MM`.
pub fn month_key(ts: Timestamp) -> String {
    let (y, m, _) = ts.civil_date();
    format!("{y:04}-{m:02}")
}

/// Day key of the calendar day before `ts`.
pub fn previous_date_key(ts: Timestamp) -> String {
    date_key(ts.plus_days(-1))
}

/// Month key of the calendar month before `ts`, rolling the year over in January.
pub fn previous_month_key(ts: Timestamp) -> String {
    let (y, m, _) = ts.civil_date();
    let (y, m) = if m == 1 { (y - 1, 12) } else { (y, m - 1) };
    format!("{y:04}-{m:02}")
}

/// Start of the day named by a `YYYY-MM-DD` key; `None` unless the key is
/// exactly that shape and a real calendar date.
pub fn parse_date_key(key: &str) -> Option<Timestamp> {
    if key.len() != 10 || key.get(4..5)? != "-" || key.get(7..8)? != "-" {
        return None;
    }
    let year = digits(key.get(0..4)?)?;
    let month = digits(key.get(5..7)?)?;
    let day = digits(key.get(8..10)?)?;
    Timestamp::from_civil(year.into(), month, day, 0, 0, 0)
}

/// Start of the month named by a `YYYY-MM` key.
pub fn parse_month_key(key: &str) -> Option<Timestamp> {
    if key.len() != 7 || key.get(4..5)? != "-" {
        return None;
    }
    let year = digits(key.get(0..4)?)?;
    let month = digits(key.get(5..7)?)?;
    Timestamp::from_civil(year.into(), month, 1, 0, 0, 0)
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_leap_year(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

fn days_in_month(y: i64, m: u32) -> u32 {
    match m {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(y) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Inverse of [`civil_from_days`]: (year, month, day) → Unix epoch days.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = u64::from((m + 9) % 12);
    let doy = (153 * mp + 2) / 5 + u64::from(d) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i64, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Timestamp::from_civil(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_unix_epoch() {
        assert_eq!(
            Timestamp::from_unix_millis(0).to_iso8601(),
            "1970-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_known_date() {
        // 2026-02-21T00:00:00Z = 1771632000
        assert_eq!(
            Timestamp::from_unix_millis(1_771_632_000_000).to_iso8601(),
            "2026-02-21T00:00:00.000Z"
        );
        assert_eq!(ts(2026, 2, 21, 0, 0, 0).unix_millis(), 1_771_632_000_000);
    }

    #[test]
    fn test_pre_epoch_formats() {
        let t = Timestamp::from_unix_millis(-1);
        assert_eq!(t.to_iso8601(), "1969-12-31T23:59:59.999Z");
        assert_eq!(date_key(t), "1969-12-31");
    }

    #[test]
    fn test_now_is_recent() {
        let iso = Timestamp::now().to_iso8601();
        assert!(iso.starts_with("20"), "timestamp should be in 2000s: {iso}");
    }

    #[test]
    fn test_iso_roundtrip_keeps_millis() {
        let t = Timestamp::from_unix_millis(1_704_067_200_123);
        let parsed = Timestamp::parse_iso8601(&t.to_iso8601()).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_parse_variants() {
        let base = ts(2024, 1, 1, 12, 0, 0);
        assert_eq!(Timestamp::parse_iso8601("2024-01-01T12:00:00Z"), Some(base));
        assert_eq!(
            Timestamp::parse_iso8601("2024-01-01T12:00:00.5Z"),
            Some(base.offset_millis(500))
        );
        assert_eq!(
            Timestamp::parse_iso8601("2024-01-01T14:00:00+02:00"),
            Some(base)
        );
        assert_eq!(
            Timestamp::parse_iso8601("2024-01-01T07:30:00-04:30"),
            Some(base)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "not a date",
            "2024-13-01T00:00:00Z",
            "2023-02-29T00:00:00Z",
            "2024-01-01T24:00:00Z",
            "2024-01-01T00:00:00",
            "2024-01-01T00:00:00.Z",
            "2024/01/01T00:00:00Z",
            "2024-01-01T00:00:00+0200",
            "2024-01-01T00:00:00Zjunk",
            "２０２４-01-01T00:00:00Z",
        ] {
            assert_eq!(Timestamp::parse_iso8601(bad), None, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_leap_day_accepted() {
        assert!(Timestamp::parse_iso8601("2024-02-29T00:00:00Z").is_some());
    }

    #[test]
    fn test_keys() {
        let t = ts(2024, 3, 9, 23, 59, 59);
        assert_eq!(date_key(t), "2024-03-09");
        assert_eq!(month_key(t), "2024-03");
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(parse_date_key("2024-02-29"), Some(ts(2024, 2, 29, 0, 0, 0)));
        assert_eq!(parse_month_key("2023-12"), Some(ts(2023, 12, 1, 0, 0, 0)));
        for bad in ["zzzz", "2023-02-29", "2024-13-01", "2024-1-01", "2024-01-01T", ""] {
            assert_eq!(parse_date_key(bad), None, "{bad}");
        }
        for bad in ["zzzz", "2024-00", "2024-13", "2024-1", "2024-01-01", "+024-01"] {
            assert_eq!(parse_month_key(bad), None, "{bad}");
        }
    }

    #[test]
    fn test_previous_day_crosses_month_and_year() {
        assert_eq!(previous_date_key(ts(2024, 3, 1, 0, 0, 0)), "2024-02-29");
        assert_eq!(previous_date_key(ts(2024, 1, 1, 8, 0, 0)), "2023-12-31");
    }

    #[test]
    fn test_previous_month_rolls_year() {
        assert_eq!(previous_month_key(ts(2024, 1, 15, 0, 0, 0)), "2023-12");
        assert_eq!(previous_month_key(ts(2024, 3, 31, 0, 0, 0)), "2024-02");
    }

    #[test]
    fn test_civil_conversions_agree() {
        for days in [-800_000i64, -1, 0, 1, 11_016, 19_723, 2_932_896] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }
}
