//! Conversion between calendar instants and serial day-counts
//!
//! A date is stored as a plain numeric cell: the integer part counts days
//! since the epoch of the workbook's date system, the fraction is the time
//! of day. The 1900 system reproduces the historical leap-year bug, so
//! serial 60 is the fictitious 1900-02-29 and every later date is one day
//! further along than a true day count would give.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// Serial of 9999-12-31 in the 1900 system
const MAX_SERIAL_1900: f64 = 2_958_465.0;

/// Workbook date system used to interpret serial date values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DateSystem {
    /// Day 1 is 1900-01-01 (includes the 1900 leap year bug)
    Excel1900,
    /// Day 0 is 1904-01-01
    Excel1904,
}

impl Default for DateSystem {
    fn default() -> Self {
        Self::Excel1900
    }
}

impl DateSystem {
    fn epoch(self) -> NaiveDate {
        match self {
            DateSystem::Excel1900 => NaiveDate::from_ymd_opt(1899, 12, 31),
            DateSystem::Excel1904 => NaiveDate::from_ymd_opt(1904, 1, 1),
        }
        .unwrap_or(NaiveDate::MIN)
    }

    fn max_serial(self) -> f64 {
        match self {
            DateSystem::Excel1900 => MAX_SERIAL_1900,
            DateSystem::Excel1904 => MAX_SERIAL_1900 - 1462.0,
        }
    }

    pub fn is_1904(self) -> bool {
        self == DateSystem::Excel1904
    }
}

/// Convert a calendar instant to a serial day-count.
///
/// Returns `None` for instants before the epoch of `system` or after
/// 9999-12-31.
pub fn to_serial(instant: NaiveDateTime, system: DateSystem) -> Option<f64> {
    let days = (instant.date() - system.epoch()).num_days();
    if days < 0 {
        return None;
    }
    // 1900-03-01 and later sit after the phantom 1900-02-29
    let days = if system == DateSystem::Excel1900 && days >= 60 {
        days + 1
    } else {
        days
    };

    let time = instant.time();
    let millis = time.num_seconds_from_midnight() as u64 * 1000
        + (time.nanosecond() % 1_000_000_000) as u64 / 1_000_000;
    let serial = days as f64 + millis as f64 / MILLIS_PER_DAY;
    if serial > system.max_serial() + 1.0 {
        return None;
    }
    Some(serial)
}

/// Convert a serial day-count back to a calendar instant, rounded to the
/// nearest millisecond.
///
/// Returns `None` for negative, non-finite or out-of-range serials.
pub fn from_serial(serial: f64, system: DateSystem) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= system.max_serial() + 1.0 {
        return None;
    }

    let mut whole = serial.floor() as i64;
    let mut millis = ((serial - whole as f64) * MILLIS_PER_DAY).round() as i64;
    if millis >= MILLIS_PER_DAY as i64 {
        whole += 1;
        millis = 0;
    }

    // Serial 60 has no real date; it lands on 1900-03-01 like serial 61
    let days = if system == DateSystem::Excel1900 && whole >= 61 {
        whole - 1
    } else if system == DateSystem::Excel1900 && whole == 60 {
        60
    } else {
        whole
    };

    let date = system.epoch().checked_add_signed(Duration::days(days))?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    midnight.checked_add_signed(Duration::milliseconds(millis))
}

/// Built-in format codes whose pattern is a date or time
const BUILTIN_DATE_CODES: &[u16] = &[
    0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x2D, 0x2E, 0x2F,
];

/// Whether a number format renders its value as a date or time.
///
/// Built-in codes are recognised directly; custom patterns are checked for
/// date/time tokens after quoted literals, escapes and bracketed colour or
/// locale sections are stripped.
pub fn is_date_format(code: u16, pattern: &str) -> bool {
    if BUILTIN_DATE_CODES.contains(&code) {
        return true;
    }
    if pattern.is_empty() {
        return false;
    }

    // Only the positive section decides
    let section = pattern.split(';').next().unwrap_or_default();
    let mut stripped = String::with_capacity(section.len());
    let mut chars = section.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut inner = String::new();
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                    inner.push(q);
                }
                // [h], [mm], [ss] are elapsed-time tokens
                if inner.chars().all(|ch| matches!(ch, 'h' | 'H' | 'm' | 'M' | 's' | 'S'))
                    && !inner.is_empty()
                {
                    stripped.push_str(&inner);
                }
            }
            _ => stripped.push(c),
        }
    }

    let upper = stripped.to_ascii_uppercase();
    let upper = upper.replace("AM/PM", "").replace("A/P", "");
    let has_token = upper
        .chars()
        .any(|c| matches!(c, 'Y' | 'M' | 'D' | 'H' | 'S'));
    has_token
        && upper
            .chars()
            .all(|c| matches!(c, 'Y' | 'M' | 'D' | 'H' | 'S' | 'E' | '0' | '-' | '/' | ',' | '.' | ' ' | ':'))
}
