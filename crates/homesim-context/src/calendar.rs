//! Calendar flags: holidays, weekends, DST transitions, vacation windows

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::SimRng;

/// A per-home vacation span, drawn once at home creation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VacationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl VacationWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Fixed holiday/DST table plus vacation-window sampling
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarTable;

impl CalendarTable {
    /// US holidays observed by the simulation
    pub fn is_holiday(date: NaiveDate) -> bool {
        let y = date.year();
        let fixed = [
            NaiveDate::from_ymd_opt(y, 1, 1),
            NaiveDate::from_ymd_opt(y, 7, 4),
            NaiveDate::from_ymd_opt(y, 11, 11),
            NaiveDate::from_ymd_opt(y, 12, 25),
        ];
        if fixed.iter().flatten().any(|d| *d == date) {
            return true;
        }
        date == Self::nth_weekday(y, 5, Weekday::Mon, -1) // Memorial Day: last Monday of May
            || date == Self::nth_weekday(y, 9, Weekday::Mon, 1) // Labor Day
            || date == Self::nth_weekday(y, 11, Weekday::Thu, 4) // Thanksgiving
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Whether a DST transition happens on this date (US rule: second
    /// Sunday of March, first Sunday of November)
    pub fn is_dst_transition(date: NaiveDate) -> bool {
        let y = date.year();
        date == Self::nth_weekday(y, 3, Weekday::Sun, 2)
            || date == Self::nth_weekday(y, 11, Weekday::Sun, 1)
    }

    /// Draw this home's vacation windows for a year: one summer week and,
    /// for about half of homes, a short winter break.
    pub fn draw_vacations(rng: &mut SimRng, year: i32) -> Vec<VacationWindow> {
        let mut windows = Vec::new();

        let summer_start_doy = rng.uniform_usize(166, 236) as u32; // mid-June..late August
        let summer_len = rng.uniform_usize(5, 12) as u64;
        if let Some(start) = NaiveDate::from_yo_opt(year, summer_start_doy) {
            windows.push(VacationWindow {
                start,
                end: start + chrono::Duration::days(summer_len as i64),
            });
        }

        if rng.chance(0.5) {
            let winter_start_doy = rng.uniform_usize(355, 362) as u32;
            let winter_len = rng.uniform_usize(3, 7) as u64;
            if let Some(start) = NaiveDate::from_yo_opt(year, winter_start_doy) {
                windows.push(VacationWindow {
                    start,
                    end: start + chrono::Duration::days(winter_len as i64),
                });
            }
        }
        windows
    }

    /// Whether any of the given windows covers `ts`
    pub fn vacation_active(windows: &[VacationWindow], ts: DateTime<Utc>) -> bool {
        let date = ts.date_naive();
        windows.iter().any(|w| w.contains(date))
    }

    /// The n-th (1-based) weekday of a month; n = -1 means the last one
    fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: i32) -> NaiveDate {
        if n > 0 {
            let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
            let offset = (7 + weekday.num_days_from_monday() as i32
                - first.weekday().num_days_from_monday() as i32)
                % 7;
            first + chrono::Duration::days((offset + 7 * (n - 1)) as i64)
        } else {
            let next_month = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            }
            .expect("valid month");
            let last = next_month - chrono::Duration::days(1);
            let offset = (7 + last.weekday().num_days_from_monday() as i32
                - weekday.num_days_from_monday() as i32)
                % 7;
            last - chrono::Duration::days(offset as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_fixed_holidays() {
        assert!(CalendarTable::is_holiday(d("2025-01-01")));
        assert!(CalendarTable::is_holiday(d("2025-07-04")));
        assert!(CalendarTable::is_holiday(d("2025-12-25")));
        assert!(!CalendarTable::is_holiday(d("2025-03-03")));
    }

    #[test]
    fn test_floating_holidays_2025() {
        // 2025: Memorial Day May 26, Labor Day Sep 1, Thanksgiving Nov 27
        assert!(CalendarTable::is_holiday(d("2025-05-26")));
        assert!(CalendarTable::is_holiday(d("2025-09-01")));
        assert!(CalendarTable::is_holiday(d("2025-11-27")));
    }

    #[test]
    fn test_dst_transitions_2025() {
        assert!(CalendarTable::is_dst_transition(d("2025-03-09")));
        assert!(CalendarTable::is_dst_transition(d("2025-11-02")));
        assert!(!CalendarTable::is_dst_transition(d("2025-03-16")));
    }

    #[test]
    fn test_weekend() {
        assert!(CalendarTable::is_weekend(d("2025-01-04")));
        assert!(!CalendarTable::is_weekend(d("2025-01-06")));
    }

    #[test]
    fn test_vacations_deterministic() {
        let mut a = SimRng::new(42).derive_str("home_001");
        let mut b = SimRng::new(42).derive_str("home_001");
        assert_eq!(
            CalendarTable::draw_vacations(&mut a, 2025),
            CalendarTable::draw_vacations(&mut b, 2025)
        );

        let windows = CalendarTable::draw_vacations(&mut SimRng::new(42).derive_str("home_001"), 2025);
        assert!(!windows.is_empty());
        for w in &windows {
            assert!(w.start <= w.end);
            assert_eq!(w.start.year(), 2025);
        }
    }
}
