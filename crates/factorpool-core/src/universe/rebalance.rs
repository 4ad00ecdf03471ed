use std::collections::BTreeSet;

use factorpool_warehouse::CalendarRow;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::TradeDate;

/// What to do when an anchor falls on a closed day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    /// Skip the anchor for that year.
    #[default]
    ExactDay,
    /// Use the first open day on or after the anchor.
    NextOpenDay,
}

/// Rebalance dates in `[start, end]`, ascending and unique.
///
/// An anchor (`MMDD`) that does not exist in a given year, such as `0229`
/// outside leap years, yields nothing for that year.
pub fn select_dates(
    calendar: &[CalendarRow],
    start: &TradeDate,
    end: &TradeDate,
    anchors: &[String],
    policy: AnchorPolicy,
) -> Vec<TradeDate> {
    let open_days = open_days(calendar, start, end);

    let mut selected = BTreeSet::new();
    for year in start.date().year()..=end.date().year() {
        for anchor in anchors {
            let Ok(anchor_day) = TradeDate::parse(&format!("{year:04}{anchor}")) else {
                continue;
            };
            if anchor_day < *start || anchor_day > *end {
                continue;
            }

            let chosen = match policy {
                AnchorPolicy::ExactDay => open_days.binary_search(&anchor_day).ok(),
                AnchorPolicy::NextOpenDay => {
                    let index = open_days.partition_point(|day| *day < anchor_day);
                    (index < open_days.len()).then_some(index)
                }
            };
            if let Some(index) = chosen {
                selected.insert(open_days[index].clone());
            }
        }
    }

    selected.into_iter().collect()
}

fn open_days(calendar: &[CalendarRow], start: &TradeDate, end: &TradeDate) -> Vec<TradeDate> {
    let mut days = calendar
        .iter()
        .filter(|row| row.is_open)
        .filter_map(|row| match TradeDate::parse(&row.cal_date) {
            Ok(date) => Some(date),
            Err(_) => {
                warn!(cal_date = %row.cal_date, "ignoring malformed calendar date");
                None
            }
        })
        .filter(|date| date >= start && date <= end)
        .collect::<Vec<_>>();
    days.sort();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, is_open: bool) -> CalendarRow {
        CalendarRow {
            exchange: String::from("SSE"),
            cal_date: date.to_owned(),
            is_open,
        }
    }

    fn date(value: &str) -> TradeDate {
        TradeDate::parse(value).expect("date")
    }

    fn anchors() -> Vec<String> {
        vec![String::from("0430"), String::from("1031")]
    }

    fn as_strings(dates: &[TradeDate]) -> Vec<&str> {
        dates.iter().map(TradeDate::as_str).collect()
    }

    #[test]
    fn open_anchor_days_are_selected_in_order() {
        let calendar = vec![
            day("20061031", true),
            day("20060430", true),
            day("20051031", true),
            day("20050430", false),
            day("20060501", true),
        ];

        let dates = select_dates(
            &calendar,
            &date("20050430"),
            &date("20061231"),
            &anchors(),
            AnchorPolicy::ExactDay,
        );
        assert_eq!(as_strings(&dates), vec!["20051031", "20060430", "20061031"]);
    }

    #[test]
    fn closed_anchor_rolls_forward_under_next_open_day() {
        let calendar = vec![
            day("20050430", false),
            day("20050501", false),
            day("20050509", true),
            day("20051031", true),
        ];

        let dates = select_dates(
            &calendar,
            &date("20050430"),
            &date("20051231"),
            &anchors(),
            AnchorPolicy::NextOpenDay,
        );
        assert_eq!(as_strings(&dates), vec!["20050509", "20051031"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let calendar = vec![day("20190430", true), day("20181031", true)];
        let dates = select_dates(
            &calendar,
            &date("20190430"),
            &date("20190430"),
            &anchors(),
            AnchorPolicy::ExactDay,
        );
        assert_eq!(as_strings(&dates), vec!["20190430"]);
    }
}
