use std::collections::HashMap;

use factorpool_warehouse::NameHistoryRow;

#[derive(Debug, Clone)]
struct NameInterval {
    start: String,
    end: Option<String>,
    name: String,
}

/// Per-code name intervals sorted by start date, for point-in-time name lookups.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_code: HashMap<String, Vec<NameInterval>>,
}

impl NameIndex {
    pub fn build(rows: impl IntoIterator<Item = NameHistoryRow>) -> Self {
        let mut by_code: HashMap<String, Vec<NameInterval>> = HashMap::new();
        for row in rows {
            by_code.entry(row.code).or_default().push(NameInterval {
                start: row.start_date,
                end: row.end_date,
                name: row.name,
            });
        }
        for intervals in by_code.values_mut() {
            intervals.sort_by(|left, right| left.start.cmp(&right.start));
        }
        Self { by_code }
    }

    /// Name in effect for `code` on `date`: the latest interval starting on or
    /// before `date` whose end is open or not before `date`.
    pub fn name_on(&self, code: &str, date: &str) -> Option<&str> {
        let intervals = self.by_code.get(code)?;
        let after = intervals.partition_point(|interval| interval.start.as_str() <= date);
        let candidate = intervals.get(after.checked_sub(1)?)?;
        match candidate.end.as_deref() {
            Some(end) if end < date => None,
            _ => Some(candidate.name.as_str()),
        }
    }

    pub fn code_count(&self) -> usize {
        self.by_code.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(code: &str, name: &str, start: &str, end: Option<&str>) -> NameHistoryRow {
        NameHistoryRow {
            code: code.to_owned(),
            name: name.to_owned(),
            start_date: start.to_owned(),
            end_date: end.map(str::to_owned),
        }
    }

    fn index() -> NameIndex {
        NameIndex::build(vec![
            interval("000001.SZ", "PAB", "20120801", None),
            interval("000001.SZ", "SDB A", "19910403", Some("20070619")),
            interval("000001.SZ", "ST SDB", "20070620", Some("20120731")),
        ])
    }

    #[test]
    fn finds_the_interval_covering_a_date() {
        let index = index();
        assert_eq!(index.name_on("000001.SZ", "20110430"), Some("ST SDB"));
        assert_eq!(index.name_on("000001.SZ", "20130430"), Some("PAB"));
        assert_eq!(index.name_on("000001.SZ", "19950101"), Some("SDB A"));
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let index = index();
        assert_eq!(index.name_on("000001.SZ", "20070620"), Some("ST SDB"));
        assert_eq!(index.name_on("000001.SZ", "20120731"), Some("ST SDB"));
        assert_eq!(index.name_on("000001.SZ", "20120801"), Some("PAB"));
    }

    #[test]
    fn touching_intervals_resolve_to_the_later_name() {
        let index = NameIndex::build(vec![
            interval("000001.SZ", "中银", "20120101", None),
            interval("000001.SZ", "ST中银", "20100101", Some("20120101")),
        ]);
        assert_eq!(index.name_on("000001.SZ", "20111231"), Some("ST中银"));
        assert_eq!(index.name_on("000001.SZ", "20120101"), Some("中银"));
        assert_eq!(index.name_on("000001.SZ", "20130430"), Some("中银"));
    }

    #[test]
    fn gaps_and_unknown_codes_have_no_name() {
        let index = NameIndex::build(vec![interval(
            "600000.SH",
            "SPDB",
            "20000101",
            Some("20001231"),
        )]);
        assert_eq!(index.name_on("600000.SH", "19991231"), None);
        assert_eq!(index.name_on("600000.SH", "20010101"), None);
        assert_eq!(index.name_on("000002.SZ", "20010101"), None);
        assert_eq!(index.code_count(), 1);
    }
}
