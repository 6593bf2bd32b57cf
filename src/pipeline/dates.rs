use chrono::{Datelike, Days, NaiveDate};

/// Inclusive ascending sequence of calendar dates. Empty when start is after
/// end; that is a no-op run, not an error.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// The dates a run still has to process: from the last successful run date
/// (or the configured fallback on a first run) through yesterday. Today is
/// excluded because its log objects may still be arriving.
pub fn sync_window(
    last_successful: Option<NaiveDate>,
    fallback_start: NaiveDate,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    let start = last_successful.unwrap_or(fallback_start);
    let Some(end) = today.checked_sub_days(Days::new(1)) else {
        return Vec::new();
    };
    date_range(start, end)
}

/// Storage prefix the load balancer writes a date's objects under:
/// `<base>/<year>/<MM>/<DD>/`, zero-padded.
pub fn prefix_for_date(base_path: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/{:02}/{:02}/",
        base_path,
        date.year(),
        date.month(),
        date.day()
    )
}

/// One prefix per date, in the order the dates are given.
pub fn prefixes_for(base_path: &str, dates: &[NaiveDate]) -> Vec<String> {
    dates
        .iter()
        .map(|date| prefix_for_date(base_path, *date))
        .collect()
}
