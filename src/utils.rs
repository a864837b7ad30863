use chrono::NaiveDate;

/// Whether `year` is a leap year of the proleptic Gregorian calendar.
pub fn is_leap(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

pub fn days_in_year(year: i32) -> usize {
    if is_leap(year) {
        366
    } else {
        365
    }
}

/// Number of days in `month` (1-12) of `year`, `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<usize> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };

    Some(next.signed_duration_since(first).num_days() as usize)
}

/// Spreadsheet numeric date (1900 date system): days since 1899-12-30 plus
/// the fraction of the day given by `hour`. Dates before 1900-03-01 are
/// ambiguous in that system and have no serial.
pub fn spreadsheet_serial(year: i32, month: u32, day: u32, hour: u32) -> Option<f64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    if hour > 23 || date < NaiveDate::from_ymd_opt(1900, 3, 1)? {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;

    Some(date.signed_duration_since(epoch).num_days() as f64 + f64::from(hour) / 24.0)
}

/// First field of a comma separated line, the way the HELP tooling has always
/// read its text reports. An empty line has no field.
pub fn first_field(line: &str) -> Option<&str> {
    if line.is_empty() {
        None
    } else {
        line.split(',').next()
    }
}

#[cfg(test)]
pub(crate) fn assert_approx_eq_slice(a: &[f64], b: &[f64], epsilon: f64) {
    assert_eq!(a.len(), b.len());
    for (i, e) in a.iter().enumerate() {
        approx::assert_abs_diff_eq!(*e, b[i], epsilon = epsilon);
    }
}
