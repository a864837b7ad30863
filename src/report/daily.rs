//! Daily output section of a HELP output report.
//!
//! Each simulated year opens with a `DAILY OUTPUT FOR YEAR <year>` line and is
//! followed by one fixed-width row per day. Rows are only accepted while a year
//! is open; the year closes on its last day so that the summaries printed after
//! the daily tables are never mistaken for data.

use {
    crate::{
        columns::Column,
        utils::{days_in_year, first_field},
    },
    anyhow::{anyhow, Context, Result},
    log::debug,
    ndarray::Array1,
    serde::{Deserialize, Serialize},
    std::{fs, path::Path, str::FromStr},
};

const LAYERS_MARKER: &str = "TOTAL NUMBER OF LAYERS";
const SUBPROFILES_MARKER: &str = "TOTAL NUMBER OF SUBPROFILES";
const YEAR_MARKER: &str = "DAILY OUTPUT FOR YEAR";

/// Names of the daily variables, in the order of [`DAILY_COLUMNS`].
pub const VARIABLES: [&str; 8] = [
    "rain",
    "runoff",
    "et",
    "ezone",
    "head first",
    "drain first",
    "leak first",
    "leak last",
];

pub const DAY_COLUMN: Column = Column::new("day", 2, 5);

/// Column layout of a daily row. The last column is anchored to the end of
/// the line since its position depends on the number of layers.
pub const DAILY_COLUMNS: [Column; 8] = [
    Column::new("rain", 13, 19),
    Column::new("runoff", 19, 26),
    Column::new("et", 26, 33),
    Column::new("ezone", 33, 41),
    Column::new("head first", 41, 51),
    Column::new("drain first", 51, 61),
    Column::new("leak first", 61, 71),
    Column::tail("leak last", 10),
];

/// A single parsed daily row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRow {
    pub day: u16,
    /// Values in the order of [`DAILY_COLUMNS`].
    pub values: [f32; 8],
}

/// Attempts to read `line` as a daily data row. `None` means the line is not a
/// data row: a blank separator, a column header, a summary line and so on.
pub fn parse_row(line: &str) -> Option<DailyRow> {
    let day = DAY_COLUMN.parse(line, 0)?;

    let mut values = [0.0; 8];
    for (value, column) in values.iter_mut().zip(DAILY_COLUMNS.iter()) {
        *value = column.parse(line, 0)?;
    }

    Some(DailyRow { day, values })
}

/// Daily output of a HELP run, one entry per simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTable {
    pub years: Array1<u16>,
    pub days: Array1<u16>,
    pub rain: Array1<f32>,
    pub runoff: Array1<f32>,
    pub et: Array1<f32>,
    pub ezone: Array1<f32>,
    pub head_first: Array1<f32>,
    pub drain_first: Array1<f32>,
    pub leak_first: Array1<f32>,
    pub leak_last: Array1<f32>,

    /// Total number of layers of the simulated profile
    pub layers: Option<usize>,
    /// Total number of subprofiles of the simulated profile
    pub subprofiles: Option<usize>,
}

impl DailyTable {
    pub fn variable(&self, name: &str) -> Option<&Array1<f32>> {
        match name {
            "rain" => Some(&self.rain),
            "runoff" => Some(&self.runoff),
            "et" => Some(&self.et),
            "ezone" => Some(&self.ezone),
            "head first" => Some(&self.head_first),
            "drain first" => Some(&self.drain_first),
            "leak first" => Some(&self.leak_first),
            "leak last" => Some(&self.leak_last),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Reads the daily output from the HELP report at `path`.
pub fn read<P: AsRef<Path>>(path: P) -> Result<DailyTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read HELP report {}", path.display()))?;

    let table = parse(&text).with_context(|| format!("Invalid HELP report {}", path.display()))?;
    debug!("Read {} days of output from {}", table.len(), path.display());

    Ok(table)
}

/// Parses the daily output of a HELP report.
pub fn parse(text: &str) -> Result<DailyTable> {
    let mut layers = None;
    let mut subprofiles = None;

    let mut years = Vec::new();
    let mut days = Vec::new();
    let mut columns = vec![Vec::new(); DAILY_COLUMNS.len()];

    // Year being read and its number of days
    let mut current: Option<(u16, usize)> = None;

    for (i, line) in text.lines().enumerate() {
        let line = match first_field(line) {
            Some(line) => line,
            None => continue,
        };

        if line.contains(LAYERS_MARKER) {
            layers = Some(last_token(line).with_context(|| format!("Line {}", i + 1))?);
        } else if line.contains(SUBPROFILES_MARKER) {
            subprofiles = Some(last_token(line).with_context(|| format!("Line {}", i + 1))?);
        }

        if line.contains(YEAR_MARKER) {
            let year: u16 = last_token(line).with_context(|| format!("Line {}", i + 1))?;
            current = Some((year, days_in_year(i32::from(year))));
        } else if let Some((year, length)) = current {
            if let Some(row) = parse_row(line) {
                years.push(year);
                days.push(row.day);
                for (column, value) in columns.iter_mut().zip(row.values.iter()) {
                    column.push(*value);
                }

                if usize::from(row.day) == length {
                    current = None;
                }
            }
        }
    }

    let mut columns = columns.into_iter().map(Array1::from);
    let mut next = || columns.next().unwrap_or_else(|| Array1::zeros(0));

    Ok(DailyTable {
        years: Array1::from(years),
        days: Array1::from(days),
        rain: next(),
        runoff: next(),
        et: next(),
        ezone: next(),
        head_first: next(),
        drain_first: next(),
        leak_first: next(),
        leak_last: next(),
        layers,
        subprofiles,
    })
}

fn last_token<T: FromStr>(line: &str) -> Result<T> {
    line.split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| anyhow!("Expected a number at the end of \"{}\"", line.trim()))
}
