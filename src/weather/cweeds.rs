//! Canadian Weather Energy and Engineering Datasets (CWEEDS).
//!
//! Hourly files come in two fixed-width variants told apart by their
//! extension: WY2 files are data rows only, WY3 files start with a comma
//! separated station header and shift every data row by two characters.
//! Global horizontal irradiance is read in kJ/m² and stored in MJ/m².

use {
    crate::{
        columns::Column,
        utils::{first_field, spreadsheet_serial},
    },
    anyhow::{anyhow, bail, Context, Result},
    log::debug,
    ndarray::{s, Array1, Axis},
    serde::{Deserialize, Serialize},
    std::{fmt, fs, path::Path},
};

const YEAR: Column = Column::new("year", 6, 10);
const MONTH: Column = Column::new("month", 10, 12);
const DAY: Column = Column::new("day", 12, 14);
const HOUR: Column = Column::new("hour", 14, 16);
const IRRADIANCE: Column = Column::new("global irradiance", 20, 24);

/// kJ/m² to MJ/m²
const IRRADIANCE_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CweedsFormat {
    Wy2,
    Wy3,
    /// A WY2 dataset merged with a WY3 dataset
    Wy2Wy3,
}

impl CweedsFormat {
    /// Format of a CWEEDS file given by its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if ext.eq_ignore_ascii_case("WY2") {
            Ok(CweedsFormat::Wy2)
        } else if ext.eq_ignore_ascii_case("WY3") {
            Ok(CweedsFormat::Wy3)
        } else {
            bail!(
                "\"{}\" is not a valid file extension for {}, CWEEDS files must have either a WY2 or WY3 extension",
                ext,
                path.display()
            )
        }
    }

    /// Number of characters preceding the data fields of every row.
    fn char_offset(self) -> usize {
        match self {
            CweedsFormat::Wy3 => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for CweedsFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CweedsFormat::Wy2 => write!(f, "WY2"),
            CweedsFormat::Wy3 => write!(f, "WY3"),
            CweedsFormat::Wy2Wy3 => write!(f, "WY2+WY3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    Hourly,
    Daily,
}

/// Station description found on the first line of WY3 files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationHeader {
    pub horz_version: String,
    pub location: String,
    pub province: String,
    pub country: String,
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: f64,
    pub elevation: f64,
}

impl StationHeader {
    fn parse(line: &str) -> Result<Self> {
        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        if fields.len() < 9 {
            bail!("Expected 9 header fields, found {}", fields.len());
        }

        let number = |i: usize, name: &str| {
            fields[i]
                .parse::<f64>()
                .with_context(|| format!("Invalid {} \"{}\"", name, fields[i]))
        };

        Ok(Self {
            horz_version: fields[0].to_owned(),
            location: fields[1].to_owned(),
            province: fields[2].to_owned(),
            country: fields[3].to_owned(),
            station_id: fields[4].to_owned(),
            latitude: number(5, "latitude")?,
            longitude: number(6, "longitude")?,
            time_zone: number(7, "time zone")?,
            elevation: number(8, "elevation")?,
        })
    }
}

/// Solar irradiance time series. All arrays are parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDataset {
    pub years: Array1<i32>,
    pub months: Array1<u32>,
    pub days: Array1<u32>,
    /// Hour of the day, starting at 0
    pub hours: Array1<u32>,
    /// Spreadsheet numeric date
    pub time: Array1<f64>,
    /// Global horizontal irradiance in MJ/m²
    pub irradiance: Array1<f64>,

    pub header: Option<StationHeader>,
    pub time_format: TimeFormat,
    pub format: CweedsFormat,
}

impl WeatherDataset {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Checks that every array has the same length.
    pub fn validate(&self) -> Result<()> {
        let n = self.time.len();
        let lengths = [
            ("years", self.years.len()),
            ("months", self.months.len()),
            ("days", self.days.len()),
            ("hours", self.hours.len()),
            ("irradiance", self.irradiance.len()),
        ];

        for (name, len) in lengths.iter() {
            if *len != n {
                bail!("{} has {} entries but time has {}", name, len, n);
            }
        }

        Ok(())
    }

    /// Sums the hourly irradiance of every day. Calendar fields are taken from
    /// the first hour of each day.
    pub fn to_daily(&self) -> Result<Self> {
        self.validate()?;
        if self.time_format != TimeFormat::Hourly {
            bail!("Only hourly datasets can be aggregated to daily values");
        }
        if self.len() % 24 != 0 {
            bail!(
                "{} hourly rows is not a whole number of days",
                self.len()
            );
        }
        let ndays = self.len() / 24;

        let irradiance = self
            .irradiance
            .clone()
            .into_shape((ndays, 24))?
            .sum_axis(Axis(1));

        Ok(Self {
            years: self.years.slice(s![..;24]).to_owned(),
            months: self.months.slice(s![..;24]).to_owned(),
            days: self.days.slice(s![..;24]).to_owned(),
            hours: Array1::zeros(ndays),
            time: self.time.slice(s![..;24]).to_owned(),
            irradiance,
            header: self.header.clone(),
            time_format: TimeFormat::Daily,
            format: self.format,
        })
    }

    /// Joins a WY2 dataset with a WY3 dataset of the same time format.
    ///
    /// The merged time axis is the sorted union of both time axes. Where both
    /// datasets have a value for the same time, the WY3 value is kept. The
    /// station header is taken from the WY3 dataset.
    pub fn merge(wy2: &Self, wy3: &Self) -> Result<Self> {
        if wy2.format != CweedsFormat::Wy2 {
            bail!("Expected a WY2 dataset, found {}", wy2.format);
        }
        if wy3.format != CweedsFormat::Wy3 {
            bail!("Expected a WY3 dataset, found {}", wy3.format);
        }
        if wy2.time_format != wy3.time_format {
            bail!(
                "Cannot merge {:?} and {:?} datasets",
                wy2.time_format,
                wy3.time_format
            );
        }
        wy2.validate()?;
        wy3.validate()?;

        let mut time = wy2.time.iter().chain(wy3.time.iter()).copied().collect::<Vec<_>>();
        time.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        time.dedup();
        let n = time.len();

        let mut merged = Self {
            years: Array1::zeros(n),
            months: Array1::zeros(n),
            days: Array1::zeros(n),
            hours: Array1::zeros(n),
            time: Array1::from(time),
            irradiance: Array1::zeros(n),
            header: wy3.header.clone(),
            time_format: wy3.time_format,
            format: CweedsFormat::Wy2Wy3,
        };

        for dataset in &[wy2, wy3] {
            for (k, t) in dataset.time.iter().enumerate() {
                let i = merged
                    .time
                    .as_slice()
                    .and_then(|time| {
                        time.binary_search_by(|x| {
                            x.partial_cmp(t).unwrap_or(std::cmp::Ordering::Less)
                        })
                        .ok()
                    })
                    .ok_or_else(|| anyhow!("Time {} is not on the merged axis", t))?;

                merged.years[i] = dataset.years[k];
                merged.months[i] = dataset.months[k];
                merged.days[i] = dataset.days[k];
                merged.hours[i] = dataset.hours[k];
                merged.irradiance[i] = dataset.irradiance[k];
            }
        }

        Ok(merged)
    }
}

/// Reads a CWEEDS file and aggregates it to daily values.
pub fn read<P: AsRef<Path>>(path: P) -> Result<WeatherDataset> {
    read_hourly(path)?.to_daily()
}

/// Reads a CWEEDS file, keeping its hourly values.
pub fn read_hourly<P: AsRef<Path>>(path: P) -> Result<WeatherDataset> {
    let path = path.as_ref();
    let format = CweedsFormat::from_path(path)?;

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read CWEEDS file {}", path.display()))?;

    let dataset = parse(&text, format)
        .with_context(|| format!("Invalid CWEEDS file {}", path.display()))?;
    debug!(
        "Read {} hourly rows in {} format from {}",
        dataset.len(),
        format,
        path.display()
    );

    Ok(dataset)
}

/// Parses the hourly rows of a CWEEDS file in the given format.
pub fn parse(text: &str, format: CweedsFormat) -> Result<WeatherDataset> {
    let mut lines = text.lines().enumerate().filter_map(|(i, line)| {
        first_field(line)
            .filter(|field| !field.trim().is_empty())
            .map(|_| (i, line))
    });

    let header = match format {
        CweedsFormat::Wy3 => {
            let (_, line) = lines.next().ok_or_else(|| anyhow!("Missing WY3 header"))?;
            Some(StationHeader::parse(line).context("Invalid WY3 header")?)
        }
        CweedsFormat::Wy2 => None,
        CweedsFormat::Wy2Wy3 => bail!("{} is not a file format", format),
    };

    let offset = format.char_offset();

    let mut years = Vec::new();
    let mut months = Vec::new();
    let mut days = Vec::new();
    let mut hours = Vec::new();
    let mut time = Vec::new();
    let mut irradiance = Vec::new();

    for (i, line) in lines {
        let line = first_field(line).unwrap_or_default();
        let field = |column: &Column| {
            column
                .parse::<i64>(line, offset)
                .ok_or_else(|| anyhow!("Invalid {} on line {}", column.name, i + 1))
        };

        let year = field(&YEAR)? as i32;
        let month = field(&MONTH)? as u32;
        let day = field(&DAY)? as u32;
        let hour = field(&HOUR)? - 1;
        if hour < 0 {
            bail!("Invalid hour on line {}", i + 1);
        }
        let hour = hour as u32;

        let serial = spreadsheet_serial(year, month, day, hour).ok_or_else(|| {
            anyhow!(
                "Invalid date {}-{:02}-{:02} hour {} on line {}",
                year,
                month,
                day,
                hour,
                i + 1
            )
        })?;

        years.push(year);
        months.push(month);
        days.push(day);
        hours.push(hour);
        time.push(serial);
        irradiance.push(
            IRRADIANCE
                .parse::<f64>(line, offset)
                .ok_or_else(|| anyhow!("Invalid {} on line {}", IRRADIANCE.name, i + 1))?
                / IRRADIANCE_SCALE,
        );
    }

    Ok(WeatherDataset {
        years: Array1::from(years),
        months: Array1::from(months),
        days: Array1::from(days),
        hours: Array1::from(hours),
        time: Array1::from(time),
        irradiance: Array1::from(irradiance),
        header,
        time_format: TimeFormat::Hourly,
        format,
    })
}
