//! Daily weather input files of the HELP model.
//!
//! Precipitation (`.D4`), mean air temperature (`.D7`) and global solar
//! radiation (`.D13`) share a layout: a header giving the data source, the unit
//! system and the city (plus the latitude for solar radiation), then for every
//! year 37 rows holding the year and ten daily values, the last row padded
//! with zeros. Only the field widths and precision differ.

use {
    crate::{columns::Column, utils::days_in_year},
    anyhow::{anyhow, bail, Context, Result},
    log::debug,
    ndarray::{Array1, ArrayView1},
    std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    },
};

/// Data entered by the user
const DATA_SOURCE: u8 = 3;
/// SI units
const UNIT_SYSTEM: u8 = 2;
const CITY_WIDTH: usize = 40;
const HEADER_LINES: usize = 4;

const ROWS_PER_YEAR: usize = 37;
const VALUES_PER_ROW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpInputKind {
    /// Daily precipitation in mm
    Precipitation,
    /// Daily mean air temperature in °C
    AirTemperature,
    /// Daily global solar radiation in MJ/m²
    SolarRadiation,
}

impl HelpInputKind {
    pub fn extension(self) -> &'static str {
        match self {
            HelpInputKind::Precipitation => "D4",
            HelpInputKind::AirTemperature => "D7",
            HelpInputKind::SolarRadiation => "D13",
        }
    }

    /// Kind of HELP input file given by its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        [
            HelpInputKind::Precipitation,
            HelpInputKind::AirTemperature,
            HelpInputKind::SolarRadiation,
        ]
        .iter()
        .copied()
        .find(|kind| ext.eq_ignore_ascii_case(kind.extension()))
        .ok_or_else(|| {
            anyhow!(
                "\"{}\" is not a valid file extension for {}, expected D4, D7 or D13",
                ext,
                path.display()
            )
        })
    }

    fn year_width(self) -> usize {
        match self {
            HelpInputKind::Precipitation => 10,
            _ => 5,
        }
    }

    fn value_width(self) -> usize {
        match self {
            HelpInputKind::Precipitation => 5,
            _ => 6,
        }
    }

    fn precision(self) -> usize {
        match self {
            HelpInputKind::SolarRadiation => 2,
            _ => 1,
        }
    }
}

/// Renders the header block. The latitude is only written for solar radiation.
pub fn format_header(kind: HelpInputKind, city: &str, latitude: Option<f64>) -> Result<Vec<String>> {
    let city = city.chars().take(CITY_WIDTH).collect::<String>();

    let mut lines = vec![
        format!("{:>2}", DATA_SOURCE),
        format!("{:>2}", UNIT_SYSTEM),
        format!("{:<width$}", city, width = CITY_WIDTH),
    ];

    if kind == HelpInputKind::SolarRadiation {
        let latitude = latitude
            .ok_or_else(|| anyhow!("A latitude is required for solar radiation data"))?;
        lines.push(format!("{:>6.2}", latitude));
    } else {
        lines.push(String::new());
    }

    Ok(lines)
}

/// Renders the data block, one 37 row block per year in increasing order.
///
/// Every year must be complete: 366 values for leap years, 365 otherwise.
pub fn format_data(
    kind: HelpInputKind,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
) -> Result<Vec<String>> {
    if years.len() != values.len() {
        bail!(
            "{} years given for {} values",
            years.len(),
            values.len()
        );
    }

    let mut by_year = BTreeMap::<i32, Vec<f64>>::new();
    for (year, value) in years.iter().zip(values.iter()) {
        by_year.entry(*year).or_default().push(*value);
    }

    let (year_width, width, precision) = (kind.year_width(), kind.value_width(), kind.precision());

    let mut lines = Vec::with_capacity(by_year.len() * ROWS_PER_YEAR);
    for (year, mut data) in by_year {
        let expected = days_in_year(year);
        if data.len() != expected {
            bail!(
                "Year {} has {} daily values, expected {}",
                year,
                data.len(),
                expected
            );
        }

        data.resize(ROWS_PER_YEAR * VALUES_PER_ROW, 0.0);

        for row in data.chunks(VALUES_PER_ROW) {
            let mut line = format!("{:>width$}", year, width = year_width);
            for value in row {
                line.push_str(&format!(
                    "{:>width$.precision$}",
                    value,
                    width = width,
                    precision = precision
                ));
            }
            lines.push(line);
        }
    }

    Ok(lines)
}

/// Renders a complete HELP input file.
pub fn render(
    kind: HelpInputKind,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    city: &str,
    latitude: Option<f64>,
) -> Result<String> {
    let header = format_header(kind, city, latitude)?;
    let data = format_data(kind, years, values)?;

    let mut text = String::new();
    for line in header.iter().chain(data.iter()) {
        text.push_str(line);
        text.push('\n');
    }

    Ok(text)
}

/// Writes a daily time series to `path`, the extension of which selects the
/// kind of input file. Nothing is written if the series is invalid.
pub fn save_help_input<P: AsRef<Path>>(
    path: P,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    city: &str,
    latitude: Option<f64>,
) -> Result<()> {
    let path = path.as_ref();
    let kind = HelpInputKind::from_path(path)?;

    let text = render(kind, years, values, city, latitude)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {} input file {}", kind.extension(), path.display());

    Ok(())
}

/// Writes a daily precipitation series (mm), appending `.D4` to `path` if
/// needed. Returns the path written.
pub fn save_precip<P: AsRef<Path>>(
    path: P,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    city: &str,
) -> Result<PathBuf> {
    let path = with_extension(path.as_ref(), HelpInputKind::Precipitation);
    save_help_input(&path, years, values, city, None)?;
    Ok(path)
}

/// Writes a daily mean air temperature series (°C), appending `.D7` to `path`
/// if needed. Returns the path written.
pub fn save_airtemp<P: AsRef<Path>>(
    path: P,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    city: &str,
) -> Result<PathBuf> {
    let path = with_extension(path.as_ref(), HelpInputKind::AirTemperature);
    save_help_input(&path, years, values, city, None)?;
    Ok(path)
}

/// Writes a daily global solar radiation series (MJ/m²), appending `.D13` to
/// `path` if needed. Returns the path written.
pub fn save_solrad<P: AsRef<Path>>(
    path: P,
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    city: &str,
    latitude: f64,
) -> Result<PathBuf> {
    let path = with_extension(path.as_ref(), HelpInputKind::SolarRadiation);
    save_help_input(&path, years, values, city, Some(latitude))?;
    Ok(path)
}

fn with_extension(path: &Path, kind: HelpInputKind) -> PathBuf {
    if path.extension().and_then(|ext| ext.to_str()) == Some(kind.extension()) {
        path.to_owned()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(kind.extension());
        PathBuf::from(name)
    }
}

/// Contents of a HELP input file.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpInput {
    pub kind: HelpInputKind,
    pub city: String,
    pub latitude: Option<f64>,
    pub years: Array1<i32>,
    pub values: Array1<f64>,
}

/// Reads a HELP input file, dropping the zero padding that completes the last
/// row of every year.
pub fn read_help_input<P: AsRef<Path>>(path: P) -> Result<HelpInput> {
    let path = path.as_ref();
    let kind = HelpInputKind::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read HELP input {}", path.display()))?;

    parse(kind, &text).with_context(|| format!("Invalid HELP input {}", path.display()))
}

/// Parses the text of a HELP input file of the given kind.
pub fn parse(kind: HelpInputKind, text: &str) -> Result<HelpInput> {
    let lines = text.lines().collect::<Vec<_>>();
    if lines.len() < HEADER_LINES {
        bail!("Expected a {} line header", HEADER_LINES);
    }

    let city = lines[2].trim_end().to_owned();
    let latitude = match kind {
        HelpInputKind::SolarRadiation => Some(
            lines[3]
                .trim()
                .parse()
                .with_context(|| format!("Invalid latitude \"{}\"", lines[3].trim()))?,
        ),
        _ => None,
    };

    let year_width = kind.year_width();
    let width = kind.value_width();
    let year_column = Column::new("year", 0, year_width);
    let value_columns = (0..VALUES_PER_ROW)
        .map(|i| Column::new("value", year_width + i * width, year_width + (i + 1) * width))
        .collect::<Vec<_>>();

    let mut by_year = BTreeMap::<i32, Vec<f64>>::new();
    for (i, line) in lines.iter().enumerate().skip(HEADER_LINES) {
        if line.trim().is_empty() {
            continue;
        }

        let year = year_column
            .parse::<i32>(line, 0)
            .ok_or_else(|| anyhow!("Invalid year on line {}", i + 1))?;
        let data = by_year.entry(year).or_default();
        for column in &value_columns {
            data.push(
                column
                    .parse(line, 0)
                    .ok_or_else(|| anyhow!("Invalid {} on line {}", column.name, i + 1))?,
            );
        }
    }

    let mut years = Vec::new();
    let mut values = Vec::new();
    for (year, mut data) in by_year {
        data.truncate(days_in_year(year));
        years.extend(std::iter::repeat(year).take(data.len()));
        values.extend(data);
    }

    Ok(HelpInput {
        kind,
        city,
        latitude,
        years: Array1::from(years),
        values: Array1::from(values),
    })
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::utils::assert_approx_eq_slice,
        insta::assert_debug_snapshot,
        tempdir::TempDir,
    };

    fn series(first: i32, last: i32, value: impl Fn(usize) -> f64) -> (Array1<i32>, Array1<f64>) {
        let mut years = Vec::new();
        let mut values = Vec::new();
        for year in first..=last {
            for _ in 0..days_in_year(year) {
                values.push(value(years.len()));
                years.push(year);
            }
        }
        (Array1::from(years), Array1::from(values))
    }

    #[test]
    fn kinds_from_extension() {
        assert_eq!(
            HelpInputKind::from_path("a/rain.D4").unwrap(),
            HelpInputKind::Precipitation
        );
        assert_eq!(
            HelpInputKind::from_path("tasavg.D7").unwrap(),
            HelpInputKind::AirTemperature
        );
        assert_eq!(
            HelpInputKind::from_path("solrad.D13").unwrap(),
            HelpInputKind::SolarRadiation
        );
        assert!(HelpInputKind::from_path("solrad.D14").is_err());
        assert!(HelpInputKind::from_path("solrad").is_err());
    }

    #[test]
    fn solar_radiation_layout() {
        let (years, values) = series(2001, 2001, |i| (i % 10) as f64 * 0.5);

        let text = render(
            HelpInputKind::SolarRadiation,
            years.view(),
            values.view(),
            "Station Name That Is Way Too Long For The HELP Header",
            Some(45.5),
        )
        .unwrap();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 4 + 37);
        assert_debug_snapshot!(&lines[..5], @r###"
        [
            " 3",
            " 2",
            "Station Name That Is Way Too Long For Th",
            " 45.50",
            " 2001  0.00  0.50  1.00  1.50  2.00  2.50  3.00  3.50  4.00  4.50",
        ]
        "###);

        // 365 values, the last row is padded with zeros
        assert_eq!(
            lines[40],
            " 2001  0.00  0.50  1.00  1.50  2.00  0.00  0.00  0.00  0.00  0.00"
        );
    }

    #[test]
    fn precipitation_layout() {
        let (years, values) = series(2004, 2004, |_| 1.0);

        let text = render(
            HelpInputKind::Precipitation,
            years.view(),
            values.view(),
            "Ottawa",
            Some(45.5),
        )
        .unwrap();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines[2], format!("{:<40}", "Ottawa"));
        // no latitude outside of solar radiation
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "      2004  1.0  1.0  1.0  1.0  1.0  1.0  1.0  1.0  1.0  1.0");
        // 366 values in a leap year
        assert_eq!(lines[40], "      2004  1.0  1.0  1.0  1.0  1.0  1.0  0.0  0.0  0.0  0.0");
    }

    #[test]
    fn solar_radiation_requires_latitude() {
        let (years, values) = series(2001, 2001, |_| 1.0);
        let dir = TempDir::new("hydro-help").unwrap();
        let path = dir.path().join("solrad.D13");

        assert!(save_help_input(&path, years.view(), values.view(), "Ottawa", None).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn incomplete_year_is_rejected() {
        let (years, values) = series(2001, 2002, |_| 1.0);
        let years = years.slice(ndarray::s![1..]).to_owned();
        let values = values.slice(ndarray::s![1..]).to_owned();

        let dir = TempDir::new("hydro-help").unwrap();
        let path = dir.path().join("rain.D4");

        let err = save_help_input(&path, years.view(), values.view(), "Ottawa", None).unwrap_err();
        assert!(format!("{}", err).contains("2001"));
        assert!(!path.exists());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let (years, values) = series(2001, 2001, |_| 1.0);
        let values = values.slice(ndarray::s![..300]).to_owned();

        assert!(format_data(HelpInputKind::AirTemperature, years.view(), values.view()).is_err());
    }

    #[test]
    fn invalid_extension_writes_nothing() {
        let (years, values) = series(2001, 2001, |_| 1.0);
        let dir = TempDir::new("hydro-help").unwrap();
        let path = dir.path().join("rain.txt");

        assert!(save_help_input(&path, years.view(), values.view(), "Ottawa", None).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn convenience_writers_append_extension() {
        let (years, values) = series(2001, 2001, |_| 1.0);
        let dir = TempDir::new("hydro-help").unwrap();

        let path = save_precip(dir.path().join("rain"), years.view(), values.view(), "A").unwrap();
        assert_eq!(path, dir.path().join("rain.D4"));
        assert!(path.exists());

        let path = save_airtemp(dir.path().join("tasavg.D7"), years.view(), values.view(), "A")
            .unwrap();
        assert_eq!(path, dir.path().join("tasavg.D7"));

        let path = save_solrad(dir.path().join("solrad"), years.view(), values.view(), "A", 46.0)
            .unwrap();
        assert_eq!(path, dir.path().join("solrad.D13"));
    }

    #[test]
    fn round_trip_within_precision() {
        let dir = TempDir::new("hydro-help").unwrap();
        let (years, values) = series(2003, 2005, |i| ((i * 37) % 200) as f64 * 0.173 - 12.0);

        for (kind, tolerance) in &[
            (HelpInputKind::Precipitation, 0.05),
            (HelpInputKind::AirTemperature, 0.05),
            (HelpInputKind::SolarRadiation, 0.005),
        ] {
            let path = dir.path().join(format!("series.{}", kind.extension()));
            save_help_input(&path, years.view(), values.view(), "Quebec", Some(46.8)).unwrap();

            let input = read_help_input(&path).unwrap();

            assert_eq!(input.kind, *kind);
            assert_eq!(input.city, "Quebec");
            assert_eq!(input.years, years);
            assert_approx_eq_slice(
                input.values.as_slice().unwrap(),
                values.as_slice().unwrap(),
                tolerance + 1e-9,
            );
        }
    }
}
