//! Monthly totals section of a HELP output report.
//!
//! Every simulated year is reported as a block opening with a
//! `MONTHLY TOTALS (MM) FOR YEAR  <year>` line and closed by a rule of
//! asterisks. Inside a block each variable spans two physical lines, the
//! first carrying the label and January-June, the second July-December:
//!
//! ```text
//!   PRECIPITATION               50.10    40.20    60.30    70.40    80.50    90.60
//!                              100.70   110.80   120.90   130.00   140.10   150.20
//! ```

use {
    crate::utils::first_field,
    anyhow::{anyhow, bail, Context, Result},
    log::debug,
    ndarray::{Array1, Array2},
    serde::{Deserialize, Serialize},
    std::{fs, path::Path},
};

const YEAR_MARKER: &str = "MONTHLY TOTALS";
const END_MARKER: &str = "FINAL WATER STORAGE";
const BLOCK_RULE: &str = "**********";

/// Names of the monthly variables, in the order they are stored.
pub const VARIABLES: [&str; 6] = [
    "rain",
    "runoff",
    "evapo",
    "sub-runoff",
    "percolation",
    "recharge",
];

/// Monthly totals of a HELP run. Every array has one row per entry of `years`
/// and one column per month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTable {
    pub years: Array1<u16>,
    pub rain: Array2<f32>,
    pub runoff: Array2<f32>,
    pub evapo: Array2<f32>,
    pub sub_runoff: Array2<f32>,
    pub percolation: Array2<f32>,
    pub recharge: Array2<f32>,
}

impl MonthlyTable {
    /// Looks up a variable by its report name, see [`VARIABLES`].
    pub fn variable(&self, name: &str) -> Option<&Array2<f32>> {
        match name {
            "rain" => Some(&self.rain),
            "runoff" => Some(&self.runoff),
            "evapo" => Some(&self.evapo),
            "sub-runoff" => Some(&self.sub_runoff),
            "percolation" => Some(&self.percolation),
            "recharge" => Some(&self.recharge),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Reads the monthly totals from the HELP report at `path`.
pub fn read<P: AsRef<Path>>(path: P) -> Result<MonthlyTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read HELP report {}", path.display()))?;

    let table = parse(&text).with_context(|| format!("Invalid HELP report {}", path.display()))?;
    debug!(
        "Read {} years of monthly totals from {}",
        table.len(),
        path.display()
    );

    Ok(table)
}

/// Parses the monthly totals of a HELP report.
pub fn parse(text: &str) -> Result<MonthlyTable> {
    let rows = text.lines().map(first_field).collect::<Vec<_>>();
    let mut blocks = Vec::new();

    let mut i = 0;
    while i + 1 < rows.len() {
        let line = match rows[i] {
            Some(line) => line,
            None => {
                i += 1;
                continue;
            }
        };

        if line.contains(YEAR_MARKER) {
            let year = line
                .split_whitespace()
                .last()
                .and_then(|token| token.parse::<u16>().ok())
                .ok_or_else(|| anyhow!("No year in \"{}\" (line {})", line.trim(), i + 1))?;

            let (block, end) = read_block(&rows, i, year)?;
            blocks.push(block);
            i = end;
        } else if line.contains(END_MARKER) {
            break;
        }

        i += 1;
    }

    assemble(blocks)
}

#[derive(Debug, Default)]
struct YearBlock {
    year: u16,
    rain: Option<Vec<f32>>,
    runoff: Option<Vec<f32>>,
    evapo: Option<Vec<f32>>,
    sub_runoff: Option<Vec<f32>>,
    percolation: Option<Vec<f32>>,
    recharge: Option<Vec<f32>>,
}

/// Reads the year block whose marker is on row `start`. Returns the block and
/// the index of the row that closed it.
fn read_block(rows: &[Option<&str>], start: usize, year: u16) -> Result<(YearBlock, usize)> {
    let mut block = YearBlock {
        year,
        ..YearBlock::default()
    };

    let mut i = start;
    loop {
        i += 1;
        if i >= rows.len() {
            break;
        }

        let line = match rows[i] {
            Some(line) => line,
            None => continue,
        };
        if line.contains(BLOCK_RULE) {
            break;
        }
        let next = match rows.get(i + 1) {
            Some(Some(next)) => *next,
            _ => continue,
        };

        let values = || monthly_values(line, next).with_context(|| format!("Line {}", i + 1));

        if line.contains("PRECIPITATION") {
            block.rain = Some(values()?);
        } else if line.contains("RUNOFF") {
            block.runoff = Some(values()?);
        } else if line.contains("EVAPOTRANSPIRATION") {
            block.evapo = Some(values()?);
        } else if line.contains("LATERAL DRAINAGE") && block.sub_runoff.is_none() {
            block.sub_runoff = Some(values()?);
        } else if line.contains("PERCOLATION") {
            // Percolation is reported for every barrier layer: the first one
            // is the percolation, the deepest one is the recharge.
            let values = values()?;
            if block.percolation.is_none() {
                block.percolation = Some(values.clone());
            }
            block.recharge = Some(values);
        }
    }

    Ok((block, i))
}

/// Twelve monthly values from the last six tokens of both lines of a pair.
fn monthly_values(first: &str, second: &str) -> Result<Vec<f32>> {
    let mut values = Vec::with_capacity(12);

    for line in &[first, second] {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        if tokens.len() < 6 {
            bail!("Expected 6 monthly values in \"{}\"", line.trim());
        }

        for token in &tokens[tokens.len() - 6..] {
            values.push(
                token
                    .parse::<f32>()
                    .with_context(|| format!("Invalid monthly value \"{}\"", token))?,
            );
        }
    }

    Ok(values)
}

fn assemble(blocks: Vec<YearBlock>) -> Result<MonthlyTable> {
    let n = blocks.len();

    let mut years = Vec::with_capacity(n);
    let mut rain = Vec::with_capacity(n * 12);
    let mut runoff = Vec::with_capacity(n * 12);
    let mut evapo = Vec::with_capacity(n * 12);
    let mut sub_runoff = Vec::with_capacity(n * 12);
    let mut percolation = Vec::with_capacity(n * 12);
    let mut recharge = Vec::with_capacity(n * 12);

    for block in blocks {
        let year = block.year;
        let missing = |label: &str| anyhow!("No {} totals for year {}", label, year);

        years.push(year);
        rain.extend(block.rain.ok_or_else(|| missing("PRECIPITATION"))?);
        runoff.extend(block.runoff.ok_or_else(|| missing("RUNOFF"))?);
        evapo.extend(block.evapo.ok_or_else(|| missing("EVAPOTRANSPIRATION"))?);
        percolation.extend(block.percolation.ok_or_else(|| missing("PERCOLATION"))?);
        recharge.extend(block.recharge.ok_or_else(|| missing("PERCOLATION"))?);
        sub_runoff.extend(block.sub_runoff.unwrap_or_else(|| vec![0.0; 12]));
    }

    Ok(MonthlyTable {
        years: Array1::from(years),
        rain: Array2::from_shape_vec((n, 12), rain)?,
        runoff: Array2::from_shape_vec((n, 12), runoff)?,
        evapo: Array2::from_shape_vec((n, 12), evapo)?,
        sub_runoff: Array2::from_shape_vec((n, 12), sub_runoff)?,
        percolation: Array2::from_shape_vec((n, 12), percolation)?,
        recharge: Array2::from_shape_vec((n, 12), recharge)?,
    })
}
