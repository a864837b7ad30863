//! Batch execution of the HELP model over many cells.
//!
//! Every cell has its own output file. When that file already exists the
//! simulation is skipped and the file is read as is, so an interrupted batch
//! can be resumed. Output files are removed once parsed.

use {
    crate::{
        pool::{map_unordered, PoolOutcome},
        report::{monthly, MonthlyTable},
    },
    anyhow::{bail, Context, Result},
    log::{debug, info, warn},
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, BTreeSet},
        fs::{self, File},
        path::{Path, PathBuf},
        process::Command,
        time::Instant,
    },
};

/// Simulation inputs of a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    /// Arguments passed to the simulator, in order
    pub inputs: Vec<String>,
    /// Report written by the simulator, passed as the last argument
    pub output: PathBuf,
}

pub type BatchOutput = PoolOutcome<String, MonthlyTable>;

/// Something able to run the HELP model for a cell.
pub trait Simulator: Sync {
    /// Runs the model, which must write its report to `cell.output`.
    fn simulate(&self, cell: &CellParameters) -> Result<()>;
}

/// The HELP executable, run as a subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct Help3o {
    pub executable: PathBuf,
}

impl Help3o {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Simulator for Help3o {
    fn simulate(&self, cell: &CellParameters) -> Result<()> {
        let output = Command::new(&self.executable)
            .args(&cell.inputs)
            .arg(&cell.output)
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if !cell.output.exists() {
            bail!(
                "{} did not write {}",
                self.executable.display(),
                cell.output.display()
            );
        }

        Ok(())
    }
}

/// Loads a YAML mapping of cell identifiers to their parameters.
pub fn load_cells<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, CellParameters>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse cell parameters from {}", path.display()))
}

/// Simulates one cell unless its report already exists, then reads the
/// report and removes it.
pub fn run_cell<S: Simulator + ?Sized>(simulator: &S, cell: &CellParameters) -> Result<MonthlyTable> {
    if cell.output.exists() {
        debug!("Found {}, skipping simulation", cell.output.display());
    } else {
        simulator.simulate(cell)?;
    }

    let table = monthly::read(&cell.output)?;
    fs::remove_file(&cell.output)
        .with_context(|| format!("Failed to remove {}", cell.output.display()))?;

    Ok(table)
}

/// Runs every cell on `workers` threads, the available parallelism by default.
///
/// A failing cell is reported in the failures of the returned output and does
/// not affect the other cells.
pub fn run_cells<S: Simulator + ?Sized>(
    cells: BTreeMap<String, CellParameters>,
    simulator: &S,
    workers: Option<usize>,
) -> Result<BatchOutput> {
    let mut outputs = BTreeSet::new();
    for (id, cell) in &cells {
        if !outputs.insert(&cell.output) {
            bail!(
                "Output file {} of cell {} is shared with another cell",
                cell.output.display(),
                id
            );
        }
    }

    info!("Running HELP for {} cells", cells.len());
    let start = Instant::now();

    let outcome = map_unordered(
        cells.into_iter().collect(),
        workers,
        |id, cell| run_cell(simulator, &cell).with_context(|| format!("Cell {}", id)),
        |progress| {
            info!(
                "{:.1}% ({:.1} min remaining)",
                progress.percent(),
                progress.remaining().as_secs_f64() / 60.0
            )
        },
    )?;

    for (id, e) in &outcome.failures {
        warn!("Cell {} failed: {:#}", id, e);
    }
    info!(
        "Calculation time: {:.2}s ({} cells succeeded, {} failed)",
        start.elapsed().as_secs_f64(),
        outcome.results.len(),
        outcome.failures.len()
    );

    Ok(outcome)
}

#[cfg(test)]
pub(crate) mod test {
    use {
        super::*,
        anyhow::anyhow,
        std::sync::atomic::{AtomicUsize, Ordering},
        tempdir::TempDir,
    };

    pub(crate) const REPORT: &str = include_str!("testdata/monthly.OUT");

    /// Writes a canned report instead of running HELP.
    #[derive(Default)]
    pub(crate) struct FakeHelp {
        pub calls: AtomicUsize,
        pub failing: Option<String>,
    }

    impl Simulator for FakeHelp {
        fn simulate(&self, cell: &CellParameters) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.is_some() && self.failing.as_ref() == cell.inputs.first() {
                return Err(anyhow!("HELP crashed"));
            }
            fs::write(&cell.output, REPORT)?;
            Ok(())
        }
    }

    pub(crate) fn cells(dir: &Path, n: usize) -> BTreeMap<String, CellParameters> {
        (0..n)
            .map(|i| {
                let id = format!("cell{:03}", i);
                let cell = CellParameters {
                    inputs: vec![id.clone(), "input.D4".to_owned()],
                    output: dir.join(format!("{}.OUT", id)),
                };
                (id, cell)
            })
            .collect()
    }

    #[test]
    fn simulates_missing_outputs() {
        let dir = TempDir::new("hydro-help").unwrap();
        let simulator = FakeHelp::default();

        let output = run_cells(cells(dir.path(), 8), &simulator, Some(3)).unwrap();

        assert_eq!(simulator.calls.load(Ordering::SeqCst), 8);
        assert_eq!(output.results.len(), 8);
        assert!(output.failures.is_empty());
        assert_eq!(output.results["cell005"].len(), 2);
        // reports are removed once parsed
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn existing_outputs_are_not_simulated() {
        let dir = TempDir::new("hydro-help").unwrap();
        let cells = cells(dir.path(), 12);
        for cell in cells.values() {
            fs::write(&cell.output, REPORT).unwrap();
        }
        let simulator = FakeHelp::default();

        let output = run_cells(cells, &simulator, Some(4)).unwrap();

        assert_eq!(simulator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.results.len(), 12);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = TempDir::new("hydro-help").unwrap();
        let simulator = FakeHelp {
            failing: Some("cell002".to_owned()),
            ..FakeHelp::default()
        };

        let output = run_cells(cells(dir.path(), 5), &simulator, Some(2)).unwrap();

        assert_eq!(output.results.len(), 4);
        assert_eq!(output.failures.len(), 1);
        let message = format!("{:#}", output.failures["cell002"]);
        assert!(message.contains("cell002"));
        assert!(message.contains("HELP crashed"));
    }

    #[test]
    fn malformed_report_is_a_cell_failure() {
        let dir = TempDir::new("hydro-help").unwrap();
        let cells = cells(dir.path(), 2);
        fs::write(
            &cells["cell000"].output,
            "     MONTHLY TOTALS (MM) FOR YEAR  2001\n\n  RUNOFF  a b c d e f\n  g h i j k l\n",
        )
        .unwrap();

        let output = run_cells(cells, &FakeHelp::default(), Some(2)).unwrap();

        assert!(output.failures.contains_key("cell000"));
        assert!(output.results.contains_key("cell001"));
    }

    #[test]
    fn shared_outputs_are_rejected() {
        let dir = TempDir::new("hydro-help").unwrap();
        let mut cells = cells(dir.path(), 3);
        let shared = cells["cell000"].output.clone();
        cells.get_mut("cell001").unwrap().output = shared;
        let simulator = FakeHelp::default();

        assert!(run_cells(cells, &simulator, None).is_err());
        assert_eq!(simulator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cells_from_yaml() {
        let cells = load_cells("src/testdata/cells.yaml").unwrap();

        assert_eq!(cells.len(), 2);
        assert_eq!(cells["c1"].output, PathBuf::from("output/c1.OUT"));
        assert_eq!(cells["c1"].inputs.len(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_writes_report() {
        let dir = TempDir::new("hydro-help").unwrap();
        let cell = CellParameters {
            inputs: vec!["src/testdata/monthly.OUT".to_owned()],
            output: dir.path().join("cell.OUT"),
        };

        let table = run_cell(&Help3o::new("cp"), &cell).unwrap();

        assert_eq!(table.len(), 2);
        assert!(!cell.output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_failure() {
        let dir = TempDir::new("hydro-help").unwrap();
        let cell = CellParameters {
            inputs: vec![],
            output: dir.path().join("cell.OUT"),
        };

        assert!(Help3o::new("false").simulate(&cell).is_err());
        // exits successfully without writing the report
        assert!(Help3o::new("true").simulate(&cell).is_err());
        assert!(Help3o::new(dir.path().join("no-such-binary"))
            .simulate(&cell)
            .is_err());
    }
}
