use {serde::Deserialize, std::path::PathBuf};

/// Run parameters
#[derive(Debug, PartialEq, Default, Deserialize)]
pub struct Parameters {
    pub simulator: Simulator,
    pub batch: Batch,
    pub environment: Environment,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Simulator {
    /// Path to the HELP executable
    pub executable: PathBuf,
}

impl Default for Simulator {
    fn default() -> Self {
        Simulator {
            executable: PathBuf::from("HELP3O"),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Batch {
    /// Number of simulations run in parallel, defaults to the available parallelism
    #[serde(default)]
    pub workers: Option<usize>,
    /// YAML file mapping cell identifiers to their simulation parameters
    pub cells: PathBuf,
}

impl Default for Batch {
    fn default() -> Self {
        Batch {
            workers: None,
            cells: PathBuf::from("cells.yaml"),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Environment {
    /// Directory receiving the results
    pub output_directory: PathBuf,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            output_directory: PathBuf::from("output"),
        }
    }
}
