#[macro_use]
extern crate clap;

use {
    anyhow::{bail, Context, Result},
    clap::{App, ArgMatches},
    hydro_help::{
        batch::{load_cells, run_cells, Help3o},
        parameters::Parameters,
        report::{daily, monthly},
        weather::{cweeds, help_input, WeatherDataset},
    },
    log::{error, info},
    serde::Serialize,
    simplelog::{Config as LogConfig, LevelFilter, TermLogger, TerminalMode},
    std::{
        fs::{create_dir_all, File},
        path::Path,
    },
};

fn app<'a, 'b>() -> App<'a, 'b> {
    clap_app!(hydro_help =>
        (version: crate_version!())
        (about: "Runs the HELP model in batch and converts its weather inputs and text reports.")
        (@arg PARAMETERS: -p --parameters +takes_value "Path to file containing run parameters.")
        (@arg VERBOSE: -v --verbose "Logs debug messages.")
        (@subcommand run =>
            (about: "Runs HELP for every cell of the cells file and saves their monthly totals.")
        )
        (@subcommand monthly =>
            (about: "Converts the monthly totals of a HELP report to YAML.")
            (@arg INPUT: +required "HELP output report.")
        )
        (@subcommand daily =>
            (about: "Converts the daily output of a HELP report to YAML.")
            (@arg INPUT: +required "HELP output report.")
        )
        (@subcommand solrad =>
            (about: "Converts CWEEDS hourly files to a HELP daily solar radiation input file.")
            (@arg WY2: --wy2 +takes_value "CWEEDS file in the WY2 format.")
            (@arg WY3: --wy3 +takes_value "CWEEDS file in the WY3 format.")
            (@arg CITY: --city +takes_value +required "City written in the file header.")
            (@arg LATITUDE: --latitude +takes_value "Station latitude, read from the WY3 header by default.")
            (@arg OUTPUT: +required "HELP solar radiation file to write.")
        )
    )
}

#[quit::main]
fn main() {
    let matches = app().get_matches();

    let level = if matches.is_present("VERBOSE") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, LogConfig::default(), TerminalMode::Mixed)
        .expect("Failed to initialize logger");

    let params = match matches.value_of("PARAMETERS") {
        Some(path) => {
            let file = File::open(path).unwrap_or_else(|e| {
                error!("Failed to open {}: \"{}\"", path, e);
                quit::with_code(1);
            });

            let params = serde_yaml::from_reader::<_, Parameters>(file).unwrap_or_else(|e| {
                error!("Failed to parse parameters from {}: \"{}\"", path, e);
                quit::with_code(1);
            });

            info!(
                "Successfully loaded run parameters from \"{}\": \n{:#?}",
                path, params
            );

            params
        }
        None => {
            info!("No parameters file given, using defaults");
            Parameters::default()
        }
    };

    run_subcommand(matches.subcommand(), &params).unwrap_or_else(|e| {
        error!("Error: \"{:#}\"", e);
        quit::with_code(1);
    });
}

fn write_yaml<T: Serialize>(params: &Parameters, input: &str, value: &T) -> Result<()> {
    let stem = Path::new(input)
        .file_stem()
        .context("Input file has no name")?;
    let path = params
        .environment
        .output_directory
        .join(stem)
        .with_extension("yaml");

    create_dir_all(&params.environment.output_directory)?;
    serde_yaml::to_writer(File::create(&path)?, value)?;
    info!("Wrote {}", path.display());

    Ok(())
}

fn run_subcommand(subcmd: (&str, Option<&ArgMatches>), params: &Parameters) -> Result<()> {
    let (name, args) = match subcmd {
        ("", _) => bail!("No subcommand selected"),
        (name, Some(args)) => (name, args),
        // Should be unreachable as clap always provides the matches of a subcommand
        (name, None) => bail!("No arguments for {}", name),
    };

    info!("Starting {}", name);

    match name {
        "run" => {
            let cells = load_cells(&params.batch.cells)?;
            let simulator = Help3o::new(&params.simulator.executable);

            let output = run_cells(cells, &simulator, params.batch.workers)?;

            create_dir_all(&params.environment.output_directory)?;
            let path = params.environment.output_directory.join("monthly.bin");
            bincode::serialize_into(File::create(&path)?, &output.results)?;
            info!("Wrote the results of {} cells to {}", output.results.len(), path.display());

            if !output.failures.is_empty() {
                bail!(
                    "{} of {} cells failed",
                    output.failures.len(),
                    output.failures.len() + output.results.len()
                );
            }
        }
        "monthly" => {
            let input = args.value_of("INPUT").context("No input file")?;
            let table = monthly::read(input)?;
            info!("Read {} years of monthly totals", table.len());
            write_yaml(params, input, &table)?;
        }
        "daily" => {
            let input = args.value_of("INPUT").context("No input file")?;
            let table = daily::read(input)?;
            info!("Read {} days of daily output", table.len());
            write_yaml(params, input, &table)?;
        }
        "solrad" => {
            let wy2 = args.value_of("WY2").map(cweeds::read).transpose()?;
            let wy3 = args.value_of("WY3").map(cweeds::read).transpose()?;

            let dataset = match (wy2, wy3) {
                (Some(wy2), Some(wy3)) => WeatherDataset::merge(&wy2, &wy3)?,
                (Some(dataset), None) | (None, Some(dataset)) => dataset,
                (None, None) => bail!("At least one of --wy2 or --wy3 is required"),
            };

            let latitude = if args.is_present("LATITUDE") {
                value_t!(args, "LATITUDE", f64)?
            } else {
                dataset
                    .header
                    .as_ref()
                    .map(|header| header.latitude)
                    .context("No latitude given and no WY3 header to read it from")?
            };

            let city = args.value_of("CITY").context("No city")?;
            let output = args.value_of("OUTPUT").context("No output file")?;

            let path = help_input::save_solrad(
                output,
                dataset.years.view(),
                dataset.irradiance.view(),
                city,
                latitude,
            )?;
            info!("Wrote {} days of solar radiation to {}", dataset.len(), path.display());
        }
        _ => {
            // Should be unreachable due to clap catching this error
            bail!("Unrecognized subcommand");
        }
    }

    info!("Finished {}", name);

    Ok(())
}
