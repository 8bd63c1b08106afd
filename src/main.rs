extern crate subterra;

use clap::Parser;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use subterra::core::borehole_field::BoreholeField;
use subterra::errors::SubterraError;
use subterra::input::ingest;
use subterra::output::FileOutput;
use subterra::progress::{JsonProgressFile, ProgressSink, TracingProgress};
use subterra::{run_simulation, RunSummary};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Ground heat transport around borehole heat exchanger fields", long_about = None)]
struct SubterraArgs {
    /// Parameter file in SI units
    input_file: String,
    /// JSON array of [x, y] borehole coordinates, overriding the configured layout
    #[arg(long, short)]
    locations: Option<String>,
    /// Directory the per-run results folder is created in
    #[arg(long, short, default_value = "results")]
    output_dir: PathBuf,
    /// Log progress instead of keeping progress.json up to date
    #[arg(long, default_value_t = false)]
    no_progress_file: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = SubterraArgs::parse();

    match run(&args) {
        Ok(summary) => {
            info!("Finished {} steps", summary.steps);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(args: &SubterraArgs) -> Result<RunSummary, SubterraError> {
    let input_file = Path::new(args.input_file.as_str());
    let parameters = ingest(BufReader::new(
        File::open(input_file).map_err(SubterraError::configuration)?,
    ))?;

    let boreholes = match &args.locations {
        Some(locations_file) => BoreholeField::from_locations_json(
            BufReader::new(File::open(locations_file).map_err(|err| {
                SubterraError::Configuration(anyhow::anyhow!(
                    "Could not open borehole locations {locations_file}: {err}"
                ))
            })?),
            parameters.power.pipe_radius,
        )?,
        None => parameters.borehole_field()?,
    };

    let run_directory = args.output_dir.join(parameters.results_folder_name());
    fs::create_dir_all(&run_directory).map_err(|err| SubterraError::Output(err.into()))?;
    info!("Writing results to {}", run_directory.display());

    let output = FileOutput::new(run_directory.clone(), "csv");
    let mut progress: Box<dyn ProgressSink> = if args.no_progress_file {
        Box::new(TracingProgress)
    } else {
        Box::new(JsonProgressFile::new(run_directory.join("progress.json")))
    };

    run_simulation(&parameters, &boreholes, &output, &mut progress)
}
