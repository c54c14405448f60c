//! Gray command-line interface.
//!
//! Run dose-scoring jobs from TOML configuration files:
//! ```sh
//! gray run job.toml
//! gray validate job.toml
//! gray geometry job.toml
//! gray materials
//! ```

mod config;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gray_core::units::best_dose;
use gray_materials::MaterialDatabase;

#[derive(Parser)]
#[command(name = "gray")]
#[command(about = "Gray: dose scoring and aggregation for Monte Carlo transport")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scoring job from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file and its geometry without running.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Print the volume tree of a job's geometry.
    Geometry {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in materials.
    Materials,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Gray dose scoring");
            println!("=================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            let report = runner::run_job(&job, &out_dir)?;

            for local in &report.locals {
                println!("{}", local.summary());
            }
            match &report.global {
                Some(global) => {
                    println!("{}", global.summary());
                    println!(
                        "Dose: {:.6} ± {:.6}",
                        best_dose(global.dose_gray()),
                        best_dose(global.rms_dose_gray())
                    );
                    println!("Output written to {}", out_dir.display());
                }
                None => println!("Run had no events; no dose computed."),
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let materials = runner::build_materials(&job)?;
            let geometry = runner::build_geometry(&job.geometry)?;
            runner::check_materials(&geometry, &materials)?;
            geometry.find_volume(&job.run.scoring_volume)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Geometry { config } => {
            let job = config::load_config(&config)?;
            let materials = runner::build_materials(&job)?;
            let geometry = runner::build_geometry(&job.geometry)?;
            runner::print_geometry(&geometry, &materials);
            Ok(())
        }
        Commands::Materials => {
            let db = gray_materials::NistDatabase::new();
            println!("Available materials ({}):", db.source_name());
            println!();
            for material in db.materials() {
                println!("  {:<28} {:>12} g/cm³", material.name, material.density);
            }
            Ok(())
        }
    }
}
