//! Clinic - records application for a small clinic
//!
//! Entry point: loads settings, initializes logging, bootstraps the database
//! and reports the state of every table.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clinic_app::{logging, ClinicApp, LoggingConfig};
use clinic_schema::DdlGenerator;
use clinic_settings::ClinicSettings;

#[derive(Parser, Debug)]
#[command(name = "clinic")]
#[command(about = "Clinic records application")]
#[command(version)]
struct Cli {
    /// Settings file (the user config directory's settings.json if omitted)
    #[arg(env = "CLINIC_SETTINGS")]
    settings: Option<PathBuf>,

    /// Print the DDL of the schema manifest and exit
    #[arg(long)]
    print_ddl: bool,
}

fn main() {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => ClinicSettings::load_from(path),
        None => ClinicSettings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            // logging is not initialized yet
            eprintln!("FATAL: Failed to load settings: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(LoggingConfig::from_settings(&settings.logging)) {
        eprintln!("FATAL: Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        build_mode = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        "Starting clinic"
    );

    if let Err(e) = run(cli, settings) {
        tracing::error!(error = %format!("{:#}", e), "clinic failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, settings: ClinicSettings) -> Result<()> {
    if cli.settings.is_none() {
        clinic_settings::ensure_directories()?;
    }
    let app = ClinicApp::bootstrap(settings)?;

    if cli.print_ddl {
        for statement in DdlGenerator::new().create_tables(app.manifest()) {
            println!("{}\n", statement);
        }
        return app.shutdown();
    }

    println!(
        "{:<24} {:>8} {:>14} {:>12}",
        "Table", "Rows", "Dependencies", "Dependants"
    );
    for table in app.overview()? {
        println!(
            "{:<24} {:>8} {:>14} {:>12}",
            table.title, table.rows, table.dependencies, table.dependants
        );
    }
    app.shutdown()
}
