use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

use panoptic2coco::{config::Args, process_label_dataset};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let dirname = PathBuf::from(&args.label_dir);
    if !dirname.is_dir() {
        error!("The specified label_dir does not exist: {}", args.label_dir);
        return ExitCode::FAILURE;
    }

    let config = match args.to_convert_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting label raster to COCO conversion process...");

    match process_label_dataset(&config) {
        Ok(stats) if stats.failed_conversions > 0 => {
            warn!(
                "Conversion finished; {} label rasters could not be converted.",
                stats.failed_conversions
            );
            ExitCode::SUCCESS
        }
        Ok(_) => {
            info!("COCO conversion process completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
