use anyhow::Result;
use clap::Parser;

use logdemux::cli::{Cli, Command, StatsFormat};
use logdemux::config::DemuxConfig;
use logdemux::error_handling::ExitCode;
use logdemux::processors::{memlog, split, top};
use logdemux::stats::ProcessingStats;

fn run(cli: &Cli) -> Result<(DemuxConfig, ProcessingStats)> {
    let file = cli.load_config_file()?;

    match &cli.command {
        Command::Split(args) => {
            let config = cli.demux_config(&file, split::DEFAULT_OUTPUT_DIR);
            let stats = split::run(&args.files, &args.options(), config.clone())?;
            Ok((config, stats))
        }
        Command::Top(args) => {
            let config = cli.demux_config(&file, top::DEFAULT_OUTPUT_DIR);
            let stats = top::run(&args.files, &args.options(&file), config.clone())?;
            Ok((config, stats))
        }
        Command::Memlog(args) => {
            let config = cli.demux_config(&file, ".");
            let stats = memlog::run(&args.files, &args.options(), config.clone())?;
            Ok((config, stats))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok((config, stats)) => {
            if stats.outputs_created == 0 {
                eprintln!(
                    "{} no output files were created (no dated line matched)",
                    config.warning_prefix()
                );
            }
            match cli.stats {
                Some(StatsFormat::Table) => {
                    eprintln!("{} Stats:\n{}", config.info_prefix(), stats.format_stats())
                }
                Some(StatsFormat::Json) => println!("{}", stats.to_json()),
                None => {}
            }
            ExitCode::Success.exit();
        }
        Err(e) => {
            eprintln!("logdemux: Error: {:#}", e);
            ExitCode::for_error(&e).exit();
        }
    }
}
