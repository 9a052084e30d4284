use anyhow::Result;
use clap::Parser;
use famtree::{self, config::Config, Cli, Command, LogLevel};
use std::{
    fs::{self, File},
    io::BufWriter,
};

// --------------------------------------------------
fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// --------------------------------------------------
fn run(cli_args: Cli) -> Result<()> {
    let outdir = cli_args.outdir.clone();
    if !outdir.is_dir() {
        fs::create_dir_all(&outdir)?;
    }

    // All logging goes into outdir
    env_logger::Builder::new()
        .filter_level(match cli_args.log {
            Some(LogLevel::Debug) => log::LevelFilter::Debug,
            _ => log::LevelFilter::Info,
        })
        .target(env_logger::Target::Pipe(Box::new(BufWriter::new(
            File::create(outdir.join("debug.log"))?,
        ))))
        .init();

    log::info!("args = {cli_args:#?}");
    let config = Config::load(cli_args.config.as_deref())?;

    match cli_args.command {
        Command::Families(args) => {
            famtree::families(&outdir, &config, args)?;
        }
        Command::Align(args) => {
            famtree::align(&outdir, &config, args)?;
        }
        Command::Disambiguate(args) => {
            famtree::disambiguate(&outdir, &config, args)?;
        }
        Command::Trees(args) => {
            famtree::trees(&outdir, &config, args)?;
        }
        Command::Merge(args) => {
            famtree::merge(&outdir, &config, args)?;
        }
    }

    Ok(())
}
