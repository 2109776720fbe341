use clap::Parser;
use std::process::ExitCode;

use monorail::{Args, MonorailError, Result, command, npm::CommandScriptRunner};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("monorail")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    let cwd = std::env::current_dir()?;

    match command::execute(&cli_args, &cwd, &CommandScriptRunner).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err)
            if !cli_args.debug
                && err.downcast_ref::<MonorailError>().is_some() =>
        {
            eprintln!("FAILURE {err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err),
    }
}
