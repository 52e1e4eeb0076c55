mod catalog;
mod cli;
mod config;
mod errors;
mod launcher;
mod picker;
mod render;
mod ros;
mod selection;
mod signals;
mod storage;
mod ui;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::errors::RecorderError;
use crate::launcher::{LaunchPlan, OutputName};
use crate::picker::Selection;
use crate::ros::RosRecorder;
use crate::selection::Checklist;
use crate::signals::Interrupts;

const EXIT_FAILURE: u8 = 1;
/// Cancelling the picker is not a failure, but it is not a recording either.
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, PartialEq, Eq)]
enum RunOutcome {
    Recorded,
    Cancelled,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(RunOutcome::Recorded) => ExitCode::SUCCESS,
        Ok(RunOutcome::Cancelled) => ExitCode::from(EXIT_CANCELLED),
        Err(err) => {
            eprintln!("{}", ui::error(&format!("error: {err:#}")));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let config = AppConfig::load()?;

    let raw_topics = ros::list_topics(&config.flavor).await?;
    let topics = catalog::build(raw_topics, &config.excluded_topics)?;
    info!(
        "{} topic(s) available via {}",
        topics.len(),
        config.flavor.label
    );

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return Err(RecorderError::NoTerminal.into());
    }

    let persisted = storage::load_selection(&config.state_path);
    let checklist = Checklist::restore(&topics, &persisted);
    let checklist = match picker::run(checklist)? {
        Selection::Committed(checklist) => checklist,
        Selection::Cancelled => return Ok(RunOutcome::Cancelled),
    };
    storage::save_selection(&config.state_path, &checklist.to_persisted())?;

    let (explicit_name, passthrough) =
        ros::take_output_name(&cli.recorder_args, config.flavor.output_flags);
    let output = explicit_name
        .map(OutputName::explicit)
        .unwrap_or_else(|| config.flavor.default_output(&Local::now()));
    let plan = launcher::plan(&checklist, &output);
    print_plan(&plan);

    // Listen before the first spawn: recorders sit in their own process groups
    // and only `record-bag` sees the terminal's Ctrl+C.
    let mut interrupts = Interrupts::listen()?;
    let mut recorder = RosRecorder::new(config.flavor, passthrough, config.stop_timeout);
    let processes = match launcher::launch(&mut recorder, &plan, &mut interrupts).await {
        Ok(processes) => processes,
        Err(RecorderError::LaunchInterrupted) => return Ok(RunOutcome::Cancelled),
        Err(err) => return Err(err.into()),
    };
    recorder.supervise(processes, &mut interrupts).await?;

    Ok(RunOutcome::Recorded)
}

fn print_plan(plan: &LaunchPlan) {
    for group in &plan.groups {
        println!(
            "{} {} ({} topic(s)): {}",
            ui::label(&format!("[{}]", group.index)),
            group.output_name,
            group.topics.len(),
            group.topics.join(" ")
        );
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}
