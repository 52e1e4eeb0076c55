//! Merges the per-process ROS 2 bags written by `record-bag` back into one bag
//! with `ros2 bag convert`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

const OPTIONS_FILE_PREFIX: &str = "merge_options_";
const OPTIONS_FILE_SUFFIX: &str = ".yaml";

#[derive(Debug, Parser)]
#[command(
    name = "merge-bag",
    version = env!("RECORD_BAG_BUILD_VERSION"),
    about = "Merge multiple ROS 2 bag recordings created by record-bag"
)]
struct Cli {
    /// Base bag path (absolute or relative) without the -{index} suffix.
    bag_path: PathBuf,
    /// Path to a `ros2 bag convert` output options YAML.
    #[arg(long)]
    options: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let base_name = cli
        .bag_path
        .file_name()
        .and_then(|name| name.to_str())
        .context("bag path must end in a file name")?
        .to_string();
    let root = match cli.bag_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let bag_paths = find_bag_paths(&root, &base_name)?;
    if bag_paths.is_empty() {
        anyhow::bail!("no bag directories found for base name: {base_name}");
    }

    let options_path = match cli.options {
        Some(path) => path,
        None => {
            let path = default_options_path(&std::env::temp_dir().join("bag_recorder"))?;
            write_options_file(&path, &cli.bag_path)?;
            path
        }
    };

    let command = merge_command(&bag_paths, &options_path);
    info!("merging {} bag(s): {}", bag_paths.len(), command.join(" "));
    let status = Command::new(&command[0])
        .args(&command[1..])
        .status()
        .with_context(|| format!("failed to run `{}`", command.join(" ")))?;

    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

/// Directories next to the base path named `<base>-<N>`, ordered by `N`.
fn find_bag_paths(root: &Path, base_name: &str) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(index) = bag_index(name, base_name) {
            candidates.push((index, path));
        }
    }

    candidates.sort_by_key(|(index, _)| *index);
    Ok(candidates.into_iter().map(|(_, path)| path).collect())
}

fn bag_index(name: &str, base_name: &str) -> Option<u64> {
    let (base, index) = name.rsplit_once('-')?;
    if base != base_name || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

fn merge_command(bag_paths: &[PathBuf], options_path: &Path) -> Vec<String> {
    let mut command = vec!["ros2".to_string(), "bag".to_string(), "convert".to_string()];
    for bag_path in bag_paths {
        command.push("-i".to_string());
        command.push(bag_path.display().to_string());
    }
    command.push("-o".to_string());
    command.push(options_path.display().to_string());
    command
}

fn default_options_path(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    Ok(dir.join(format!(
        "{OPTIONS_FILE_PREFIX}{}-{nonce}{OPTIONS_FILE_SUFFIX}",
        std::process::id()
    )))
}

fn write_options_file(options_path: &Path, bag_path: &Path) -> Result<()> {
    fs::write(
        options_path,
        format!("output_bags:\n  - uri: {}\n", bag_path.display()),
    )
    .with_context(|| format!("failed to write {}", options_path.display()))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
