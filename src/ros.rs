//! Middleware-facing collaborators: topic discovery and the bag recorder
//! processes. Everything that differs between ROS 1 and ROS 2 lives in
//! [`RosFlavor`], chosen once at startup.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::errors::RecorderError;
use crate::launcher::{LaunchGroup, OutputName, Recorder};
use crate::signals::Interrupts;

const ROS2_VERSION_VALUE: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosFlavor {
    pub label: &'static str,
    pub topic_list_cmd: &'static [&'static str],
    pub record_cmd: &'static [&'static str],
    /// Flags the recorder accepts for an explicit output name; the first one
    /// is used when passing the resolved name.
    pub output_flags: &'static [&'static str],
    pub timestamp_format: &'static str,
    pub default_prefix: &'static str,
    pub default_extension: &'static str,
}

impl RosFlavor {
    pub const fn ros1() -> Self {
        Self {
            label: "ROS 1",
            topic_list_cmd: &["rostopic", "list"],
            record_cmd: &["rosbag", "record"],
            output_flags: &["-O", "--output-name"],
            timestamp_format: "%Y-%m-%d-%H-%M-%S",
            default_prefix: "",
            default_extension: ".bag",
        }
    }

    pub const fn ros2() -> Self {
        Self {
            label: "ROS 2",
            topic_list_cmd: &["ros2", "topic", "list"],
            record_cmd: &["ros2", "bag", "record"],
            output_flags: &["-o", "--output"],
            timestamp_format: "%Y_%m_%d-%H_%M_%S",
            default_prefix: "rosbag2_",
            default_extension: "",
        }
    }

    pub fn from_version(version: Option<&str>) -> Self {
        match version.map(str::trim) {
            Some(ROS2_VERSION_VALUE) => Self::ros2(),
            _ => Self::ros1(),
        }
    }

    pub fn default_output(&self, now: &DateTime<Local>) -> OutputName {
        OutputName {
            stem: format!(
                "{}{}",
                self.default_prefix,
                now.format(self.timestamp_format)
            ),
            extension: self.default_extension.to_string(),
        }
    }

    fn output_flag(&self) -> &'static str {
        self.output_flags[0]
    }
}

/// Runs the flavor's topic listing command and returns its stdout lines.
pub async fn list_topics(flavor: &RosFlavor) -> Result<Vec<String>, RecorderError> {
    let (program, args) = split_program(flavor.topic_list_cmd);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| {
            RecorderError::Discovery(format!(
                "failed to run `{}`: {err}",
                flavor.topic_list_cmd.join(" ")
            ))
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(RecorderError::Discovery(stderr.trim().to_string()));
    }
    if !output.status.success() {
        return Err(RecorderError::Discovery(format!(
            "`{}` exited with {}",
            flavor.topic_list_cmd.join(" "),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Pulls an explicit output name out of the passthrough arguments. The name is
/// folded into each group's resolved name, so the flag itself is not forwarded.
pub fn take_output_name(args: &[String], flags: &[&str]) -> (Option<String>, Vec<String>) {
    let mut name = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if flags.contains(&arg.as_str()) {
            match iter.next() {
                Some(value) => name = Some(value.clone()),
                None => rest.push(arg.clone()),
            }
            continue;
        }

        let inline = flags
            .iter()
            .filter(|flag| flag.starts_with("--"))
            .find_map(|flag| arg.strip_prefix(flag).and_then(|tail| tail.strip_prefix('=')));
        match inline {
            Some(value) => name = Some(value.to_string()),
            None => rest.push(arg.clone()),
        }
    }

    (name.filter(|value| !value.is_empty()), rest)
}

#[derive(Debug)]
pub struct RecorderProcess {
    pub index: u32,
    pub output_name: String,
    pub pid: u32,
    child: Child,
}

/// Spawns `rosbag record` / `ros2 bag record` for each launch group.
#[derive(Debug, Clone)]
pub struct RosRecorder {
    flavor: RosFlavor,
    passthrough: Vec<String>,
    stop_timeout: Duration,
}

impl RosRecorder {
    pub fn new(flavor: RosFlavor, passthrough: Vec<String>, stop_timeout: Duration) -> Self {
        Self {
            flavor,
            passthrough,
            stop_timeout,
        }
    }

    pub fn command_line(&self, group: &LaunchGroup) -> Vec<String> {
        let mut line: Vec<String> = self
            .flavor
            .record_cmd
            .iter()
            .map(|part| part.to_string())
            .collect();
        line.push(self.flavor.output_flag().to_string());
        line.push(group.output_name.clone());
        line.extend(group.topics.iter().cloned());
        line.extend(self.passthrough.iter().cloned());
        line
    }

    /// Waits until every recorder exits on its own. Ctrl+C stops them all and
    /// counts as a clean finish; otherwise the first recorder that exited
    /// unsuccessfully is reported.
    pub async fn supervise(
        &mut self,
        mut processes: Vec<RecorderProcess>,
        interrupts: &mut Interrupts,
    ) -> Result<(), RecorderError> {
        let finished = tokio::select! {
            failure = wait_all(&mut processes) => Some(failure),
            _ = interrupts.recv() => None,
        };

        match finished {
            Some(failure) => failure.map_or(Ok(()), Err),
            None => {
                info!("interrupt received, stopping {} recorder(s)", processes.len());
                self.shutdown_all(processes).await;
                Ok(())
            }
        }
    }

    pub async fn shutdown_all(&mut self, processes: Vec<RecorderProcess>) {
        for process in &processes {
            interrupt(process);
        }
        for process in processes {
            let index = process.index;
            if let Err(err) = self.reap(process).await {
                warn!("failed to stop recorder for process {index}: {err}");
            }
        }
    }

    async fn reap(&self, mut process: RecorderProcess) -> Result<()> {
        if let Ok(status) = timeout(self.stop_timeout, process.child.wait()).await {
            status.context("failed waiting for recorder")?;
            return Ok(());
        }

        warn!(
            "recorder {} did not stop after interrupt, terminating",
            process.output_name
        );
        terminate(&process);
        if let Ok(status) = timeout(self.stop_timeout, process.child.wait()).await {
            status.context("failed waiting for recorder")?;
            return Ok(());
        }

        warn!("recorder {} still running, killing", process.output_name);
        kill_group(&process);
        process
            .child
            .kill()
            .await
            .with_context(|| format!("failed to kill recorder {}", process.output_name))
    }
}

impl Recorder for RosRecorder {
    type Handle = RecorderProcess;

    fn start(&mut self, group: &LaunchGroup) -> Result<RecorderProcess> {
        let line = self.command_line(group);
        let (program, args) = split_program(&line);

        let mut command = Command::new(program);
        #[cfg(unix)]
        {
            // Own process group: the terminal's Ctrl+C must not reach recorders
            // directly, shutdown goes through `shutdown_all`.
            unsafe {
                command.pre_exec(|| {
                    if nix::libc::setpgid(0, 0) == 0 {
                        Ok(())
                    } else {
                        Err(std::io::Error::last_os_error())
                    }
                });
            }
        }
        command.args(args).stdin(Stdio::null());

        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", line.join(" ")))?;
        let pid = child.id().context("spawned recorder has no pid")?;
        info!(
            "started {} recorder {} (pid {pid}) for {} topic(s)",
            self.flavor.label,
            group.output_name,
            group.topics.len()
        );

        Ok(RecorderProcess {
            index: group.index,
            output_name: group.output_name.clone(),
            pid,
            child,
        })
    }

    async fn stop(&mut self, handle: RecorderProcess) -> Result<()> {
        interrupt(&handle);
        self.reap(handle).await
    }
}

/// Waits for every recorder in turn and returns the first unsuccessful exit.
async fn wait_all(processes: &mut [RecorderProcess]) -> Option<RecorderError> {
    let mut first_failure = None;

    for process in processes.iter_mut() {
        let status = match process.child.wait().await {
            Ok(status) if status.success() => {
                info!("recorder {} finished", process.output_name);
                continue;
            }
            Ok(status) => status.to_string(),
            Err(err) => format!("unknown status ({err})"),
        };
        warn!("recorder {} exited with {status}", process.output_name);
        first_failure.get_or_insert(RecorderError::RecorderExited {
            index: process.index,
            status,
        });
    }

    first_failure
}

fn split_program<S: AsRef<str>>(line: &[S]) -> (&str, impl Iterator<Item = &str> + '_) {
    let program = line.first().map(|part| part.as_ref()).unwrap_or_default();
    (program, line.iter().skip(1).map(|part| part.as_ref()))
}

#[cfg(unix)]
fn interrupt(process: &RecorderProcess) {
    send_signal(process.pid, nix::sys::signal::Signal::SIGINT);
}

#[cfg(unix)]
fn terminate(process: &RecorderProcess) {
    send_signal(process.pid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(unix)]
fn kill_group(process: &RecorderProcess) {
    send_signal(process.pid, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(-(pid as i32));
    match kill(pgid, signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            warn!("failed to send {signal:?} to process group of {pid}: {err}");
            if let Err(err) = kill(Pid::from_raw(pid as i32), signal) {
                warn!("failed to send {signal:?} to {pid}: {err}");
            }
        }
    }
}

#[cfg(not(unix))]
fn interrupt(process: &RecorderProcess) {
    let _ = process;
}

#[cfg(not(unix))]
fn terminate(process: &RecorderProcess) {
    let _ = process;
}

#[cfg(not(unix))]
fn kill_group(process: &RecorderProcess) {
    let _ = process;
}
