//! Subprocess execution with merged output logging
//!
//! Every external command goes through a [`CommandRunner`]. The runner writes a
//! banner into the job log, spawns the command with stdout and stderr merged
//! into the same sink, and blocks until it exits. A nonzero exit becomes a
//! [`BuildError::ToolchainFailure`] which callers propagate with `?`, so the
//! first failure stops the whole run.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::BuildError;
use crate::exec::command::ToolCommand;
use crate::utils::terminal;

/// Log file receiving a job's merged stdout/stderr
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Truncate (or create) the log at `path` and open it for appending
    pub fn create(path: &Path) -> Result<Self, BuildError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BuildError::io("create directory", parent, e))?;
        }
        File::create(path).map_err(|e| BuildError::io("truncate log", path, e))?;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| BuildError::io("open log", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the self-describing header that precedes each command's output
    pub fn write_banner(&mut self, cwd: &Path, command: &ToolCommand) -> io::Result<()> {
        writeln!(self)?;
        writeln!(self, "Current directory : {}", cwd.display())?;
        writeln!(self, "Command : {}", command)?;
        writeln!(self)?;
        self.flush()
    }

    /// stdout/stderr handles for a child process
    fn child_stdio(&self) -> io::Result<(Stdio, Stdio)> {
        let out = self.file.try_clone()?;
        let err = self.file.try_clone()?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Runs external commands on behalf of the drivers
pub trait CommandRunner {
    /// Spawn `command`, block until it terminates and return its exit code
    /// (`None` when it was killed by a signal)
    fn execute(
        &mut self,
        command: &ToolCommand,
        sink: &mut LogSink,
        env: &[(String, String)],
    ) -> Result<Option<i32>, BuildError>;

    /// Directory commands are started from, as recorded in the log banner
    fn working_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_default()
    }

    /// Log, execute and check one command; nonzero exit is a hard failure
    fn run(
        &mut self,
        command: &ToolCommand,
        sink: &mut LogSink,
        env: &[(String, String)],
    ) -> Result<(), BuildError> {
        terminal::print_command(&command.to_string());

        let cwd = self.working_dir();
        sink.write_banner(&cwd, command)
            .map_err(|e| BuildError::io("write log", sink.path(), e))?;

        let exit_code = self.execute(command, sink, env)?;
        tracing::debug!(command = %command, ?exit_code, "command finished");

        match exit_code {
            Some(0) => Ok(()),
            exit_code => Err(BuildError::ToolchainFailure {
                command: command.to_string(),
                exit_code,
            }),
        }
    }
}

/// [`CommandRunner`] that spawns real processes
#[derive(Debug, Default)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Start every command from `dir` instead of the current directory
    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn execute(
        &mut self,
        command: &ToolCommand,
        sink: &mut LogSink,
        env: &[(String, String)],
    ) -> Result<Option<i32>, BuildError> {
        let (stdout, stderr) = sink
            .child_stdio()
            .map_err(|e| BuildError::io("share log handle", sink.path(), e))?;

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BuildError::MissingTool {
                    tool: command.program().to_string(),
                    hint: format!(
                        "'{}' could not be started. Make sure it is installed and on your PATH.",
                        command.program()
                    ),
                }
            } else {
                BuildError::io("spawn", command.program(), e)
            }
        })?;

        Ok(status.code())
    }

    fn working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_default(),
        }
    }
}
