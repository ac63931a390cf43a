//! External Specctra autorouter invocation.
//!
//! The autorouter is opaque: DSN bytes go in, SES bytes come out. It runs in a
//! private temporary directory with its console output captured to a log file
//! that is attached to any failure.

pub mod probe;

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::{Probe, ProbeError};

/// Environment variable naming the autorouter executable.
pub const AUTOROUTER_ENV: &str = "SESMERGE_AUTOROUTER";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const INPUT_NAME: &str = "design.dsn";
const OUTPUT_NAME: &str = "design.ses";
const LOG_NAME: &str = "autorouter.log";

#[derive(Debug, Error)]
pub enum AutorouteError {
    #[error("{0}")]
    Discovery(#[from] ProbeError),

    #[error("{program} exited with {status}\n{output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    #[error("{program} finished without writing a session file\n{output}")]
    MissingOutput { program: String, output: String },

    #[error("{program} did not finish within {seconds}s\n{output}")]
    TimedOut {
        program: String,
        seconds: u64,
        output: String,
    },

    #[error("Autorouter I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// `[autorouter]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutorouterConfig {
    /// Executable to run, taking precedence over discovery.
    pub command: Option<PathBuf>,
    /// Jar run through `java -jar` when no executable is found.
    pub jar: Option<PathBuf>,
    /// Extra arguments after the input and output options.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for AutorouterConfig {
    fn default() -> Self {
        Self {
            command: None,
            jar: None,
            args: Vec::new(),
            timeout_secs: 600,
        }
    }
}

/// A resolved autorouter command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autorouter {
    program: PathBuf,
    leading_args: Vec<OsString>,
    args: Vec<String>,
    timeout: Duration,
}

impl Autorouter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            args: Vec::new(),
            timeout: Duration::from_secs(AutorouterConfig::default().timeout_secs),
        }
    }

    /// Argument placed before the input and output options (`-jar x.jar`).
    pub fn leading_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Find the autorouter using `config` and the process environment.
    ///
    /// Tried in order: the configured command, [`AUTOROUTER_ENV`],
    /// `freerouting` on `PATH`, then the configured jar through `java -jar`.
    pub fn locate(config: &AutorouterConfig) -> Result<Self, AutorouteError> {
        Self::locate_with(config, std::env::var_os(AUTOROUTER_ENV))
    }

    fn locate_with(
        config: &AutorouterConfig,
        from_env: Option<OsString>,
    ) -> Result<Self, AutorouteError> {
        let program = Probe::new("an autorouter")
            .strategy("configured command", || match &config.command {
                Some(command) => executable(command.as_os_str()).map(Autorouter::new),
                None => Err("not configured".to_string()),
            })
            .strategy(format!("${AUTOROUTER_ENV}"), || match &from_env {
                Some(value) if !value.is_empty() => executable(value).map(Autorouter::new),
                _ => Err("not set".to_string()),
            })
            .strategy("freerouting on PATH", || {
                executable("freerouting".as_ref()).map(Autorouter::new)
            })
            .strategy("java -jar", || {
                let jar = config.jar.as_ref().ok_or("no jar configured")?;
                if !jar.is_file() {
                    return Err(format!("{} does not exist", jar.display()));
                }
                let java = executable("java".as_ref())?;
                Ok(Autorouter::new(java).leading_arg("-jar").leading_arg(jar))
            })
            .run()?;

        Ok(program
            .args(config.args.iter().cloned())
            .timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Route a DSN design and return the session text the autorouter wrote.
    pub fn route(&self, dsn: &[u8]) -> Result<Vec<u8>, AutorouteError> {
        let workdir = tempfile::Builder::new().prefix("sesmerge-").tempdir()?;
        let input = workdir.path().join(INPUT_NAME);
        let output = workdir.path().join(OUTPUT_NAME);
        let log_path = workdir.path().join(LOG_NAME);
        std::fs::write(&input, dsn)?;

        let log_file = File::create(&log_path)?;
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg("-de")
            .arg(&input)
            .arg("-do")
            .arg(&output)
            .args(&self.args)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file));

        let program = self.program.display().to_string();
        info!("Running {program} on {} bytes of DSN", dsn.len());
        let mut child = command.spawn()?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AutorouteError::TimedOut {
                    program,
                    seconds: self.timeout.as_secs(),
                    output: read_log(&log_path),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        debug!("{program} finished in {:?} with {status}", started.elapsed());

        if !status.success() {
            return Err(AutorouteError::Failed {
                program,
                status: status.to_string(),
                output: read_log(&log_path),
            });
        }

        match std::fs::read(&output) {
            Ok(ses) if !ses.is_empty() => Ok(ses),
            Ok(_) => Err(AutorouteError::MissingOutput {
                program,
                output: read_log(&log_path),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AutorouteError::MissingOutput {
                    program,
                    output: read_log(&log_path),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn executable(name: &std::ffi::OsStr) -> Result<PathBuf, String> {
    which::which(name).map_err(|e| format!("{}: {e}", Path::new(name).display()))
}

fn read_log(path: &Path) -> String {
    let mut text = String::new();
    if let Ok(mut file) = File::open(path) {
        let mut bytes = Vec::new();
        if file.read_to_end(&mut bytes).is_ok() {
            text = String::from_utf8_lossy(&bytes).trim_end().to_string();
        }
    }
    text
}
