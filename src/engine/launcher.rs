// Starting the external encoder process

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};

use tracing::debug;

use super::core::query;

/// A running encoder as seen by the supervisor
pub trait EncoderProcess: Send {
    fn id(&self) -> u32;

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Block until the process exits. `None` means it was killed by a signal.
    fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Something that can turn a query into a running encoder
pub trait Launcher: Send + Sync {
    /// Name used in launch error messages
    fn executable(&self) -> &str;

    fn launch(&self, query: &str) -> io::Result<Box<dyn EncoderProcess>>;
}

/// Launches a real encoder executable
#[derive(Debug, Clone)]
pub struct EncoderLauncher {
    executable: String,
    extra_args: Vec<String>,
}

impl EncoderLauncher {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
        }
    }

    /// Add arguments placed before every query, split like a shell would.
    /// Unbalanced quoting falls back to plain whitespace splitting.
    pub fn with_extra_args(mut self, args: &str) -> Self {
        self.extra_args = shlex::split(args)
            .unwrap_or_else(|| args.split_whitespace().map(str::to_string).collect());
        self
    }

    /// Full argument list for a query
    pub fn args_for(&self, query_text: &str) -> io::Result<Vec<String>> {
        let tokens = query::tokenize(query_text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(self.extra_args.iter().cloned().chain(tokens).collect())
    }
}

impl Launcher for EncoderLauncher {
    fn executable(&self) -> &str {
        &self.executable
    }

    fn launch(&self, query_text: &str) -> io::Result<Box<dyn EncoderProcess>> {
        let args = self.args_for(query_text)?;
        debug!(executable = %self.executable, ?args, "spawning encoder");

        let mut cmd = Command::new(&self.executable);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn()?;
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

impl EncoderProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait()?.code())
    }
}
