//! Candidate sources.
//!
//! A `DomainSource` describes where raw candidate values come from: a text
//! file, an in-process callback or an external program writing one value per
//! line to stdout. Opening a source yields a lazy sequence of raw values;
//! normalization, validation and deduplication happen in the generator.

use crate::error::DomainSeekerError;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// In-memory sequence produced by a callback.
type ValueIter = Box<dyn Iterator<Item = Result<String, DomainSeekerError>>>;

type Loader = Box<dyn FnOnce() -> ValueIter>;

/// Lazy sequence of raw candidate values read from an opened source.
pub(crate) enum RawValues {
    Callback(ValueIter),
    File(FileLines),
    Process(ProcessLines),
}

impl RawValues {
    /// Next raw value; `None` once the source is exhausted.
    pub(crate) async fn next_value(&mut self) -> Option<Result<String, DomainSeekerError>> {
        match self {
            Self::Callback(values) => values.next(),
            Self::File(lines) => lines.next_value().await,
            Self::Process(lines) => lines.next_value().await,
        }
    }
}

/// Where candidate values come from.
pub enum DomainSource {
    /// UTF-8 text file, one candidate per line
    File(PathBuf),

    /// In-process producer, called once when the source is opened
    Callback { name: String, loader: Loader },

    /// External program printing one candidate per line
    ExternalProcess { program: String, args: Vec<String> },
}

impl DomainSource {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File(path.into())
    }

    /// Source backed by a zero-argument producer of string-like values.
    pub fn callback<N, F, I>(name: N, producer: F) -> Self
    where
        N: Into<String>,
        F: FnOnce() -> I + 'static,
        I: IntoIterator + 'static,
        I::IntoIter: 'static,
        I::Item: ToString,
    {
        Self::Callback {
            name: name.into(),
            loader: Box::new(move || -> ValueIter {
                Box::new(
                    producer()
                        .into_iter()
                        .map(|value| Ok::<_, DomainSeekerError>(value.to_string())),
                )
            }),
        }
    }

    /// Like `callback`, for producers that can fail part way through.
    ///
    /// The first error ends the sequence as a generator execution error.
    pub fn fallible_callback<N, F, I, V, E>(name: N, producer: F) -> Self
    where
        N: Into<String>,
        F: FnOnce() -> I + 'static,
        I: IntoIterator<Item = Result<V, E>> + 'static,
        I::IntoIter: 'static,
        V: ToString,
        E: fmt::Display,
    {
        let name = name.into();
        let origin = name.clone();
        Self::Callback {
            name,
            loader: Box::new(move || -> ValueIter {
                Box::new(producer().into_iter().map(move |value| {
                    value
                        .map(|v| v.to_string())
                        .map_err(|e| DomainSeekerError::generator_execution(origin.clone(), e.to_string()))
                }))
            }),
        }
    }

    pub fn external_process<P: Into<String>>(program: P, args: Vec<String>) -> Self {
        Self::ExternalProcess {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line ("gen.sh --count 10").
    pub fn parse_command(command: &str) -> Result<Self, DomainSeekerError> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| DomainSeekerError::config("Generator command cannot be empty"))?;
        Ok(Self::external_process(program, parts.collect()))
    }

    /// Short description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Callback { name, .. } => name.clone(),
            Self::ExternalProcess { program, args } => {
                if args.is_empty() {
                    program.clone()
                } else {
                    format!("{} {}", program, args.join(" "))
                }
            }
        }
    }

    /// Start producing raw values.
    ///
    /// Spawning an external process requires a running tokio runtime.
    pub(crate) fn open(self) -> Result<RawValues, DomainSeekerError> {
        match self {
            Self::File(path) => open_file(path),
            Self::Callback { loader, .. } => Ok(RawValues::Callback(loader())),
            Self::ExternalProcess { program, args } => spawn_process(program, args),
        }
    }
}

impl fmt::Debug for DomainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Callback { name, .. } => f.debug_struct("Callback").field("name", name).finish(),
            Self::ExternalProcess { program, args } => f
                .debug_struct("ExternalProcess")
                .field("program", program)
                .field("args", args)
                .finish(),
        }
    }
}

fn open_file(path: PathBuf) -> Result<RawValues, DomainSeekerError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(DomainSeekerError::not_found(display));
    }

    let file = std::fs::File::open(&path)
        .map_err(|e| DomainSeekerError::file_error(&display, e.to_string()))?;
    Ok(RawValues::File(FileLines {
        path: display,
        lines: BufReader::new(File::from_std(file)),
        line_no: 0,
        done: false,
    }))
}

/// Non-blank, non-comment lines of a file; stops after the first read error.
pub(crate) struct FileLines {
    path: String,
    lines: BufReader<File>,
    line_no: usize,
    done: bool,
}

impl FileLines {
    async fn next_value(&mut self) -> Option<Result<String, DomainSeekerError>> {
        while !self.done {
            let mut line = String::new();
            self.line_no += 1;
            match self.lines.read_line(&mut line).await {
                Ok(0) => self.done = true,
                Ok(_) => {
                    if let Some(value) = keep_line(&line) {
                        return Some(Ok(value));
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(if e.kind() == ErrorKind::InvalidData {
                        DomainSeekerError::InvalidEncoding {
                            path: self.path.clone(),
                            line: self.line_no,
                        }
                    } else {
                        DomainSeekerError::file_error(&self.path, e.to_string())
                    }));
                }
            }
        }
        None
    }
}

/// Trimmed line, or None for blank and `#` lines.
fn keep_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Must be called from within a tokio runtime.
fn spawn_process(program: String, args: Vec<String>) -> Result<RawValues, DomainSeekerError> {
    let origin = if args.is_empty() {
        program.clone()
    } else {
        format!("{} {}", program, args.join(" "))
    };

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            let message = if e.kind() == ErrorKind::NotFound {
                format!("program '{}' not found", program)
            } else {
                e.to_string()
            };
            DomainSeekerError::generator_load(&origin, message)
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DomainSeekerError::generator_load(&origin, "stdout not captured"))?;

    Ok(RawValues::Process(ProcessLines {
        origin,
        child: Some(child),
        lines: BufReader::new(stdout).lines(),
    }))
}

/// Lines printed by a generator process.
///
/// Reaps the process at end of output and reports a non-zero exit as an
/// execution error. A process still running when the sequence is dropped
/// is killed.
pub(crate) struct ProcessLines {
    origin: String,
    child: Option<Child>,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ProcessLines {
    async fn next_value(&mut self) -> Option<Result<String, DomainSeekerError>> {
        while self.child.is_some() {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(value) = keep_line(&line) {
                        return Some(Ok(value));
                    }
                }
                Ok(None) => return self.finish().await,
                Err(e) => {
                    let error = DomainSeekerError::generator_execution(
                        &self.origin,
                        format!("failed to read output: {}", e),
                    );
                    return self.abort(error).await;
                }
            }
        }
        None
    }

    async fn finish(&mut self) -> Option<Result<String, DomainSeekerError>> {
        let mut child = self.child.take()?;
        match child.wait().await {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(DomainSeekerError::generator_execution(
                &self.origin,
                format!("process exited with {}", status),
            ))),
            Err(e) => Some(Err(DomainSeekerError::generator_execution(
                &self.origin,
                e.to_string(),
            ))),
        }
    }

    async fn abort(&mut self, error: DomainSeekerError) -> Option<Result<String, DomainSeekerError>> {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        Some(Err(error))
    }
}
