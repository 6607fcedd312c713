//! Shared doubles for integration tests.

#![allow(dead_code)]

use kodegen_bundler_cross::cli::{Args, Command, FreeBsdFlags};
use kodegen_bundler_cross::process::{CommandOutput, CommandRequest};
use kodegen_bundler_cross::{CommandRunner, ExecutableLookup, ProcessError};
use clap::Parser;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

/// Replays queued responses and records every request.
/// An empty queue answers with empty successful output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    responses: Mutex<VecDeque<Result<CommandOutput, ProcessError>>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, stdout: &str) {
        self.responses.lock().unwrap().push_back(Ok(CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }));
    }

    pub fn fail(&self, error: ProcessError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

/// PATH stand-in holding only the given executables
#[derive(Default)]
pub struct StaticLookup {
    found: HashMap<String, PathBuf>,
}

impl StaticLookup {
    pub fn with(mut self, name: &str, path: &str) -> Self {
        self.found.insert(name.to_string(), PathBuf::from(path));
        self
    }
}

impl ExecutableLookup for StaticLookup {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.found.get(name).cloned()
    }
}

/// Parse `freebsd` flags as the binary would
pub fn freebsd_flags(extra: &[&str]) -> FreeBsdFlags {
    let mut argv = vec!["kodegen_bundler_cross", "freebsd"];
    argv.extend_from_slice(extra);
    match Args::try_parse_from(argv).unwrap().command {
        Command::Freebsd(flags) => flags,
    }
}
