//! Scripted git runner for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::runner::{GitOutput, GitRunner};

type Handler = Box<dyn Fn(&[String], Option<&str>) -> GitOutput + Send + Sync>;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Arguments passed to git.
    pub args: Vec<String>,
    /// Stdin payload, if any.
    pub stdin: Option<String>,
}

/// Shared view of the calls a [`ScriptedRunner`] received.
#[derive(Clone, Default)]
pub struct CallHandle {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallHandle {
    /// All calls so far, in order.
    pub fn all(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose arguments begin with `prefix`.
    pub fn count_starting_with(&self, prefix: &[&str]) -> usize {
        self.all()
            .iter()
            .filter(|c| {
                c.args.len() >= prefix.len() && c.args.iter().zip(prefix).all(|(a, p)| a == p)
            })
            .count()
    }
}

/// Fake runner answering from a closure or a fixed queue.
pub struct ScriptedRunner {
    handler: Handler,
    calls: CallHandle,
}

impl ScriptedRunner {
    /// Answers every call through `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[String], Option<&str>) -> GitOutput + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: CallHandle::default(),
        }
    }

    /// Answers calls with `outputs` in order, then succeeds with no output.
    pub fn sequence(outputs: Vec<GitOutput>) -> Self {
        let queue = Mutex::new(VecDeque::from(outputs));
        Self::new(move |_, _| {
            queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| GitOutput::ok(""))
        })
    }

    /// Returns a handle for inspecting calls after the runner is moved.
    pub fn call_handle(&self) -> CallHandle {
        self.calls.clone()
    }
}

impl GitRunner for ScriptedRunner {
    fn run(&self, args: &[&str], stdin: Option<&str>) -> std::io::Result<GitOutput> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        if let Ok(mut calls) = self.calls.calls.lock() {
            calls.push(RecordedCall {
                args: args.clone(),
                stdin: stdin.map(str::to_string),
            });
        }
        Ok((self.handler)(&args, stdin))
    }
}
