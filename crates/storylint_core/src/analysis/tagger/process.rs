//! Line-protocol adapter for an external tagger process.
//!
//! # Responsibility
//! - Keep one long-lived tagger process (e.g. a MaxEnt tagger in stdin mode).
//! - Send one line per request and read back `word_TAG` tokens.
//!
//! # Invariants
//! - Stale output from a previous request is drained before each request.
//! - A request that yields no tagged line within its budget fails with
//!   `TaggerError::Timeout` and returns nothing partial.

use log::{info, warn};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use super::{split_sentences, TaggedText, TaggedToken, Tagger, TaggerError, TaggerResult};

/// Time budget for one tagging request: `min(max, base + chars / chars_per_sec)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutPolicy {
    pub base: Duration,
    pub chars_per_sec: f64,
    pub max: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            chars_per_sec: 20.0,
            max: Duration::from_secs(40),
        }
    }
}

impl TimeoutPolicy {
    /// Budget for tagging `text`.
    pub fn budget_for(&self, text: &str) -> Duration {
        let per_char = if self.chars_per_sec > 0.0 {
            text.chars().count() as f64 / self.chars_per_sec
        } else {
            0.0
        };
        let budget = self.base.as_secs_f64() + per_char;
        Duration::from_secs_f64(budget.min(self.max.as_secs_f64()))
    }
}

struct TaggerProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

/// Tagger backed by a child process speaking one line in, one line out.
pub struct ProcessTagger {
    process: Mutex<TaggerProcess>,
    policy: TimeoutPolicy,
}

impl ProcessTagger {
    /// Spawns `command` (program followed by arguments).
    ///
    /// When `ready_marker` is set, blocks until a line containing it appears
    /// or `startup_timeout` elapses.
    pub fn spawn(
        command: &[String],
        policy: TimeoutPolicy,
        ready_marker: Option<&str>,
        startup_timeout: Duration,
    ) -> TaggerResult<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(TaggerError::Protocol("tagger command is empty".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child.stdin.take().ok_or(TaggerError::Closed)?;
        let stdout = child.stdout.take().ok_or(TaggerError::Closed)?;

        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });

        let tagger = Self {
            process: Mutex::new(TaggerProcess {
                child,
                stdin,
                lines,
            }),
            policy,
        };

        if let Some(marker) = ready_marker {
            tagger.wait_for_marker(marker, startup_timeout)?;
        }
        info!("event=tagger_spawn module=tagger status=ok program={program}");
        Ok(tagger)
    }

    fn wait_for_marker(&self, marker: &str, timeout: Duration) -> TaggerResult<()> {
        let process = self.lock()?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match process.lines.recv_timeout(remaining) {
                Ok(line) if line.contains(marker) => return Ok(()),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(TaggerError::Timeout { after: timeout }),
                Err(RecvTimeoutError::Disconnected) => return Err(TaggerError::Closed),
            }
        }
    }

    fn lock(&self) -> TaggerResult<std::sync::MutexGuard<'_, TaggerProcess>> {
        self.process
            .lock()
            .map_err(|_| TaggerError::Protocol("tagger process lock poisoned".to_string()))
    }
}

impl Tagger for ProcessTagger {
    fn tag(&self, text: &str) -> TaggerResult<TaggedText> {
        let line = text.replace(['\n', '\r'], " ");
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let mut process = self.lock()?;
        while process.lines.try_recv().is_ok() {}

        writeln!(process.stdin, "{line}")?;
        process.stdin.flush()?;

        let budget = self.policy.budget_for(line);
        let started_at = Instant::now();
        loop {
            let remaining = budget.saturating_sub(started_at.elapsed());
            match process.lines.recv_timeout(remaining) {
                Ok(output) => {
                    let output = output.trim();
                    if output.is_empty() || output == line || !output.contains('_') {
                        continue;
                    }
                    return parse_tagged_line(output);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "event=tagger_request module=tagger status=timeout budget_ms={} chars={}",
                        budget.as_millis(),
                        line.chars().count()
                    );
                    return Err(TaggerError::Timeout { after: budget });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(TaggerError::Closed),
            }
        }
    }
}

impl Drop for ProcessTagger {
    fn drop(&mut self) {
        if let Ok(process) = self.process.get_mut() {
            let _ = process.child.kill();
            let _ = process.child.wait();
        }
    }
}

/// Parses `word_TAG word_TAG ...` into sentences.
fn parse_tagged_line(line: &str) -> TaggerResult<TaggedText> {
    let tokens = line
        .split_whitespace()
        .map(|pair| {
            pair.rsplit_once('_')
                .filter(|(word, tag)| !word.is_empty() && !tag.is_empty())
                .map(|(word, tag)| TaggedToken::new(word, tag))
                .ok_or_else(|| TaggerError::Protocol(format!("token `{pair}` has no tag")))
        })
        .collect::<TaggerResult<Vec<_>>>()?;
    Ok(split_sentences(tokens))
}
