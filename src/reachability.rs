//! Reachability check.
//!
//! A best-effort connectivity probe: one ping to a reference host, bounded by
//! an explicit timeout. The result is diagnostic output only and never feeds
//! back into activation decisions.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ProxyError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Host answered and the output carried a round-trip time
    Latency(String),
    /// Host answered, no round-trip time found in the output
    Reachable,
    /// The ping utility ran and reported failure
    Unreachable,
    /// No answer before the timeout, the probe was killed
    TimedOut(Duration),
    /// The ping utility could not be run
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Latency(_) | Outcome::Reachable)
    }

    /// The failure as an error value, `None` on success
    pub fn failure(&self) -> Option<ProxyError> {
        let reason = match self {
            Outcome::Latency(_) | Outcome::Reachable => return None,
            Outcome::Unreachable => "ping failed".to_string(),
            Outcome::TimedOut(after) => format!("no reply within {}s", after.as_secs()),
            Outcome::Failed(reason) => reason.clone(),
        };
        Some(ProxyError::ReachabilityCheckFailed(reason))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Latency(time) => write!(f, "{}", time),
            Outcome::Reachable => write!(f, "successful"),
            Outcome::Unreachable => write!(f, "failed"),
            Outcome::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
            Outcome::Failed(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Connectivity probe used after activation and on demand
pub trait Reachability {
    fn check(&self, host: &str) -> Outcome;
}

/// Probe backed by the platform `ping` utility
#[derive(Debug, Clone)]
pub struct PingCheck {
    program: String,
    timeout: Duration,
}

impl PingCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            timeout,
        }
    }

    /// Use a different executable in place of `ping`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, host: &str) -> Vec<String> {
        let mut args = Vec::new();
        if cfg!(windows) {
            args.extend(["-n".to_string(), "1".to_string()]);
            args.extend(["-w".to_string(), self.timeout.as_millis().to_string()]);
        } else {
            args.extend(["-c".to_string(), "1".to_string()]);
            if cfg!(target_os = "linux") {
                args.extend(["-W".to_string(), self.timeout.as_secs().max(1).to_string()]);
            }
        }
        args.push(host.to_string());
        args
    }
}

impl Reachability for PingCheck {
    fn check(&self, host: &str) -> Outcome {
        let args = self.args(host);
        debug!(program = %self.program, ?args, "running reachability probe");

        let start = Instant::now();
        let mut child = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to start ping");
                return Outcome::Failed(format!("failed to run '{}': {}", self.program, e));
            }
        };

        // Poll for completion with timeout
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        warn!(host, timeout = ?self.timeout, "reachability probe timed out");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Outcome::TimedOut(self.timeout);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Outcome::Failed(format!("failed to wait for ping: {}", e));
                }
            }
        };

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            let _ = pipe.read_to_string(&mut stdout);
        }

        let outcome = interpret(status.success(), &stdout);
        debug!(host, ?outcome, elapsed = ?start.elapsed(), "reachability probe finished");
        outcome
    }
}

/// Map exit status and output text to an outcome
pub fn interpret(success: bool, stdout: &str) -> Outcome {
    if !success {
        return Outcome::Unreachable;
    }
    match parse_round_trip(stdout) {
        Some(time) => Outcome::Latency(time),
        None => Outcome::Reachable,
    }
}

/// Extract the round-trip time from ping output
///
/// Handles both `time=12.3 ms` (unit as its own token) and `time=12ms` /
/// `time<1ms` (unit attached).
pub fn parse_round_trip(output: &str) -> Option<String> {
    for line in output.lines() {
        let Some(idx) = line.find("time=").or_else(|| line.find("time<")) else {
            continue;
        };
        let marker = &line[idx + 4..idx + 5];
        let rest = &line[idx + 5..];
        let mut tokens = rest.split_whitespace();
        let value = tokens.next()?;
        let value = if marker == "<" {
            format!("<{}", value)
        } else {
            value.to_string()
        };

        let bare_number = value
            .trim_start_matches('<')
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
        return match tokens.next() {
            Some(unit) if bare_number && unit == "ms" => Some(format!("{} ms", value)),
            _ => Some(value),
        };
    }
    None
}
