//! Strategy advisor bridge to an external program.
//!
//! The advisor is any executable that reads one [`AdvisoryRequest`] as JSON
//! on stdin and writes its reply on stdout. The reply is parsed with
//! [`StrategyDirective::from_response`], so fenced or bare JSON both work.
//! A failed, slow, or garbled call is reported as an [`AdvisorError`] and
//! the round falls back to the local wave.

use std::process::Stdio;
use std::time::Duration;

use td_core::error::AdvisorError;
use td_core::snapshot::AdvisoryRequest;
use td_core::strategy::{StrategyDirective, StrategyProvider};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;

/// Default time allowed for one advisory call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures talking to the advisor process.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Spawning or piping to the process failed.
    #[error("advisor I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    /// The process exited unsuccessfully.
    #[error("advisor exited with status {0:?}")]
    Exit(Option<i32>),
    /// The process wrote something other than UTF-8.
    #[error("advisor reply is not UTF-8")]
    NotUtf8,
}

impl From<BridgeError> for AdvisorError {
    fn from(err: BridgeError) -> Self {
        Self::Call(err.to_string())
    }
}

/// Advisor backed by an external command, run once per round.
#[derive(Debug)]
pub struct ProcessAdvisor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    runtime: Runtime,
}

impl ProcessAdvisor {
    /// Create an advisor that runs `program` with `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if the async runtime cannot be started.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
            runtime,
        })
    }

    /// Parse a whitespace-separated command line such as `"python3 advisor.py"`.
    ///
    /// Returns `Ok(None)` for an empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if the async runtime cannot be started.
    pub fn from_command_line(line: &str) -> std::io::Result<Option<Self>> {
        let mut parts = line.split_whitespace().map(String::from);
        match parts.next() {
            Some(program) => Self::new(program, parts.collect()).map(Some),
            None => Ok(None),
        }
    }

    /// Set the time allowed for one call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program being run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn call(&self, request: String) -> Result<String, BridgeError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(BridgeError::Exit(output.status.code()));
        }
        String::from_utf8(output.stdout).map_err(|_| BridgeError::NotUtf8)
    }
}

impl StrategyProvider for ProcessAdvisor {
    fn advise(&mut self, request: &AdvisoryRequest) -> Result<StrategyDirective, AdvisorError> {
        let payload = request.to_json().map_err(BridgeError::from)?;
        tracing::debug!(program = %self.program, bytes = payload.len(), "Calling advisor");

        let reply = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, self.call(payload)).await })
            .map_err(|_| AdvisorError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)))??;

        tracing::debug!(reply = %reply.trim(), "Advisor replied");
        Ok(StrategyDirective::from_response(&reply)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use td_core::simulation::SimulationContext;

    fn request() -> AdvisoryRequest {
        SimulationContext::default().advisory_request()
    }

    fn shell(script: &str) -> ProcessAdvisor {
        ProcessAdvisor::new("sh", vec!["-c".into(), script.into()]).unwrap()
    }

    #[test]
    fn test_reply_is_parsed() {
        let mut advisor = shell(
            r#"cat > /dev/null; echo '{"strategy_reason":"rush","units":{"melee":2}}'"#,
        );
        let directive = advisor.advise(&request()).unwrap();
        assert_eq!(directive.strategy_reason.as_deref(), Some("rush"));
        assert_eq!(directive.units.melee, 2);
    }

    #[test]
    fn test_request_reaches_stdin() {
        // Replies only if the request arrived.
        let mut advisor = shell(r#"grep '"round"' > /dev/null && echo '{}'"#);
        assert!(advisor.advise(&request()).is_ok());
    }

    #[test]
    fn test_failing_process_is_a_call_error() {
        let mut advisor = shell("cat > /dev/null; exit 3");
        assert!(matches!(advisor.advise(&request()), Err(AdvisorError::Call(_))));
    }

    #[test]
    fn test_garbled_reply_is_a_parse_error() {
        let mut advisor = shell("cat > /dev/null; echo 'build more turrets'");
        assert!(matches!(advisor.advise(&request()), Err(AdvisorError::Parse(_))));
    }

    #[test]
    fn test_slow_advisor_times_out() {
        let mut advisor = shell("sleep 5").with_timeout(Duration::from_millis(100));
        assert!(matches!(advisor.advise(&request()), Err(AdvisorError::Timeout(100))));
    }

    #[test]
    fn test_missing_program_is_a_call_error() {
        let mut advisor = ProcessAdvisor::new("/nonexistent/advisor", Vec::new()).unwrap();
        assert!(matches!(advisor.advise(&request()), Err(AdvisorError::Call(_))));
    }

    #[test]
    fn test_command_line_parsing() {
        assert!(ProcessAdvisor::from_command_line("   ").unwrap().is_none());
        let advisor = ProcessAdvisor::from_command_line("python3 advisor.py").unwrap().unwrap();
        assert_eq!(advisor.program(), "python3");
    }
}
