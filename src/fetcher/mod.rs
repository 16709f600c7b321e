//! External fetcher
//!
//! Gift listings and decoration data come from external scripts. Each run
//! goes through [`process::run`], which owns the child, bounds its output
//! and kills it on timeout.
//!
//! # Invocation contract
//! - gifts: `<interpreter> <gifts_script> @<handle> --include-user`
//! - decoration: `<interpreter> <profile_script> <handle>`
//! - stdout: one JSON record per line, only the last non-empty line counts
//! - exit code 0 = success; otherwise stderr carries the reason

pub mod parse;
pub mod process;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::FetcherConfig;
use crate::data::{AccountHandle, ProfilePayload};
use process::{Invocation, ProcessOutput};

const GIFTS_LABEL: &str = "gifts";
const DECORATION_LABEL: &str = "decoration";

/// Flag asking the gifts script to include the owner's profile
const INCLUDE_USER_FLAG: &str = "--include-user";

/// Failure of an external fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// The executable could not be started
    #[error("Failed to start fetch process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Non-zero exit; `message` is the trimmed stderr
    #[error("{message}")]
    Exit { code: Option<i32>, message: String },

    /// The process outlived its deadline and was killed
    #[error("Fetch process timed out after {0:?}")]
    Timeout(Duration),

    /// Waiting on the process or reading its pipes failed
    #[error("Failed to read fetch process output: {0}")]
    Io(#[source] std::io::Error),

    /// The authoritative stdout line is not valid JSON
    #[error("Failed to parse fetch response: {0}")]
    Parse(String),

    /// Exit 0, but the script reported its own failure
    #[error("{0}")]
    Upstream(String),
}

impl FetchError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Spawn(_) => "spawn",
            FetchError::Exit { .. } => "exit",
            FetchError::Timeout(_) => "timeout",
            FetchError::Io(_) => "io",
            FetchError::Parse(_) => "parse",
            FetchError::Upstream(_) => "upstream",
        }
    }
}

/// Source of profile payloads and decoration data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Fetch and normalize an account's gift listing
    async fn fetch_profile(&self, handle: &AccountHandle) -> Result<ProfilePayload, FetchError>;

    /// Fetch the raw decoration lookup for an account
    async fn fetch_decoration(&self, handle: &AccountHandle) -> Result<Value, FetchError>;
}

/// [`ProfileFetcher`] backed by the configured scripts
pub struct ScriptFetcher {
    config: FetcherConfig,
}

impl ScriptFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    fn invocation(&self, script: &Path, args: &[String]) -> Invocation {
        let mut all_args = Vec::with_capacity(args.len() + 1);
        all_args.push(script.display().to_string());
        all_args.extend_from_slice(args);

        Invocation {
            program: self.config.interpreter.clone(),
            args: all_args,
            working_dir: Some(self.config.working_dir.clone()),
            timeout: self.config.timeout(),
            max_output_bytes: self.config.max_output_bytes,
        }
    }

    /// Run a script and return the parsed authoritative line
    async fn run_script(&self, label: &'static str, invocation: Invocation) -> Result<Value, FetchError> {
        use crate::metrics::{FETCH_DURATION_SECONDS, FETCH_RUNS_TOTAL};

        let timer = FETCH_DURATION_SECONDS
            .with_label_values(&[label])
            .start_timer();
        let result = process::run(&invocation)
            .await
            .and_then(|output| Self::interpret(label, output));
        timer.observe_duration();

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.kind(),
        };
        FETCH_RUNS_TOTAL.with_label_values(&[label, outcome]).inc();

        result
    }

    fn interpret(label: &'static str, output: ProcessOutput) -> Result<Value, FetchError> {
        if output.truncated {
            tracing::warn!(script = label, "Fetch process output exceeded budget; kept the tail");
        }

        if !output.status.success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                "Fetch process exited with an error".to_string()
            } else {
                stderr.to_string()
            };
            return Err(FetchError::Exit {
                code: output.status.code(),
                message,
            });
        }

        if !output.stderr.trim().is_empty() {
            tracing::debug!(script = label, stderr = %output.stderr.trim(), "Fetch process diagnostics");
        }

        parse::parse_last_line(&output.stdout)
    }
}

#[async_trait]
impl ProfileFetcher for ScriptFetcher {
    async fn fetch_profile(&self, handle: &AccountHandle) -> Result<ProfilePayload, FetchError> {
        let invocation = self.invocation(
            &self.config.gifts_script,
            &[handle.with_sigil(), INCLUDE_USER_FLAG.to_string()],
        );

        let value = self.run_script(GIFTS_LABEL, invocation).await?;
        parse::ensure_success(&value, "Unable to load gifts")?;

        let payload = parse::map_payload(&value, handle);
        tracing::debug!(
            account = %handle,
            gifts = payload.gifts.len(),
            total = payload.total,
            "Fetched profile gifts"
        );
        Ok(payload)
    }

    async fn fetch_decoration(&self, handle: &AccountHandle) -> Result<Value, FetchError> {
        let invocation = self.invocation(&self.config.profile_script, &[handle.to_string()]);

        let value = self.run_script(DECORATION_LABEL, invocation).await?;
        parse::ensure_success(&value, "Unable to load profile decoration")?;
        Ok(value)
    }
}
