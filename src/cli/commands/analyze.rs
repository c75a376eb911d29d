//! Analyze Command
//!
//! Scores a prompt, suggests improvements and proposes a rewording.
//!
//! Usage:
//!   promptlens analyze "<prompt>" [--json]
//!   promptlens analyze --file prompt.txt [--identity <id>] [--fingerprint <fp>]

use std::path::PathBuf;

use tracing::debug;

use crate::analysis::PromptRequest;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, read_input};
use crate::gate::{ClientTraits, Fingerprint};
use crate::types::{CallerId, Result};

pub struct AnalyzeOptions {
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    /// Caller identity for the cooldown gate; a fresh session id when absent
    pub identity: Option<String>,
    /// Precomputed quota fingerprint; overrides `traits`
    pub fingerprint: Option<String>,
    pub traits: ClientTraits,
    pub json: bool,
}

pub async fn run(options: AnalyzeOptions) -> Result<()> {
    let text = read_input(options.text, options.file.as_deref())?;
    let ctx = CommandContext::load()?;
    let analyzer = ctx.analyzer().await?;

    let housekeeping = analyzer.spawn_housekeeping(ctx.config.cache.sweep_interval());

    let shutdown = analyzer.shutdown_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let request = PromptRequest {
        text: text.trim().to_string(),
        caller: CallerId::new(
            options
                .identity
                .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4())),
        ),
        fingerprint: options
            .fingerprint
            .map(Fingerprint::from_raw)
            .unwrap_or_else(|| Fingerprint::from_traits(&options.traits)),
    };
    debug!(
        "Analyzing as caller {} with fingerprint {}",
        request.caller, request.fingerprint
    );

    let outcome = analyzer.analyze_prompt(&request).await;

    interrupt.abort();
    housekeeping.abort();

    let output = Output::new();
    match outcome {
        Ok(result) if options.json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(result) => {
            output.result(&result);
            Ok(())
        }
        Err(e) => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(&e.report())?);
            } else if let Some(wait) = e.retry_after() {
                output.warning(&format!("Retry in {:.1}s", wait.as_secs_f64()));
            }
            Err(e)
        }
    }
}
