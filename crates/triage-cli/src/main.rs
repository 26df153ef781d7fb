// crates/triage-cli/src/main.rs
// ============================================================================
// Module: Triage CLI Entry Point
// Description: Command dispatcher for triage runs and ledger/lane maintenance.
// Purpose: Wire triage.toml to collaborators and run one batch per invocation.
// Dependencies: clap, tokio, triage-config, triage-core, triage-providers,
// triage-store-fs
// ============================================================================

//! ## Overview
//! `triage run` loads `triage.toml`, builds the HTTP queue client, endpoint
//! probe, filesystem stores, and optional signer, and runs a single batch.
//! Maintenance commands verify the ledger chain, print its tip, rebuild lane
//! documents from the ledger, validate configuration, and canonicalize JSON
//! files. Configuration problems fail closed before anything is written.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use triage_config::ConfigError;
use triage_config::TriageConfig;
use triage_core::ArtifactSigner;
use triage_core::CanonicalOptions;
use triage_core::Lane;
use triage_core::LaneRepository;
use triage_core::Ledger;
use triage_core::LedgerIssue;
use triage_core::LedgerReplay;
use triage_core::LedgerStore;
use triage_core::LedgerVerification;
use triage_core::PipelineOptions;
use triage_core::RunOutcome;
use triage_core::SignatureOutcome;
use triage_core::StoreError;
use triage_core::Timestamp;
use triage_core::TriageCollaborators;
use triage_core::TriagePipeline;
use triage_core::core::canonical::canonical_json_bytes_with;
use triage_core::project_lanes;
use triage_core::verify_ledger;
use triage_providers::HttpEndpointProbe;
use triage_providers::HttpProbeConfig;
use triage_providers::HttpQueueConfig;
use triage_providers::HttpSubmissionQueue;
use triage_providers::MinisignConfig;
use triage_providers::MinisignSigner;
use triage_providers::QueueAuth;
use triage_store_fs::FileAuditSink;
use triage_store_fs::FileLaneRepository;
use triage_store_fs::FileLedgerStore;
use triage_store_fs::FileSnapshotSink;
use triage_store_fs::DEFAULT_MAX_ITEMS;
use triage_store_fs::canonicalize_file;
use triage_store_fs::check_file;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "triage", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process pending submissions into the ledger and lane documents.
    Run(RunCommand),
    /// Ledger inspection utilities.
    Ledger {
        /// Selected ledger subcommand.
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Lane document maintenance.
    Lanes {
        /// Selected lanes subcommand.
        #[command(subcommand)]
        command: LanesCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Rewrite JSON files in canonical form, or check that they already are.
    Canon(CanonCommand),
}

/// Ledger subcommands.
#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Replay the ledger from the sentinel and recompute every hash.
    Verify(LedgerVerifyCommand),
    /// Print the hash of the last valid entry.
    Tip(ConfigArgs),
}

/// Lane subcommands.
#[derive(Subcommand, Debug)]
enum LanesCommand {
    /// Rebuild lane documents purely from ledger decisions.
    Rebuild(LanesRebuildCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate(ConfigArgs),
}

/// Config file selection shared by every command that reads `triage.toml`.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Config file path (defaults to `TRIAGE_CONFIG`, then triage.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Run timestamp override (`YYYY-MM-DDTHH:MM:SSZ`); defaults to now.
    #[arg(long, value_name = "TIMESTAMP")]
    at: Option<String>,
}

/// Arguments for `ledger verify`.
#[derive(Args, Debug)]
struct LedgerVerifyCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `lanes rebuild`.
#[derive(Args, Debug)]
struct LanesRebuildCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Report what would change without writing.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Timestamp stamped on rewritten documents; defaults to now.
    #[arg(long, value_name = "TIMESTAMP")]
    at: Option<String>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `canon`.
#[derive(Args, Debug)]
struct CanonCommand {
    /// Fail when any file is not canonical instead of rewriting it.
    #[arg(long, action = ArgAction::SetTrue)]
    check: bool,
    /// Escape non-ASCII characters as `\uXXXX`.
    #[arg(long, action = ArgAction::SetTrue)]
    ascii: bool,
    /// Refuse files whose top-level `items` array is longer than this.
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: usize,
    /// JSON files to process.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

/// Output formats for structured CLI commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("triage {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Run(command) => command_run(command).await,
        Commands::Ledger {
            command,
        } => command_ledger(&command),
        Commands::Lanes {
            command,
        } => command_lanes(&command),
        Commands::Config {
            command,
        } => command_config(&command),
        Commands::Canon(command) => command_canon(&command),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    if !config.run.enabled {
        write_stdout_line("run disabled: set [run] enabled = true to process the queue")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let ts = resolve_timestamp(command.at.as_deref())?;
    let outcome = tokio::task::spawn_blocking(move || execute_run(&config, &ts))
        .await
        .map_err(|err| CliError::new(format!("run failed: worker join failed: {err}")))??;
    write_stdout_line(&render_run_summary(&outcome))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds every collaborator from configuration and runs one batch.
fn execute_run(config: &TriageConfig, ts: &Timestamp) -> CliResult<RunOutcome> {
    let queue = build_queue(config)?;
    let probe = HttpEndpointProbe::new(probe_config(config))
        .map_err(|err| CliError::new(format!("probe setup failed: {err}")))?;
    let storage = &config.storage;
    let ledger = FileLedgerStore::new(storage.ledger_file());
    let lanes = FileLaneRepository::new(storage.lanes_path(), storage.mirror_paths());
    let snapshots = FileSnapshotSink::new(storage.state_path());
    let audit = FileAuditSink::new(storage.audit_path());
    let signer = build_signer(config);
    let collaborators = TriageCollaborators {
        queue: &queue,
        probe: &probe,
        ledger: &ledger,
        lanes: &lanes,
        snapshots: &snapshots,
        signer: signer.as_ref().map(|signer| signer as &dyn ArtifactSigner),
        audit: &audit,
    };
    let options = PipelineOptions {
        workers: config.run.workers,
        ascii_only: config.output.ascii_only,
    };
    TriagePipeline::new(&config.rules, collaborators, options)
        .and_then(|pipeline| pipeline.run(ts))
        .map_err(|err| CliError::new(format!("run failed: {err}")))
}

/// Builds the queue client, resolving the maintainer token.
fn build_queue(config: &TriageConfig) -> CliResult<HttpSubmissionQueue> {
    let queue = &config.queue;
    let base_url = queue.parsed_base_url().map_err(|err| config_error(&err))?;
    let auth = queue.resolve_token().map_err(|err| config_error(&err))?.map(|token| QueueAuth {
        header: queue.auth_header.clone(),
        token,
    });
    HttpSubmissionQueue::new(HttpQueueConfig {
        base_url,
        list_path: queue.list_path.clone(),
        detail_path: queue.detail_path.clone(),
        auth,
        allow_http: queue.allow_http,
        timeout_ms: queue.timeout_ms,
        max_response_bytes: queue.max_response_bytes,
        user_agent: queue.user_agent.clone(),
    })
    .map_err(|err| CliError::new(format!("queue client setup failed: {err}")))
}

/// Maps probe settings onto the HTTP probe configuration.
fn probe_config(config: &TriageConfig) -> HttpProbeConfig {
    HttpProbeConfig {
        allow_http: config.probes.allow_http,
        allow_private_networks: config.probes.allow_private_networks,
        timeout_ms: config.probes.timeout_ms,
        user_agent: config.probes.user_agent.clone(),
    }
}

/// Builds the signer when signing is enabled; the key path is storage-relative.
fn build_signer(config: &TriageConfig) -> Option<MinisignSigner> {
    let signing = &config.signing;
    if !signing.enabled {
        return None;
    }
    let key_path = signing.key_path.as_deref()?;
    Some(MinisignSigner::new(MinisignConfig {
        command: signing.command.clone(),
        key_path: config.storage.resolve(key_path),
        passphrase_env: signing.passphrase_env.clone(),
    }))
}

/// Renders the human-readable run summary.
fn render_run_summary(outcome: &RunOutcome) -> String {
    let snapshot = &outcome.snapshot;
    let mut lines = vec![format!(
        "run {}: {} decided, {} failed, {} already seen, {} repaired",
        snapshot.ts,
        snapshot.decisions.len(),
        snapshot.errors.len(),
        snapshot.skipped_seen,
        outcome.repaired.len()
    )];
    for decision in &snapshot.decisions {
        lines.push(format!(
            "  {} -> {} ({}, score {})",
            decision.id, decision.lane, decision.reason, decision.score
        ));
    }
    for failure in &snapshot.errors {
        lines.push(format!("  {} failed: {}", failure.id, failure.error));
    }
    let changed: Vec<&str> =
        outcome.published.iter().map(|(lane, _)| lane.document_name()).collect();
    if changed.is_empty() {
        lines.push("lanes changed: none".to_string());
    } else {
        lines.push(format!("lanes changed: {}", changed.join(", ")));
    }
    lines.push(format!("ledger tip: {}", snapshot.ledger_last_hash));
    lines.push(format!("snapshot: {}", outcome.snapshot_path.display()));
    match &outcome.signature {
        SignatureOutcome::NotNeeded => {}
        SignatureOutcome::Written {
            path, ..
        } => lines.push(format!("signature: {}", path.display())),
        SignatureOutcome::Skipped(reason) => lines.push(format!("signature skipped: {reason}")),
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Ledger Commands
// ============================================================================

/// Dispatches ledger subcommands.
fn command_ledger(command: &LedgerCommand) -> CliResult<ExitCode> {
    match command {
        LedgerCommand::Verify(command) => command_ledger_verify(command),
        LedgerCommand::Tip(args) => command_ledger_tip(args),
    }
}

/// Executes `ledger verify`.
fn command_ledger_verify(command: &LedgerVerifyCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let path = config.storage.ledger_file();
    let bytes = read_ledger(&FileLedgerStore::new(&path))?;
    let verification = verify_ledger(&bytes)
        .map_err(|err| CliError::new(format!("ledger verify failed: {err}")))?;
    match command.format {
        OutputFormat::Text => write_stdout_line(&render_verification_text(&path, &verification))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
        OutputFormat::Json => write_json(&verification)?,
    }
    if verification.is_intact() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

/// Executes `ledger tip`.
fn command_ledger_tip(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let store = FileLedgerStore::new(config.storage.ledger_file());
    let (ledger, _) =
        Ledger::open(&store).map_err(|err| CliError::new(format!("ledger read failed: {err}")))?;
    let tip = ledger.last_hash().map_err(|err| CliError::new(format!("ledger tip failed: {err}")))?;
    write_stdout_line(&tip).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Reads the raw ledger bytes.
fn read_ledger(store: &FileLedgerStore) -> CliResult<Vec<u8>> {
    store.read_all().map_err(|err| CliError::new(format!("ledger read failed: {err}")))
}

/// Renders verification results as text.
fn render_verification_text(path: &Path, verification: &LedgerVerification) -> String {
    let status = if verification.is_intact() { "intact" } else { "broken" };
    let mut lines = vec![
        format!("ledger: {}", path.display()),
        format!("entries: {}", verification.entries),
        format!("tip: {}", verification.tip),
        format!("status: {status}"),
    ];
    for issue in &verification.issues {
        lines.push(match issue {
            LedgerIssue::Malformed {
                line,
            } => format!("line {line}: malformed, skipped"),
            LedgerIssue::PrevHashMismatch {
                line,
                expected,
                found,
            } => format!("line {line}: prev_hash mismatch (expected {expected}, found {found})"),
            LedgerIssue::EntryHashMismatch {
                line,
                expected,
                found,
            } => format!("line {line}: entry_hash mismatch (expected {expected}, found {found})"),
        });
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Lane Commands
// ============================================================================

/// Result of rebuilding one lane document.
#[derive(Debug, Clone, Serialize)]
struct LaneRebuildOutput {
    /// Lane document name.
    lane: String,
    /// Items projected from the ledger.
    items: usize,
    /// Whether the stored document differs from the projection.
    changed: bool,
    /// Whether the document was rewritten.
    written: bool,
}

/// Dispatches lane subcommands.
fn command_lanes(command: &LanesCommand) -> CliResult<ExitCode> {
    match command {
        LanesCommand::Rebuild(command) => command_lanes_rebuild(command),
    }
}

/// Executes `lanes rebuild`.
fn command_lanes_rebuild(command: &LanesRebuildCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let ts = resolve_timestamp(command.at.as_deref())?;
    let bytes = read_ledger(&FileLedgerStore::new(config.storage.ledger_file()))?;
    let replay = LedgerReplay::from_bytes(&bytes);
    let rebuilt = project_lanes(&replay.decisions(), &ts)
        .map_err(|err| CliError::new(format!("lane rebuild failed: {err}")))?;
    let repo = FileLaneRepository::new(config.storage.lanes_path(), config.storage.mirror_paths());
    let options = CanonicalOptions::for_files(config.output.ascii_only);

    let mut outputs = Vec::new();
    let mut accepted_written = false;
    for (lane, document) in rebuilt.into_documents() {
        let changed = match repo.load(lane) {
            Ok(Some(current)) => current.items != document.items,
            Ok(None) | Err(StoreError::Corrupt(_)) => true,
            Err(err) => return Err(CliError::new(format!("lane rebuild failed: {err}"))),
        };
        let written = changed && !command.dry_run;
        if written {
            let encoded = canonical_json_bytes_with(&document, options)
                .map_err(|err| CliError::new(format!("lane rebuild failed: {err}")))?;
            repo.publish(lane, &encoded)
                .map_err(|err| CliError::new(format!("lane rebuild failed: {err}")))?;
            accepted_written |= lane == Lane::Accept;
        }
        outputs.push(LaneRebuildOutput {
            lane: lane.document_name().to_string(),
            items: document.items.len(),
            changed,
            written,
        });
    }

    match command.format {
        OutputFormat::Text => write_stdout_line(&render_rebuild_text(&outputs, command.dry_run))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
        OutputFormat::Json => write_json(&outputs)?,
    }
    if accepted_written && let Some(signer) = build_signer(&config) {
        write_stderr_line(&resign_accepted(&signer, &repo))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders lane rebuild results as text.
fn render_rebuild_text(outputs: &[LaneRebuildOutput], dry_run: bool) -> String {
    outputs
        .iter()
        .map(|output| {
            let status = match (output.changed, dry_run) {
                (false, _) => "unchanged",
                (true, true) => "would rewrite",
                (true, false) => "rewritten",
            };
            format!("{}: {} items, {status}", output.lane, output.items)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Signs the rewritten accepted lane and mirrors the signature.
///
/// Signatures of the replaced document are removed first, wherever they were
/// mirrored.
fn resign_accepted(signer: &MinisignSigner, repo: &FileLaneRepository) -> String {
    let accepted = repo.document_path(Lane::Accept);
    if let Err(err) = repo.remove_artifact(&signer.signature_path(&accepted)) {
        return format!("signature skipped: stale signature removal failed: {err}");
    }
    if !signer.available() {
        return "signature skipped: signer unavailable".to_string();
    }
    match signer.sign(&accepted) {
        Ok(signature) => match repo.mirror_artifact(&signature) {
            Ok(_) => format!("signature: {}", signature.display()),
            Err(err) => format!("signature mirror failed: {err}"),
        },
        Err(err) => format!("signature skipped: {err}"),
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => command_config_validate(args),
    }
}

/// Executes `config validate`.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args)?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Canon Command
// ============================================================================

/// Executes `canon`.
fn command_canon(command: &CanonCommand) -> CliResult<ExitCode> {
    let options = CanonicalOptions::for_files(command.ascii);
    let mut not_canonical = 0_usize;
    for path in &command.files {
        if command.check {
            let canonical = check_file(path, options, command.max_items)
                .map_err(|err| CliError::new(format!("canon check failed: {err}")))?;
            if !canonical {
                not_canonical += 1;
                write_stderr_line(&format!("not canonical: {}", path.display()))
                    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            }
        } else if canonicalize_file(path, options, command.max_items)
            .map_err(|err| CliError::new(format!("canon failed: {err}")))?
        {
            write_stdout_line(&format!("canonicalized: {}", path.display()))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    if not_canonical == 0 { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<TriageConfig> {
    TriageConfig::load(args.config.as_deref()).map_err(|err| config_error(&err))
}

/// Formats a configuration error.
fn config_error(err: &ConfigError) -> CliError {
    CliError::new(format!("config load failed: {err}"))
}

/// Parses a timestamp override or takes the current time.
fn resolve_timestamp(at: Option<&str>) -> CliResult<Timestamp> {
    match at {
        Some(value) => Timestamp::parse(value)
            .map_err(|err| CliError::new(format!("invalid timestamp {value}: {err}"))),
        None => Timestamp::from_datetime(OffsetDateTime::now_utc())
            .map_err(|err| CliError::new(format!("clock unavailable: {err}"))),
    }
}

/// Writes canonical JSON to stdout.
fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let bytes = canonical_json_bytes_with(value, CanonicalOptions::for_files(false))
        .map_err(|err| CliError::new(format!("json output failed: {err}")))?;
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
