// persona-activation-cli/src/main.rs
// ============================================================================
// Module: Persona Activation CLI Entry Point
// Description: Command dispatcher for the activation server and offline operations.
// Purpose: Serve the HTTP API and run resolve, replay, audit, and admin tasks locally.
// Dependencies: clap, persona-activation-config, persona-activation-server, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `persona-activation serve` runs the HTTP server. The remaining commands
//! open the configured store directly and run the same service layer the
//! server uses, in the tenant given by `--tenant` (default
//! `tenancy.local_tenant_id`), with actor `cli`. Decisions and records are
//! written to stdout as canonical JSON.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use persona_activation_cli::fixture::Fixture;
use persona_activation_cli::fixture::FixtureError;
use persona_activation_cli::t;
use persona_activation_config::ActivationConfig;
use persona_activation_config::ServerAuthMode;
use persona_activation_config::StoreType;
use persona_activation_core::ResolverContext;
use persona_activation_core::TenantId;
use persona_activation_core::Timestamp;
use persona_activation_server::ActivationServer;
use persona_activation_server::ActivationService;
use persona_activation_server::ServiceError;
use persona_activation_server::StoreHandles;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a fixture JSON input.
const MAX_FIXTURE_BYTES: usize = 16 * 1024 * 1024;
/// Actor recorded in audit records written by offline commands.
const CLI_ACTOR: &str = "cli";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "persona-activation", disable_help_subcommand = true, disable_version_flag = true)]
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
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Resolve activation for a user.
    Resolve(ResolveCommand),
    /// Replay a recorded decision by audit id.
    Replay(ReplayCommand),
    /// List a user's recorded decisions, newest first.
    Audit(AuditCommand),
    /// Persona policy administration.
    Policy {
        /// Selected policy subcommand.
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Load users, bindings, and policies from a JSON fixture.
    Seed(SeedCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to persona-activation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Store and tenant selection shared by offline commands.
#[derive(Args, Debug)]
struct StoreArgs {
    /// Optional config file path (defaults to persona-activation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Tenant to operate in (defaults to `tenancy.local_tenant_id`).
    #[arg(long, value_name = "TENANT")]
    tenant: Option<String>,
}

/// Arguments for `resolve`.
#[derive(Args, Debug)]
struct ResolveCommand {
    /// User to resolve.
    #[arg(long = "user", value_name = "USER_ID")]
    user_id: String,
    /// Restrict resolution to one persona.
    #[arg(long = "persona", value_name = "PERSONA_ID")]
    persona_id: Option<String>,
    /// Store and tenant selection.
    #[command(flatten)]
    store: StoreArgs,
}

/// Arguments for `replay`.
#[derive(Args, Debug)]
struct ReplayCommand {
    /// Audit id returned by a prior resolve.
    #[arg(long, value_name = "AUDIT_ID")]
    audit_id: String,
    /// Store and tenant selection.
    #[command(flatten)]
    store: StoreArgs,
}

/// Arguments for `audit`.
#[derive(Args, Debug)]
struct AuditCommand {
    /// User whose history is listed.
    #[arg(long = "user", value_name = "USER_ID")]
    user_id: String,
    /// Maximum records to return (1-100, default 20).
    #[arg(long, value_name = "N")]
    limit: Option<String>,
    /// Store and tenant selection.
    #[command(flatten)]
    store: StoreArgs,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Move a persona's current policy to a new lifecycle status.
    Transition(PolicyTransitionCommand),
}

/// Arguments for `policy transition`.
#[derive(Args, Debug)]
struct PolicyTransitionCommand {
    /// Persona whose current policy changes.
    #[arg(long = "persona", value_name = "PERSONA_ID")]
    persona_id: String,
    /// Target status: staged, active, or deprecated.
    #[arg(long, value_name = "STATUS")]
    to: String,
    /// Store and tenant selection.
    #[command(flatten)]
    store: StoreArgs,
}

/// Arguments for `seed`.
#[derive(Args, Debug)]
struct SeedCommand {
    /// Path to the fixture JSON file.
    #[arg(long, value_name = "PATH")]
    fixture: PathBuf,
    /// Optional config file path (defaults to persona-activation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to persona-activation.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(err: ServiceError) -> Self {
        Self::new(t!("command.failed", code = err.code(), message = err))
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
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Resolve(command) => command_resolve(&command),
        Commands::Replay(command) => command_replay(&command),
        Commands::Audit(command) => command_audit(&command),
        Commands::Policy {
            command,
        } => command_policy(&command),
        Commands::Seed(command) => command_seed(&command),
        Commands::Config {
            command,
        } => command_config(&command),
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
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = ActivationConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(t!("serve.config.load_failed", error = err)))?;
    warn_local_only(&config)?;
    let listening = t!(
        "serve.listening",
        bind = config.server.bind.trim(),
        store = store_label(config.store.store_type)
    );

    let server = tokio::task::spawn_blocking(move || ActivationServer::from_config(config))
        .await
        .map_err(|err| {
            CliError::new(t!("serve.init_failed", error = format!("init join failed: {err}")))
        })?
        .map_err(|err| CliError::new(t!("serve.init_failed", error = err)))?;
    write_stderr_line(&listening).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(t!("serve.failed", error = err)))?;

    Ok(ExitCode::SUCCESS)
}

/// Emits the local-only warning when no explicit auth is configured.
fn warn_local_only(config: &ActivationConfig) -> CliResult<()> {
    if config.server.auth_mode() != ServerAuthMode::LocalOnly {
        return Ok(());
    }
    write_stderr_line(&t!(
        "serve.warn.local_only_auth",
        tenant = config.tenancy.local_tenant_id.as_str()
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(())
}

/// Returns the config label of a store backend.
const fn store_label(store_type: StoreType) -> &'static str {
    match store_type {
        StoreType::Memory => "memory",
        StoreType::Sqlite => "sqlite",
    }
}

// ============================================================================
// SECTION: Offline Commands
// ============================================================================

/// Service and context for one offline command.
struct OfflineSession {
    /// Service over the configured store.
    service: ActivationService,
    /// Context for the selected tenant.
    context: ResolverContext,
}

/// Loads config, opens the store, and builds the resolver context.
fn open_session(args: &StoreArgs) -> CliResult<OfflineSession> {
    let config = ActivationConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    let tenant_id = match args.tenant.as_deref() {
        Some(raw) => TenantId::parse("tenant_id", raw)
            .map_err(|err| CliError::new(t!("tenant.invalid", error = err)))?,
        None => config.tenancy.local_tenant_id.clone(),
    };
    let stores = StoreHandles::from_config(&config.store)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))?;
    Ok(OfflineSession {
        service: ActivationService::new(stores, config.transition_rules()),
        context: ResolverContext::new(tenant_id, now_timestamp()).with_actor(CLI_ACTOR),
    })
}

/// Executes the `resolve` command.
fn command_resolve(command: &ResolveCommand) -> CliResult<ExitCode> {
    let session = open_session(&command.store)?;
    let decision = session.service.resolve(
        &session.context,
        Some(command.user_id.as_str()),
        command.persona_id.as_deref(),
    )?;
    write_json(&decision)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `replay` command.
fn command_replay(command: &ReplayCommand) -> CliResult<ExitCode> {
    let session = open_session(&command.store)?;
    let replayed = session.service.replay(&session.context, Some(command.audit_id.as_str()))?;
    write_json(&replayed)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `audit` command.
fn command_audit(command: &AuditCommand) -> CliResult<ExitCode> {
    let session = open_session(&command.store)?;
    let history = session.service.audit_history(
        &session.context,
        Some(command.user_id.as_str()),
        command.limit.as_deref(),
    )?;
    write_json(&history)?;
    Ok(ExitCode::SUCCESS)
}

/// Dispatches policy subcommands.
fn command_policy(command: &PolicyCommand) -> CliResult<ExitCode> {
    match command {
        PolicyCommand::Transition(command) => command_policy_transition(command),
    }
}

/// Executes the `policy transition` command.
fn command_policy_transition(command: &PolicyTransitionCommand) -> CliResult<ExitCode> {
    let session = open_session(&command.store)?;
    let outcome = session.service.transition_policy(
        &session.context,
        &command.persona_id,
        Some(command.to.as_str()),
    )?;
    write_json(&outcome)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Seed Command
// ============================================================================

/// Executes the `seed` command.
fn command_seed(command: &SeedCommand) -> CliResult<ExitCode> {
    let config = ActivationConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    if config.store.store_type == StoreType::Memory {
        return Err(CliError::new(t!("seed.memory_store")));
    }
    let fixture = read_fixture(&command.fixture)?;
    let stores = StoreHandles::from_config(&config.store)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))?;
    let summary = fixture.apply(&stores.writer).map_err(|err| match err {
        FixtureError::Store(err) => CliError::new(t!("seed.write_failed", error = err)),
        other => CliError::new(t!("seed.invalid", error = other)),
    })?;
    write_stdout_line(&t!(
        "seed.ok",
        users = summary.users,
        bindings = summary.bindings,
        policies = summary.policies
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Reads and parses a fixture file with a size limit.
fn read_fixture(path: &Path) -> CliResult<Fixture> {
    let bytes = read_bytes_with_limit(path, MAX_FIXTURE_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = "fixture",
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = "fixture",
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    Fixture::from_json(&bytes).map_err(|err| {
        CliError::new(t!("input.parse_failed", kind = "fixture", path = path.display(), error = err))
    })
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = ActivationConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Current wall-clock time as a timestamp.
fn now_timestamp() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a value to stdout as canonical JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
