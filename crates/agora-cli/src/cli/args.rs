use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agora-authz",
    version,
    about = "Run authorization checks against the Agora policy endpoint"
)]
pub struct Cli {
    /// YAML configuration file (environment variables override it)
    #[arg(long, global = true, env = "AGORA_AUTHZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Authorize a single action on a resource
    Check(CheckArgs),
    /// Authorize several (action, resource) pairs for one subject
    Batch(BatchArgs),
    /// Print the effective configuration (secrets redacted)
    Config,
}

/// Where the subject token comes from. Neither flag means no token.
#[derive(Args, Clone, Debug, Default)]
pub struct TokenArgs {
    /// Subject token (JWT)
    #[arg(long, conflicts_with = "token_env")]
    pub token: Option<String>,

    /// Read the subject token from this environment variable
    #[arg(long, value_name = "VAR")]
    pub token_env: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub token: TokenArgs,

    /// Action name, e.g. read_post
    #[arg(long)]
    pub action: String,

    /// Resource as JSON, e.g. '{"type":"post","id":"42"}'
    #[arg(long)]
    pub resource: String,

    /// Client IP forwarded to the policy as env.ip
    #[arg(long)]
    pub ip: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub token: TokenArgs,

    /// JSON array of {"action", "resource"} objects ("-" reads stdin)
    #[arg(long)]
    pub file: PathBuf,

    /// Client IP forwarded to the policy as env.ip
    #[arg(long)]
    pub ip: Option<String>,

    #[arg(long, value_enum, default_value_t = BatchMode::List)]
    pub mode: BatchMode,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// Print every decision; succeed only if all are allowed
    List,
    /// Succeed iff every item is allowed
    All,
    /// Succeed iff at least one item is allowed
    Any,
}
