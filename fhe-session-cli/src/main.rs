mod telemetry;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use fhe_session_core::util::format_address;
use fhe_session_core::{
    BitWidth, EncryptionProvider, HttpGatewayProvider, JsonRpcLedger, MemoryEncryptionProvider,
    Network, ProviderResult, SessionConfig, SessionConfigBuilder, SessionLifecycleManager,
    StaticLedger,
};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "fhe-session",
    version,
    about = "Homomorphic encryption session CLI"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Network to bind the session to (local, public-test, main).
    #[arg(
        long,
        global = true,
        env = "FHE_SESSION_NETWORK",
        default_value = "local",
        value_parser = parse_network
    )]
    network: Network,
    /// Encryption gateway base URL.
    #[arg(long, global = true, env = "FHE_SESSION_GATEWAY_URL")]
    gateway: Option<String>,
    /// JSON-RPC endpoint of the ledger.
    #[arg(long, global = true, env = "FHE_SESSION_RPC_URL")]
    rpc_url: Option<String>,
    /// Access-control-list contract address.
    #[arg(long, global = true, env = "FHE_SESSION_ACL_ADDRESS")]
    acl: Option<String>,
    /// Use the in-process development provider instead of a gateway.
    #[arg(long, global = true)]
    dev: bool,
    #[arg(long, global = true, env = "FHE_SESSION_MAX_RETRIES")]
    max_retries: Option<u32>,
    #[arg(long, global = true, env = "FHE_SESSION_BASE_DELAY_MS")]
    base_delay_ms: Option<u64>,
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a session and report its state.
    Status,
    /// Print the public parameters fetched during initialization.
    Params,
    /// Encrypt an unsigned integer.
    Encrypt(EncryptCmd),
    /// Request an authorization proof for a resource/principal pair.
    Authorize(AuthorizeCmd),
}

#[derive(Args)]
struct EncryptCmd {
    #[arg(long)]
    value: u64,
    #[arg(long, default_value = "32")]
    bits: BitWidth,
}

#[derive(Args)]
struct AuthorizeCmd {
    #[arg(long)]
    resource: String,
    #[arg(long)]
    principal: String,
}

fn parse_network(value: &str) -> Result<Network, String> {
    value
        .parse()
        .map_err(|_| format!("unknown network `{value}` (expected local, public-test or main)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.global.log_json)?;

    let config = build_config(&cli.global)?;
    let manager = build_manager(cli.global.dev);
    match cli.command {
        Command::Status => handle_status(&manager, &config).await,
        Command::Params => handle_params(&manager, &config).await,
        Command::Encrypt(cmd) => handle_encrypt(&manager, &config, cmd).await,
        Command::Authorize(cmd) => handle_authorize(&manager, &config, cmd).await,
    }
}

fn build_config(args: &GlobalArgs) -> Result<SessionConfig> {
    let mut builder = SessionConfigBuilder::default().network(args.network);

    builder = if args.dev {
        builder.ledger(StaticLedger::new(args.network.expected_chain_id()))
    } else {
        let Some(rpc_url) = args.rpc_url.as_deref() else {
            bail!("--rpc-url is required unless --dev is set");
        };
        let ledger = JsonRpcLedger::new(rpc_url)
            .with_context(|| format!("failed to configure rpc endpoint {rpc_url}"))?;
        builder.ledger(ledger)
    };

    if let Some(gateway) = &args.gateway {
        builder = builder.gateway_url(gateway);
    }
    if let Some(acl) = &args.acl {
        builder = builder.acl_address(acl);
    }
    if let Some(retries) = args.max_retries {
        builder = builder.max_retries(retries);
    }
    if let Some(millis) = args.base_delay_ms {
        builder = builder.base_delay(Duration::from_millis(millis));
    }

    debug!(network = %args.network, dev = args.dev, "session configuration resolved");
    builder.build().context("invalid session configuration")
}

fn build_manager(dev: bool) -> SessionLifecycleManager {
    if dev {
        SessionLifecycleManager::new(
            |_: &SessionConfig| -> ProviderResult<Box<dyn EncryptionProvider>> {
                Ok(Box::new(MemoryEncryptionProvider::new()))
            },
        )
    } else {
        SessionLifecycleManager::new(
            |config: &SessionConfig| -> ProviderResult<Box<dyn EncryptionProvider>> {
                Ok(Box::new(HttpGatewayProvider::from_config(config)?))
            },
        )
    }
}

async fn handle_status(manager: &SessionLifecycleManager, config: &SessionConfig) -> Result<()> {
    let (session, state) = manager.get_or_create(config).await?;
    let output = json!({
        "session": session.id(),
        "network": config.network().as_str(),
        "acl_address": config.acl_address().map(format_address),
        "state": state.label(),
        "error": state.error().map(ToString::to_string),
    });
    print_json(&output)
}

async fn handle_params(manager: &SessionLifecycleManager, config: &SessionConfig) -> Result<()> {
    let session = manager.ready(config).await?;
    let params = session
        .public_params()
        .context("session is ready but holds no public parameters")?;
    print_json(&params)
}

async fn handle_encrypt(
    manager: &SessionLifecycleManager,
    config: &SessionConfig,
    cmd: EncryptCmd,
) -> Result<()> {
    let session = manager.ready(config).await?;
    let value = session.encrypt_uint(cmd.value, cmd.bits).await?;
    print_json(&value)
}

async fn handle_authorize(
    manager: &SessionLifecycleManager,
    config: &SessionConfig,
    cmd: AuthorizeCmd,
) -> Result<()> {
    let session = manager.ready(config).await?;
    let proof = session
        .create_authorization_proof(&cmd.resource, &cmd.principal)
        .await?;
    print_json(&proof)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(())
}
