use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use wm_chain_evm::EvmAdapter;
use wm_session::{
    AdapterRegistry, AutoReconnect, ChainAdapter, ChainFamily, ChainId, IntentStore,
    ReconnectOutcome, Session, SessionConfig, TransactionRequest,
};
use wm_storage::RocksDbStore;

const STATE_DIR_ENV: &str = "WALLETMESH_STATE_DIR";

#[derive(Parser, Debug)]
#[command(
    name = "walletmesh",
    version = env!("CARGO_PKG_VERSION"),
    about = "Drive a wallet session from the terminal"
)]
struct Cli {
    /// Directory holding the persisted session hint
    #[arg(long, global = true, env = STATE_DIR_ENV, default_value = ".walletmesh")]
    state_dir: PathBuf,

    /// EVM wallet JSON-RPC endpoint; falls back to WALLETMESH_EVM_RPC_URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Skip resuming the previous session before running the command
    #[arg(long, global = true)]
    no_auto_connect: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the session snapshot as JSON
    Status,

    /// Connect a wallet of the given chain family
    Connect { family: ChainFamily },

    /// Disconnect and forget the stored session
    Disconnect,

    /// Ask the wallet to switch networks
    Switch { chain_id: ChainId },

    /// Sign a UTF-8 message with the connected account
    Sign { message: String },

    /// Submit a transaction through the connected wallet
    Send {
        #[arg(long)]
        to: String,

        /// Amount in wei, decimal
        #[arg(long)]
        value: Option<String>,

        /// Calldata, 0x-prefixed hex
        #[arg(long)]
        data: Option<String>,
    },

    /// Query the balance of the connected account
    Balance {
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = open_session(&cli)?;

    match AutoReconnect::spawn(Arc::clone(&session)).await {
        Ok(ReconnectOutcome::Restored(account)) => info!("resumed session for {}", account.address),
        Ok(ReconnectOutcome::Failed(err)) => warn!("could not resume previous session: {}", err),
        Ok(outcome) => info!("no session resumed: {:?}", outcome),
        Err(err) => warn!("auto-reconnect task failed: {}", err),
    }

    run(&session, cli.command).await
}

fn open_session(cli: &Cli) -> Result<Arc<Session>> {
    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("failed to create state dir {}", cli.state_dir.display()))?;
    let store = RocksDbStore::open_default(&cli.state_dir)?;

    let evm = EvmAdapter::new(cli.rpc_url.clone());
    info!("evm wallet endpoint {}", evm.endpoint());
    let registry = AdapterRegistry::builder()
        .register(Arc::new(evm) as Arc<dyn ChainAdapter>)
        .build();

    let config = SessionConfig::from_env()
        .auto_connect(!cli.no_auto_connect)
        .on_connect(|address, family| info!("connected {} wallet {}", family, address))
        .on_disconnect(|| info!("wallet disconnected"))
        .on_error(|message| warn!("wallet error: {}", message));

    Ok(Arc::new(Session::new(
        config,
        registry,
        Arc::new(store) as Arc<dyn IntentStore>,
    )))
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Status => {}
        Command::Connect { family } => {
            let account = session.connect(family).await?;
            println!("{} on chain {}", account.address, account.chain_id);
            return Ok(());
        }
        Command::Disconnect => {
            session.disconnect().await;
            session.forget_intent();
        }
        Command::Switch { chain_id } => session.switch_chain(chain_id).await?,
        Command::Sign { message } => {
            let signature = session.sign_message(&message).await?;
            println!("{}", signature.0);
            return Ok(());
        }
        Command::Send { to, value, data } => {
            let request = TransactionRequest {
                to: Some(to),
                value,
                data,
                ..TransactionRequest::default()
            };
            let handle = session.send_transaction(&request).await?;
            println!("{}", handle.0);
            return Ok(());
        }
        Command::Balance { token } => {
            let balance = session
                .refresh_balance(token.as_deref())
                .await
                .context("balance unavailable")?;
            println!("{balance}");
            return Ok(());
        }
    }

    let snapshot = serde_json::to_string_pretty(&session.snapshot())?;
    println!("{snapshot}");
    Ok(())
}
