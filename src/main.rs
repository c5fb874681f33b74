//! ethwallet CLI Application
//!
//! A command-line Ethereum wallet: local encrypted keys, balances and
//! signed transfers against a JSON-RPC node.

use clap::{Parser, Subcommand};
use ethwallet::cli::{self, CliResult};
use ethwallet::keystore::{KeyVault, ScryptConfig};
use ethwallet::node::{NodeClient, DEFAULT_NODE_ADDR};
use ethwallet::wallet::{WalletConfig, WalletSession};
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "ethwallet")]
#[command(version)]
#[command(about = "A command-line Ethereum wallet", long_about = None)]
struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long, global = true, default_value = DEFAULT_NODE_ADDR)]
    nodeaddr: String,

    /// Directory holding encrypted key files
    #[arg(long, global = true, default_value = ".ethwallet/keystore")]
    keystore: PathBuf,

    /// Deadline in seconds for all node calls
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Use cheaper scrypt parameters when writing key files
    #[arg(long, global = true)]
    light_kdf: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    #[command(alias = "a")]
    New {
        /// Passphrase for the new key (prompted if omitted)
        #[arg(long)]
        passwd: Option<String>,
    },

    /// Import an account from a key file
    #[command(alias = "i")]
    Import {
        /// Key file to import
        #[arg(long)]
        keyfile: PathBuf,

        /// Passphrase the key file is encrypted with
        #[arg(long)]
        passwd: Option<String>,

        /// Passphrase to store the key under (defaults to --passwd)
        #[arg(long)]
        new_passwd: Option<String>,
    },

    /// Export an account to a key file
    #[command(alias = "e")]
    Export {
        /// Address of the account
        #[arg(long)]
        account: String,

        /// Passphrase of the account
        #[arg(long)]
        passwd: Option<String>,

        /// Output path
        #[arg(long)]
        keyfile: PathBuf,
    },

    /// Show the balance of an address
    #[command(alias = "b")]
    Balance {
        #[arg(long)]
        address: String,
    },

    /// Sign a transfer and optionally submit it
    #[command(alias = "t")]
    Transfer {
        /// Sender, an account in the vault
        #[arg(long)]
        from: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Amount in ether, e.g. 0.5
        #[arg(long)]
        amount: String,

        /// Passphrase of the sender (prompted if omitted)
        #[arg(long)]
        passwd: Option<String>,

        /// Submit the signed transaction to the node
        #[arg(long)]
        broadcast: bool,
    },

    /// List accounts in the vault
    #[command(alias = "l")]
    List,
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = WalletConfig {
        node_addr: cli.nodeaddr,
        keystore_dir: cli.keystore,
        timeout: Duration::from_secs(cli.timeout),
        scrypt: if cli.light_kdf {
            ScryptConfig::LIGHT
        } else {
            ScryptConfig::STANDARD
        },
        ..Default::default()
    };

    match cli.command {
        Some(Commands::New { passwd }) => {
            let vault = KeyVault::open(&config.keystore_dir, config.scrypt)?;
            let passwd = cli::passphrase_or_prompt(passwd, "Passphrase: ", true)?;
            cli::cmd_new(&vault, &passwd)?;
            Ok(())
        }

        Some(Commands::Import {
            keyfile,
            passwd,
            new_passwd,
        }) => {
            let vault = KeyVault::open(&config.keystore_dir, config.scrypt)?;
            let passwd = cli::passphrase_or_prompt(passwd, "Key file passphrase: ", false)?;
            let new_passwd = match new_passwd {
                Some(p) => Zeroizing::new(p),
                None => passwd.clone(),
            };
            cli::cmd_import(&vault, &keyfile, &passwd, &new_passwd)?;
            Ok(())
        }

        Some(Commands::Export {
            account,
            passwd,
            keyfile,
        }) => {
            let vault = KeyVault::open(&config.keystore_dir, config.scrypt)?;
            let passwd = cli::passphrase_or_prompt(passwd, "Passphrase: ", false)?;
            cli::cmd_export(&vault, &account, &passwd, &keyfile)
        }

        Some(Commands::List) => {
            let vault = KeyVault::open(&config.keystore_dir, config.scrypt)?;
            cli::cmd_list(&vault)
        }

        Some(Commands::Balance { address }) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(balance(&config, &address))
        }

        Some(Commands::Transfer {
            from,
            to,
            amount,
            passwd,
            broadcast,
        }) => {
            // Ask before connecting so typing doesn't eat into the deadline
            let passwd = cli::passphrase_or_prompt(passwd, "Passphrase: ", false)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(transfer(&config, &from, &to, &amount, &passwd, broadcast))
        }

        None => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(status(&config))
        }
    }
}

async fn balance(config: &WalletConfig, address: &str) -> CliResult<()> {
    let session = WalletSession::open(config).await?;
    let result = cli::cmd_balance(&session, address).await;
    shutdown(session).await;
    result
}

async fn transfer(
    config: &WalletConfig,
    from: &str,
    to: &str,
    amount: &str,
    passwd: &str,
    broadcast: bool,
) -> CliResult<()> {
    let session = WalletSession::open(config).await?;
    let result = cli::cmd_transfer(&session, from, to, amount, passwd, broadcast).await;
    shutdown(session).await;
    result
}

async fn status(config: &WalletConfig) -> CliResult<()> {
    let session = WalletSession::open(config).await?;
    let result = cli::cmd_status(&session).await;
    shutdown(session).await;
    result
}

/// Close the session and wait until it has released the node
async fn shutdown<N: NodeClient>(session: WalletSession<N>) {
    session.close();
    session.await_exit().await;
}
