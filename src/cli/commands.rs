//! CLI commands for the wallet
//!
//! Vault-only verbs take a [`KeyVault`]; verbs that need chain state take an
//! open [`WalletSession`].

use std::fs;
use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::core::{format_ether, parse_ether, Address};
use crate::keystore::KeyVault;
use crate::node::NodeClient;
use crate::wallet::WalletSession;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Use the passphrase given on the command line, or ask for it on the
/// terminal without echo. With `confirm`, the prompt is repeated and both
/// entries must match.
pub fn passphrase_or_prompt(
    given: Option<String>,
    prompt: &str,
    confirm: bool,
) -> CliResult<Zeroizing<String>> {
    if let Some(passphrase) = given {
        return Ok(Zeroizing::new(passphrase));
    }

    let passphrase = Zeroizing::new(rpassword::prompt_password(prompt)?);
    if confirm {
        let again = Zeroizing::new(rpassword::prompt_password("Repeat passphrase: ")?);
        if *again != *passphrase {
            return Err("passphrases do not match".into());
        }
    }
    Ok(passphrase)
}

// =============================================================================
// Vault commands
// =============================================================================

/// Create a new account
pub fn cmd_new(vault: &KeyVault, passphrase: &str) -> CliResult<Address> {
    let account = vault.create_account(passphrase)?;

    println!("🔐 New account created!");
    println!("   📍 Address: {}", account.address);
    println!("   📁 Key file: {}", account.path.display());
    println!("\n   ⚠️  IMPORTANT: The key can only be unlocked with this passphrase.");
    println!("   Back up the key file and passphrase to avoid losing access to your funds!");

    Ok(account.address)
}

/// Import an account from a key file
pub fn cmd_import(
    vault: &KeyVault,
    keyfile: &Path,
    passphrase: &str,
    new_passphrase: &str,
) -> CliResult<Address> {
    let json = fs::read(keyfile)
        .map_err(|e| format!("cannot read key file {}: {}", keyfile.display(), e))?;
    let account = vault.import_account(&json, passphrase, new_passphrase)?;

    println!("📥 Account imported!");
    println!("   📍 Address: {}", account.address);
    println!("   📁 Key file: {}", account.path.display());

    Ok(account.address)
}

/// Export an account to a key file
pub fn cmd_export(vault: &KeyVault, account: &str, passphrase: &str, keyfile: &Path) -> CliResult<()> {
    let address: Address = account.parse()?;
    let json = vault.export_account(&address, passphrase)?;
    write_new_private(keyfile, &json)
        .map_err(|e| format!("cannot write {}: {}", keyfile.display(), e))?;

    println!("📤 Account exported!");
    println!("   📍 Address: {}", address);
    println!("   📁 Key file: {}", keyfile.display());

    Ok(())
}

/// List accounts in the vault
pub fn cmd_list(vault: &KeyVault) -> CliResult<()> {
    let accounts = vault.accounts()?;

    if accounts.is_empty() {
        println!("📭 No accounts found. Create one with: ethwallet new");
        return Ok(());
    }

    println!("📋 Accounts:");
    for (index, account) in accounts.iter().enumerate() {
        println!("   #{} {} ({})", index, account.address, account.path.display());
    }

    Ok(())
}

/// Create `path` (failing if it exists) readable by the owner only
fn write_new_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

// =============================================================================
// Node commands
// =============================================================================

/// Show the balance of an address in ether
pub async fn cmd_balance<N: NodeClient>(session: &WalletSession<N>, address: &str) -> CliResult<()> {
    let address: Address = address.parse()?;
    let wei = session.balance_at(&address).await?;

    println!("💰 Balance for {}", address);
    println!("   {} ETH", format_ether(wei));

    Ok(())
}

/// Sign a transfer of `amount` ether and optionally submit it
pub async fn cmd_transfer<N: NodeClient>(
    session: &WalletSession<N>,
    from: &str,
    to: &str,
    amount: &str,
    passphrase: &str,
    broadcast: bool,
) -> CliResult<()> {
    let from: Address = from.parse()?;
    let to: Address = to.parse()?;
    let value = parse_ether(amount)?;

    let signed = session.prepare_transfer(&from, to, value, passphrase).await?;
    let tx = signed.transaction();

    println!("✍️  Transaction signed!");
    println!("   ├─ From: {}", from);
    println!("   ├─ To: {}", to);
    println!("   ├─ Amount: {} ETH", format_ether(tx.value));
    println!("   ├─ Nonce: {}", tx.nonce);
    println!("   ├─ Gas: {} @ {} wei", tx.gas_limit, tx.gas_price);
    println!("   ├─ Chain ID: {}", signed.chain_id().unwrap_or_default());
    println!("   └─ Hash: 0x{}", hex::encode(signed.hash()));
    println!("\n{}", signed.raw_hex());

    if broadcast {
        let hash = session.send_raw_transaction(&signed).await?;
        println!("\n📡 Transaction submitted: 0x{}", hex::encode(hash));
    }

    Ok(())
}

/// Default action: refuse to report while the node is syncing, otherwise
/// show the balance of every vault account
pub async fn cmd_status<N: NodeClient>(session: &WalletSession<N>) -> CliResult<()> {
    session.ensure_synced().await?;
    let chain_id = session.chain_id()?;
    let accounts = session.vault().accounts()?;

    println!("🔗 Connected, chain ID {}", chain_id);
    if accounts.is_empty() {
        println!("📭 No accounts found. Create one with: ethwallet new");
        return Ok(());
    }

    println!("📋 Accounts:");
    for (index, account) in accounts.iter().enumerate() {
        let wei = session.balance_at(&account.address).await?;
        println!("   #{} {} - {} ETH", index, account.address, format_ether(wei));
    }

    Ok(())
}
