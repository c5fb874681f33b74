//! Directory-backed key vault
//!
//! Every account is one key file in the vault directory. Accounts are looked
//! up by the address recorded in the file, never by file order.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use super::keyfile::{KeyFile, ScryptConfig};
use super::passphrase::check_passphrase;
use super::VaultError;
use crate::core::{Address, LegacyTransaction, SignedTransaction};
use crate::crypto::KeyPair;

/// An account held in the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Location of the encrypted key file
    pub path: PathBuf,
}

/// Manages encrypted key files in one directory
#[derive(Debug)]
pub struct KeyVault {
    dir: PathBuf,
    scrypt: ScryptConfig,
}

impl KeyVault {
    /// Open (and create if needed) a vault directory
    pub fn open(dir: &Path, scrypt: ScryptConfig) -> Result<Self, VaultError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            scrypt,
        })
    }

    /// Generate a key, encrypt it under `passphrase` and store it
    pub fn create_account(&self, passphrase: &str) -> Result<Account, VaultError> {
        check_passphrase(passphrase)?;
        let key = KeyPair::generate();
        let account = self.store(&key, passphrase)?;
        log::info!("Created account {}", account.address);
        Ok(account)
    }

    /// Import a key file, re-encrypting it with this vault's parameters
    pub fn import_account(
        &self,
        keyfile_json: &[u8],
        decrypt_passphrase: &str,
        reencrypt_passphrase: &str,
    ) -> Result<Account, VaultError> {
        let keyfile = KeyFile::from_json(keyfile_json)?;
        let key = keyfile.decrypt(decrypt_passphrase)?;
        check_passphrase(reencrypt_passphrase)?;

        let address = key.address();
        if self.find_account(&address).is_ok() {
            return Err(VaultError::AlreadyExists(address));
        }

        let account = self.store(&key, reencrypt_passphrase)?;
        log::info!("Imported account {}", account.address);
        Ok(account)
    }

    /// Re-encrypt an account's key with fresh salt and IV and return the
    /// portable key file JSON
    pub fn export_account(&self, address: &Address, passphrase: &str) -> Result<Vec<u8>, VaultError> {
        let account = self.find_account(address)?;
        let key = self.unlock(&account, passphrase)?;
        let keyfile = KeyFile::encrypt(&key, passphrase, &self.scrypt)?;
        log::debug!("Exported account {} as key file {}", address, keyfile.id());
        keyfile.to_json()
    }

    /// Exact lookup by address
    pub fn find_account(&self, address: &Address) -> Result<Account, VaultError> {
        self.accounts()?
            .into_iter()
            .find(|account| &account.address == address)
            .ok_or(VaultError::NotFound(*address))
    }

    /// All accounts in the vault, sorted by address
    pub fn accounts(&self) -> Result<Vec<Account>, VaultError> {
        let mut accounts = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with('.'))
                .unwrap_or(true);
            if hidden || !path.is_file() {
                continue;
            }

            match read_address(&path) {
                Ok(Some(address)) => accounts.push(Account { address, path }),
                Ok(None) => log::warn!("Key file {:?} has no address, skipping", path),
                Err(e) => log::debug!("Ignoring {:?}: {}", path, e),
            }
        }

        accounts.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(accounts)
    }

    /// Unlock the account and sign `tx` for `chain_id`
    pub fn sign_transaction(
        &self,
        account: &Account,
        passphrase: &str,
        tx: LegacyTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, VaultError> {
        let key = self.unlock(account, passphrase)?;
        let signed = tx.sign(&key, chain_id)?;
        log::debug!(
            "Signed transaction {} from {}",
            hex::encode(signed.hash()),
            account.address
        );
        Ok(signed)
    }

    fn unlock(&self, account: &Account, passphrase: &str) -> Result<KeyPair, VaultError> {
        let json = fs::read(&account.path)?;
        KeyFile::from_json(&json)?.decrypt(passphrase)
    }

    fn store(&self, key: &KeyPair, passphrase: &str) -> Result<Account, VaultError> {
        let keyfile = KeyFile::encrypt(key, passphrase, &self.scrypt)?;
        let address = key.address();
        let path = self.dir.join(keyfile_name(&address));
        write_private(&path, &keyfile.to_json()?)?;
        Ok(Account { address, path })
    }
}

/// `UTC--<timestamp>--<address>`, the naming other Ethereum clients use
fn keyfile_name(address: &Address) -> String {
    format!(
        "UTC--{}--{}",
        Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ"),
        address.to_plain_hex()
    )
}

fn read_address(path: &Path) -> Result<Option<Address>, VaultError> {
    let json = fs::read(path)?;
    KeyFile::from_json(&json)?.address()
}

/// Write through a temporary file so a crash never leaves a truncated key
fn write_private(path: &Path, contents: &[u8]) -> Result<(), VaultError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("keyfile");
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&tmp, contents)?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::U256;

    const PASS: &str = "Abcdef1!";

    fn vault(dir: &tempfile::TempDir) -> KeyVault {
        KeyVault::open(dir.path(), ScryptConfig::LIGHT).unwrap()
    }

    #[test]
    fn test_create_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);

        let account = vault.create_account(PASS).unwrap();
        assert!(account.path.exists());
        assert_eq!(vault.find_account(&account.address).unwrap(), account);
        assert_eq!(vault.accounts().unwrap(), vec![account]);
    }

    #[test]
    fn test_weak_passphrase_rejected_before_anything_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);

        assert!(matches!(
            vault.create_account("abcdefgh"),
            Err(VaultError::WeakPassphrase(_))
        ));
        assert!(vault.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_find_missing_account() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let stranger = KeyPair::generate().address();

        assert!(matches!(
            vault.find_account(&stranger),
            Err(VaultError::NotFound(a)) if a == stranger
        ));
        assert!(matches!(
            vault.export_account(&stranger, PASS),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_export_wrong_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let account = vault.create_account(PASS).unwrap();

        assert!(matches!(
            vault.export_account(&account.address, "Wrong1!x"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn test_export_import_round_trip() {
        let source_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let source = vault(&source_dir);
        let target = vault(&target_dir);

        let account = source.create_account(PASS).unwrap();
        let exported = source.export_account(&account.address, PASS).unwrap();
        let imported = target.import_account(&exported, PASS, PASS).unwrap();

        assert_eq!(imported.address, account.address);
        assert_eq!(target.find_account(&account.address).unwrap(), imported);
    }

    #[test]
    fn test_import_reencrypts_under_new_passphrase() {
        let source_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let source = vault(&source_dir);
        let target = vault(&target_dir);

        let account = source.create_account(PASS).unwrap();
        let exported = source.export_account(&account.address, PASS).unwrap();
        let imported = target.import_account(&exported, PASS, "Zyxwvu9#").unwrap();

        let tx = LegacyTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(account.address),
            value: U256::zero(),
            data: Vec::new(),
        };
        assert!(matches!(
            target.sign_transaction(&imported, PASS, tx.clone(), 1),
            Err(VaultError::Authentication)
        ));
        assert!(target.sign_transaction(&imported, "Zyxwvu9#", tx, 1).is_ok());
    }

    #[test]
    fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);

        assert!(matches!(
            vault.import_account(b"{ nope", PASS, PASS),
            Err(VaultError::InvalidKeyFile(_))
        ));

        let account = vault.create_account(PASS).unwrap();
        let exported = vault.export_account(&account.address, PASS).unwrap();
        assert!(matches!(
            vault.import_account(&exported, "Wrong1!x", PASS),
            Err(VaultError::Authentication)
        ));
        assert!(matches!(
            vault.import_account(&exported, PASS, PASS),
            Err(VaultError::AlreadyExists(a)) if a == account.address
        ));
    }

    #[test]
    fn test_sign_transaction_recovers_to_account() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let account = vault.create_account(PASS).unwrap();

        let tx = LegacyTransaction {
            nonce: 3,
            gas_price: U256::from(7u64),
            gas_limit: 21_000,
            to: Some(KeyPair::generate().address()),
            value: U256::from(1_000u64),
            data: Vec::new(),
        };
        let signed = vault.sign_transaction(&account, PASS, tx, 5).unwrap();
        assert_eq!(signed.chain_id(), Some(5));
        assert_eq!(signed.recover_sender().unwrap(), account.address);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        fs::write(dir.path().join("README"), "not a key").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let account = vault.create_account(PASS).unwrap();
        assert_eq!(vault.accounts().unwrap(), vec![account]);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let account = vault(&dir).create_account(PASS).unwrap();
        let mode = fs::metadata(&account.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
