//! Encrypted key files
//!
//! Web3 Secret Storage (version 3): the private key is encrypted with
//! AES-128-CTR under the first half of a password-derived key, and the second
//! half authenticates the ciphertext through a Keccak-256 MAC. New files use
//! scrypt; files derived with PBKDF2-HMAC-SHA256 can still be read.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::VaultError;
use crate::core::Address;
use crate::crypto::{keccak256_concat, KeyPair};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Key file format version
pub const KEYFILE_VERSION: u32 = 3;

const CIPHER: &str = "aes-128-ctr";
const KDF_SCRYPT: &str = "scrypt";
const KDF_PBKDF2: &str = "pbkdf2";
const PBKDF2_PRF: &str = "hmac-sha256";
const DERIVED_KEY_LENGTH: usize = 32;

/// Largest scrypt working set (128 * r * N bytes) accepted from a key file
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
/// Largest scrypt r * p accepted from a key file
const MAX_SCRYPT_PARALLEL_COST: u64 = 64;
/// Largest PBKDF2 iteration count accepted from a key file
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;

/// scrypt cost parameters used when writing key files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScryptConfig {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl ScryptConfig {
    /// N = 2^18, r = 8, p = 1
    pub const STANDARD: Self = Self {
        log_n: 18,
        r: 8,
        p: 1,
    };

    /// N = 2^12, r = 8, p = 6; for low-memory machines and tests
    pub const LIGHT: Self = Self {
        log_n: 12,
        r: 8,
        p: 6,
    };
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CipherParams {
    iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScryptParams {
    dklen: usize,
    n: u64,
    p: u32,
    r: u32,
    salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pbkdf2Params {
    c: u32,
    dklen: usize,
    prf: String,
    salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CryptoSection {
    cipher: String,
    ciphertext: String,
    cipherparams: CipherParams,
    kdf: String,
    kdfparams: serde_json::Value,
    mac: String,
}

/// A version 3 key file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(alias = "Crypto")]
    crypto: CryptoSection,
    id: Uuid,
    version: u32,
}

impl KeyFile {
    /// Encrypt `key` under `passphrase` with fresh salt and IV
    pub fn encrypt(
        key: &KeyPair,
        passphrase: &str,
        config: &ScryptConfig,
    ) -> Result<Self, VaultError> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; 32];
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let derived = derive_scrypt(passphrase, &salt, config.log_n, config.r, config.p)?;

        let mut ciphertext = key.private_key_bytes().to_vec();
        apply_aes_ctr(&derived[..16], &iv, &mut ciphertext)?;
        let mac = keccak256_concat(&[&derived[16..32], &ciphertext]);

        let kdfparams = serde_json::to_value(ScryptParams {
            dklen: DERIVED_KEY_LENGTH,
            n: 1u64 << config.log_n,
            p: config.p,
            r: config.r,
            salt: hex::encode(salt),
        })?;

        Ok(Self {
            address: Some(key.address().to_plain_hex()),
            crypto: CryptoSection {
                cipher: CIPHER.to_string(),
                ciphertext: hex::encode(&ciphertext),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                kdf: KDF_SCRYPT.to_string(),
                kdfparams,
                mac: hex::encode(mac),
            },
            id: Uuid::new_v4(),
            version: KEYFILE_VERSION,
        })
    }

    /// Parse key file JSON
    pub fn from_json(bytes: &[u8]) -> Result<Self, VaultError> {
        let keyfile: Self = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::InvalidKeyFile(e.to_string()))?;
        if keyfile.version != KEYFILE_VERSION {
            return Err(VaultError::InvalidKeyFile(format!(
                "unsupported version {}",
                keyfile.version
            )));
        }
        Ok(keyfile)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<Vec<u8>, VaultError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// The address recorded in the file, if any
    pub fn address(&self) -> Result<Option<Address>, VaultError> {
        self.address
            .as_deref()
            .map(|a| a.parse().map_err(|_| VaultError::InvalidKeyFile(format!("bad address {}", a))))
            .transpose()
    }

    /// Unique id of this encryption of the key
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Decrypt the private key, verifying the MAC first
    pub fn decrypt(&self, passphrase: &str) -> Result<KeyPair, VaultError> {
        let crypto = &self.crypto;
        if crypto.cipher != CIPHER {
            return Err(VaultError::InvalidKeyFile(format!(
                "unsupported cipher {}",
                crypto.cipher
            )));
        }

        let ciphertext = decode_hex("ciphertext", &crypto.ciphertext)?;
        let iv = decode_hex("iv", &crypto.cipherparams.iv)?;
        let mac = decode_hex("mac", &crypto.mac)?;

        let derived = match crypto.kdf.as_str() {
            KDF_SCRYPT => {
                let params: ScryptParams = kdf_params(&crypto.kdfparams)?;
                check_dklen(params.dklen)?;
                if params.n < 2 || !params.n.is_power_of_two() {
                    return Err(VaultError::InvalidKeyFile("scrypt n must be a power of two".into()));
                }
                check_scrypt_cost(&params)?;
                let salt = decode_hex("salt", &params.salt)?;
                derive_scrypt(passphrase, &salt, params.n.trailing_zeros() as u8, params.r, params.p)?
            }
            KDF_PBKDF2 => {
                let params: Pbkdf2Params = kdf_params(&crypto.kdfparams)?;
                check_dklen(params.dklen)?;
                if params.prf != PBKDF2_PRF {
                    return Err(VaultError::InvalidKeyFile(format!("unsupported prf {}", params.prf)));
                }
                if params.c == 0 || params.c > MAX_PBKDF2_ROUNDS {
                    return Err(VaultError::InvalidKeyFile(format!(
                        "pbkdf2 iteration count {} out of range",
                        params.c
                    )));
                }
                let salt = decode_hex("salt", &params.salt)?;
                let mut derived = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
                pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, params.c, &mut derived[..]);
                derived
            }
            other => {
                return Err(VaultError::InvalidKeyFile(format!("unsupported kdf {}", other)));
            }
        };

        let expected = keccak256_concat(&[&derived[16..32], &ciphertext]);
        if !bool::from(expected[..].ct_eq(&mac[..])) {
            return Err(VaultError::Authentication);
        }

        let mut plaintext = Zeroizing::new(ciphertext);
        apply_aes_ctr(&derived[..16], &iv, &mut plaintext)?;

        let key = KeyPair::from_private_key_bytes(&plaintext)
            .map_err(|e| VaultError::InvalidKeyFile(e.to_string()))?;

        if let Some(recorded) = self.address()? {
            if recorded != key.address() {
                return Err(VaultError::InvalidKeyFile(format!(
                    "key belongs to {}, file says {}",
                    key.address(),
                    recorded
                )));
            }
        }

        Ok(key)
    }
}

fn derive_scrypt(
    passphrase: &str,
    salt: &[u8],
    log_n: u8,
    r: u32,
    p: u32,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LENGTH]>, VaultError> {
    let params = scrypt::Params::new(log_n, r, p, DERIVED_KEY_LENGTH)
        .map_err(|e| VaultError::InvalidKeyFile(format!("scrypt params: {}", e)))?;
    let mut derived = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut derived[..])
        .map_err(|e| VaultError::InvalidKeyFile(format!("scrypt: {}", e)))?;
    Ok(derived)
}

/// Reject costs that would exhaust memory or CPU before deriving anything
fn check_scrypt_cost(params: &ScryptParams) -> Result<(), VaultError> {
    let r = u64::from(params.r);
    let p = u64::from(params.p);
    if r == 0 || p == 0 {
        return Err(VaultError::InvalidKeyFile("scrypt r and p must be non-zero".into()));
    }

    let memory = params
        .n
        .checked_mul(r)
        .and_then(|v| v.checked_mul(128))
        .filter(|&bytes| bytes <= MAX_SCRYPT_MEMORY);
    if memory.is_none() {
        return Err(VaultError::InvalidKeyFile(format!(
            "scrypt memory cost too high (n = {}, r = {})",
            params.n, params.r
        )));
    }
    if r * p > MAX_SCRYPT_PARALLEL_COST {
        return Err(VaultError::InvalidKeyFile(format!(
            "scrypt parallel cost too high (r = {}, p = {})",
            params.r, params.p
        )));
    }
    Ok(())
}

fn apply_aes_ctr(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), VaultError> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|_| VaultError::InvalidKeyFile("bad cipher key or iv length".into()))?;
    cipher.apply_keystream(buf);
    Ok(())
}

fn kdf_params<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, VaultError> {
    serde_json::from_value(value.clone())
        .map_err(|e| VaultError::InvalidKeyFile(format!("kdfparams: {}", e)))
}

fn check_dklen(dklen: usize) -> Result<(), VaultError> {
    if dklen != DERIVED_KEY_LENGTH {
        return Err(VaultError::InvalidKeyFile(format!("unsupported dklen {}", dklen)));
    }
    Ok(())
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, VaultError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| VaultError::InvalidKeyFile(format!("{} is not hex", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors from the Web3 Secret Storage definition, password "testpassword"
    const PBKDF2_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": { "iv": "6087dab2f9fdbbfaddc31a909735c1e6" },
            "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": 262144,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    const SCRYPT_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": { "iv": "83dbcc02d8ccb40e466191a123791e0e" },
            "ciphertext": "d172bf743a674da9cdad04534d56926ef8358534d458fffccd4e6ad2fbde479c",
            "kdf": "scrypt",
            "kdfparams": {
                "dklen": 32,
                "n": 262144,
                "p": 8,
                "r": 1,
                "salt": "ab0c7876052600dd703518d6fc3fe8984592145b591fc8fb5c6d43190334ba19"
            },
            "mac": "2103ac29920d71da29f15d75b4a16dbe95cfd7ff8faea1056c33131d846e3097"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    const VECTOR_SECRET: &str = "7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

    #[test]
    fn test_decrypt_pbkdf2_vector() {
        let keyfile = KeyFile::from_json(PBKDF2_VECTOR.as_bytes()).unwrap();
        let key = keyfile.decrypt("testpassword").unwrap();
        assert_eq!(hex::encode(&key.private_key_bytes()[..]), VECTOR_SECRET);
    }

    #[test]
    fn test_decrypt_scrypt_vector() {
        let keyfile = KeyFile::from_json(SCRYPT_VECTOR.as_bytes()).unwrap();
        let key = keyfile.decrypt("testpassword").unwrap();
        assert_eq!(hex::encode(&key.private_key_bytes()[..]), VECTOR_SECRET);
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let key = KeyPair::generate();
        let keyfile = KeyFile::encrypt(&key, "Abcdef1!", &ScryptConfig::LIGHT).unwrap();
        assert_eq!(keyfile.address().unwrap(), Some(key.address()));

        let json = keyfile.to_json().unwrap();
        let parsed = KeyFile::from_json(&json).unwrap();
        let unlocked = parsed.decrypt("Abcdef1!").unwrap();
        assert_eq!(unlocked.address(), key.address());
    }

    #[test]
    fn test_wrong_passphrase_fails_authentication() {
        let key = KeyPair::generate();
        let keyfile = KeyFile::encrypt(&key, "Abcdef1!", &ScryptConfig::LIGHT).unwrap();
        assert!(matches!(
            keyfile.decrypt("Abcdef1?"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let key = KeyPair::generate();
        let mut keyfile = KeyFile::encrypt(&key, "Abcdef1!", &ScryptConfig::LIGHT).unwrap();
        let mut bytes = hex::decode(&keyfile.crypto.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        keyfile.crypto.ciphertext = hex::encode(bytes);
        assert!(matches!(
            keyfile.decrypt("Abcdef1!"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn test_altered_mac_fails_authentication() {
        let key = KeyPair::generate();
        let keyfile = KeyFile::encrypt(&key, "Abcdef1!", &ScryptConfig::LIGHT).unwrap();

        let mut flipped = keyfile.clone();
        let mut mac = hex::decode(&flipped.crypto.mac).unwrap();
        mac[31] ^= 0x01;
        flipped.crypto.mac = hex::encode(&mac);
        assert!(matches!(
            flipped.decrypt("Abcdef1!"),
            Err(VaultError::Authentication)
        ));

        let mut truncated = keyfile;
        truncated.crypto.mac = hex::encode(&mac[..16]);
        assert!(matches!(
            truncated.decrypt("Abcdef1!"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn test_malformed_input_is_invalid_key_file() {
        for input in [
            &b"not json"[..],
            br#"{"version": 3}"#,
            br#"{"crypto": {}, "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6", "version": 3}"#,
        ] {
            assert!(matches!(
                KeyFile::from_json(input),
                Err(VaultError::InvalidKeyFile(_))
            ));
        }

        let v2 = PBKDF2_VECTOR.replace("\"version\": 3", "\"version\": 2");
        assert!(matches!(
            KeyFile::from_json(v2.as_bytes()),
            Err(VaultError::InvalidKeyFile(_))
        ));
    }

    #[test]
    fn test_unsupported_kdf_is_invalid_key_file() {
        let json = PBKDF2_VECTOR.replace("\"kdf\": \"pbkdf2\"", "\"kdf\": \"argon2\"");
        let keyfile = KeyFile::from_json(json.as_bytes()).unwrap();
        assert!(matches!(
            keyfile.decrypt("testpassword"),
            Err(VaultError::InvalidKeyFile(_))
        ));
    }

    #[test]
    fn test_excessive_kdf_cost_is_invalid_key_file() {
        let key = KeyPair::generate();
        let keyfile = KeyFile::encrypt(&key, "Abcdef1!", &ScryptConfig::LIGHT).unwrap();

        for (field, value) in [
            ("n", serde_json::json!(1u64 << 44)),
            ("r", serde_json::json!(1_000_000)),
            ("p", serde_json::json!(1_000)),
            ("r", serde_json::json!(0)),
        ] {
            let mut tweaked = keyfile.clone();
            tweaked.crypto.kdfparams[field] = value;
            assert!(matches!(
                tweaked.decrypt("Abcdef1!"),
                Err(VaultError::InvalidKeyFile(_))
            ));
        }

        let pbkdf2 = PBKDF2_VECTOR.replace("\"c\": 262144", "\"c\": 4000000000");
        let keyfile = KeyFile::from_json(pbkdf2.as_bytes()).unwrap();
        assert!(matches!(
            keyfile.decrypt("testpassword"),
            Err(VaultError::InvalidKeyFile(_))
        ));
    }
}
