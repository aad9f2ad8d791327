// Credential store - keeps the repository connection string encrypted with age

use age::secrecy::SecretString;
use anyhow::{bail, Context, Result};
use modelrepo_core::ConnectionString;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

/// Plaintext layout of the credential file before encryption.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    version: u32,
    connection_string: String,
}

/// Default credential file (~/.modelrepo/credentials.age)
pub fn default_path() -> Result<PathBuf> {
    #[cfg(unix)]
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;

    #[cfg(windows)]
    let home = std::env::var("USERPROFILE")
        .map_err(|_| anyhow::anyhow!("USERPROFILE environment variable not set"))?;

    Ok(PathBuf::from(home).join(".modelrepo").join("credentials.age"))
}

/// Encrypts bytes with a passphrase using age encryption.
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = vec![];
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .context("Failed to create age encryptor")?;

    writer
        .write_all(plaintext)
        .context("Failed to write credentials to encryptor")?;

    writer.finish().context("Failed to finalize encryption")?;

    Ok(encrypted)
}

/// Decrypts bytes produced by [`encrypt`].
pub fn decrypt(encrypted: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(encrypted)
        .context("Credential file is not age encrypted")?
    {
        age::Decryptor::Passphrase(d) => d,
        _ => bail!("Credential file is not passphrase encrypted"),
    };

    let mut decrypted = vec![];
    let mut reader = decryptor
        .decrypt(&SecretString::from(passphrase.to_string()), None)
        .context("Failed to decrypt credentials (wrong passphrase?)")?;

    reader
        .read_to_end(&mut decrypted)
        .context("Failed to read decrypted credentials")?;

    Ok(decrypted)
}

/// Writes the connection string to `path`, encrypted.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn save(path: &Path, cs: &ConnectionString, passphrase: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Credentials already stored at {}. Use --force to replace them.",
            path.display()
        );
    }

    let stored = StoredCredential {
        version: FORMAT_VERSION,
        connection_string: cs.to_string(),
    };
    let plaintext = serde_json::to_vec(&stored)?;
    let encrypted = encrypt(&plaintext, passphrase)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, &encrypted)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, &encrypted)?;
    }

    Ok(())
}

/// Reads and decrypts the stored connection string.
pub fn load(path: &Path, passphrase: &str) -> Result<ConnectionString> {
    let encrypted =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let plaintext = decrypt(&encrypted, passphrase)?;

    let stored: StoredCredential =
        serde_json::from_slice(&plaintext).context("Stored credentials are corrupt")?;
    if stored.version != FORMAT_VERSION {
        bail!("Unsupported credential format version {}", stored.version);
    }

    ConnectionString::parse(&stored.connection_string)
        .context("Stored connection string is invalid")
}

/// Deletes the credential file. Returns false when there was nothing to delete.
pub fn remove(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

/// Passphrase from `MODELREPO_PASSPHRASE`, or prompted. With `confirm`, the
/// prompt is repeated and both entries must match.
pub fn passphrase(confirm: bool) -> Result<String> {
    if let Ok(passphrase) = std::env::var("MODELREPO_PASSPHRASE") {
        return Ok(passphrase);
    }

    let first = rpassword::prompt_password("Passphrase: ").context("Failed to read passphrase")?;
    if first.is_empty() {
        bail!("Passphrase must not be empty");
    }
    if confirm {
        let second = rpassword::prompt_password("Confirm passphrase: ")
            .context("Failed to read passphrase")?;
        if first != second {
            bail!("Passphrases do not match");
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION_STRING: &str =
        "HostName=repo.example.com;RepositoryId=team;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0";

    fn cs() -> ConnectionString {
        ConnectionString::parse(CONNECTION_STRING).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let encrypted = encrypt(b"payload", "pass-123").expect("Encryption should succeed");
        assert_ne!(&encrypted[..], b"payload");
        assert_eq!(decrypt(&encrypted, "pass-123").unwrap(), b"payload");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encrypted = encrypt(b"payload", "right").unwrap();
        assert!(decrypt(&encrypted, "wrong").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.age");

        save(&path, &cs(), "pass", false).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("SharedAccessKey"));

        let loaded = load(&path, "pass").unwrap();
        assert_eq!(loaded, cs());
    }

    #[test]
    fn test_save_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.age");

        save(&path, &cs(), "pass", false).unwrap();
        assert!(save(&path, &cs(), "pass", false).is_err());
        save(&path, &cs(), "other", true).unwrap();
        assert!(load(&path, "other").is_ok());
    }

    #[test]
    fn test_remove_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.age");

        assert!(!remove(&path).unwrap());
        save(&path, &cs(), "pass", false).unwrap();
        assert!(remove(&path).unwrap());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.age");
        save(&path, &cs(), "pass", false).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
