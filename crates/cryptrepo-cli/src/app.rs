//! Repository resolution, key derivation and error reporting for commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cryptrepo_core::options::SALT_LENGTH;
use cryptrepo_core::{
    derive_key, EncryptionKey, JournalMode, KeyMode, Repo, RepoError, RepoRegistry, StoreOptions,
};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::cli::{Cli, StoreArgs};
use crate::helpers::{prompt_init_passphrase, prompt_passphrase};

/// Exit code for a missing repository.
pub const EXIT_NOT_FOUND: i32 = 3;
/// Exit code for a wrong passphrase or a crypto state mismatch.
pub const EXIT_BAD_KEY: i32 = 5;

pub fn missing_repo_message(path: &Path) -> String {
    format!(
        "No repository found at {}\n\nRun:\n  cryptrepo init {}\n\nOr specify a repository path:\n  CRYPTREPO_PATH=/path/to/repo.db cryptrepo status",
        path.display(),
        path.display()
    )
}

pub fn exit_not_found_with_hint(message: &str, hint: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", hint);
    std::process::exit(EXIT_NOT_FOUND);
}

/// Resolve the repository path from `--repo` / `CRYPTREPO_PATH`.
pub fn repo_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    cli.repo.as_ref().map(PathBuf::from).ok_or_else(|| {
        anyhow::anyhow!("No repository path provided. Use --repo or set CRYPTREPO_PATH.")
    })
}

/// Location of the salt sidecar for `db`.
pub fn salt_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push(".salt");
    PathBuf::from(name)
}

pub fn read_salt(db: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    let path = salt_path(db);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read salt file {}: {}", path.display(), e))?;
    let salt = hex::decode(text.trim())
        .map_err(|e| anyhow::anyhow!("Invalid salt file {}: {}", path.display(), e))?;
    if salt.len() != SALT_LENGTH {
        return Err(anyhow::anyhow!(
            "Invalid salt file {}: expected {} bytes, got {}",
            path.display(),
            SALT_LENGTH,
            salt.len()
        ));
    }
    Ok(Some(salt))
}

/// Write a fresh random salt next to `db`, refusing to replace one.
pub fn write_new_salt(db: &Path) -> anyhow::Result<Vec<u8>> {
    let path = salt_path(db);
    if path.exists() {
        return Err(anyhow::anyhow!(
            "Salt file already exists: {}",
            path.display()
        ));
    }
    let mut salt = vec![0u8; SALT_LENGTH];
    getrandom::getrandom(&mut salt)
        .map_err(|e| anyhow::anyhow!("Failed to generate salt: {}", e))?;
    std::fs::write(&path, hex::encode(&salt))
        .map_err(|e| anyhow::anyhow!("Failed to write salt file {}: {}", path.display(), e))?;
    Ok(salt)
}

/// Build store options from the global flags and the repository salt.
pub fn store_options(args: &StoreArgs, salt: Option<&[u8]>) -> StoreOptions {
    let mut opts = StoreOptions::new();
    if args.wal {
        opts = opts.journal_mode(JournalMode::Wal);
    }
    if args.segmented_keys {
        opts = opts.key_mode(KeyMode::Segmented);
    }
    if args.plaintext_header {
        if let Some(salt) = salt {
            opts = opts.plaintext_header(salt.to_vec());
        }
    }
    opts
}

/// Key material for a repository: `None` for a plain repository.
pub struct Unlocked {
    pub key: Option<EncryptionKey>,
    pub options: StoreOptions,
}

/// Derive the key for an existing repository. A repository without a salt
/// sidecar is opened without a key.
pub fn unlock(cli: &Cli, path: &Path) -> anyhow::Result<Unlocked> {
    let Some(salt) = read_salt(path)? else {
        debug!(path = %path.display(), "no salt sidecar, opening without a key");
        return Ok(Unlocked {
            key: None,
            options: store_options(&cli.store, None),
        });
    };
    let passphrase = prompt_passphrase()?;
    let key = derive_key(passphrase.expose_secret(), &salt)?;
    Ok(Unlocked {
        key: Some(key),
        options: store_options(&cli.store, Some(&salt)),
    })
}

/// Create the salt sidecar and derive the key for a new repository.
pub fn unlock_new(cli: &Cli, path: &Path, encrypted: bool) -> anyhow::Result<Unlocked> {
    if !encrypted {
        if cli.store.plaintext_header {
            return Err(anyhow::anyhow!(
                "--plaintext-header cannot be used with --no-encryption"
            ));
        }
        return Ok(Unlocked {
            key: None,
            options: store_options(&cli.store, None),
        });
    }
    let passphrase = prompt_init_passphrase()?;
    let salt = match read_salt(path)? {
        Some(salt) => salt,
        None => write_new_salt(path)?,
    };
    let key = derive_key(passphrase.expose_secret(), &salt)?;
    Ok(Unlocked {
        key: Some(key),
        options: store_options(&cli.store, Some(&salt)),
    })
}

/// Open the repository named on the command line.
pub fn open_repo(cli: &Cli) -> anyhow::Result<Arc<Repo>> {
    let path = repo_path(cli)?;
    if !path.exists() {
        return Err(RepoError::DatabaseNotFound(path).into());
    }
    let unlocked = unlock(cli, &path)?;
    let repo = RepoRegistry::global().open(&path, unlocked.key.as_ref(), &unlocked.options)?;
    Ok(repo)
}

/// Print `err` with a hint where one helps and return the process exit code.
pub fn report_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RepoError>() {
        Some(RepoError::DatabaseNotFound(path)) => {
            eprintln!("Error: {}", missing_repo_message(path));
            EXIT_NOT_FOUND
        }
        Some(RepoError::IncorrectKey) => {
            eprintln!("Error: Incorrect passphrase.");
            EXIT_BAD_KEY
        }
        Some(RepoError::CryptoStateMismatch(message)) => {
            eprintln!("Error: {}", message);
            eprintln!(
                "Hint: the repository was created with different encryption settings. \
                 Check that its .salt file sits next to it."
            );
            EXIT_BAD_KEY
        }
        _ => {
            eprintln!("Error: {:#}", err);
            1
        }
    }
}
