use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use cryptrepo_core::VERSION;

/// cryptrepo - An encrypted key-value repository
#[derive(Parser)]
#[command(name = "cryptrepo")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the repository database
    #[arg(short, long, global = true, env = "CRYPTREPO_PATH")]
    pub repo: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Backing store settings. They must match between `init` and later opens.
#[derive(Args, Clone, Default)]
pub struct StoreArgs {
    /// Use the write-ahead log journal
    #[arg(long, global = true, env = "CRYPTREPO_WAL")]
    pub wal: bool,

    /// Keep the SQLite header readable
    #[arg(long, global = true, env = "CRYPTREPO_PLAINTEXT_HEADER")]
    pub plaintext_header: bool,

    /// Encrypt keys segment by segment so prefix queries keep working
    #[arg(long, global = true, env = "CRYPTREPO_SEGMENTED_KEYS")]
    pub segmented_keys: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the repository will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Create a plain, unencrypted repository
    #[arg(long)]
    pub no_encryption: bool,

    /// Peer ID to record in the config (random if omitted)
    #[arg(long)]
    pub peer_id: Option<String>,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Only list keys below this prefix
    #[arg(value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Limit number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip this many results
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new repository
    Init(InitArgs),

    /// Show repository status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a value
    Put {
        /// Key to write
        #[arg(value_name = "KEY")]
        key: String,

        /// Value (read from stdin when omitted)
        #[arg(value_name = "VALUE")]
        value: Option<String>,
    },

    /// Print a value
    Get {
        /// Key to read
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Delete a value
    Rm {
        /// Key to delete
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// List stored keys
    List(ListArgs),

    /// Read or modify the repository config
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage the keystore
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Delete the repository files
    Remove {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the whole config
    Show {
        /// Include the identity private key
        #[arg(long)]
        show_secrets: bool,
    },

    /// Print one config field
    Get {
        /// Dotted selector, e.g. Datastore.StorageMax
        #[arg(value_name = "SELECTOR")]
        selector: String,
    },

    /// Set one config field
    Set {
        /// Dotted selector, e.g. Datastore.StorageMax
        #[arg(value_name = "SELECTOR")]
        selector: String,

        /// New value
        #[arg(value_name = "VALUE")]
        value: String,

        /// Parse the value as JSON instead of a string
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// List key names
    List,
}
