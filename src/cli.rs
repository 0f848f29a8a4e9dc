use clap::{Parser, Subcommand};

/// ledgerlink: link bank accounts to your ledger and keep transactions in sync
#[derive(Parser)]
#[command(name = "ledgerlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to LEDGERLINK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect and edit account links
    Links {
        #[command(subcommand)]
        command: LinkCommands,
    },

    /// Run a transaction sync once and exit
    Sync {
        /// Only sync this aggregator account
        #[arg(long)]
        account_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// List all links
    List,
    /// Link a ledger asset to an aggregator account
    Add {
        #[arg(long)]
        ledger_id: i64,
        #[arg(long)]
        account_id: String,
    },
    /// Remove the link of a ledger asset
    Remove {
        #[arg(long)]
        ledger_id: i64,
        /// Only remove the link if it points at this aggregator account
        #[arg(long)]
        account_id: Option<String>,
    },
}
