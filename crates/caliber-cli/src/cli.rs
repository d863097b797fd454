use std::path::PathBuf;

use caliber_core::sync::ConflictChoice;
use caliber_core::{OperationKind, OperationStatus};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "caliber")]
#[command(about = "Inspect and replay the Caliber Vault offline queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local queue database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show record counts per status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued operations, oldest first
    List {
        /// Only show records with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Buffer a mutation for later replay
    Enqueue {
        /// Mutation kind
        #[arg(value_enum)]
        kind: KindArg,
        /// Target table
        table: String,
        /// Row payload as a JSON object
        data: String,
        /// User the mutation belongs to
        #[arg(long, value_name = "ID")]
        owner: Option<String>,
    },
    /// Return failed or conflicted operations to the queue
    Retry {
        /// Operation ID or unique ID prefix
        id: Option<String>,
        /// Requeue every failed operation
        #[arg(long, conflicts_with = "id")]
        all_failed: bool,
    },
    /// Remove an operation without replaying it
    Discard {
        /// Operation ID or unique ID prefix
        id: String,
    },
    /// Drop completed operations
    Purge,
    /// Replay pending operations against Supabase
    Sync {
        /// User to replay on behalf of
        #[arg(long, value_name = "ID")]
        owner: String,
        /// Optional JSON sync configuration file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Settle an operation waiting on a manual conflict decision
    Resolve {
        /// Operation ID or unique ID prefix
        id: String,
        /// Which version to keep
        #[arg(value_enum)]
        choice: ChoiceArg,
        /// User the operation belongs to
        #[arg(long, value_name = "ID")]
        owner: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Completed,
    Failed,
    Conflict,
}

impl From<StatusArg> for OperationStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::Completed => Self::Completed,
            StatusArg::Failed => Self::Failed,
            StatusArg::Conflict => Self::Conflict,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Create,
    Update,
    Delete,
}

impl From<KindArg> for OperationKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Create => Self::Create,
            KindArg::Update => Self::Update,
            KindArg::Delete => Self::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChoiceArg {
    KeepLocal,
    KeepServer,
    Merge,
}

impl From<ChoiceArg> for ConflictChoice {
    fn from(value: ChoiceArg) -> Self {
        match value {
            ChoiceArg::KeepLocal => Self::KeepLocal,
            ChoiceArg::KeepServer => Self::KeepServer,
            ChoiceArg::Merge => Self::Merge,
        }
    }
}
