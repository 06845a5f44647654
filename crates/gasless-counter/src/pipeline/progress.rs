//! Progress events emitted by the sponsored transaction pipeline.

use alloy_primitives::{TxHash, B256};
use tokio::sync::mpsc;

use crate::user_op::Reconciliation;

/// The sequential stages of a sponsored write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum Stage {
    /// Encode the target call
    #[display("populate")]
    Populate,
    /// Assemble the nonce-stamped, gas-estimated envelope
    #[display("build")]
    Build,
    /// Request paymaster sponsorship
    #[display("sponsor")]
    Sponsor,
    /// Merge the paymaster-signed gas limits
    #[display("reconcile")]
    Reconcile,
    /// Sign, submit and await inclusion
    #[display("submit")]
    Submit,
}

/// A status transition of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Encoding the call
    Populating,
    /// Building the user operation
    BuildingUserOp,
    /// Waiting for the paymaster
    Sponsoring,
    /// Gas limits merged
    Reconciled(Reconciliation),
    /// Signing and sending to the bundler
    Submitting,
    /// The bundler accepted the operation
    AwaitingInclusion {
        /// Hash returned by the bundler
        user_op_hash: B256,
    },
    /// The operation is included
    Included {
        /// Hash returned by the bundler
        user_op_hash: B256,
        /// Hash of the bundle transaction
        tx_hash: TxHash,
    },
    /// The run was aborted
    Failed {
        /// The stage that failed, if any
        stage: Option<Stage>,
        /// Error message
        message: String,
    },
}

impl ProgressEvent {
    /// The stage this event belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Populating => Some(Stage::Populate),
            Self::BuildingUserOp => Some(Stage::Build),
            Self::Sponsoring => Some(Stage::Sponsor),
            Self::Reconciled(_) => Some(Stage::Reconcile),
            Self::Submitting | Self::AwaitingInclusion { .. } | Self::Included { .. } => {
                Some(Stage::Submit)
            }
            Self::Failed { stage, .. } => *stage,
        }
    }

    /// Short status line suitable for a transient notification.
    pub fn message(&self) -> String {
        match self {
            Self::Populating => "Populating Transaction".to_string(),
            Self::BuildingUserOp => "Building UserOp".to_string(),
            Self::Sponsoring => "Requesting sponsorship".to_string(),
            Self::Reconciled(Reconciliation::Overwritten(_)) => {
                "Applied paymaster gas limits".to_string()
            }
            Self::Reconciled(Reconciliation::KeptEstimates { .. }) => {
                "Kept estimated gas limits".to_string()
            }
            Self::Submitting => "Sending UserOp".to_string(),
            Self::AwaitingInclusion { user_op_hash } => {
                format!("Waiting for inclusion of {user_op_hash}")
            }
            Self::Included { .. } => "Transaction Successful".to_string(),
            Self::Failed { message, .. } => format!("Transaction Unsuccessful: {message}"),
        }
    }
}

/// A progress event keyed by the identifier of the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineUpdate {
    /// Identifier of the in-flight action
    pub action_id: u64,
    /// The transition
    pub event: ProgressEvent,
}

/// Sending half of the progress stream.
pub type ProgressSender = mpsc::UnboundedSender<PipelineUpdate>;

/// Receiving half of the progress stream.
pub type ProgressReceiver = mpsc::UnboundedReceiver<PipelineUpdate>;

/// Creates a progress stream.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}
