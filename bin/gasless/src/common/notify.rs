//! Transient status notifications rendered from the pipeline progress stream.

use gasless_counter::{
    chain::ChainConfig,
    pipeline::{PipelineUpdate, ProgressEvent, ProgressReceiver},
};
use tokio::task::JoinHandle;

/// Formats one update. Successful runs end with the explorer link of the bundle transaction.
pub fn render(update: &PipelineUpdate, chain: &ChainConfig) -> String {
    let status = match &update.event {
        ProgressEvent::Included { tx_hash, .. } => {
            format!("{} {}", update.event.message(), chain.explorer_tx_url(*tx_hash))
        }
        event => event.message(),
    };
    let marker = match &update.event {
        ProgressEvent::Included { .. } => "ok",
        ProgressEvent::Failed { .. } => "error",
        _ => "..",
    };
    format!("[#{} {marker}] {status}", update.action_id)
}

/// Prints every update to stderr until all senders are dropped.
pub fn spawn_notifier(mut progress: ProgressReceiver, chain: ChainConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = progress.recv().await {
            eprintln!("{}", render(&update, &chain));
        }
    })
}
