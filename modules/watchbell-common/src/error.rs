use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchbellError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Tick lock conflict: another reconciliation tick is in progress")]
    TickInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
