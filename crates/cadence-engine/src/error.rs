use cadence_core::CoreError;
use cadence_mode::ModeError;
use cadence_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("mode tree error: {0}")]
    Mode(#[from] ModeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("context used before init()")]
    NotInitialized,
}

pub type EngineResult<T> = Result<T, EngineError>;
