use thiserror::Error;

use crate::gpu::DeviceStage;

#[derive(Error, Debug)]
pub enum RsaClError {
    #[error("decimal value has {len} digits, capacity is {max}")]
    CapacityExceeded { len: usize, max: usize },

    #[error("compute backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("context setup failed: {0}")]
    ContextSetupFailed(String),

    #[error("kernel program compilation failed: {0}")]
    ProgramCompileFailed(String),

    #[error("device {stage} failed: {detail}")]
    DeviceOperationFailed { stage: DeviceStage, detail: String },

    #[error("malformed input: {0}")]
    InputMalformed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RsaClError>;
