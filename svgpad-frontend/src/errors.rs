use svgpad_engine::errors::EngineError;
use svgpad_io::{IdentityError, IoError, ReadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("没有打开的文档")]
    NoDocument,
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("脚本命令无效: {0}")]
    Script(String),
}
