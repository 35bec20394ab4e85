//! 错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// 便签内容为空，保存时直接拒绝
    #[error("Note cannot be empty")]
    EmptyText,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 数据库中保存的时间无法解析
    #[error("Invalid stored timestamp: {0}")]
    Timestamp(String),

    #[error("Engine is not running")]
    EngineStopped,
}
