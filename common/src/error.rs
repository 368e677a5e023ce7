//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// 行IDが `t1-<行>` / `t2-<グループ>-<行>` の形式に従っていない
    #[error("Invalid row id: {0}")]
    InvalidRowId(String),

    /// 形式は正しいが静的ラベル表に存在しない行
    #[error("Unknown row: {table}/{row_id}")]
    UnknownRow { table: &'static str, row_id: String },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
