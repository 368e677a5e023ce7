use inspection_common::{RowId, TableKey, VisitKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] inspection_common::Error),

    #[error("回次 {visit} はこの設備の点検回数（{rounds}回）を超えています")]
    VisitOutOfRange { visit: VisitKey, rounds: u8 },

    #[error("{table}/{row_id} の {visit} が「否」ではないため不具合を登録できません")]
    VisitNotNg { table: TableKey, row_id: RowId, visit: VisitKey },

    #[error("編集画面は既に閉じられています")]
    EditorClosed,

    #[error("不具合が見つかりません: {0}番目")]
    DefectIndex(usize),

    #[error("写真が見つかりません: {0}番目")]
    PhotoIndex(usize),

    #[error("撮影対象の不具合が下書きから外れました: {0}")]
    PhotoTargetChanged(String),

    #[error("「その他」の指摘事項ではありません")]
    NotOtherDefect,

    #[error("{table}/{row_id} は追記できない項目です")]
    ExtraTextNotAllowed { table: TableKey, row_id: RowId },

    #[error("写真は1件につき{0}枚までです")]
    PhotoCapacity(usize),

    #[error("{operation} は現在の状態（{state}）では実行できません")]
    InvalidState { operation: &'static str, state: &'static str },

    #[error("撮影エラー: {0}")]
    CaptureSurface(String),

    #[error("画像読み込みエラー: {0}")]
    ImageDecode(String),

    #[error("画像エンコードエラー: {0}")]
    ImageEncode(String),

    #[error("様式区分の照会に失敗: {0}")]
    Lookup(String),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URLが不正: {0}")]
    InvalidUrl(String),

    #[error("カタログに存在しません: {0}")]
    CatalogEntry(String),

    #[error("点検データが見つかりません: {0}")]
    ReportNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChecklistError>;
