//! Inspection Checklist Common Library
//!
//! 点検チェックリストのデータモデル・行ラベル定義・マージエンジン

pub mod types;
pub mod labels;
pub mod rounds;
pub mod merge;
pub mod error;

pub use types::{
    Checklist, ChecklistRow, ChecklistSnapshot, Defect, PhotoItem, PhotoSource, RowId, RowPatch,
    TableKey, VisitKey, VisitState, MAX_PHOTOS_PER_DEFECT, OTHER_PROBLEM_ID,
};
pub use labels::{resolve_label, allows_extra_text, RowPosition};
pub use rounds::{RoundCount, FormTypeTable};
pub use merge::{merge_row, merge_snapshot, RowReplacement};
pub use error::{Error, Result};
