//! 編集画面（不具合・備考）
//!
//! どちらも開いた時点の値を下書きにコピーし、確定時にだけパッチを適用する。

mod defect_editor;
mod note_editor;

pub use defect_editor::{CommitOutcome, DefectEditor, EditorState, ValidationReport};
pub use note_editor::NoteEditor;
