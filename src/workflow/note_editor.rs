//! 備考の編集
//!
//! 判定・不具合とは独立して、行ごとの備考だけを書き換える。

use crate::error::{ChecklistError, Result};
use crate::store::ChecklistStore;
use inspection_common::{RowId, RowPatch, RowReplacement, TableKey};

pub struct NoteEditor {
    table: TableKey,
    row_id: RowId,
    draft: String,
    open: bool,
}

impl NoteEditor {
    pub fn open(store: &ChecklistStore, table: TableKey, row_id: RowId) -> Result<Self> {
        store.label(table, &row_id)?;
        let draft = store.row(table, &row_id).note;
        Ok(Self { table, row_id, draft, open: true })
    }

    pub fn text(&self) -> &str {
        &self.draft
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.draft = text.into();
        Ok(())
    }

    /// 備考だけのパッチとして保存
    pub fn save(&mut self, store: &mut ChecklistStore) -> Result<RowReplacement> {
        self.ensure_open()?;
        let replacement = store.apply(self.table, &self.row_id, RowPatch::note(self.draft.clone()))?;
        self.open = false;
        tracing::info!(table = %self.table, row_id = %self.row_id, "note saved");
        Ok(replacement)
    }

    pub fn cancel(&mut self) {
        self.open = false;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(ChecklistError::EditorClosed)
        }
    }
}
