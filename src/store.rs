//! 編集中チェックリストの保持
//!
//! 書き込みはすべて `inspection_common::merge` を経由する。
//! 1人の編集者が1つのチェックリストを編集する前提。

use crate::error::{ChecklistError, Result};
use inspection_common::labels;
use inspection_common::{
    merge_snapshot, Checklist, ChecklistRow, ChecklistSnapshot, RoundCount, RowId, RowPatch,
    RowReplacement, TableKey, VisitKey, VisitState,
};

#[derive(Debug, Clone, Default)]
pub struct ChecklistStore {
    checklist: Checklist,
    rounds: RoundCount,
}

impl ChecklistStore {
    pub fn new(rounds: RoundCount) -> Self {
        Self { checklist: Checklist::new(), rounds }
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    pub fn rounds(&self) -> RoundCount {
        self.rounds
    }

    /// 表示する回次列
    pub fn visit_keys(&self) -> &'static [VisitKey] {
        self.rounds.visit_keys()
    }

    pub fn label(&self, table: TableKey, row_id: &RowId) -> Result<&'static str> {
        Ok(labels::resolve_label(table, row_id)?)
    }

    /// 行（未作成なら空のデフォルト行）
    pub fn row(&self, table: TableKey, row_id: &RowId) -> ChecklistRow {
        self.checklist.row_or_default(table, row_id)
    }

    /// パッチを適用して差し替えた行を返す
    pub fn apply(&mut self, table: TableKey, row_id: &RowId, delta: RowPatch) -> Result<RowReplacement> {
        let replacement = self.checklist.patch(table, row_id, delta)?;
        self.checklist = self.checklist.apply(replacement.clone());
        Ok(replacement)
    }

    /// 判定の切り替え（同じ値の再指定で未設定に戻る）
    pub fn toggle_visit(
        &mut self,
        table: TableKey,
        row_id: &RowId,
        visit: VisitKey,
        requested: VisitState,
    ) -> Result<VisitState> {
        self.ensure_visit(visit)?;

        let next = self.row(table, row_id).visit(visit).toggled(requested);
        self.apply(table, row_id, RowPatch::visit(visit, next))?;
        tracing::debug!(%table, %row_id, %visit, state = ?next, "visit toggled");
        Ok(next)
    }

    /// 追記テキストの設定（「その他（　）」のような行のみ）
    pub fn set_extra_text(&mut self, table: TableKey, row_id: &RowId, text: impl Into<String>) -> Result<RowReplacement> {
        if !labels::allows_extra_text(table, row_id) {
            return Err(ChecklistError::ExtraTextNotAllowed { table, row_id: row_id.clone() });
        }
        self.apply(table, row_id, RowPatch::extra_text(text))
    }

    pub fn ensure_visit(&self, visit: VisitKey) -> Result<()> {
        if self.rounds.contains(visit) {
            Ok(())
        } else {
            Err(ChecklistError::VisitOutOfRange { visit, rounds: self.rounds.get() })
        }
    }

    /// 保存データをセクション単位でマージ
    pub fn hydrate(&mut self, snapshot: ChecklistSnapshot) -> Result<()> {
        self.checklist = merge_snapshot(&self.checklist, snapshot)?;
        Ok(())
    }

    /// 保存用スナップショット（全体）
    pub fn snapshot(&self) -> ChecklistSnapshot {
        self.checklist.to_snapshot()
    }
}
