//! パッチ・マージエンジン
//!
//! チェックリストへの書き込みはすべてここを通る。
//!
//! 行マージの規則:
//! 1. 現在の行（なければ空行）を読む
//! 2. `inspection_item_text` は静的ラベル表から再計算し、呼び出し側の値は捨てる
//! 3. スカラー項目（備考・追記テキスト）は指定されたものだけ上書き
//! 4. `visits` は指定された回次キーだけ上書き
//! 5. `defects_by_visit` は指定された回次キーのリストを丸ごと置き換え
//! 6. 結果を (表, 行ID) の差し替えとして返す。他の行はポインタ等価のまま

use crate::error::Result;
use crate::labels;
use crate::types::{Checklist, ChecklistRow, ChecklistSnapshot, RowId, RowPatch, TableKey};
use std::sync::Arc;

/// 1行分の差し替え
#[derive(Debug, Clone, PartialEq)]
pub struct RowReplacement {
    pub table: TableKey,
    pub row_id: RowId,
    pub row: Arc<ChecklistRow>,
}

/// 現在の行にパッチをマージした行を作る
pub fn merge_row(
    table: TableKey,
    row_id: &RowId,
    current: Option<&ChecklistRow>,
    delta: RowPatch,
) -> Result<ChecklistRow> {
    let label = labels::resolve_label(table, row_id)?;

    let mut merged = current.cloned().unwrap_or_default();
    merged.inspection_item_text = label.to_string();

    if let Some(note) = delta.note {
        merged.note = note;
    }
    if let Some(extra_text) = delta.extra_text {
        merged.extra_text = Some(extra_text);
    }

    for (key, state) in delta.visits {
        merged.visits.insert(key, state);
    }

    for (key, defects) in delta.defects_by_visit {
        merged.defects_by_visit.insert(key, defects);
    }

    Ok(merged)
}

impl Checklist {
    /// パッチから差し替えを作る（チェックリスト自体は変更しない）
    ///
    /// 行IDの形式違反はプログラミングエラーとして開発ビルドでは panic する。
    pub fn patch(&self, table: TableKey, row_id: &RowId, delta: RowPatch) -> Result<RowReplacement> {
        let current = self.row(table, row_id).map(|r| r.as_ref());
        let merged = match merge_row(table, row_id, current, delta) {
            Ok(merged) => merged,
            Err(e) => {
                debug_assert!(false, "malformed row id {}/{}: {}", table, row_id, e);
                return Err(e);
            }
        };

        Ok(RowReplacement { table, row_id: row_id.clone(), row: Arc::new(merged) })
    }

    /// 差し替えを適用した新しいチェックリスト
    pub fn apply(&self, replacement: RowReplacement) -> Checklist {
        self.with_row(replacement.table, replacement.row_id, replacement.row)
    }

    /// `patch` + `apply`
    pub fn apply_patch(&self, table: TableKey, row_id: &RowId, delta: RowPatch) -> Result<Checklist> {
        let replacement = self.patch(table, row_id, delta)?;
        Ok(self.apply(replacement))
    }
}

/// 保存データ（セクション単位）を現在のチェックリストへマージ
///
/// グループごと、グループ内は行ごとに `merge_row` と同じ規則で統合する。
/// スナップショットに含まれないグループ、変化のない行は元の `Arc` を保持する。
pub fn merge_snapshot(current: &Checklist, mut incoming: ChecklistSnapshot) -> Result<Checklist> {
    let mut next = current.clone();

    for table in TableKey::ALL {
        let Some(rows) = incoming.take_table(table) else {
            continue;
        };
        if rows.is_empty() {
            continue;
        }

        let mut map = next.table(table).as_ref().clone();
        for (row_id, row) in rows {
            let existing = map.get(&row_id).cloned();
            let merged = merge_row(table, &row_id, existing.as_deref(), RowPatch::from(row))?;
            match existing {
                Some(existing) if *existing == merged => {}
                _ => {
                    map.insert(row_id, Arc::new(merged));
                }
            }
        }
        next = next.with_table(table, map);
    }

    Ok(next)
}
