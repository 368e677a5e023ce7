//! 不具合編集画面
//!
//! (行, 回次) ごとに1つの編集セッションを持つ。開いた時点の不具合リストを
//! 下書きにコピーし、確定するまでチェックリストには一切書き込まない。
//! 確定時は下書き全体で回次のリストを丸ごと置き換える。

use crate::assets::ObjectUrlRegistry;
use crate::capture::{OpenOutcome, PhotoCapture, PhotoTarget, PickedFile, ViewedPhoto};
use crate::catalog::{CatalogProblem, LegalReference};
use crate::error::{ChecklistError, Result};
use crate::store::ChecklistStore;
use inspection_common::{Defect, PhotoItem, RowId, RowPatch, RowReplacement, TableKey, VisitKey, VisitState};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Editing,
    Committed,
    Cancelled,
}

/// 確定前チェックの結果（画面上で該当欄を強調表示する）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// 「その他」の指摘事項名が空
    pub missing_other_name: bool,
    /// 是正内容が空の不具合（下書き内の位置）
    pub missing_suggestions: Vec<usize>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self.missing_other_name && self.missing_suggestions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(RowReplacement),
    /// 入力不足のため確定せず、編集画面は開いたまま
    Rejected(ValidationReport),
}

pub struct DefectEditor {
    table: TableKey,
    row_id: RowId,
    visit: VisitKey,
    original: Vec<Defect>,
    draft: Vec<Defect>,
    state: EditorState,
    validation: Option<ValidationReport>,
    urls: Arc<dyn ObjectUrlRegistry>,
}

impl DefectEditor {
    /// 編集を開始
    ///
    /// 判定が「否」の回次でのみ開ける。
    pub fn open(
        store: &ChecklistStore,
        table: TableKey,
        row_id: RowId,
        visit: VisitKey,
        urls: Arc<dyn ObjectUrlRegistry>,
    ) -> Result<Self> {
        store.ensure_visit(visit)?;
        store.label(table, &row_id)?;

        let row = store.row(table, &row_id);
        if row.visit(visit) != VisitState::Ng {
            return Err(ChecklistError::VisitNotNg { table, row_id, visit });
        }

        let original = row.defects(visit).to_vec();
        tracing::debug!(%table, %row_id, %visit, defects = original.len(), "defect editor opened");
        Ok(Self {
            table,
            row_id,
            visit,
            draft: original.clone(),
            original,
            state: EditorState::Editing,
            validation: None,
            urls,
        })
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn draft(&self) -> &[Defect] {
        &self.draft
    }

    /// 直近の確定失敗時のチェック結果
    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn is_selected(&self, problem_id: &str) -> bool {
        self.draft.iter().any(|d| d.problem_id == problem_id)
    }

    /// カタログの指摘事項の選択を切り替え（追加したら true）
    pub fn toggle_catalog_problem(&mut self, problem: &CatalogProblem) -> Result<bool> {
        self.ensure_editing()?;

        if let Some(index) = self.draft.iter().position(|d| d.problem_id == problem.problem_id) {
            self.draft.remove(index);
            return Ok(false);
        }

        self.draft.push(Defect::from_catalog(
            problem.problem_id.clone(),
            problem.problem_name.clone(),
            problem.suggestion_text.clone(),
        ));
        Ok(true)
    }

    /// 複数選択の結果をまとめて反映
    ///
    /// 選択が続いている指摘事項は入力済みの内容と写真を保持する。「その他」は対象外。
    pub fn set_catalog_selection(&mut self, selected: &[CatalogProblem]) -> Result<()> {
        self.ensure_editing()?;

        let keep: HashSet<&str> = selected.iter().map(|p| p.problem_id.as_str()).collect();
        self.draft.retain(|d| d.is_other() || keep.contains(d.problem_id.as_str()));

        for problem in selected {
            if !self.is_selected(&problem.problem_id) {
                self.draft.push(Defect::from_catalog(
                    problem.problem_id.clone(),
                    problem.problem_name.clone(),
                    problem.suggestion_text.clone(),
                ));
            }
        }
        Ok(())
    }

    pub fn other_index(&self) -> Option<usize> {
        self.draft.iter().position(|d| d.is_other())
    }

    /// 「その他」の有無を切り替え（1つの回次に1件まで）
    pub fn toggle_other(&mut self) -> Result<bool> {
        self.ensure_editing()?;

        match self.other_index() {
            Some(index) => {
                self.draft.remove(index);
                Ok(false)
            }
            None => {
                self.draft.push(Defect::other());
                Ok(true)
            }
        }
    }

    pub fn set_other_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_editing()?;
        let index = self.other_index().ok_or(ChecklistError::NotOtherDefect)?;
        self.draft[index].problem_name = name.into();
        Ok(())
    }

    /// 法令条項の設定（「その他」のみ）
    pub fn set_legal_reference(&mut self, index: usize, reference: Option<&LegalReference>) -> Result<()> {
        self.ensure_editing()?;
        let defect = self.draft.get_mut(index).ok_or(ChecklistError::DefectIndex(index))?;
        if !defect.is_other() {
            return Err(ChecklistError::NotOtherDefect);
        }
        defect.legal_reference_id = reference.map(|r| r.id.clone());
        Ok(())
    }

    pub fn set_suggestion(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        self.ensure_editing()?;
        let defect = self.draft.get_mut(index).ok_or(ChecklistError::DefectIndex(index))?;
        defect.suggestion_text = text.into();
        Ok(())
    }

    pub fn remove_defect(&mut self, index: usize) -> Result<Defect> {
        self.ensure_editing()?;
        if index >= self.draft.len() {
            return Err(ChecklistError::DefectIndex(index));
        }
        Ok(self.draft.remove(index))
    }

    /// 下書きの不具合を写真の追加先として固定する
    pub fn photo_target(&self, defect_index: usize) -> Result<PhotoTarget> {
        let defect = self.draft.get(defect_index).ok_or(ChecklistError::DefectIndex(defect_index))?;
        Ok(PhotoTarget {
            table: self.table,
            row_id: self.row_id.clone(),
            visit: self.visit,
            defect_index,
            problem_id: defect.problem_id.clone(),
        })
    }

    /// 写真の撮影・選択を開始
    pub async fn open_photo(&self, capture: &mut PhotoCapture, defect_index: usize) -> Result<OpenOutcome> {
        self.ensure_editing()?;
        capture.open(self.photo_target(defect_index)?, &self.draft).await
    }

    /// ファイル選択の結果を確定待ちにする
    pub async fn pick_photo(&self, capture: &mut PhotoCapture, file: &dyn PickedFile) -> Result<PhotoItem> {
        self.ensure_editing()?;
        self.ensure_target(capture)?;
        capture.pick_file(file, &self.draft).await.cloned()
    }

    /// 確定待ちの写真を下書きへ追加
    pub fn confirm_photo(&mut self, capture: &mut PhotoCapture) -> Result<PhotoItem> {
        self.ensure_editing()?;
        self.ensure_target(capture)?;
        capture.confirm(&mut self.draft)
    }

    pub fn view_photo(&self, capture: &mut PhotoCapture, defect_index: usize, photo_index: usize) -> Result<ViewedPhoto> {
        self.ensure_editing()?;
        capture.view(self.photo_target(defect_index)?, photo_index, &self.draft).cloned()
    }

    pub fn delete_viewed_photo(&mut self, capture: &mut PhotoCapture) -> Result<PhotoItem> {
        self.ensure_editing()?;
        match capture.viewing() {
            Some(viewed) if self.owns(&viewed.target) => {}
            _ => return Err(ChecklistError::InvalidState { operation: "delete_viewed_photo", state: capture.state().as_str() }),
        }
        capture.delete_viewed(&mut self.draft)
    }

    /// 確定前チェック
    pub fn validate(&self) -> ValidationReport {
        let blank = |s: &str| s.trim().is_empty();
        ValidationReport {
            missing_other_name: self.draft.iter().any(|d| d.is_other() && blank(&d.problem_name)),
            missing_suggestions: self
                .draft
                .iter()
                .enumerate()
                .filter(|(_, d)| blank(&d.suggestion_text))
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// 確定（入力不足なら Rejected を返し、チェックリストは変更しない）
    pub fn commit(&mut self, store: &mut ChecklistStore) -> Result<CommitOutcome> {
        self.ensure_editing()?;

        let report = self.validate();
        if !report.is_valid() {
            tracing::debug!(row_id = %self.row_id, visit = %self.visit, ?report, "defect commit rejected");
            self.validation = Some(report.clone());
            return Ok(CommitOutcome::Rejected(report));
        }

        let replacement = store.apply(self.table, &self.row_id, RowPatch::defects(self.visit, self.draft.clone()))?;

        // 確定で参照されなくなったプレビューURLを失効
        revoke_unreferenced(self.urls.as_ref(), &self.original, &self.draft);
        self.validation = None;
        self.state = EditorState::Committed;
        tracing::info!(
            table = %self.table,
            row_id = %self.row_id,
            visit = %self.visit,
            defects = self.draft.len(),
            "defects committed"
        );
        Ok(CommitOutcome::Committed(replacement))
    }

    /// 取消（下書きを破棄し、撮影中なら閉じる）
    pub fn cancel(&mut self, capture: &mut PhotoCapture) {
        if capture.target().map(|t| self.owns(t)).unwrap_or(false)
            || capture.viewing().map(|v| self.owns(&v.target)).unwrap_or(false)
        {
            capture.close();
        }
        self.discard();
    }

    fn discard(&mut self) {
        if self.state != EditorState::Editing {
            return;
        }
        // 下書きにだけ存在するプレビューURLを失効
        revoke_unreferenced(self.urls.as_ref(), &self.draft, &self.original);
        self.draft = self.original.clone();
        self.state = EditorState::Cancelled;
        tracing::debug!(row_id = %self.row_id, visit = %self.visit, "defect editor cancelled");
    }

    fn owns(&self, target: &PhotoTarget) -> bool {
        target.table == self.table && target.row_id == self.row_id && target.visit == self.visit
    }

    fn ensure_target(&self, capture: &PhotoCapture) -> Result<()> {
        match capture.target() {
            Some(target) if self.owns(target) => Ok(()),
            _ => Err(ChecklistError::InvalidState { operation: "photo", state: capture.state().as_str() }),
        }
    }

    fn ensure_editing(&self) -> Result<()> {
        if self.state == EditorState::Editing {
            Ok(())
        } else {
            Err(ChecklistError::EditorClosed)
        }
    }
}

impl Drop for DefectEditor {
    fn drop(&mut self) {
        self.discard();
    }
}

/// `from` にあって `kept` にないプレビューURLを失効させる
fn revoke_unreferenced(urls: &dyn ObjectUrlRegistry, from: &[Defect], kept: &[Defect]) {
    let kept: HashSet<&str> = kept
        .iter()
        .flat_map(|d| d.photos.iter())
        .filter_map(|p| p.local_preview_url())
        .collect();

    for url in from.iter().flat_map(|d| d.photos.iter()).filter_map(|p| p.local_preview_url()) {
        if !kept.contains(url) {
            urls.revoke(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LocalUrlRegistry, RemoteAssetResolver};
    use crate::capture::{CaptureState, MemoryFile, UnavailableCamera};
    use inspection_common::RoundCount;

    fn problem(id: &str, suggestion: &str) -> CatalogProblem {
        CatalogProblem {
            problem_id: id.to_string(),
            problem_name: id.to_string(),
            suggestion_text: suggestion.to_string(),
        }
    }

    fn ng_store() -> ChecklistStore {
        let mut store = ChecklistStore::new(RoundCount::new(2).unwrap());
        store.toggle_visit(TableKey::Table1, &RowId::table1(1), VisitKey::V1, VisitState::Ng).unwrap();
        store
    }

    fn open(store: &ChecklistStore, urls: Arc<LocalUrlRegistry>) -> DefectEditor {
        DefectEditor::open(store, TableKey::Table1, RowId::table1(1), VisitKey::V1, urls).unwrap()
    }

    fn png_file() -> MemoryFile {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(2, 2))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        MemoryFile { name: "site.png".into(), bytes }
    }

    #[test]
    fn test_open_requires_ng() {
        let store = ChecklistStore::new(RoundCount::ONE);
        let result = DefectEditor::open(
            &store,
            TableKey::Table1,
            RowId::table1(1),
            VisitKey::V1,
            Arc::new(LocalUrlRegistry::new()),
        );
        assert!(matches!(result, Err(ChecklistError::VisitNotNg { .. })));
    }

    #[test]
    fn test_open_rejects_visit_beyond_rounds() {
        let store = ng_store();
        let result = DefectEditor::open(
            &store,
            TableKey::Table1,
            RowId::table1(1),
            VisitKey::V3,
            Arc::new(LocalUrlRegistry::new()),
        );
        assert!(matches!(result, Err(ChecklistError::VisitOutOfRange { .. })));
    }

    #[test]
    fn test_catalog_toggle_copies_suggestion() {
        let store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));

        assert!(editor.toggle_catalog_problem(&problem("P1", "Fix P1")).unwrap());
        assert_eq!(editor.draft()[0].suggestion_text, "Fix P1");
        assert!(!editor.toggle_catalog_problem(&problem("P1", "Fix P1")).unwrap());
        assert!(editor.draft().is_empty());
    }

    #[test]
    fn test_catalog_selection_keeps_edits() {
        let store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        editor.set_catalog_selection(&[problem("P1", "a"), problem("P2", "b")]).unwrap();
        editor.set_suggestion(0, "編集済み").unwrap();
        editor.toggle_other().unwrap();

        editor.set_catalog_selection(&[problem("P1", "a"), problem("P3", "c")]).unwrap();
        let ids: Vec<&str> = editor.draft().iter().map(|d| d.problem_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "other", "P3"]);
        assert_eq!(editor.draft()[0].suggestion_text, "編集済み");
    }

    #[test]
    fn test_single_other_defect() {
        let store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        assert!(editor.toggle_other().unwrap());
        assert_eq!(editor.draft().iter().filter(|d| d.is_other()).count(), 1);
        assert!(!editor.toggle_other().unwrap());
        assert!(editor.other_index().is_none());
    }

    #[test]
    fn test_legal_reference_only_for_other() {
        let store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        editor.toggle_catalog_problem(&problem("P1", "x")).unwrap();
        editor.toggle_other().unwrap();
        let law = LegalReference { id: "L1".into(), label: "条例 第10条".into() };

        assert!(matches!(editor.set_legal_reference(0, Some(&law)), Err(ChecklistError::NotOtherDefect)));
        editor.set_legal_reference(1, Some(&law)).unwrap();
        assert_eq!(editor.draft()[1].legal_reference_id.as_deref(), Some("L1"));
    }

    #[test]
    fn test_commit_rejected_for_incomplete_other() {
        let mut store = ng_store();
        let before = store.checklist().clone();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        editor.toggle_other().unwrap();
        editor.set_suggestion(0, "撤去すること").unwrap();

        let outcome = editor.commit(&mut store).unwrap();
        match outcome {
            CommitOutcome::Rejected(report) => {
                assert!(report.missing_other_name);
                assert!(report.missing_suggestions.is_empty());
            }
            other => panic!("確定されてしまった: {:?}", other),
        }
        assert_eq!(editor.state(), EditorState::Editing);
        assert!(editor.validation().is_some());
        assert_eq!(store.checklist(), &before);
    }

    #[test]
    fn test_commit_rejected_for_blank_suggestion() {
        let mut store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        editor.toggle_catalog_problem(&problem("P1", "")).unwrap();
        editor.toggle_catalog_problem(&problem("P2", "補修")).unwrap();
        editor.set_suggestion(1, "   ").unwrap();

        let CommitOutcome::Rejected(report) = editor.commit(&mut store).unwrap() else {
            panic!("確定されてしまった");
        };
        assert_eq!(report.missing_suggestions, vec![0, 1]);
        assert!(store.row(TableKey::Table1, &RowId::table1(1)).defects(VisitKey::V1).is_empty());
    }

    #[test]
    fn test_commit_replaces_visit_list() {
        let mut store = ng_store();
        let mut editor = open(&store, Arc::new(LocalUrlRegistry::new()));
        editor.toggle_other().unwrap();
        editor.set_other_name("看板裏の鳥の巣").unwrap();
        editor.set_suggestion(0, "撤去すること").unwrap();

        assert!(matches!(editor.commit(&mut store).unwrap(), CommitOutcome::Committed(_)));
        assert_eq!(editor.state(), EditorState::Committed);
        let row = store.row(TableKey::Table1, &RowId::table1(1));
        assert_eq!(row.defects(VisitKey::V1)[0].problem_name, "看板裏の鳥の巣");

        assert!(matches!(editor.toggle_other(), Err(ChecklistError::EditorClosed)));
    }

    #[test]
    fn test_draft_is_a_copy() {
        let mut store = ng_store();
        let mut first = open(&store, Arc::new(LocalUrlRegistry::new()));
        first.toggle_catalog_problem(&problem("P1", "a")).unwrap();
        first.commit(&mut store).unwrap();

        let mut second = open(&store, Arc::new(LocalUrlRegistry::new()));
        second.remove_defect(0).unwrap();
        assert_eq!(store.row(TableKey::Table1, &RowId::table1(1)).defects(VisitKey::V1).len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_draft_and_photos() {
        let mut store = ng_store();
        let urls = Arc::new(LocalUrlRegistry::new());
        let resolver = RemoteAssetResolver::new("https://assets.example/photo").unwrap();
        let mut capture = PhotoCapture::new(Arc::new(UnavailableCamera), urls.clone(), resolver);

        let mut editor = open(&store, urls.clone());
        editor.toggle_catalog_problem(&problem("P1", "a")).unwrap();
        assert_eq!(editor.open_photo(&mut capture, 0).await.unwrap(), OpenOutcome::FilePicker);
        editor.pick_photo(&mut capture, &png_file()).await.unwrap();
        editor.confirm_photo(&mut capture).unwrap();
        assert_eq!(urls.live_handles().len(), 1);

        // 2枚目を撮影中に取消
        editor.open_photo(&mut capture, 0).await.unwrap();
        editor.cancel(&mut capture);

        assert_eq!(editor.state(), EditorState::Cancelled);
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(urls.live_handles().is_empty());
        assert!(store.row(TableKey::Table1, &RowId::table1(1)).defects(VisitKey::V1).is_empty());
        assert!(matches!(editor.commit(&mut store), Err(ChecklistError::EditorClosed)));
    }

    #[tokio::test]
    async fn test_deleted_committed_photo_revoked_on_commit() {
        let mut store = ng_store();
        let urls = Arc::new(LocalUrlRegistry::new());
        let resolver = RemoteAssetResolver::new("https://assets.example/photo").unwrap();
        let mut capture = PhotoCapture::new(Arc::new(UnavailableCamera), urls.clone(), resolver);

        let mut editor = open(&store, urls.clone());
        editor.toggle_catalog_problem(&problem("P1", "a")).unwrap();
        editor.open_photo(&mut capture, 0).await.unwrap();
        editor.pick_photo(&mut capture, &png_file()).await.unwrap();
        editor.confirm_photo(&mut capture).unwrap();
        editor.commit(&mut store).unwrap();
        let url = urls.live_handles()[0].clone();

        // 別セッションで削除して取消 → URLは残る
        let mut editor = open(&store, urls.clone());
        editor.view_photo(&mut capture, 0, 0).unwrap();
        editor.delete_viewed_photo(&mut capture).unwrap();
        editor.cancel(&mut capture);
        assert!(urls.is_live(&url));

        // 削除して確定 → URLは失効
        let mut editor = open(&store, urls.clone());
        editor.view_photo(&mut capture, 0, 0).unwrap();
        editor.delete_viewed_photo(&mut capture).unwrap();
        editor.commit(&mut store).unwrap();
        assert!(!urls.is_live(&url));
        assert!(store.row(TableKey::Table1, &RowId::table1(1)).defects(VisitKey::V1)[0].photos.is_empty());
    }

    #[tokio::test]
    async fn test_photo_not_moved_to_shifted_defect() {
        let store = ng_store();
        let urls = Arc::new(LocalUrlRegistry::new());
        let resolver = RemoteAssetResolver::new("https://assets.example/photo").unwrap();
        let mut capture = PhotoCapture::new(Arc::new(UnavailableCamera), urls.clone(), resolver);

        let mut editor = open(&store, urls.clone());
        let p1 = problem("P1", "a");
        editor.set_catalog_selection(&[p1.clone(), problem("P2", "b")]).unwrap();
        editor.open_photo(&mut capture, 0).await.unwrap();
        editor.pick_photo(&mut capture, &png_file()).await.unwrap();

        // 撮影中にP1を外すとP2が0番目に詰まる
        editor.toggle_catalog_problem(&p1).unwrap();
        assert_eq!(editor.draft()[0].problem_id, "P2");

        let result = editor.confirm_photo(&mut capture);
        assert!(matches!(result, Err(ChecklistError::PhotoTargetChanged(id)) if id == "P1"));
        assert!(editor.draft()[0].photos.is_empty());
        assert!(urls.live_handles().is_empty());
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_confirm_from_other_editor_rejected() {
        let mut store = ng_store();
        store.toggle_visit(TableKey::Table1, &RowId::table1(2), VisitKey::V1, VisitState::Ng).unwrap();
        let urls = Arc::new(LocalUrlRegistry::new());
        let resolver = RemoteAssetResolver::new("https://assets.example/photo").unwrap();
        let mut capture = PhotoCapture::new(Arc::new(UnavailableCamera), urls.clone(), resolver);

        let mut first = open(&store, urls.clone());
        first.toggle_catalog_problem(&problem("P1", "a")).unwrap();
        let mut second =
            DefectEditor::open(&store, TableKey::Table1, RowId::table1(2), VisitKey::V1, urls.clone()).unwrap();
        second.toggle_catalog_problem(&problem("P1", "a")).unwrap();

        first.open_photo(&mut capture, 0).await.unwrap();
        first.pick_photo(&mut capture, &png_file()).await.unwrap();
        assert!(matches!(second.confirm_photo(&mut capture), Err(ChecklistError::InvalidState { .. })));
        first.confirm_photo(&mut capture).unwrap();
        assert_eq!(first.draft()[0].photos.len(), 1);
    }
}
