//! チェックリストのデータモデル
//!
//! 点検表の入れ子構造:
//! - Checklist: `table1` / `table2` の2グループ（行ID → ChecklistRow）
//! - ChecklistRow: 点検項目ラベル・回次ごとの判定・備考・回次ごとの不具合
//! - Defect: 不具合1件（指摘事項・是正内容・写真最大2枚）
//! - PhotoItem: 写真1枚（ファイル名と表示ソース）
//!
//! 書き込みは merge モジュール経由のみ。ここにはセッターを置かない。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 不具合1件あたりの写真上限
pub const MAX_PHOTOS_PER_DEFECT: usize = 2;

/// カタログ外（その他）の指摘事項を表す番兵ID
pub const OTHER_PROBLEM_ID: &str = "other";

/// 点検表のグループ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableKey {
    #[serde(rename = "table1")]
    Table1,
    #[serde(rename = "table2")]
    Table2,
}

impl TableKey {
    pub const ALL: [TableKey; 2] = [TableKey::Table1, TableKey::Table2];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKey::Table1 => "table1",
            TableKey::Table2 => "table2",
        }
    }

    /// `table1` / `t1` / `1` などの表記を受け付ける
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "table1" | "t1" | "1" => Some(TableKey::Table1),
            "table2" | "t2" | "2" => Some(TableKey::Table2),
            _ => None,
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 点検回次（最大3回）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitKey {
    V1,
    V2,
    V3,
}

impl VisitKey {
    pub const ALL: [VisitKey; 3] = [VisitKey::V1, VisitKey::V2, VisitKey::V3];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitKey::V1 => "v1",
            VisitKey::V2 => "v2",
            VisitKey::V3 => "v3",
        }
    }

    /// 1始まりの回次番号
    pub fn number(&self) -> u8 {
        match self {
            VisitKey::V1 => 1,
            VisitKey::V2 => 2,
            VisitKey::V3 => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "v1" | "1" => Some(VisitKey::V1),
            "v2" | "2" => Some(VisitKey::V2),
            "v3" | "3" => Some(VisitKey::V3),
            _ => None,
        }
    }
}

impl fmt::Display for VisitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 回次ごとの判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitState {
    Ok,
    Ng,
    #[default]
    Unset,
}

impl VisitState {
    /// 同じ値を再度指定すると未設定に戻る
    pub fn toggled(self, requested: VisitState) -> VisitState {
        if self == requested {
            VisitState::Unset
        } else {
            requested
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ok" | "良" => Some(VisitState::Ok),
            "ng" | "否" => Some(VisitState::Ng),
            "unset" | "" | "-" => Some(VisitState::Unset),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            VisitState::Ok => "○",
            VisitState::Ng => "×",
            VisitState::Unset => "-",
        }
    }
}

/// 写真の表示ソース
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "camelCase")]
pub enum PhotoSource {
    /// 撮影直後のdata URL（未アップロード）
    InlineData(String),
    /// ファイル選択直後のローカルプレビューURL（未アップロード）
    LocalPreview(String),
    /// 保存済みファイル名から組み立てたリモートURL
    Remote(String),
}

impl PhotoSource {
    pub fn url(&self) -> &str {
        match self {
            PhotoSource::InlineData(url)
            | PhotoSource::LocalPreview(url)
            | PhotoSource::Remote(url) => url,
        }
    }

    /// サーバ未保存のソースか
    pub fn is_local(&self) -> bool {
        !matches!(self, PhotoSource::Remote(_))
    }
}

/// 不具合写真1枚
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    /// `defect_DDMMYYYYhhmmss.<ext>` 形式の生成ファイル名
    pub filename: String,

    /// 保存データから読み込んだ直後は None（ファイル名のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PhotoSource>,
}

impl PhotoItem {
    pub fn new(filename: impl Into<String>, source: PhotoSource) -> Self {
        Self { filename: filename.into(), source: Some(source) }
    }

    /// ローカルプレビューURLを保持している場合はそれを返す
    pub fn local_preview_url(&self) -> Option<&str> {
        match &self.source {
            Some(PhotoSource::LocalPreview(url)) => Some(url),
            _ => None,
        }
    }
}

/// 不具合1件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
    /// 指摘事項カタログのID、または "other"
    pub problem_id: String,

    /// 指摘事項（"other" の場合は手入力・必須）
    #[serde(default)]
    pub problem_name: String,

    /// 法令条項ID（"other" の場合のみ意味を持つ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_reference_id: Option<String>,

    /// 是正内容（必須）
    #[serde(default)]
    pub suggestion_text: String,

    #[serde(default)]
    pub photos: Vec<PhotoItem>,
}

impl Defect {
    /// カタログの指摘事項から生成（是正内容の初期値をコピー）
    pub fn from_catalog(
        problem_id: impl Into<String>,
        problem_name: impl Into<String>,
        suggestion_text: impl Into<String>,
    ) -> Self {
        Self {
            problem_id: problem_id.into(),
            problem_name: problem_name.into(),
            legal_reference_id: None,
            suggestion_text: suggestion_text.into(),
            photos: Vec::new(),
        }
    }

    /// 空の「その他」指摘事項
    pub fn other() -> Self {
        Self { problem_id: OTHER_PROBLEM_ID.to_string(), ..Default::default() }
    }

    pub fn is_other(&self) -> bool {
        self.problem_id == OTHER_PROBLEM_ID
    }

    pub fn can_add_photo(&self) -> bool {
        self.photos.len() < MAX_PHOTOS_PER_DEFECT
    }
}

/// 点検表の行ID（`t1-<行>` / `t2-<グループ>-<行>`）
///
/// 値は表・グループ・行の位置から常に再導出できる。妥当性は
/// `labels::RowPosition::parse` で検証する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// table1 の行ID（行は1始まり）
    pub fn table1(row: usize) -> Self {
        Self(format!("t1-{}", row))
    }

    /// table2 の行ID（グループ・行は1始まり）
    pub fn table2(group: usize, row: usize) -> Self {
        Self(format!("t2-{}-{}", group, row))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 点検表の1行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistRow {
    /// 点検項目（静的ラベル表から毎回再計算される）
    #[serde(default)]
    pub inspection_item_text: String,

    #[serde(default)]
    pub visits: BTreeMap<VisitKey, VisitState>,

    #[serde(default)]
    pub note: String,

    /// 「その他（　）」のような追記可能な行の追記テキスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_text: Option<String>,

    #[serde(default)]
    pub defects_by_visit: BTreeMap<VisitKey, Vec<Defect>>,
}

impl ChecklistRow {
    pub fn visit(&self, key: VisitKey) -> VisitState {
        self.visits.get(&key).copied().unwrap_or_default()
    }

    pub fn defects(&self, key: VisitKey) -> &[Defect] {
        self.defects_by_visit.get(&key).map(|d| d.as_slice()).unwrap_or(&[])
    }
}

/// 行への部分更新
///
/// `None` / キーなしのフィールドは現在値を保持する。
/// `inspection_item_text` は受け取るが常に無視される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection_item_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_text: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub visits: BTreeMap<VisitKey, VisitState>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defects_by_visit: BTreeMap<VisitKey, Vec<Defect>>,
}

impl RowPatch {
    pub fn visit(key: VisitKey, state: VisitState) -> Self {
        let mut patch = Self::default();
        patch.visits.insert(key, state);
        patch
    }

    pub fn note(text: impl Into<String>) -> Self {
        Self { note: Some(text.into()), ..Default::default() }
    }

    pub fn extra_text(text: impl Into<String>) -> Self {
        Self { extra_text: Some(text.into()), ..Default::default() }
    }

    /// 1回次分の不具合リストを丸ごと置き換えるパッチ
    pub fn defects(key: VisitKey, defects: Vec<Defect>) -> Self {
        let mut patch = Self::default();
        patch.defects_by_visit.insert(key, defects);
        patch
    }
}

impl From<ChecklistRow> for RowPatch {
    fn from(row: ChecklistRow) -> Self {
        Self {
            inspection_item_text: Some(row.inspection_item_text),
            note: Some(row.note),
            extra_text: row.extra_text,
            visits: row.visits,
            defects_by_visit: row.defects_by_visit,
        }
    }
}

/// 1グループ分の行（行はArcで共有される）
pub type RowMap = BTreeMap<RowId, Arc<ChecklistRow>>;

/// 点検表全体
///
/// 各グループと各行は `Arc` で共有される。パッチ適用後も変更のない
/// 行・グループは元のチェックリストとポインタ等価のまま残る。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default)]
    table1: Arc<RowMap>,
    #[serde(default)]
    table2: Arc<RowMap>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, table: TableKey) -> &Arc<RowMap> {
        match table {
            TableKey::Table1 => &self.table1,
            TableKey::Table2 => &self.table2,
        }
    }

    pub fn row(&self, table: TableKey, row_id: &RowId) -> Option<&Arc<ChecklistRow>> {
        self.table(table).get(row_id)
    }

    /// 行が存在しなければ空のデフォルト行
    pub fn row_or_default(&self, table: TableKey, row_id: &RowId) -> ChecklistRow {
        self.row(table, row_id).map(|r| r.as_ref().clone()).unwrap_or_default()
    }

    /// 1行だけを差し替えた新しいチェックリストを返す
    pub(crate) fn with_row(&self, table: TableKey, row_id: RowId, row: Arc<ChecklistRow>) -> Self {
        let mut next = self.clone();
        let map = match table {
            TableKey::Table1 => &mut next.table1,
            TableKey::Table2 => &mut next.table2,
        };
        Arc::make_mut(map).insert(row_id, row);
        next
    }

    pub(crate) fn with_table(&self, table: TableKey, rows: RowMap) -> Self {
        let mut next = self.clone();
        match table {
            TableKey::Table1 => next.table1 = Arc::new(rows),
            TableKey::Table2 => next.table2 = Arc::new(rows),
        }
        next
    }

    pub fn is_empty(&self) -> bool {
        self.table1.is_empty() && self.table2.is_empty()
    }

    /// 保存用のスナップショット（両グループ・全行）
    pub fn to_snapshot(&self) -> ChecklistSnapshot {
        let plain = |map: &RowMap| -> BTreeMap<RowId, ChecklistRow> {
            map.iter().map(|(id, row)| (id.clone(), row.as_ref().clone())).collect()
        };
        ChecklistSnapshot {
            table1: Some(plain(&self.table1)),
            table2: Some(plain(&self.table2)),
        }
    }
}

/// 保存・読込用の入れ子構造
///
/// 読込時はグループ単位で欠落しうる（片方のセクションだけのハイドレート）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table1: Option<BTreeMap<RowId, ChecklistRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table2: Option<BTreeMap<RowId, ChecklistRow>>,
}

impl ChecklistSnapshot {
    pub fn table(&self, table: TableKey) -> Option<&BTreeMap<RowId, ChecklistRow>> {
        match table {
            TableKey::Table1 => self.table1.as_ref(),
            TableKey::Table2 => self.table2.as_ref(),
        }
    }

    pub fn take_table(&mut self, table: TableKey) -> Option<BTreeMap<RowId, ChecklistRow>> {
        match table {
            TableKey::Table1 => self.table1.take(),
            TableKey::Table2 => self.table2.take(),
        }
    }
}
