//! 点検項目ラベル定義
//!
//! 行IDは表・グループ・行の位置から決定的に導出される。
//! ラベルはここで定義した静的な表からのみ解決し、保存データ側の値は信用しない。

use crate::error::{Error, Result};
use crate::types::{RowId, TableKey};
use lazy_static::lazy_static;
use regex::Regex;

/// 点検項目1行の定義
#[derive(Debug, Clone, Copy)]
pub struct RowDef {
    pub label: &'static str,
    /// 「その他（　）」のように利用者が追記できる行
    pub extra_text: bool,
}

/// table2 のグループ定義
#[derive(Debug, Clone, Copy)]
pub struct GroupDef {
    pub title: &'static str,
    pub rows: &'static [RowDef],
}

const fn item(label: &'static str) -> RowDef {
    RowDef { label, extra_text: false }
}

const fn item_with_extra(label: &'static str) -> RowDef {
    RowDef { label, extra_text: true }
}

/// 表1: 外観・取付状況
pub const TABLE1_ROWS: &[RowDef] = &[
    item("基礎の沈下・傾斜"),
    item("支柱の腐食・変形"),
    item("取付部のボルトの緩み・脱落"),
    item("溶接部の亀裂"),
    item("表示面の破損・汚損"),
    item("照明装置の破損・不点灯"),
    item("塗装の剥離・劣化"),
    item_with_extra("その他（　）"),
];

/// 表2: 構造・設備（グループ別）
pub const TABLE2_GROUPS: &[GroupDef] = &[
    GroupDef {
        title: "構造部",
        rows: &[
            item("主要構造部材の亀裂・破断"),
            item("接合部の緩み・ずれ"),
            item("防錆処理の劣化"),
        ],
    },
    GroupDef {
        title: "電気設備",
        rows: &[
            item("配線・配管の損傷"),
            item("漏電遮断器の作動"),
            item("接地の状態"),
            item_with_extra("その他（　）"),
        ],
    },
    GroupDef {
        title: "安全対策",
        rows: &[
            item("落下防止措置"),
            item("周辺の立入制限"),
            item("避雷設備"),
        ],
    },
];

lazy_static! {
    static ref TABLE1_ID: Regex = Regex::new(r"^t1-(\d+)$").unwrap();
    static ref TABLE2_ID: Regex = Regex::new(r"^t2-(\d+)-(\d+)$").unwrap();
}

/// 行IDを分解した位置（いずれも1始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPosition {
    Table1 { row: usize },
    Table2 { group: usize, row: usize },
}

impl RowPosition {
    /// 行IDを検証して位置に分解
    ///
    /// 形式違反は `InvalidRowId`、ラベル表にない位置は `UnknownRow`。
    /// `t1-01` のように位置から再導出した値と一致しないIDも形式違反とする。
    pub fn parse(table: TableKey, row_id: &RowId) -> Result<Self> {
        let invalid = || Error::InvalidRowId(row_id.to_string());
        let position = match table {
            TableKey::Table1 => {
                let caps = TABLE1_ID.captures(row_id.as_str()).ok_or_else(invalid)?;
                let row = caps[1].parse().map_err(|_| invalid())?;
                RowPosition::Table1 { row }
            }
            TableKey::Table2 => {
                let caps = TABLE2_ID.captures(row_id.as_str()).ok_or_else(invalid)?;
                let group = caps[1].parse().map_err(|_| invalid())?;
                let row = caps[2].parse().map_err(|_| invalid())?;
                RowPosition::Table2 { group, row }
            }
        };
        if position.row_id() != *row_id {
            return Err(invalid());
        }

        if position.row_def().is_none() {
            return Err(Error::UnknownRow { table: table.as_str(), row_id: row_id.to_string() });
        }
        Ok(position)
    }

    pub fn row_def(&self) -> Option<&'static RowDef> {
        match *self {
            RowPosition::Table1 { row } => row.checked_sub(1).and_then(|i| TABLE1_ROWS.get(i)),
            RowPosition::Table2 { group, row } => group
                .checked_sub(1)
                .and_then(|g| TABLE2_GROUPS.get(g))
                .and_then(|g| row.checked_sub(1).and_then(|i| g.rows.get(i))),
        }
    }

    pub fn row_id(&self) -> RowId {
        match *self {
            RowPosition::Table1 { row } => RowId::table1(row),
            RowPosition::Table2 { group, row } => RowId::table2(group, row),
        }
    }
}

/// 行IDから点検項目ラベルを解決
pub fn resolve_label(table: TableKey, row_id: &RowId) -> Result<&'static str> {
    let position = RowPosition::parse(table, row_id)?;
    // parse 済みなので row_def は必ず存在する
    Ok(position.row_def().map(|d| d.label).unwrap_or_default())
}

/// 追記テキストを受け付ける行か
pub fn allows_extra_text(table: TableKey, row_id: &RowId) -> bool {
    RowPosition::parse(table, row_id)
        .ok()
        .and_then(|p| p.row_def())
        .map(|d| d.extra_text)
        .unwrap_or(false)
}

/// グループの全行IDを表示順に列挙
pub fn row_ids(table: TableKey) -> Vec<RowId> {
    match table {
        TableKey::Table1 => (1..=TABLE1_ROWS.len()).map(RowId::table1).collect(),
        TableKey::Table2 => TABLE2_GROUPS
            .iter()
            .enumerate()
            .flat_map(|(g, group)| (1..=group.rows.len()).map(move |r| RowId::table2(g + 1, r)))
            .collect(),
    }
}

/// table2 のグループ見出し
pub fn group_title(row_id: &RowId) -> Option<&'static str> {
    match RowPosition::parse(TableKey::Table2, row_id).ok()? {
        RowPosition::Table2 { group, .. } => TABLE2_GROUPS.get(group - 1).map(|g| g.title),
        RowPosition::Table1 { .. } => None,
    }
}
