//! 点検回次数の判定表
//!
//! 設備の様式区分トークンを回次数（1〜3）へ変換する。
//! 未知のトークンや取得失敗は常に1回次に倒す（0にはしない）。

use crate::types::VisitKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 回次数（1〜3）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoundCount(u8);

impl RoundCount {
    pub const ONE: RoundCount = RoundCount(1);
    pub const MAX: u8 = 3;

    pub fn new(count: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&count).then_some(Self(count))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// 表示する回次列（v1..vN）
    pub fn visit_keys(&self) -> &'static [VisitKey] {
        &VisitKey::ALL[..self.0 as usize]
    }

    pub fn contains(&self, key: VisitKey) -> bool {
        key.number() <= self.0
    }
}

impl Default for RoundCount {
    fn default() -> Self {
        Self::ONE
    }
}

/// 様式区分トークン → 回次数の対応表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormTypeTable(BTreeMap<String, u8>);

impl Default for FormTypeTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert("A".to_string(), 1);
        table.insert("B".to_string(), 2);
        table.insert("C".to_string(), 3);
        Self(table)
    }
}

impl FormTypeTable {
    pub fn new(entries: BTreeMap<String, u8>) -> Self {
        Self(entries)
    }

    /// トークンから回次数を決定（大文字小文字・前後空白は無視）
    pub fn rounds_for(&self, token: Option<&str>) -> RoundCount {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return RoundCount::ONE;
        };

        self.0
            .get(token)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(token))
                    .map(|(_, count)| count)
            })
            .and_then(|&count| RoundCount::new(count))
            .unwrap_or(RoundCount::ONE)
    }

    pub fn entries(&self) -> &BTreeMap<String, u8> {
        &self.0
    }
}
