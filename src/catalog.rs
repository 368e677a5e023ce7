//! 指摘事項カタログ・法令条項カタログ
//!
//! どちらもJSON配列のマスタファイルから読み込む。

use crate::error::{ChecklistError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 既知の指摘事項
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProblem {
    pub problem_id: String,
    pub problem_name: String,
    /// 選択時に不具合へコピーされる是正内容の初期値
    #[serde(default)]
    pub suggestion_text: String,
}

/// 法令条項（「その他」の指摘事項にのみ紐付ける）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalReference {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemCatalog {
    problems: Vec<CatalogProblem>,
}

impl ProblemCatalog {
    pub fn new(problems: Vec<CatalogProblem>) -> Self {
        Self { problems }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let problems: Vec<CatalogProblem> = serde_json::from_str(json)?;
        Ok(Self { problems })
    }

    pub fn find(&self, problem_id: &str) -> Option<&CatalogProblem> {
        self.problems.iter().find(|p| p.problem_id == problem_id)
    }

    pub fn get(&self, problem_id: &str) -> Result<&CatalogProblem> {
        self.find(problem_id)
            .ok_or_else(|| ChecklistError::CatalogEntry(problem_id.to_string()))
    }

    pub fn problems(&self) -> &[CatalogProblem] {
        &self.problems
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalCatalog {
    references: Vec<LegalReference>,
}

impl LegalCatalog {
    pub fn new(references: Vec<LegalReference>) -> Self {
        Self { references }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let references: Vec<LegalReference> = serde_json::from_str(json)?;
        Ok(Self { references })
    }

    pub fn find(&self, id: &str) -> Option<&LegalReference> {
        self.references.iter().find(|r| r.id == id)
    }

    pub fn references(&self) -> &[LegalReference] {
        &self.references
    }
}
