//! 点検回次数の解決
//!
//! 外部照会 → 様式区分トークン → 回次数。照会失敗は警告ログのみで1回次に倒す。

use crate::lookup::ClassificationLookup;
use inspection_common::{FormTypeTable, RoundCount};

pub struct RoundResolver<L> {
    lookup: L,
    table: FormTypeTable,
}

impl<L: ClassificationLookup> RoundResolver<L> {
    pub fn new(lookup: L, table: FormTypeTable) -> Self {
        Self { lookup, table }
    }

    /// 設備IDの回次数（1〜3、失敗時は1）
    pub async fn resolve(&self, equipment_id: &str) -> RoundCount {
        match self.lookup.form_type(equipment_id).await {
            Ok(token) => {
                let rounds = self.table.rounds_for(token.as_deref());
                tracing::debug!(equipment_id, token = ?token, rounds = rounds.get(), "rounds resolved");
                rounds
            }
            Err(e) => {
                tracing::warn!(equipment_id, error = %e, "classification lookup failed, falling back to 1 round");
                RoundCount::ONE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{NoClassification, StaticClassificationLookup};

    #[tokio::test]
    async fn test_resolve_known_token() {
        let lookup = StaticClassificationLookup::new().with_entry("EQ-1", "B").with_entry("EQ-2", "C");
        let resolver = RoundResolver::new(lookup, FormTypeTable::default());
        assert_eq!(resolver.resolve("EQ-1").await.get(), 2);
        assert_eq!(resolver.resolve("EQ-2").await.get(), 3);
    }

    #[tokio::test]
    async fn test_resolve_unknown_equipment_fails_open() {
        let resolver = RoundResolver::new(StaticClassificationLookup::new(), FormTypeTable::default());
        assert_eq!(resolver.resolve("EQ-404").await, RoundCount::ONE);
    }

    #[tokio::test]
    async fn test_resolve_unknown_token_fails_open() {
        let lookup = StaticClassificationLookup::uniform("UNKNOWN");
        let resolver = RoundResolver::new(lookup, FormTypeTable::default());
        assert_eq!(resolver.resolve("EQ-1").await, RoundCount::ONE);
    }

    #[tokio::test]
    async fn test_resolve_lookup_failure_fails_open() {
        let resolver = RoundResolver::new(NoClassification, FormTypeTable::default());
        assert_eq!(resolver.resolve("EQ-1").await.get(), 1);
    }
}
