use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{RetentionRule, RuleType},
};

/// Repository for retention rules.
#[async_trait]
pub trait RuleRepo: Send + Sync {
    /// All active rules of one type, ordered by project then storage name
    /// so bucket grouping sees a stable order.
    async fn find_active_by_type(&self, rule_type: RuleType) -> DbResult<Vec<RetentionRule>>;
}
