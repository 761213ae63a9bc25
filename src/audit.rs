use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{AuditEntry, AuditStore};

/// Append an audit entry. A failed write is logged and swallowed so it never
/// fails the business operation that triggered it.
pub async fn record(
    audit: &dyn AuditStore,
    user_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        user_id,
        action: action.to_string(),
        resource: Some(resource.to_string()),
        metadata: Some(metadata),
        created_at: Utc::now(),
    };

    if let Err(err) = audit.append(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
