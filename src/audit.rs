use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Appends a row to `audit_logs`. Callers treat failures as warnings.
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Records a rejected payment callback. Logging failures are swallowed so the
/// callback can still be acknowledged.
pub async fn log_rejected_callback(pool: &DbPool, order_number: &str, client_ip: &str) {
    if let Err(err) = log_audit(
        pool,
        None,
        "payment_callback_rejected",
        Some("orders"),
        Some(serde_json::json!({
            "merchant_oid": order_number,
            "ip": client_ip,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
}
