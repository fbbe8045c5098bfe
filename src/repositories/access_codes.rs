use sqlx::PgPool;
use time::OffsetDateTime;

use crate::db::models::AccessCode;

pub(crate) const COLUMNS: &str = "code, label, is_active, created_at";

pub(crate) async fn find_active(
    pool: &PgPool,
    code: &str,
) -> Result<Option<AccessCode>, sqlx::Error> {
    sqlx::query_as::<_, AccessCode>(&format!(
        "SELECT {COLUMNS} FROM access_codes WHERE code = $1 AND is_active = TRUE"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn upsert(
    pool: &PgPool,
    code: &str,
    label: Option<&str>,
    is_active: bool,
    now: OffsetDateTime,
) -> Result<AccessCode, sqlx::Error> {
    sqlx::query_as::<_, AccessCode>(&format!(
        "INSERT INTO access_codes (code, label, is_active, created_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (code) DO UPDATE SET label = EXCLUDED.label, \
             is_active = EXCLUDED.is_active \
         RETURNING {COLUMNS}"
    ))
    .bind(code)
    .bind(label)
    .bind(is_active)
    .bind(now)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::now_utc;
    use crate::test_support;
    use uuid::Uuid;

    #[tokio::test]
    async fn upsert_controls_code_visibility() {
        let Some(pool) = test_support::live_pool().await else {
            eprintln!("skipping access code test, no test database configured");
            return;
        };

        let code = format!("SEED-{}", Uuid::new_v4());

        upsert(&pool, &code, Some("seeded"), true, now_utc()).await.expect("insert");
        let found = find_active(&pool, &code).await.expect("lookup");
        assert_eq!(found.map(|row| row.code), Some(code.clone()));

        upsert(&pool, &code, Some("seeded"), false, now_utc()).await.expect("deactivate");
        assert!(find_active(&pool, &code).await.expect("lookup").is_none());
    }
}
