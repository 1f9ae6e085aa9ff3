//! Aggregate table DDL.
//!
//! The binary and the integration tests create tables through the
//! migrations under `migrations/`; [`create_table_sql`] produces the same
//! shape for aggregates added at runtime.

use sqlx::PgPool;
use tessera_core::aggregate::Aggregate;
use tessera_core::error::DomainError;

/// Quotes a table name as a `PostgreSQL` identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL creating the table of an aggregate collection.
#[must_use]
pub fn create_table_sql(collection: &str) -> String {
    let table = quote_ident(collection);
    format!(
        r"
CREATE TABLE IF NOT EXISTS {table} (
    id          UUID PRIMARY KEY,
    document    JSONB NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"
    )
}

/// Creates the table of `A` if it does not exist.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the statement fails.
pub async fn ensure_table<A: Aggregate>(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::query(&create_table_sql(A::COLLECTION))
        .execute(pool)
        .await
        .map_err(|e| DomainError::infrastructure("create_table", A::COLLECTION, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_create_table_sql_names_table_and_columns() {
        let sql = create_table_sql("outbox_events");

        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"outbox_events\""));
        assert!(sql.contains("document    JSONB NOT NULL"));
    }
}
