use anyhow::Result;
use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Create the sqlx pool shared by raw queries and the ORM.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Wrap an existing pool in a SeaORM connection.
pub fn orm_from_pool(pool: DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Rewrites `?` placeholders into Postgres `$n` parameters.
///
/// Question marks inside single-quoted literals are left alone, and a doubled
/// quote (`''`) inside a literal does not end it.
pub fn to_postgres(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_literal = false;
    let mut n = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_postgres;

    #[test]
    fn numbers_placeholders_in_order() {
        assert_eq!(
            to_postgres("SELECT * FROM orders WHERE status = ? AND created_at >= ?"),
            "SELECT * FROM orders WHERE status = $1 AND created_at >= $2"
        );
    }

    #[test]
    fn skips_question_marks_in_literals() {
        assert_eq!(
            to_postgres("SELECT '?' AS q, name FROM users WHERE email = ?"),
            "SELECT '?' AS q, name FROM users WHERE email = $1"
        );
        assert_eq!(
            to_postgres("SELECT 'it''s ?' WHERE a = ?"),
            "SELECT 'it''s ?' WHERE a = $1"
        );
    }

    #[test]
    fn leaves_queries_without_placeholders_untouched() {
        let sql = "SELECT count(*) FROM products";
        assert_eq!(to_postgres(sql), sql);
    }
}
