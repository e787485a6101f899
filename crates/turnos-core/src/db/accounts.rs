//! Account database operations.

use rusqlite::{params, ErrorCode, OptionalExtension};

use super::{Database, DbError, DbResult};

/// A stored login account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

impl Database {
    /// Insert a new account. Fails with `Constraint` if the email is taken.
    pub fn insert_account(&self, account: &Account) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO accounts (uid, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                account.uid,
                account.email,
                account.password_hash,
                account.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Constraint(format!("account already exists: {}", account.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get an account by email.
    pub fn get_account_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        self.conn
            .query_row(
                r#"
                SELECT uid, email, password_hash, created_at
                FROM accounts
                WHERE email = ?
                "#,
                [email],
                |row| {
                    Ok(Account {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
