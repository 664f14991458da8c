use crate::{Database, DatabaseResult};
use sqlx::FromRow;

pub type UserDatabase = Database<User>;

/// This is a row in the `react_db` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
#[non_exhaustive]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    pub avatar: String,
}

impl UserDatabase {
    /// Creates the user table if it does not exist yet.
    ///
    /// `username` carries no unique index, registration checks for an
    /// existing row before inserting.
    pub async fn ensure_schema(&self) -> DatabaseResult<()> {
        let mut db = self.get_connection().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS react_db (
                id TEXT PRIMARY KEY NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                avatar TEXT NOT NULL DEFAULT 'default.png'
            )"#,
        )
        .execute(&mut db)
        .await?;

        Ok(())
    }

    pub async fn get_users(&self) -> DatabaseResult<Vec<User>> {
        let mut db = self.get_connection().await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password, avatar FROM react_db ORDER BY rowid",
        )
        .fetch_all(&mut db)
        .await?;

        Ok(users)
    }

    /// First user with the given username. An absent username matches nothing.
    pub async fn get_user_by_username(
        &self,
        username: Option<&str>,
    ) -> DatabaseResult<Option<User>> {
        let mut db = self.get_connection().await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, avatar FROM react_db WHERE username = ?1 ORDER BY rowid LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&mut db)
        .await?;

        Ok(user)
    }

    /// First user whose username and password both match exactly.
    pub async fn validate_user(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> DatabaseResult<Option<User>> {
        let mut db = self.get_connection().await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, avatar FROM react_db WHERE username = ?1 AND password = ?2 ORDER BY rowid LIMIT 1",
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&mut db)
        .await?;

        Ok(user)
    }

    /// Absent `username` or `password` violate the `NOT NULL` columns and
    /// come back as an error.
    pub async fn insert_user(
        &self,
        id: &str,
        username: Option<&str>,
        password: Option<&str>,
        avatar: &str,
    ) -> DatabaseResult<()> {
        let mut db = self.get_connection().await?;

        sqlx::query(
            "INSERT INTO react_db (id, username, password, avatar) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(username)
        .bind(password)
        .bind(avatar)
        .execute(&mut db)
        .await?;

        Ok(())
    }

    pub async fn update_password(&self, id: &str, password: Option<&str>) -> DatabaseResult<bool> {
        let mut db = self.get_connection().await?;

        let query_result = sqlx::query("UPDATE react_db SET password = ?1 WHERE id = ?2")
            .bind(password)
            .bind(id)
            .execute(&mut db)
            .await?;

        Ok(query_result.rows_affected() == 1)
    }

    pub async fn delete_user(&self, id: &str) -> DatabaseResult<bool> {
        let mut db = self.get_connection().await?;

        let query_result = sqlx::query("DELETE FROM react_db WHERE id = ?1")
            .bind(id)
            .execute(&mut db)
            .await?;

        Ok(query_result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, UserDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let addr = format!("sqlite://{}", dir.path().join("users.db").display());
        let db = UserDatabase::new(&addr, 1).await.unwrap();
        db.ensure_schema().await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn insert_and_list_in_insertion_order() {
        let (_dir, db) = test_db().await;

        for (id, name) in vec![("1", "carol"), ("2", "alice"), ("3", "bob")] {
            db.insert_user(id, Some(name), Some("pw"), "default.png")
                .await
                .unwrap();
        }

        let names: Vec<_> = db
            .get_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[tokio::test]
    async fn duplicate_usernames_are_not_rejected_by_the_table() {
        let (_dir, db) = test_db().await;

        db.insert_user("1", Some("dup"), Some("first"), "default.png")
            .await
            .unwrap();
        db.insert_user("2", Some("dup"), Some("second"), "default.png")
            .await
            .unwrap();

        assert_eq!(db.get_users().await.unwrap().len(), 2);
        let found = db.get_user_by_username(Some("dup")).await.unwrap().unwrap();
        assert_eq!(found.password, "first");
    }

    #[tokio::test]
    async fn validate_user_requires_exact_match() {
        let (_dir, db) = test_db().await;
        db.insert_user("1", Some("dave"), Some("Secret"), "a.png")
            .await
            .unwrap();

        assert!(db
            .validate_user(Some("dave"), Some("Secret"))
            .await
            .unwrap()
            .is_some());
        assert!(db
            .validate_user(Some("dave"), Some("secret"))
            .await
            .unwrap()
            .is_none());
        assert!(db
            .validate_user(Some("dave"), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn absent_username_matches_nothing() {
        let (_dir, db) = test_db().await;
        db.insert_user("1", Some("erin"), Some("pw"), "default.png")
            .await
            .unwrap();

        assert!(db.get_user_by_username(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_without_password_fails() {
        let (_dir, db) = test_db().await;

        assert!(db
            .insert_user("1", Some("frank"), None, "default.png")
            .await
            .is_err());
        assert!(db.get_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_by_id() {
        let (_dir, db) = test_db().await;
        db.insert_user("1", Some("gina"), Some("old"), "default.png")
            .await
            .unwrap();

        assert!(db.update_password("1", Some("new")).await.unwrap());
        let user = db.get_user_by_username(Some("gina")).await.unwrap().unwrap();
        assert_eq!(user.password, "new");

        assert!(db.delete_user("1").await.unwrap());
        assert!(!db.delete_user("1").await.unwrap());
        assert!(db.get_user_by_username(Some("gina")).await.unwrap().is_none());
    }
}
