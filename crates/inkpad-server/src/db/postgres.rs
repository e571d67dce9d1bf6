use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use inkpad_core::{
    Collaborator, Mutation, NewNotebook, Notebook, NotebookError, SketchSnapshot, UserRef,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::models::{CollaboratorRow, NewUser, NotebookRow, Session, SketchRow, User};
use super::Store;
use crate::error::AppError;

const NOTEBOOK_COLUMNS: &str = r#"
    n.id, n.title, n.content, n.owner_id,
    u.username AS owner_username, u.email AS owner_email,
    n.created_at, n.updated_at
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Attach collaborators and sketch history to notebook rows
    async fn hydrate(&self, rows: Vec<NotebookRow>) -> Result<Vec<Notebook>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let collaborator_rows = sqlx::query_as::<_, CollaboratorRow>(
            r#"SELECT notebook_id, email, user_id, permission, status, invited_at
               FROM collaborators WHERE notebook_id = ANY($1) ORDER BY id"#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let sketch_rows = sqlx::query_as::<_, SketchRow>(
            r#"SELECT notebook_id, data, created_at
               FROM sketches WHERE notebook_id = ANY($1) ORDER BY id"#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut collaborators: HashMap<Uuid, Vec<Collaborator>> = HashMap::new();
        for row in collaborator_rows {
            let id = row.notebook_id;
            collaborators.entry(id).or_default().push(row.try_into()?);
        }
        let mut sketches: HashMap<Uuid, Vec<SketchSnapshot>> = HashMap::new();
        for row in sketch_rows {
            sketches.entry(row.notebook_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| Notebook {
                collaborators: collaborators.remove(&row.id).unwrap_or_default(),
                sketches: sketches.remove(&row.id).unwrap_or_default(),
                id: row.id,
                title: row.title,
                content: row.content,
                owner: UserRef {
                    id: row.owner_id,
                    username: row.owner_username,
                    email: row.owner_email,
                },
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn require_notebook(&self, id: Uuid) -> Result<Notebook, AppError> {
        self.get_notebook(id)
            .await?
            .ok_or_else(|| NotebookError::NotFound.into())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let result = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, username, password_hash)
               VALUES ($1, $2, $3, $4)
               RETURNING id, email, username, password_hash, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(AppError::BadRequest(
                "Email or username already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, created_at FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_session(&self, session: Session) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = $1"#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_notebook(
        &self,
        owner: &UserRef,
        draft: NewNotebook,
    ) -> Result<Notebook, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO notebooks (id, title, content, owner_id) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(owner.id)
        .execute(&self.pool)
        .await?;

        self.require_notebook(id).await
    }

    async fn get_notebook(&self, id: Uuid) -> Result<Option<Notebook>, AppError> {
        let row = sqlx::query_as::<_, NotebookRow>(&format!(
            "SELECT {} FROM notebooks n JOIN users u ON u.id = n.owner_id WHERE n.id = $1",
            NOTEBOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_notebooks_for(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<Notebook>, AppError> {
        let rows = sqlx::query_as::<_, NotebookRow>(&format!(
            r#"SELECT {} FROM notebooks n JOIN users u ON u.id = n.owner_id
               WHERE n.owner_id = $1
                  OR EXISTS (SELECT 1 FROM collaborators c
                             WHERE c.notebook_id = n.id AND c.email = $2)
               ORDER BY n.updated_at DESC"#,
            NOTEBOOK_COLUMNS
        ))
        .bind(user_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn apply_mutations(
        &self,
        id: Uuid,
        mutations: &[Mutation],
    ) -> Result<Notebook, AppError> {
        let mut tx = self.pool.begin().await?;

        // Takes the row lock first so concurrent appends keep a single order
        let touched = sqlx::query("UPDATE notebooks SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(NotebookError::NotFound.into());
        }

        for mutation in mutations {
            match mutation {
                Mutation::ReplaceContent(content) => {
                    sqlx::query("UPDATE notebooks SET content = $1 WHERE id = $2")
                        .bind(content)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                Mutation::AppendSketch(data) => {
                    sqlx::query("INSERT INTO sketches (notebook_id, data) VALUES ($1, $2)")
                        .bind(id)
                        .bind(data)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        self.require_notebook(id).await
    }

    async fn insert_collaborator(
        &self,
        id: Uuid,
        entry: &Collaborator,
    ) -> Result<Notebook, AppError> {
        let inserted = sqlx::query(
            r#"INSERT INTO collaborators (notebook_id, email, user_id, permission, status, invited_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (notebook_id, email) DO NOTHING"#,
        )
        .bind(id)
        .bind(&entry.email)
        .bind(entry.user_id)
        .bind(entry.permission.to_string())
        .bind(entry.status.to_string())
        .bind(entry.invited_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(NotebookError::AlreadyCollaborator(entry.email.clone()).into());
        }

        self.require_notebook(id).await
    }

    async fn mark_accepted(
        &self,
        id: Uuid,
        email: &str,
        user_id: Uuid,
    ) -> Result<Notebook, AppError> {
        let updated = sqlx::query(
            r#"UPDATE collaborators SET status = 'accepted', user_id = $3
               WHERE notebook_id = $1 AND email = $2"#,
        )
        .bind(id)
        .bind(email)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(NotebookError::InvitationNotFound(email.to_string()).into());
        }

        self.require_notebook(id).await
    }
}
