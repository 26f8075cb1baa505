use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{
    error::Result,
    models::{post::Post, statistics::UserCounters, user::User},
};

/// Storage for users, their walls and their profile view counts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Inserts a user. Returns `false` if the email is already taken.
    async fn insert(&self, user: &User) -> Result<bool>;

    /// Replaces a user's password hash.
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<()>;

    /// Stores a post on `to_user`'s wall, with an optional media file name.
    async fn insert_post(
        &self,
        to_user: &str,
        from_user: &str,
        content: &str,
        media: Option<&str>,
    ) -> Result<()>;

    /// Lists the posts on `to_user`'s wall, newest first.
    async fn list_posts(&self, to_user: &str) -> Result<Vec<Post>>;

    /// Counts the posts on `to_user`'s wall.
    async fn count_posts(&self, to_user: &str) -> Result<i64>;

    /// Returns how many times `email`'s profile was viewed.
    async fn page_views(&self, email: &str) -> Result<i64>;

    /// Counts one more view of `email`'s profile.
    async fn record_page_view(&self, email: &str) -> Result<()>;

    /// Collects the live counters for `email`.
    async fn counters(&self, email: &str) -> Result<UserCounters> {
        Ok(UserCounters {
            posts: self.count_posts(email).await?,
            views: self.page_views(email).await?,
        })
    }
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        first_name: row.try_get("first_name")?,
        family_name: row.try_get("family_name")?,
        gender: row.try_get("gender")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
    })
}

/// A helper function to map a `tokio_postgres::Row` to a `Post`.
fn row_to_post(row: &Row) -> Result<Post> {
    Ok(Post {
        to_user: row.try_get("to_user")?,
        from_user: row.try_get("from_user")?,
        content: row.try_get("content")?,
        media: row.try_get("media")?,
        date_posted: row.try_get("date_posted")?,
    })
}

/// PostgreSQL-backed `UserRepository`.
///
/// Every call checks a client out of the pool; the client goes back when the
/// call returns, error paths included.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    /// Creates a new `PgUserRepository`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT email, password, first_name, family_name, gender, city, country
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn insert(&self, user: &User) -> Result<bool> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                r#"
                INSERT INTO users (email, password, first_name, family_name, gender, city, country)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (email) DO NOTHING
                "#,
                &[
                    &user.email,
                    &user.password,
                    &user.first_name,
                    &user.family_name,
                    &user.gender,
                    &user.city,
                    &user.country,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET password = $1 WHERE email = $2",
                &[&password_hash, &email],
            )
            .await?;
        Ok(())
    }

    async fn insert_post(
        &self,
        to_user: &str,
        from_user: &str,
        content: &str,
        media: Option<&str>,
    ) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO posts (to_user, from_user, content, media) VALUES ($1, $2, $3, $4)",
                &[&to_user, &from_user, &content, &media],
            )
            .await?;
        Ok(())
    }

    async fn list_posts(&self, to_user: &str) -> Result<Vec<Post>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT to_user, from_user, content, media, date_posted
                FROM posts
                WHERE to_user = $1
                ORDER BY date_posted DESC, id DESC
                "#,
                &[&to_user],
            )
            .await?;
        rows.iter().map(row_to_post).collect()
    }

    async fn count_posts(&self, to_user: &str) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) AS n FROM posts WHERE to_user = $1", &[&to_user])
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn page_views(&self, email: &str) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT number_views FROM page_views WHERE email = $1", &[&email])
            .await?;
        match row {
            Some(row) => Ok(row.try_get("number_views")?),
            None => Ok(0),
        }
    }

    async fn record_page_view(&self, email: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO page_views (email, number_views)
                VALUES ($1, 1)
                ON CONFLICT (email) DO UPDATE SET number_views = page_views.number_views + 1
                "#,
                &[&email],
            )
            .await?;
        Ok(())
    }
}
