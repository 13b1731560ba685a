use crate::{
    query::PostFilter,
    record::{
        AuthenticationRecord, CategoryRecord, CommentRecord, CredentialsRecord, FullPostRecord,
        LocationRecord, ParticipantRecord, UserRecord,
    },
};
use blogicum_common::{
    model::{
        BlogicumSnowflakeGenerator, Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, Credentials, PasswordDigest},
        category::{Category, CategoryForm, CategoryMarker, CategorySlug},
        comment::{Comment, CommentForm, CommentMarker},
        location::{Location, LocationForm, LocationMarker},
        post::{Post, PostForm, PostMarker},
        user::{Participant, ProfileForm, User, UserMarker, Username},
    },
    pagination::{PAGE_SIZE, Page, PageQuery, PageWindow},
    snowflake::{ProcessId, WorkerId},
};
use sqlx::{PgPool, migrate::Migrator, query, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A count did not fit the expected range: {0}")]
    Count(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether a `UNIQUE` constraint rejected the statement.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::Sqlx(sqlx::Error::Database(err)) if err.is_unique_violation())
    }
}

const USER_COLUMNS: &str = "
    users.user_snowflake,
    users.username,
    users.first_name,
    users.last_name,
    users.is_staff,
    users.joined_at";

const PARTICIPANT_COLUMNS: &str = "
    users.user_snowflake,
    users.username,
    users.first_name,
    users.last_name,
    users.is_staff,
    users.joined_at,
    users.email,
    users.is_speaker,
    users.full_name,
    users.organisation,
    users.phone,
    users.abstract_file,
    users.give_personal_data";

const CATEGORY_COLUMNS: &str = "
    categories.category_snowflake,
    categories.title,
    categories.description,
    categories.slug,
    categories.is_published,
    categories.created_at";

const LOCATION_COLUMNS: &str = "
    locations.location_snowflake,
    locations.name,
    locations.is_published,
    locations.created_at";

fn count_from_db(count: i64) -> Result<u64> {
    u64::try_from(count).map_err(|_| DbError::Count(count))
}

pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<BlogicumSnowflakeGenerator>,
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(BlogicumSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    fn next_id<Marker>(&self) -> Id<Marker> {
        self.snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .into()
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users.users WHERE users.user_snowflake = $1"
        ))
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users.users WHERE users.username = $1"
        ))
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_participant(&self, user_id: Id<UserMarker>) -> Result<Option<Participant>> {
        let record = query_as::<_, ParticipantRecord>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM users.users WHERE users.user_snowflake = $1"
        ))
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let participant = record.map(Participant::try_from).transpose()?;
        Ok(participant)
    }

    pub async fn fetch_credentials(&self, username: &str) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username,
                users.password_digest
            FROM
                users.users
            WHERE
                users.username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    pub async fn fetch_user_credentials(
        &self,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_snowflake,
                users.username,
                users.password_digest
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    /// Fails with a unique violation when the username is taken.
    pub async fn create_user(
        &self,
        profile: &ProfileForm,
        digest: &PasswordDigest,
        give_personal_data: bool,
    ) -> Result<Participant> {
        let user_id = self.next_id::<UserMarker>();

        let record = query_as::<_, ParticipantRecord>(&format!(
            "
            INSERT INTO users.users (
                user_snowflake, username, password_digest, first_name, last_name, email,
                is_speaker, full_name, organisation, phone, abstract_file, give_personal_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PARTICIPANT_COLUMNS}
            "
        ))
        .bind(user_id.to_db())
        .bind(profile.username.get())
        .bind(digest.get())
        .bind(profile.first_name.get())
        .bind(profile.last_name.get())
        .bind(profile.email.as_ref().map(|email| email.get()))
        .bind(profile.is_speaker)
        .bind(profile.full_name.as_ref().map(|text| text.get()))
        .bind(profile.organisation.as_ref().map(|text| text.get()))
        .bind(profile.phone.as_ref().map(|text| text.get()))
        .bind(profile.abstract_file.as_ref().map(|text| text.get()))
        .bind(give_personal_data)
        .fetch_one(&self.pool)
        .await?;

        debug!(%user_id, username = %profile.username, "Created user");
        Ok(record.try_into()?)
    }

    /// Fails with a unique violation when the new username is taken.
    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        profile: &ProfileForm,
    ) -> Result<Option<Participant>> {
        let record = query_as::<_, ParticipantRecord>(&format!(
            "
            UPDATE users.users
            SET
                username = $2,
                first_name = $3,
                last_name = $4,
                email = $5,
                is_speaker = $6,
                full_name = $7,
                organisation = $8,
                phone = $9,
                abstract_file = $10
            WHERE
                users.user_snowflake = $1
            RETURNING {PARTICIPANT_COLUMNS}
            "
        ))
        .bind(user_id.to_db())
        .bind(profile.username.get())
        .bind(profile.first_name.get())
        .bind(profile.last_name.get())
        .bind(profile.email.as_ref().map(|email| email.get()))
        .bind(profile.is_speaker)
        .bind(profile.full_name.as_ref().map(|text| text.get()))
        .bind(profile.organisation.as_ref().map(|text| text.get()))
        .bind(profile.phone.as_ref().map(|text| text.get()))
        .bind(profile.abstract_file.as_ref().map(|text| text.get()))
        .fetch_optional(&self.pool)
        .await?;

        let participant = record.map(Participant::try_from).transpose()?;
        Ok(participant)
    }

    pub async fn update_password(
        &self,
        user_id: Id<UserMarker>,
        digest: &PasswordDigest,
    ) -> Result<bool> {
        let result = query(
            "
            UPDATE users.users
            SET password_digest = $2
            WHERE users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .bind(digest.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.auth (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.to_db())
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth.user_snowflake,
                auth.token_hash,
                auth.created_at,
                auth.expires_after_seconds
            FROM
                users.auth
            WHERE
                auth.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM users.auth WHERE auth.token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every token of the user except `keep`.
    pub async fn delete_other_auths(
        &self,
        user_id: Id<UserMarker>,
        keep: &AuthTokenHash,
    ) -> Result<u64> {
        let result = query(
            "
            DELETE FROM users.auth
            WHERE auth.user_snowflake = $1 AND auth.token_hash <> $2
            ",
        )
        .bind(user_id.to_db())
        .bind(&keep.0[..])
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_expired_auths(&self, now: OffsetDateTime) -> Result<u64> {
        let result = query(
            "
            DELETE FROM users.auth
            WHERE
                auth.expires_after_seconds IS NOT NULL
                AND auth.created_at + auth.expires_after_seconds * INTERVAL '1 second' < $1
            ",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn fetch_category(&self, category_id: Id<CategoryMarker>) -> Result<Option<Category>> {
        let record = query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM blog.categories WHERE categories.category_snowflake = $1"
        ))
        .bind(category_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    pub async fn fetch_category_by_slug(&self, slug: &CategorySlug) -> Result<Option<Category>> {
        let record = query_as::<_, CategoryRecord>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM blog.categories WHERE categories.slug = $1"
        ))
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    pub async fn fetch_categories(&self, include_unpublished: bool) -> Result<Vec<Category>> {
        let records = query_as::<_, CategoryRecord>(&format!(
            "
            SELECT {CATEGORY_COLUMNS}
            FROM blog.categories
            WHERE $1 OR categories.is_published
            ORDER BY categories.title
            "
        ))
        .bind(include_unpublished)
        .fetch_all(&self.pool)
        .await?;

        let categories = records
            .into_iter()
            .map(Category::try_from)
            .collect::<Result<_, _>>()?;
        Ok(categories)
    }

    /// Fails with a unique violation when the slug is taken.
    pub async fn create_category(&self, category: &CategoryForm) -> Result<Category> {
        let category_id = self.next_id::<CategoryMarker>();

        let record = query_as::<_, CategoryRecord>(&format!(
            "
            INSERT INTO blog.categories (category_snowflake, title, description, slug, is_published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(category_id.to_db())
        .bind(category.title.get())
        .bind(category.description.get())
        .bind(category.slug.get())
        .bind(category.is_published)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    /// Fails with a unique violation when the new slug is taken.
    pub async fn update_category(
        &self,
        slug: &CategorySlug,
        category: &CategoryForm,
    ) -> Result<Option<Category>> {
        let record = query_as::<_, CategoryRecord>(&format!(
            "
            UPDATE blog.categories
            SET title = $2, description = $3, slug = $4, is_published = $5
            WHERE categories.slug = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(slug.get())
        .bind(category.title.get())
        .bind(category.description.get())
        .bind(category.slug.get())
        .bind(category.is_published)
        .fetch_optional(&self.pool)
        .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    /// Posts of the category keep existing without one.
    pub async fn delete_category(&self, slug: &CategorySlug) -> Result<bool> {
        let result = query("DELETE FROM blog.categories WHERE categories.slug = $1")
            .bind(slug.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_location(&self, location_id: Id<LocationMarker>) -> Result<Option<Location>> {
        let record = query_as::<_, LocationRecord>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM blog.locations WHERE locations.location_snowflake = $1"
        ))
        .bind(location_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let location = record.map(Location::try_from).transpose()?;
        Ok(location)
    }

    pub async fn fetch_locations(&self, include_unpublished: bool) -> Result<Vec<Location>> {
        let records = query_as::<_, LocationRecord>(&format!(
            "
            SELECT {LOCATION_COLUMNS}
            FROM blog.locations
            WHERE $1 OR locations.is_published
            ORDER BY locations.name
            "
        ))
        .bind(include_unpublished)
        .fetch_all(&self.pool)
        .await?;

        let locations = records
            .into_iter()
            .map(Location::try_from)
            .collect::<Result<_, _>>()?;
        Ok(locations)
    }

    pub async fn create_location(&self, location: &LocationForm) -> Result<Location> {
        let location_id = self.next_id::<LocationMarker>();

        let record = query_as::<_, LocationRecord>(&format!(
            "
            INSERT INTO blog.locations (location_snowflake, name, is_published)
            VALUES ($1, $2, $3)
            RETURNING {LOCATION_COLUMNS}
            "
        ))
        .bind(location_id.to_db())
        .bind(location.name.get())
        .bind(location.is_published)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    pub async fn update_location(
        &self,
        location_id: Id<LocationMarker>,
        location: &LocationForm,
    ) -> Result<Option<Location>> {
        let record = query_as::<_, LocationRecord>(&format!(
            "
            UPDATE blog.locations
            SET name = $2, is_published = $3
            WHERE locations.location_snowflake = $1
            RETURNING {LOCATION_COLUMNS}
            "
        ))
        .bind(location_id.to_db())
        .bind(location.name.get())
        .bind(location.is_published)
        .fetch_optional(&self.pool)
        .await?;

        let location = record.map(Location::try_from).transpose()?;
        Ok(location)
    }

    pub async fn delete_location(&self, location_id: Id<LocationMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.locations WHERE locations.location_snowflake = $1")
            .bind(location_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Looks the post up regardless of visibility.
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = PostFilter::all()
            .with_id(post_id)
            .select_query(None)
            .build_query_as::<FullPostRecord>()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn fetch_post_page(&self, filter: &PostFilter, page: &PageQuery) -> Result<Page<Post>> {
        let count = filter
            .count_query()
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        let window = PageWindow::resolve(page, count_from_db(count)?, PAGE_SIZE);

        let records = filter
            .select_query(Some(&window))
            .build_query_as::<FullPostRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(window, posts))
    }

    pub async fn create_post(&self, author: Id<UserMarker>, post: &PostForm) -> Result<Post> {
        let post_id = self.next_id::<PostMarker>();

        query(
            "
            INSERT INTO blog.posts (
                post_snowflake, title, text, pub_date, author_snowflake,
                category_snowflake, location_snowflake, image, is_published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(post_id.to_db())
        .bind(post.title.get())
        .bind(post.text.get())
        .bind(post.pub_date)
        .bind(author.to_db())
        .bind(post.category.to_db())
        .bind(post.location.map(Id::to_db))
        .bind(post.image.as_ref().map(|image| image.get()))
        .bind(post.is_published)
        .execute(&self.pool)
        .await?;

        debug!(%post_id, %author, "Created post");
        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    pub async fn update_post(&self, post_id: Id<PostMarker>, post: &PostForm) -> Result<Option<Post>> {
        let result = query(
            "
            UPDATE blog.posts
            SET
                title = $2,
                text = $3,
                pub_date = $4,
                category_snowflake = $5,
                location_snowflake = $6,
                image = $7,
                is_published = $8
            WHERE
                posts.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(post.title.get())
        .bind(post.text.get())
        .bind(post.pub_date)
        .bind(post.category.to_db())
        .bind(post.location.map(Id::to_db))
        .bind(post.image.as_ref().map(|image| image.get()))
        .bind(post.is_published)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(post_id).await
    }

    /// Comments of the post go with it.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.posts WHERE posts.post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
    ) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                {USER_COLUMNS}
            FROM
                blog.comments
                JOIN users.users ON users.user_snowflake = comments.author_snowflake
            WHERE
                comments.comment_snowflake = $1 AND comments.post_snowflake = $2
            "
        ))
        .bind(comment_id.to_db())
        .bind(post_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    pub async fn fetch_comment_page(
        &self,
        post_id: Id<PostMarker>,
        page: &PageQuery,
    ) -> Result<Page<Comment>> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blog.comments WHERE comments.post_snowflake = $1",
        )
        .bind(post_id.to_db())
        .fetch_one(&self.pool)
        .await?;
        let window = PageWindow::resolve(page, count_from_db(count)?, PAGE_SIZE);

        let records = query_as::<_, CommentRecord>(&format!(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                {USER_COLUMNS}
            FROM
                blog.comments
                JOIN users.users ON users.user_snowflake = comments.author_snowflake
            WHERE
                comments.post_snowflake = $1
            ORDER BY comments.created_at, comments.comment_snowflake
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(post_id.to_db())
        .bind(window.limit().cast_signed())
        .bind(window.offset().cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page::new(window, comments))
    }

    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        comment: &CommentForm,
    ) -> Result<Comment> {
        let comment_id = self.next_id::<CommentMarker>();

        let record = query_as::<_, CommentRecord>(&format!(
            "
            WITH comments AS (
                INSERT INTO blog.comments (comment_snowflake, text, post_snowflake, author_snowflake)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                {USER_COLUMNS}
            FROM
                comments
                JOIN users.users ON users.user_snowflake = comments.author_snowflake
            "
        ))
        .bind(comment_id.to_db())
        .bind(comment.text.get())
        .bind(post_id.to_db())
        .bind(author.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    pub async fn update_comment(
        &self,
        comment_id: Id<CommentMarker>,
        comment: &CommentForm,
    ) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "
            WITH comments AS (
                UPDATE blog.comments
                SET text = $2
                WHERE comments.comment_snowflake = $1
                RETURNING *
            )
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                {USER_COLUMNS}
            FROM
                comments
                JOIN users.users ON users.user_snowflake = comments.author_snowflake
            "
        ))
        .bind(comment_id.to_db())
        .bind(comment.text.get())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog.comments WHERE comments.comment_snowflake = $1")
            .bind(comment_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
