//! Composition of post listings.
//!
//! Every listing (index, category page, profile page, detail lookup) runs the
//! same joined select; they differ only in the filter conditions.

use blogicum_common::{
    model::{
        Id,
        category::CategoryMarker,
        post::PostMarker,
        user::UserMarker,
    },
    pagination::PageWindow,
};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

const POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.text,
        posts.pub_date,
        posts.image,
        posts.is_published,
        posts.created_at,
        users.user_snowflake,
        users.username,
        users.first_name,
        users.last_name,
        users.is_staff,
        users.joined_at,
        categories.category_snowflake,
        categories.title AS category_title,
        categories.description AS category_description,
        categories.slug AS category_slug,
        categories.is_published AS category_is_published,
        categories.created_at AS category_created_at,
        locations.location_snowflake,
        locations.name AS location_name,
        locations.is_published AS location_is_published,
        locations.created_at AS location_created_at,
        (
            SELECT COUNT(*)
            FROM blog.comments
            WHERE comments.post_snowflake = posts.post_snowflake
        ) AS comment_count
    FROM
        blog.posts
        JOIN users.users ON users.user_snowflake = posts.author_snowflake
        LEFT JOIN blog.categories ON categories.category_snowflake = posts.category_snowflake
        LEFT JOIN blog.locations ON locations.location_snowflake = posts.location_snowflake
    WHERE TRUE";

const POST_COUNT: &str = "
    SELECT COUNT(*)
    FROM
        blog.posts
        LEFT JOIN blog.categories ON categories.category_snowflake = posts.category_snowflake
    WHERE TRUE";

const POST_ORDER: &str = " ORDER BY posts.pub_date DESC, posts.title ASC";

/// Which posts a listing includes.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFilter {
    /// Only posts that are publicly visible at this instant.
    pub visible_at: Option<OffsetDateTime>,
    pub author: Option<Id<UserMarker>>,
    pub category: Option<Id<CategoryMarker>>,
    pub post: Option<Id<PostMarker>>,
}

impl PostFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visible_at(now: OffsetDateTime) -> Self {
        Self {
            visible_at: Some(now),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_author(self, author: Id<UserMarker>) -> Self {
        Self {
            author: Some(author),
            ..self
        }
    }

    #[must_use]
    pub fn in_category(self, category: Id<CategoryMarker>) -> Self {
        Self {
            category: Some(category),
            ..self
        }
    }

    #[must_use]
    pub fn with_id(self, post: Id<PostMarker>) -> Self {
        Self {
            post: Some(post),
            ..self
        }
    }

    fn push_conditions(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        if let Some(now) = self.visible_at {
            // A missing category joins as NULL, which also fails the check.
            builder
                .push(" AND posts.is_published AND posts.pub_date <= ")
                .push_bind(now)
                .push(" AND categories.is_published");
        }
        if let Some(author) = self.author {
            builder
                .push(" AND posts.author_snowflake = ")
                .push_bind(author.to_db());
        }
        if let Some(category) = self.category {
            builder
                .push(" AND posts.category_snowflake = ")
                .push_bind(category.to_db());
        }
        if let Some(post) = self.post {
            builder
                .push(" AND posts.post_snowflake = ")
                .push_bind(post.to_db());
        }
    }

    pub(crate) fn select_query(&self, window: Option<&PageWindow>) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(POST_SELECT);
        self.push_conditions(&mut builder);
        builder.push(POST_ORDER);

        if let Some(window) = window {
            builder
                .push(" LIMIT ")
                .push_bind(window.limit().cast_signed())
                .push(" OFFSET ")
                .push_bind(window.offset().cast_signed());
        }

        builder
    }

    pub(crate) fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(POST_COUNT);
        self.push_conditions(&mut builder);
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::PostFilter;
    use blogicum_common::{
        model::Id,
        pagination::{PageQuery, PageWindow},
    };
    use time::macros::datetime;

    #[test]
    fn unfiltered_listing_has_no_conditions() {
        let builder = PostFilter::all().select_query(None);
        let sql = builder.sql();

        assert!(sql.trim_end().ends_with("ORDER BY posts.pub_date DESC, posts.title ASC"));
        assert!(!sql.contains("$1"));
    }

    #[test]
    fn visibility_checks_post_date_and_category() {
        let builder = PostFilter::visible_at(datetime!(2025-06-01 12:00 UTC)).count_query();
        let sql = builder.sql();

        assert!(sql.contains(
            "AND posts.is_published AND posts.pub_date <= $1 AND categories.is_published"
        ));
    }

    #[test]
    fn conditions_are_numbered_in_order() {
        let builder = PostFilter::visible_at(datetime!(2025-06-01 12:00 UTC))
            .in_category(Id::from(7))
            .by_author(Id::from(3))
            .select_query(None);
        let sql = builder.sql();

        assert!(sql.contains("posts.pub_date <= $1"));
        assert!(sql.contains("posts.author_snowflake = $2"));
        assert!(sql.contains("posts.category_snowflake = $3"));
    }

    #[test]
    fn paging_goes_after_ordering() {
        let window = PageWindow::resolve(&PageQuery::new("2"), 30, 10);
        let builder = PostFilter::all().by_author(Id::from(3)).select_query(Some(&window));
        let sql = builder.sql();

        let order = sql.find("ORDER BY").unwrap();
        let limit = sql.find("LIMIT $2 OFFSET $3").unwrap();
        assert!(order < limit);
    }
}
