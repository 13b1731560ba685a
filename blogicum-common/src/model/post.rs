use crate::model::{
    Body, Id, ShortText, Title,
    category::{Category, CategoryMarker},
    location::{Location, LocationMarker},
    published_by_default,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: Title,
    pub text: Body,
    /// A future value keeps the post hidden until then.
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: User,
    /// `None` once the category has been deleted.
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub image: Option<ShortText>,
    pub is_published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub comment_count: u64,
}

impl Post {
    /// Published, due, and filed under a published category.
    #[must_use]
    pub fn is_publicly_visible_at(&self, now: OffsetDateTime) -> bool {
        self.is_published
            && self.pub_date <= now
            && self
                .category
                .as_ref()
                .is_some_and(|category| category.is_published)
    }

    /// Authors always see their own posts.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<Id<UserMarker>>, now: OffsetDateTime) -> bool {
        self.is_authored_by(viewer) || self.is_publicly_visible_at(now)
    }

    #[must_use]
    pub fn is_authored_by(&self, user: Option<Id<UserMarker>>) -> bool {
        user == Some(self.author.id)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostForm {
    pub title: Title,
    pub text: Body,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub category: Id<CategoryMarker>,
    #[serde(default)]
    pub location: Option<Id<LocationMarker>>,
    #[serde(default)]
    pub image: Option<ShortText>,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
}

#[cfg(test)]
mod tests {
    use super::{Post, PostForm};
    use crate::model::{
        Body, Id, Title,
        category::{Category, CategorySlug},
        user::{PersonalName, User, Username},
    };
    use time::{Duration, OffsetDateTime, macros::datetime};

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn post() -> Post {
        Post {
            id: Id::from(10),
            title: Title::new("Programme announced".into()).unwrap(),
            text: Body::new("See you in Yekaterinburg.".into()).unwrap(),
            pub_date: NOW - Duration::days(1),
            author: User {
                id: Id::from(1),
                username: Username::new("organiser".into()).unwrap(),
                first_name: PersonalName::new(String::new()).unwrap(),
                last_name: PersonalName::new(String::new()).unwrap(),
                is_staff: true,
                joined_at: NOW - Duration::days(30),
            },
            category: Some(Category {
                id: Id::from(2),
                title: Title::new("News".into()).unwrap(),
                description: "Conference news".into(),
                slug: CategorySlug::new("news".into()).unwrap(),
                is_published: true,
                created_at: NOW - Duration::days(30),
            }),
            location: None,
            image: None,
            is_published: true,
            created_at: NOW - Duration::days(2),
            comment_count: 0,
        }
    }

    #[test]
    fn published_post_is_visible() {
        assert!(post().is_publicly_visible_at(NOW));
    }

    #[test]
    fn publish_date_is_inclusive() {
        let mut post = post();
        post.pub_date = NOW;
        assert!(post.is_publicly_visible_at(NOW));

        post.pub_date = NOW + Duration::seconds(1);
        assert!(!post.is_publicly_visible_at(NOW));
    }

    #[test]
    fn each_condition_hides_the_post() {
        let mut unpublished = post();
        unpublished.is_published = false;
        assert!(!unpublished.is_publicly_visible_at(NOW));

        let mut hidden_category = post();
        if let Some(category) = &mut hidden_category.category {
            category.is_published = false;
        }
        assert!(!hidden_category.is_publicly_visible_at(NOW));

        let mut uncategorised = post();
        uncategorised.category = None;
        assert!(!uncategorised.is_publicly_visible_at(NOW));
    }

    #[test]
    fn author_sees_hidden_post() {
        let mut draft = post();
        draft.is_published = false;

        assert!(draft.is_visible_to(Some(Id::from(1)), NOW));
        assert!(!draft.is_visible_to(Some(Id::from(99)), NOW));
        assert!(!draft.is_visible_to(None, NOW));
    }

    #[test]
    fn post_form_defaults() {
        let form: PostForm = serde_json::from_str(
            r#"{
                "title": "Venue",
                "text": "The venue has changed.",
                "pub_date": "2025-06-02T09:00:00Z",
                "category": 2
            }"#,
        )
        .unwrap();

        assert!(form.is_published);
        assert_eq!(form.location, None);
        assert_eq!(form.pub_date, datetime!(2025-06-02 09:00 UTC));
        assert_eq!(form.category, Id::from(2));
    }

    #[test]
    fn post_form_requires_category() {
        let parsed: Result<PostForm, _> = serde_json::from_str(
            r#"{"title": "Venue", "text": "Changed.", "pub_date": "2025-06-02T09:00:00Z"}"#,
        );
        assert!(parsed.is_err());
    }
}
