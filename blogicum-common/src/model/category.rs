use crate::{
    model::{Body, Id, Title, published_by_default},
    util::validated_text,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const CATEGORY_SLUG_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CategoryMarker;

validated_text!(
    /// URL identifier of a category: Latin letters, digits, `-` and `_`.
    CategorySlug,
    InvalidCategorySlugError,
    "slug of at most 50 Latin letters, digits, hyphens and underscores",
    |value| {
        !value.is_empty()
            && value.len() <= CATEGORY_SLUG_MAX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Category {
    pub id: Id<CategoryMarker>,
    pub title: Title,
    pub description: String,
    pub slug: CategorySlug,
    pub is_published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CategoryForm {
    pub title: Title,
    pub description: Body,
    pub slug: CategorySlug,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
}

#[cfg(test)]
mod tests {
    use super::{CategoryForm, CategorySlug};

    #[test]
    fn slugs() {
        assert!(CategorySlug::new("travel".into()).is_ok());
        assert!(CategorySlug::new("nuclear-power_2024".into()).is_ok());
        assert!(CategorySlug::new("путешествия".into()).is_err());
        assert!(CategorySlug::new("with space".into()).is_err());
        assert!(CategorySlug::new(String::new()).is_err());
        assert!(CategorySlug::new("s".repeat(51)).is_err());
    }

    #[test]
    fn categories_are_published_unless_told_otherwise() {
        let form: CategoryForm = serde_json::from_str(
            r#"{"title": "Travel", "description": "Trips and venues", "slug": "travel"}"#,
        )
        .unwrap();
        assert!(form.is_published);

        let form: CategoryForm = serde_json::from_str(
            r#"{"title": "Drafts", "description": "Hidden", "slug": "drafts", "is_published": false}"#,
        )
        .unwrap();
        assert!(!form.is_published);
    }
}
