use blogicum_common::model::{
    Body, Id, ModelValidationError, ShortText, Title,
    auth::{Authentication, Credentials, PasswordDigest},
    category::{Category, CategorySlug},
    comment::Comment,
    location::Location,
    post::Post,
    user::{Email, Participant, ParticipantDetails, PersonalName, User, Username},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub joined_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ParticipantRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub email: Option<String>,
    pub is_speaker: Option<bool>,
    pub full_name: Option<String>,
    pub organisation: Option<String>,
    pub phone: Option<String>,
    pub abstract_file: Option<String>,
    pub give_personal_data: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub username: String,
    pub password_digest: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CategoryRecord {
    pub category_snowflake: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct LocationRecord {
    pub location_snowflake: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

/// A post joined with its author, category, location and comment count.
///
/// Category and location columns are all `NULL` when the reference is unset.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
    #[sqlx(flatten)]
    pub author: UserRecord,
    pub category_snowflake: Option<i64>,
    pub category_title: Option<String>,
    pub category_description: Option<String>,
    pub category_slug: Option<String>,
    pub category_is_published: Option<bool>,
    pub category_created_at: Option<OffsetDateTime>,
    pub location_snowflake: Option<i64>,
    pub location_name: Option<String>,
    pub location_is_published: Option<bool>,
    pub location_created_at: Option<OffsetDateTime>,
    pub comment_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    #[sqlx(flatten)]
    pub author: UserRecord,
}

fn optional_text(value: Option<String>) -> Result<Option<ShortText>, ModelValidationError> {
    Ok(value.map(ShortText::new).transpose()?)
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            username: Username::new(value.username)?,
            first_name: PersonalName::new(value.first_name)?,
            last_name: PersonalName::new(value.last_name)?,
            is_staff: value.is_staff,
            joined_at: value.joined_at,
        })
    }
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = ModelValidationError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user.try_into()?,
            details: ParticipantDetails {
                email: value.email.map(Email::new).transpose()?,
                is_speaker: value.is_speaker,
                full_name: optional_text(value.full_name)?,
                organisation: optional_text(value.organisation)?,
                phone: optional_text(value.phone)?,
                abstract_file: optional_text(value.abstract_file)?,
                give_personal_data: value.give_personal_data,
            },
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            username: Username::new(value.username)?,
            digest: PasswordDigest::from_stored(value.password_digest),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl TryFrom<CategoryRecord> for Category {
    type Error = ModelValidationError;

    fn try_from(value: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.category_snowflake),
            title: Title::new(value.title)?,
            description: value.description,
            slug: CategorySlug::new(value.slug)?,
            is_published: value.is_published,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<LocationRecord> for Location {
    type Error = ModelValidationError;

    fn try_from(value: LocationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.location_snowflake),
            name: Title::new(value.name)?,
            is_published: value.is_published,
            created_at: value.created_at,
        })
    }
}

impl FullPostRecord {
    fn category(&mut self) -> Option<CategoryRecord> {
        Some(CategoryRecord {
            category_snowflake: self.category_snowflake?,
            title: self.category_title.take()?,
            description: self.category_description.take()?,
            slug: self.category_slug.take()?,
            is_published: self.category_is_published?,
            created_at: self.category_created_at?,
        })
    }

    fn location(&mut self) -> Option<LocationRecord> {
        Some(LocationRecord {
            location_snowflake: self.location_snowflake?,
            name: self.location_name.take()?,
            is_published: self.location_is_published?,
            created_at: self.location_created_at?,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(mut value: FullPostRecord) -> Result<Self, Self::Error> {
        let category = value.category().map(Category::try_from).transpose()?;
        let location = value.location().map(Location::try_from).transpose()?;
        let comment_count = u64::try_from(value.comment_count)
            .map_err(|_| ModelValidationError::NegativeCount(value.comment_count))?;

        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            title: Title::new(value.title)?,
            text: Body::new(value.text)?,
            pub_date: value.pub_date,
            author: value.author.try_into()?,
            category,
            location,
            image: optional_text(value.image)?,
            is_published: value.is_published,
            created_at: value.created_at,
            comment_count,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            author: value.author.try_into()?,
            text: Body::new(value.text)?,
            created_at: value.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FullPostRecord, UserRecord};
    use blogicum_common::model::{ModelValidationError, post::Post};
    use time::macros::datetime;

    fn record() -> FullPostRecord {
        FullPostRecord {
            post_snowflake: 100,
            title: "Opening session".into(),
            text: "Starts at nine.".into(),
            pub_date: datetime!(2025-05-01 09:00 UTC),
            image: None,
            is_published: true,
            created_at: datetime!(2025-04-01 09:00 UTC),
            author: UserRecord {
                user_snowflake: 1,
                username: "organiser".into(),
                first_name: String::new(),
                last_name: String::new(),
                is_staff: true,
                joined_at: datetime!(2025-01-02 00:00 UTC),
            },
            category_snowflake: Some(5),
            category_title: Some("Programme".into()),
            category_description: Some("Sessions".into()),
            category_slug: Some("programme".into()),
            category_is_published: Some(true),
            category_created_at: Some(datetime!(2025-01-03 00:00 UTC)),
            location_snowflake: None,
            location_name: None,
            location_is_published: None,
            location_created_at: None,
            comment_count: 3,
        }
    }

    #[test]
    fn joined_columns_build_nested_models() {
        let post = Post::try_from(record()).unwrap();

        assert_eq!(post.author.username.get(), "organiser");
        assert_eq!(
            post.category.map(|category| category.slug.into_inner()),
            Some("programme".to_owned())
        );
        assert_eq!(post.location, None);
        assert_eq!(post.comment_count, 3);
    }

    #[test]
    fn nulled_category_is_none() {
        let mut record = record();
        record.category_snowflake = None;
        record.category_title = None;
        record.category_description = None;
        record.category_slug = None;
        record.category_is_published = None;
        record.category_created_at = None;

        let post = Post::try_from(record).unwrap();
        assert_eq!(post.category, None);
    }

    #[test]
    fn invalid_rows_are_rejected() {
        let mut record = record();
        record.author.username = "not valid!".into();
        assert!(matches!(
            Post::try_from(record),
            Err(ModelValidationError::Username(_))
        ));
    }
}
