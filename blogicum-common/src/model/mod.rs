pub mod auth;
pub mod category;
pub mod comment;
pub mod location;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, InvalidPasswordError},
        category::InvalidCategorySlugError,
        user::{InvalidEmailError, InvalidPersonalNameError, InvalidUsernameError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::{NonPositiveDurationError, char_len_within, is_blank, validated_text},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

pub const TITLE_MAX_LEN: usize = 256;
pub const SHORT_TEXT_MAX_LEN: usize = 256;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    PersonalName(#[from] InvalidPersonalNameError),
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    Password(#[from] InvalidPasswordError),
    #[error(transparent)]
    Title(#[from] InvalidTitleError),
    #[error(transparent)]
    Body(#[from] InvalidBodyError),
    #[error(transparent)]
    ShortText(#[from] InvalidShortTextError),
    #[error(transparent)]
    CategorySlug(#[from] InvalidCategorySlugError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error("Negative count: {0}")]
    NegativeCount(i64),
}

/// Cross-field checks that run after a form has been parsed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum FormError {
    #[error("The two password fields didn't match.")]
    PasswordMismatch,
    #[error("The password is too similar to the username.")]
    PasswordTooSimilar,
    #[error("Consent to the processing of personal data is required.")]
    PersonalDataConsentMissing,
}

validated_text!(
    /// Headline of a post or category, or the name of a location.
    Title,
    InvalidTitleError,
    "non-blank title of at most 256 characters",
    |value| !is_blank(value) && char_len_within(value, TITLE_MAX_LEN)
);

validated_text!(
    /// Free text of a post or comment.
    Body,
    InvalidBodyError,
    "non-blank text",
    |value| !is_blank(value)
);

validated_text!(
    /// Optional profile fields and stored file references.
    ShortText,
    InvalidShortTextError,
    "text of at most 256 characters",
    |value| char_len_within(value, SHORT_TEXT_MAX_LEN)
);

pub(crate) fn published_by_default() -> bool {
    true
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct BlogicumEpoch;
impl Epoch for BlogicumEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type BlogicumSnowflake = Snowflake<BlogicumEpoch>;
pub type BlogicumSnowflakeGenerator = SnowflakeGenerator<BlogicumEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(BlogicumSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: BlogicumSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> BlogicumSnowflake {
        self.0
    }

    /// The value as stored in a `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<BlogicumSnowflake> for Id<Marker> {
    fn from(value: BlogicumSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(BlogicumSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
