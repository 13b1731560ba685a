use crate::{
    model::{
        FormError, Id, ShortText,
        auth::{IssuedToken, Password},
    },
    util::{char_len_within, validated_text},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const USERNAME_MAX_LEN: usize = 150;
pub const PERSONAL_NAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

validated_text!(
    /// Login name: Latin letters and digits only.
    Username,
    InvalidUsernameError,
    "username of at most 150 Latin letters and digits",
    |value| {
        !value.is_empty()
            && char_len_within(value, USERNAME_MAX_LEN)
            && value.chars().all(|c| c.is_ascii_alphanumeric())
    }
);

validated_text!(
    PersonalName,
    InvalidPersonalNameError,
    "name of at most 150 characters",
    |value| char_len_within(value, PERSONAL_NAME_MAX_LEN)
);

validated_text!(Email, InvalidEmailError, "email address", is_plausible_email);

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    value.len() <= EMAIL_MAX_LEN
        && !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Public view of an account.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub first_name: PersonalName,
    pub last_name: PersonalName,
    pub is_staff: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// Conference participant fields layered on top of the account.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ParticipantDetails {
    pub email: Option<Email>,
    pub is_speaker: Option<bool>,
    pub full_name: Option<ShortText>,
    pub organisation: Option<ShortText>,
    pub phone: Option<ShortText>,
    pub abstract_file: Option<ShortText>,
    pub give_personal_data: bool,
}

/// The account as its owner sees it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Participant {
    #[serde(flatten)]
    pub user: User,
    #[serde(flatten)]
    pub details: ParticipantDetails,
}

/// Editable profile fields. Also the shared part of the registration form.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ProfileForm {
    pub username: Username,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default = "empty_name")]
    pub first_name: PersonalName,
    #[serde(default = "empty_name")]
    pub last_name: PersonalName,
    #[serde(default)]
    pub is_speaker: Option<bool>,
    #[serde(default)]
    pub full_name: Option<ShortText>,
    #[serde(default)]
    pub organisation: Option<ShortText>,
    #[serde(default)]
    pub phone: Option<ShortText>,
    #[serde(default)]
    pub abstract_file: Option<ShortText>,
}

fn empty_name() -> PersonalName {
    PersonalName(String::new())
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct RegistrationForm {
    #[serde(flatten)]
    pub profile: ProfileForm,
    pub password: Password,
    pub password_confirmation: Password,
    #[serde(default)]
    pub give_personal_data: bool,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.password != self.password_confirmation {
            return Err(FormError::PasswordMismatch);
        }
        if self.password.resembles(&self.profile.username) {
            return Err(FormError::PasswordTooSimilar);
        }
        if !self.give_personal_data {
            return Err(FormError::PersonalDataConsentMissing);
        }

        Ok(())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Registered {
    pub profile: Participant,
    #[serde(flatten)]
    pub token: IssuedToken,
}
