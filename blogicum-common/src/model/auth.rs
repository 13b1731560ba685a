use crate::{
    model::{FormError, Id, user::{UserMarker, Username}},
    util::PositiveDuration,
};
use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::Error as _,
};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
    sync::LazyLock,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashError(argon2::password_hash::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// Bearer token handed to a client: `user_id:core:salt`, base64 parts.
///
/// Only the Argon2 hash of `core` (salted with `salt`) is ever stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        // Lifetimes past the representable range never expire.
        self.expires_after
            .and_then(|expires_after| self.created_at.checked_add(expires_after.get()))
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at < now)
    }
}

/// Stored login data of one account.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: Id<UserMarker>,
    pub username: Username,
    pub digest: PasswordDigest,
}

/// What a client receives after logging in or registering.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self {
            user_id,
            core,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Box<[u8]>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidAuthTokenHashError)?,
        ))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidPasswordError {
    #[error("The password must contain at least {PASSWORD_MIN_LEN} characters.")]
    TooShort,
    #[error("The password can't be entirely numeric.")]
    EntirelyNumeric,
}

/// A plaintext password that passed the strength rules. Never logged.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(InvalidPasswordError::TooShort);
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidPasswordError::EntirelyNumeric);
        }

        Ok(Self(password))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    /// Whether the password is just the username in another case.
    #[must_use]
    pub fn resembles(&self, username: &Username) -> bool {
        self.0.to_lowercase() == username.get().to_lowercase()
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(D::Error::custom)
    }
}

/// Argon2 PHC string of a password, as stored in the database.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(password: &Password) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let digest = Argon2::default()
            .hash_password(password.get().as_bytes(), &salt)
            .map_err(PasswordHashError)?
            .to_string();

        Ok(Self(digest))
    }

    #[must_use]
    pub fn from_stored(digest: String) -> Self {
        Self(digest)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, candidate: &str) -> Result<bool, PasswordHashError> {
        let parsed = PasswordHash::new(&self.0).map_err(PasswordHashError)?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordHashError(err)),
        }
    }
}

/// Stands in for the stored digest when a login names no existing user.
static ABSENT_USER_DIGEST: LazyLock<Result<PasswordDigest, PasswordHashError>> =
    LazyLock::new(|| PasswordDigest::new(&Password(String::from("no such user, no such password"))));

impl PasswordDigest {
    /// Spends the same Argon2 work as [`PasswordDigest::verify`] without any
    /// account, so a login for an unknown user takes as long as a wrong password.
    pub fn verify_absent(candidate: &str) -> Result<(), PasswordHashError> {
        let digest = ABSENT_USER_DIGEST.as_ref().map_err(Clone::clone)?;
        digest.verify(candidate)?;

        Ok(())
    }
}

impl Debug for PasswordDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordDigest").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl Debug for LoginForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password: Password,
    pub new_password_confirmation: Password,
}

impl Debug for PasswordChangeForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChangeForm")
            .field("old_password", &"[redacted]")
            .field("new_password", &self.new_password)
            .field("new_password_confirmation", &self.new_password_confirmation)
            .finish()
    }
}

impl PasswordChangeForm {
    pub fn validate(&self, username: &Username) -> Result<(), FormError> {
        if self.new_password != self.new_password_confirmation {
            return Err(FormError::PasswordMismatch);
        }
        if self.new_password.resembles(username) {
            return Err(FormError::PasswordTooSimilar);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AuthToken, AuthTokenDecodeError, Authentication, InvalidPasswordError, LoginForm,
        Password, PasswordChangeForm, PasswordDigest,
    };
    use crate::{model::Id, util::PositiveDuration};
    use time::{Duration, macros::datetime};

    #[test]
    fn token_string_parses_back() {
        let token = AuthToken::generate_random(Id::from(4_242));
        let parsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens() {
        assert_eq!(
            "12:abc".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "twelve:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "12:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn secrets_are_redacted() {
        let token = AuthToken::generate_random(Id::from(7));
        let debug = format!("{token:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains(&token.as_token_str()));

        let password = Password::new("correct horse".into()).unwrap();
        assert_eq!(format!("{password:?}"), "Password(\"[redacted]\")");
    }

    #[test]
    fn forms_redact_plaintext_passwords() {
        let login: LoginForm =
            serde_json::from_str(r#"{"username": "speaker", "password": "hunter2secret"}"#)
                .unwrap();
        let debug = format!("{login:?}");
        assert!(debug.contains("speaker"));
        assert!(!debug.contains("hunter2secret"));

        let change: PasswordChangeForm = serde_json::from_str(
            r#"{
                "old_password": "oldsecret99",
                "new_password": "newsecret99",
                "new_password_confirmation": "newsecret99"
            }"#,
        )
        .unwrap();
        let debug = format!("{change:?}");
        assert!(!debug.contains("oldsecret99"));
        assert!(!debug.contains("newsecret99"));
    }

    #[test]
    fn absent_user_check_does_the_hashing_work() {
        assert_eq!(PasswordDigest::verify_absent("whatever they typed"), Ok(()));
        assert_eq!(
            PasswordDigest::verify_absent("no such user, no such password"),
            Ok(())
        );
    }

    #[test]
    fn huge_lifetime_never_expires() {
        let created_at = datetime!(2025-03-01 12:00 UTC);
        let authentication = Authentication {
            user: Id::from(1),
            token_hash: AuthToken::generate_random(Id::from(1)).hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::hours(10_000_000_000)),
        };

        assert_eq!(authentication.expires_at(), None);
        assert!(!authentication.is_expired_at(created_at + Duration::days(3650)));
    }

    #[test]
    fn token_expiry() {
        let created_at = datetime!(2025-03-01 12:00 UTC);
        let mut authentication = Authentication {
            user: Id::from(1),
            token_hash: AuthToken::generate_random(Id::from(1)).hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::hours(1)),
        };

        assert!(!authentication.is_expired_at(created_at + Duration::minutes(59)));
        assert!(authentication.is_expired_at(created_at + Duration::minutes(61)));

        authentication.expires_after = None;
        assert!(!authentication.is_expired_at(created_at + Duration::days(3650)));
    }

    #[test]
    fn password_rules() {
        assert_eq!(
            Password::new("short".into()),
            Err(InvalidPasswordError::TooShort)
        );
        assert_eq!(
            Password::new("1234567890".into()),
            Err(InvalidPasswordError::EntirelyNumeric)
        );
        assert!(Password::new("12345678a".into()).is_ok());
    }

    #[test]
    fn password_digest_verifies() {
        let password = Password::new("correct horse".into()).unwrap();
        let digest = PasswordDigest::new(&password).unwrap();

        assert!(digest.get().starts_with("$argon2"));
        assert!(digest.verify("correct horse").unwrap());
        assert!(!digest.verify("battery staple").unwrap());

        let stored = PasswordDigest::from_stored(digest.get().to_owned());
        assert!(stored.verify("correct horse").unwrap());
    }
}
