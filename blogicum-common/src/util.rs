use thiserror::Error;
use time::Duration;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

/// Counts characters, not bytes.
pub(crate) fn char_len_within(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Declares a `String` newtype that can only hold values accepted by `$check`.
///
/// Deserialization runs the same check, so request bodies are validated while
/// they are parsed.
macro_rules! validated_text {
    ($(#[$meta:meta])* $name:ident, $error:ident, $expected:literal, $check:expr) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, ::thiserror::Error)]
        #[error("Invalid {}: {:?}", $expected, .0)]
        pub struct $error(pub String);

        impl $name {
            pub fn new(value: String) -> Result<Self, $error> {
                let check: fn(&str) -> bool = $check;
                if check(&value) {
                    Ok(Self(value))
                } else {
                    Err($error(value))
                }
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = <String as ::serde::Deserialize<'de>>::deserialize(deserializer)?;
                $name::new(inner).map_err(|err| {
                    ::serde::de::Error::invalid_value(
                        ::serde::de::Unexpected::Str(&err.0),
                        &$expected,
                    )
                })
            }
        }
    };
}

pub(crate) use validated_text;

#[cfg(test)]
mod tests {
    use super::{PositiveDuration, char_len_within, is_blank};
    use time::Duration;

    #[test]
    fn positive_duration() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::try_from(Duration::seconds(-5)).is_err());
    }

    #[test]
    fn length_counts_characters() {
        assert!(char_len_within("Екатеринбург", 12));
        assert!(!char_len_within("Екатеринбург", 11));
        assert!(is_blank(" \n\t"));
        assert!(!is_blank(" a "));
    }
}
