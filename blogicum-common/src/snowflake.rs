//! Snowflake IDs for every stored entity.
//!
//! Layout, from the most significant bit: 42 bits of milliseconds since the
//! epoch, 5 bits worker id, 5 bits process id, 12 bits per-process increment.
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Debug, Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u64 = 22;
pub const TIMESTAMP_LENGTH: u64 = 42;

pub const WORKER_ID_OFFSET: u64 = 17;
pub const WORKER_ID_LENGTH: u64 = 5;

pub const PROCESS_ID_OFFSET: u64 = 12;
pub const PROCESS_ID_LENGTH: u64 = 5;

pub const INCREMENT_OFFSET: u64 = 0;
pub const INCREMENT_LENGTH: u64 = 12;

const fn part_mask(length: u64) -> u64 {
    (1 << length) - 1
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampFromDateTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range for creation: {0}")]
pub struct SnowflakePartOutOfRangeError<TInt>(TInt);

/// Declares a bounded integer that occupies `$length` bits of a snowflake
/// starting at `$offset`.
macro_rules! snowflake_part {
    ($name:ident: $repr:ty, offset = $offset:ident, len = $length:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        pub struct $name($repr);

        impl $name {
            #[must_use]
            pub fn new(id: $repr) -> Option<Self> {
                (u64::from(id) <= part_mask($length)).then_some(Self(id))
            }

            #[must_use]
            pub fn new_unchecked(id: $repr) -> Self {
                Self::new(id).expect(concat!(stringify!($name), " out of range."))
            }

            #[must_use]
            pub fn get(self) -> $repr {
                self.0
            }
        }

        impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for $name {
            fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
                #[allow(clippy::cast_possible_truncation)]
                let part = ((value.get() >> $offset) & part_mask($length)) as $repr;
                Self(part)
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = SnowflakePartOutOfRangeError<$repr>;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(SnowflakePartOutOfRangeError(value))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = <$repr as Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

snowflake_part!(WorkerId: u8, offset = WORKER_ID_OFFSET, len = WORKER_ID_LENGTH);
snowflake_part!(ProcessId: u8, offset = PROCESS_ID_OFFSET, len = PROCESS_ID_LENGTH);
snowflake_part!(SnowflakeIncrement: u16, offset = INCREMENT_OFFSET, len = INCREMENT_LENGTH);

impl SnowflakeIncrement {
    #[must_use]
    pub fn next(self) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let next = (self.0 + 1) & part_mask(INCREMENT_LENGTH) as u16;
        Self(next)
    }

    pub fn increment(&mut self) {
        *self = self.next();
    }
}

/// Milliseconds since `SnowflakeEpoch`, bounded to the timestamp bits.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnowflakeTimestamp<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn new(millis: u64) -> Option<Self> {
        (millis <= part_mask(TIMESTAMP_LENGTH)).then_some(Self(millis, PhantomData))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn from_time_unchecked(value: UtcDateTime) -> Self
    where
        SnowflakeEpoch: Epoch,
    {
        Self::try_from(value).expect("Cannot create timestamp.")
    }

    pub fn now() -> Result<Self, SnowflakeTimestampFromDateTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        Self::try_from(UtcDateTime::now())
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for SnowflakeTimestamp<SnowflakeEpoch> {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        Self(value.get() >> TIMESTAMP_OFFSET, PhantomData)
    }
}

impl<SnowflakeEpoch: Epoch> TryFrom<UtcDateTime> for SnowflakeTimestamp<SnowflakeEpoch> {
    type Error = SnowflakeTimestampFromDateTimeError;

    fn try_from(value: UtcDateTime) -> Result<Self, Self::Error> {
        let millis = (value - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        if millis < 0 {
            return Err(Self::Error::TimeBeforeEpoch);
        }
        let millis_u64 = u64::try_from(millis).map_err(|_| Self::Error::TimestampTooLarge)?;
        Self::new(millis_u64).ok_or(Self::Error::TimestampTooLarge)
    }
}

impl<SnowflakeEpoch: Epoch> From<SnowflakeTimestamp<SnowflakeEpoch>> for UtcDateTime {
    fn from(value: SnowflakeTimestamp<SnowflakeEpoch>) -> Self {
        // At most 42 bits, always fits an i64.
        #[allow(clippy::cast_possible_wrap)]
        let millis = value.0 as i64;
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp: SnowflakeTimestamp<SnowflakeEpoch>,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: SnowflakeIncrement,
    ) -> Self {
        let snowflake = timestamp.get() << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | u64::from(increment.get()) << INCREMENT_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp(self) -> SnowflakeTimestamp<SnowflakeEpoch> {
        self.into()
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        self.into()
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        self.into()
    }

    #[must_use]
    pub fn increment(self) -> SnowflakeIncrement {
        self.into()
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    next_increment: SnowflakeIncrement,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            next_increment: SnowflakeIncrement::default(),
            phantom_data: PhantomData,
        }
    }

    pub fn generate_at(&mut self, time: UtcDateTime) -> Snowflake<SnowflakeEpoch>
    where
        SnowflakeEpoch: Epoch,
    {
        let increment = self.next_increment;
        self.next_increment.increment();

        Snowflake::from_parts(
            SnowflakeTimestamp::from_time_unchecked(time),
            self.worker_id,
            self.process_id,
            increment,
        )
    }

    pub fn generate(&mut self) -> Snowflake<SnowflakeEpoch>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeIncrement, SnowflakeTimestamp,
        SnowflakeTimestampFromDateTimeError, WorkerId,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-01-01 00:00);
    }

    #[test]
    fn part_ranges() {
        assert!(SnowflakeTimestamp::<MillennialEpoch>::new(0x03FF_FFFF_FFFF).is_some());
        assert!(SnowflakeTimestamp::<MillennialEpoch>::new(0x0400_0000_0000).is_none());

        for legal_id in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal_id).is_some());
            assert!(ProcessId::new(legal_id).is_some());
        }
        for illegal_id in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal_id).is_none());
            assert!(ProcessId::new(illegal_id).is_none());
        }

        assert!(SnowflakeIncrement::new(0xFFF).is_some());
        assert!(SnowflakeIncrement::new(0x1000).is_none());
    }

    #[test]
    fn timestamp_bounds() {
        let inside = utc_datetime!(2025-10-24 10:00);
        let timestamp = SnowflakeTimestamp::<MillennialEpoch>::try_from(inside).unwrap();
        assert_eq!(UtcDateTime::from(timestamp), inside);

        assert_eq!(
            SnowflakeTimestamp::<MillennialEpoch>::try_from(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)
            ),
            Err(SnowflakeTimestampFromDateTimeError::TimeBeforeEpoch)
        );
        assert_eq!(
            SnowflakeTimestamp::<MillennialEpoch>::try_from(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeTimestampFromDateTimeError::TimestampTooLarge)
        );
    }

    #[test]
    fn increment_wraps() {
        let mut increment = SnowflakeIncrement::new_unchecked(0xFFE);
        increment.increment();
        assert_eq!(increment, SnowflakeIncrement::new_unchecked(0xFFF));
        increment.increment();
        assert_eq!(increment, SnowflakeIncrement::new_unchecked(0));
    }

    #[test]
    fn parts_survive_packing() {
        let timestamp = SnowflakeTimestamp::from_time_unchecked(utc_datetime!(2025-10-24 10:30));
        let worker_id = WorkerId::new_unchecked(0b10101);
        let process_id = ProcessId::new_unchecked(0b10001);
        let increment = SnowflakeIncrement::new_unchecked(100);

        let snowflake =
            Snowflake::<MillennialEpoch>::from_parts(timestamp, worker_id, process_id, increment);

        assert_eq!(snowflake.timestamp(), timestamp);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), increment);
    }

    #[test]
    fn generator_is_monotonic_within_a_millisecond() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(
            WorkerId::new_unchecked(10),
            ProcessId::new_unchecked(0),
        );

        let first = generator.generate_at(time);
        let second = generator.generate_at(time);
        let later = generator.generate_at(time + Duration::milliseconds(1));

        assert_eq!(first.increment(), SnowflakeIncrement::new_unchecked(0));
        assert_eq!(second.increment(), SnowflakeIncrement::new_unchecked(1));
        assert!(first < second);
        assert!(second < later);
    }
}
