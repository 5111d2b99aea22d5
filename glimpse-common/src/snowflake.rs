//! Module for working with snowflake IDs.
//!
//! A snowflake packs 42 bits of milliseconds since an [`Epoch`], a 5 bit worker id, a 5 bit
//! process id and a 12 bit sequence into a `u64`. IDs handed out by a single
//! [`SnowflakeGenerator`] strictly increase, so ordering by ID is ordering by insertion.
//!
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

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;

pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;

pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;

pub const SEQUENCE_OFFSET: u32 = 0;
pub const SEQUENCE_LENGTH: u32 = 12;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

const MAX_TIMESTAMP: u64 = mask(TIMESTAMP_LENGTH);
#[allow(clippy::cast_possible_truncation)]
const MAX_SEQUENCE: u16 = mask(SEQUENCE_LENGTH) as u16;

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    BeforeEpoch,
    #[error("Specified time does not fit into the snowflake timestamp.")]
    TooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake node id was out of range: {0}")]
pub struct NodeIdOutOfRangeError(u8);

macro_rules! node_id {
    ($name:ident, $length:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(u8);

        impl $name {
            #[must_use]
            pub fn new(id: u8) -> Option<Self> {
                (u64::from(id) <= mask($length)).then_some(Self(id))
            }

            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = NodeIdOutOfRangeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(NodeIdOutOfRangeError(value))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = u8::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

node_id!(WorkerId, WORKER_ID_LENGTH);
node_id!(ProcessId, PROCESS_ID_LENGTH);

fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimeError::BeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= MAX_TIMESTAMP)
        .ok_or(SnowflakeTimeError::TooLarge)
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

    /// `millis` and `sequence` are truncated to their field widths.
    #[must_use]
    pub fn from_parts(millis: u64, worker_id: WorkerId, process_id: ProcessId, sequence: u16) -> Self {
        let snowflake = (millis & MAX_TIMESTAMP) << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | (u64::from(sequence) & mask(SEQUENCE_LENGTH)) << SEQUENCE_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        (self.0 >> TIMESTAMP_OFFSET) & MAX_TIMESTAMP
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> WorkerId {
        WorkerId(((self.0 >> WORKER_ID_OFFSET) & mask(WORKER_ID_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> ProcessId {
        ProcessId(((self.0 >> PROCESS_ID_OFFSET) & mask(PROCESS_ID_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sequence(self) -> u16 {
        ((self.0 >> SEQUENCE_OFFSET) & mask(SEQUENCE_LENGTH)) as u16
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        // Fits: the timestamp field is 42 bits wide.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.millis().cast_signed())
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

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last_millis: Option<u64>,
    sequence: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last_millis: None,
            sequence: 0,
            phantom_data: PhantomData,
        }
    }

    /// If `time` is not after the previous call, the previous timestamp is reused and the
    /// sequence bumped. An exhausted sequence borrows the next millisecond, so IDs stay
    /// strictly increasing even when the clock stalls or steps backwards.
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let now = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let (millis, sequence) = match self.last_millis {
            Some(last) if now <= last && self.sequence < MAX_SEQUENCE => (last, self.sequence + 1),
            Some(last) if now <= last => (last + 1, 0),
            _ => (now, 0),
        };

        if millis > MAX_TIMESTAMP {
            return Err(SnowflakeTimeError::TooLarge);
        }

        self.last_millis = Some(millis);
        self.sequence = sequence;

        Ok(Snowflake::from_parts(
            millis,
            self.worker_id,
            self.process_id,
            sequence,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, MAX_SEQUENCE, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimeError,
        WorkerId,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-1-1 00:00);
    }

    fn generator() -> SnowflakeGenerator<MillennialEpoch> {
        SnowflakeGenerator::new(WorkerId::new(10).unwrap(), ProcessId::new(3).unwrap())
    }

    #[test]
    fn node_id_range() {
        for legal_id in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal_id).is_some());
            assert!(ProcessId::new(legal_id).is_some());
        }
        for illegal_id in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal_id).is_none());
            assert!(ProcessId::try_from(illegal_id).is_err());
        }
    }

    #[test]
    fn node_id_deserialize_rejects_out_of_range() {
        assert_eq!(
            serde_json::from_str::<WorkerId>("31").unwrap(),
            WorkerId::new(31).unwrap()
        );
        assert!(serde_json::from_str::<WorkerId>("32").is_err());
    }

    #[test]
    fn from_into_parts() {
        let worker_id = WorkerId::new(0b10101).unwrap();
        let process_id = ProcessId::new(0b10001).unwrap();

        let snowflake = Snowflake::<MillennialEpoch>::from_parts(1234, worker_id, process_id, 100);

        assert_eq!(snowflake.get(), (1234 << 22) | (0b10101 << 17) | (0b10001 << 12) | 100);
        assert_eq!(snowflake.millis(), 1234);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.sequence(), 100);
    }

    #[test]
    fn timestamp_round_trips_through_generator() {
        let time = utc_datetime!(2025-10-24 10:30);
        let snowflake = generator().generate_at(time).unwrap();

        assert_eq!(snowflake.created_at(), time);
    }

    #[test]
    fn time_before_epoch_is_rejected() {
        assert_eq!(
            generator().generate_at(MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)),
            Err(SnowflakeTimeError::BeforeEpoch)
        );
    }

    #[test]
    fn time_too_far_after_epoch_is_rejected() {
        assert_eq!(
            generator()
                .generate_at(MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)),
            Err(SnowflakeTimeError::TooLarge)
        );
    }

    #[test]
    fn same_millisecond_bumps_sequence() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = generator();

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();

        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert_eq!(first.millis(), second.millis());
        assert!(first < second);
    }

    #[test]
    fn clock_going_backwards_stays_monotonic() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = generator();

        let first = generator.generate_at(time).unwrap();
        let second = generator
            .generate_at(time - Duration::seconds(5))
            .unwrap();

        assert!(first < second);
        assert_eq!(second.millis(), first.millis());
    }

    #[test]
    fn exhausted_sequence_borrows_next_millisecond() {
        let time = utc_datetime!(2025-10-24 10:55);
        let mut generator = generator();

        let mut last = generator.generate_at(time).unwrap();
        for _ in 0..MAX_SEQUENCE {
            let next = generator.generate_at(time).unwrap();
            assert!(last < next);
            last = next;
        }
        assert_eq!(last.sequence(), MAX_SEQUENCE);

        let borrowed = generator.generate_at(time).unwrap();
        assert_eq!(borrowed.millis(), last.millis() + 1);
        assert_eq!(borrowed.sequence(), 0);
        assert!(last < borrowed);
    }
}
