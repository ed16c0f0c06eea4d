use crate::{
    backoff::{backoff_for, Interrupter, WaitCounters},
    clock::{Clock, SystemClock},
    error::Error,
    identity::{check_datacenter_id, check_machine_id},
    snowflake_id::{EPOCH_MILLIS, MAX_TIMESTAMP, SEQUENCE_MASK},
    SnowflakeId,
};
use jiff::Timestamp;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Configures a Snowflake generator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct SnowflakeSettings {
    /// Datacenter index in the range `[0, 31]`.
    #[builder]
    pub datacenter_id: u8,
    /// Machine index within the datacenter, in the range `[0, 31]`.
    #[builder]
    pub machine_id: u8,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: Option<Timestamp>,
    sequence: u16,
}

/// Snowflake ID generator.
///
/// Ids are unique per `(datacenter_id, machine_id)` identity: the clock
/// read, the sequence update and the timestamp write happen under one
/// lock. A clock that moves backwards is reported, never papered over.
pub struct Snowflake<C: Clock> {
    datacenter_id: u8,
    machine_id: u8,
    clock: C,
    state: Mutex<GeneratorState>,
    waiters: WaitCounters,
    interrupter: Interrupter,
}

impl Snowflake<SystemClock> {
    /// Creates a generator backed by the real system clock.
    pub fn new(settings: SnowflakeSettings) -> Result<Self, Error> {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Snowflake<C> {
    pub fn with_clock(settings: SnowflakeSettings, clock: C) -> Result<Self, Error> {
        let datacenter_id = check_datacenter_id(settings.datacenter_id.into())?;
        let machine_id = check_machine_id(settings.machine_id.into())?;

        info!(datacenter_id, machine_id, "snowflake generator ready");

        Ok(Self {
            datacenter_id,
            machine_id,
            clock,
            state: Mutex::new(GeneratorState::default()),
            waiters: WaitCounters::default(),
            interrupter: Interrupter::default(),
        })
    }

    pub fn datacenter_id(&self) -> u8 {
        self.datacenter_id
    }

    pub fn machine_id(&self) -> u8 {
        self.machine_id
    }

    /// Handle that cancels a wait for the next millisecond.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Generates the next unique SnowflakeId.
    ///
    /// - if the clock is behind the last issued timestamp, fail with
    ///   [`Error::ClockMovedBackwards`]
    /// - if the per-millisecond sequence is exhausted, wait for the next
    ///   millisecond while still holding the lock
    ///
    /// State is only written once an id is certain to be returned, so a
    /// failed call never burns or reuses a sequence number.
    pub fn next_id(&self) -> Result<SnowflakeId, Error> {
        let mut state = self.state.lock().map_err(|_| Error::StatePoisoned)?;

        let mut now = self.clock.now();
        let mut sequence = 0;

        if let Some(last) = state.last_timestamp {
            let last_ms = last.as_millisecond();
            let now_ms = now.as_millisecond();

            if now_ms < last_ms {
                warn!(%last, %now, "clock moved backwards; refusing to generate id");
                return Err(Error::ClockMovedBackwards { last, now });
            }

            if now_ms == last_ms {
                sequence = (state.sequence + 1) & SEQUENCE_MASK;
                if sequence == 0 {
                    debug!(timestamp = last_ms, "sequence exhausted; waiting for next millisecond");
                    now = self.wait_for_next_millis(last_ms)?;
                }
            }
        }

        let elapsed = now.as_millisecond() - EPOCH_MILLIS;
        if elapsed < 0 {
            return Err(Error::BeforeEpoch {
                epoch: Timestamp::from_millisecond(EPOCH_MILLIS)
                    .expect("snowflake epoch is a valid timestamp"),
                now,
            });
        }
        if elapsed as u64 > MAX_TIMESTAMP {
            return Err(Error::OverTimeLimit);
        }

        let id = SnowflakeId::new()
            .with_timestamp(elapsed as u64)
            .with_datacenter_id(self.datacenter_id)
            .with_machine_id(self.machine_id)
            .with_sequence(sequence);

        state.last_timestamp = Some(now);
        state.sequence = sequence;

        Ok(id)
    }

    /// Re-polls the clock until it is strictly past `last_ms`, backing off
    /// according to how many callers wait on the same millisecond.
    ///
    /// The wait runs with the state lock held, so a single generator only
    /// ever has one waiter per millisecond and the back-off stays at its
    /// 1 ms floor.
    ///
    /// Only an interrupt sent after the wait starts cancels it.
    fn wait_for_next_millis(&self, last_ms: i64) -> Result<Timestamp, Error> {
        self.interrupter.reset();
        let backoff = backoff_for(self.waiters.enter(last_ms));

        let mut now = self.clock.now();
        let result = loop {
            if now.as_millisecond() > last_ms {
                break Ok(now);
            }
            if self.interrupter.take() {
                break Err(Error::Interrupted);
            }
            self.clock.sleep(backoff);
            now = self.clock.now();
        };

        self.waiters.release(last_ms);
        if result.is_ok() {
            debug!(timestamp = last_ms, ?backoff, "clock advanced past exhausted millisecond");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::TestClock;
    use crate::snowflake_id::MAX_DATACENTER_ID;
    use std::collections::HashSet;

    const CLOCK_MILLIS: i64 = EPOCH_MILLIS + 100_000;

    fn settings(datacenter_id: u8, machine_id: u8) -> SnowflakeSettings {
        SnowflakeSettings::builder()
            .datacenter_id(datacenter_id)
            .machine_id(machine_id)
            .build()
    }

    fn make_generator(datacenter_id: u8, machine_id: u8) -> (Snowflake<TestClock>, TestClock) {
        let clock = TestClock::at_millisecond(CLOCK_MILLIS);
        let generator =
            Snowflake::with_clock(settings(datacenter_id, machine_id), clock.clone()).unwrap();
        (generator, clock)
    }

    #[test]
    fn first_id_has_sequence_zero() {
        let (generator, _) = make_generator(0, 0);
        let id = generator.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn same_millisecond_increments_sequence() {
        let (generator, _) = make_generator(0, 0);
        let id0 = generator.next_id().unwrap();
        let id1 = generator.next_id().unwrap();
        let id2 = generator.next_id().unwrap();
        assert_eq!(id0.sequence(), 0);
        assert_eq!(id1.sequence(), 1);
        assert_eq!(id2.sequence(), 2);
        assert_eq!(id0.timestamp(), id2.timestamp());
    }

    #[test]
    fn new_millisecond_resets_sequence() {
        let (generator, clock) = make_generator(0, 0);
        generator.next_id().unwrap();
        generator.next_id().unwrap();
        clock.advance(5);
        let id = generator.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
        assert_eq!(id.timestamp(), 100_005);
    }

    #[test]
    fn identity_is_embedded() {
        let (generator, _) = make_generator(21, 7);
        let id = generator.next_id().unwrap();
        assert_eq!(id.datacenter_id(), 21);
        assert_eq!(id.machine_id(), 7);
        assert_eq!(generator.datacenter_id(), 21);
        assert_eq!(generator.machine_id(), 7);
    }

    #[test]
    fn timestamp_field_reflects_elapsed_millis() {
        let (generator, _) = make_generator(0, 0);
        let id = generator.next_id().unwrap();
        // elapsed = clock - epoch
        assert_eq!(id.timestamp(), 100_000);
        assert_eq!(id.created_at().as_millisecond(), CLOCK_MILLIS);
    }

    #[test]
    fn boundary_identities() {
        let clock = TestClock::at_millisecond(CLOCK_MILLIS);
        assert!(Snowflake::with_clock(settings(31, 31), clock.clone()).is_ok());

        let err = Snowflake::with_clock(settings(32, 0), clock.clone())
            .err()
            .unwrap();
        assert_eq!(
            err,
            Error::InvalidDatacenterId {
                datacenter_id: 32,
                max: MAX_DATACENTER_ID
            }
        );
        assert!(err.is_configuration());

        let err = Snowflake::with_clock(settings(0, 32), clock).err().unwrap();
        assert!(matches!(err, Error::InvalidMachineId { machine_id: 32, .. }));
    }

    #[test]
    fn clock_regression_is_refused() {
        let (generator, clock) = make_generator(0, 0);
        let first = generator.next_id().unwrap();

        clock.advance(-3);
        let err = generator.next_id().unwrap_err();
        assert!(matches!(err, Error::ClockMovedBackwards { .. }));
        assert!(!err.is_configuration());

        // once the clock catches up the generator resumes where it left off
        clock.advance(3);
        let next = generator.next_id().unwrap();
        assert_eq!(next.timestamp(), first.timestamp());
        assert_eq!(next.sequence(), 1);
    }

    #[test]
    fn sequence_overflow_advances_clock() {
        let (generator, clock) = make_generator(0, 0);
        let mut seen = HashSet::new();
        // Exhaust all 4096 IDs allocated to the current millisecond.
        for _ in 0..=SEQUENCE_MASK {
            let id = generator.next_id().unwrap();
            assert_eq!(id.timestamp(), 100_000);
            assert!(seen.insert((id.timestamp(), id.sequence())));
        }
        assert_eq!(clock.sleeps(), 0);

        // The 4097th call must wait for the next millisecond; sequence resets to 0.
        let id = generator.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
        assert_eq!(id.timestamp(), 100_001);
        assert!(seen.insert((id.timestamp(), id.sequence())));
        assert_eq!(clock.sleeps(), 1);
        assert_eq!(generator.waiters.len(), 0);
    }

    #[test]
    fn interrupted_wait_fails_without_reusing_sequence() {
        let clock = TestClock::frozen(Timestamp::from_millisecond(CLOCK_MILLIS).unwrap());
        let generator = Snowflake::with_clock(settings(0, 0), clock.clone()).unwrap();
        for _ in 0..=SEQUENCE_MASK {
            generator.next_id().unwrap();
        }

        let interrupter = generator.interrupter();
        let result = std::thread::scope(|scope| {
            let waiter = scope.spawn(|| generator.next_id());
            // the frozen clock keeps the waiter spinning until interrupted
            while clock.sleeps() == 0 {
                std::thread::yield_now();
            }
            interrupter.interrupt();
            waiter.join().unwrap()
        });
        assert_eq!(result, Err(Error::Interrupted));
        assert_eq!(generator.waiters.len(), 0);
        assert!(!generator.interrupter().is_interrupted());

        clock.advance(1);
        let id = generator.next_id().unwrap();
        assert_eq!(id.timestamp(), 100_001);
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn interrupt_sent_before_a_wait_does_not_cancel_it() {
        let (generator, clock) = make_generator(0, 0);
        generator.next_id().unwrap();
        generator.interrupter().interrupt();

        // a later, unrelated caller exhausts a millisecond and has to wait
        clock.advance(60_000);
        for _ in 0..=SEQUENCE_MASK {
            generator.next_id().unwrap();
        }
        let id = generator.next_id().unwrap();
        assert_eq!(id.timestamp(), 160_001);
        assert_eq!(id.sequence(), 0);
        assert!(!generator.interrupter().is_interrupted());
    }

    #[test]
    fn clock_before_epoch_returns_error() {
        let clock = TestClock::at_millisecond(EPOCH_MILLIS - 1);
        let generator = Snowflake::with_clock(settings(0, 0), clock).unwrap();
        assert!(matches!(generator.next_id(), Err(Error::BeforeEpoch { .. })));
    }

    #[test]
    fn overtime_limit_returns_error() {
        // Place the clock one millisecond past the 41-bit timestamp limit.
        let over_limit = EPOCH_MILLIS + MAX_TIMESTAMP as i64 + 1;
        let clock = TestClock::at_millisecond(over_limit);
        let generator = Snowflake::with_clock(settings(0, 0), clock.clone()).unwrap();
        assert_eq!(generator.next_id(), Err(Error::OverTimeLimit));

        clock.advance(-1);
        let id = generator.next_id().unwrap();
        assert_eq!(id.timestamp(), MAX_TIMESTAMP);
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let (generator, _) = make_generator(3, 4);
        let per_thread = 2_000;
        let threads = 8;

        let ids: Vec<SnowflakeId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        (0..per_thread)
                            .map(|_| generator.next_id().unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let unique: HashSet<u64> = ids.iter().map(|id| id.to_raw()).collect();
        assert_eq!(ids.len(), per_thread * threads);
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| id.datacenter_id() == 3 && id.machine_id() == 4));
    }

    #[test]
    fn different_identities_on_one_clock_are_disjoint() {
        let clock = TestClock::frozen(Timestamp::from_millisecond(CLOCK_MILLIS).unwrap());
        let a = Snowflake::with_clock(settings(1, 0), clock.clone()).unwrap();
        let b = Snowflake::with_clock(settings(0, 1), clock).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(a.next_id().unwrap().to_raw()));
            assert!(seen.insert(b.next_id().unwrap().to_raw()));
        }
    }
}
