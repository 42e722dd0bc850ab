//! Property-based tests for voting, staleness, cyclic scheduling and PID
//! output limits.

use safeflow_engine::prelude::*;
use safeflow_engine::{average, max, median, min, spread, vote};

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn votes() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(any::<i32>(), 1..=8)
    }

    proptest! {
        #[test]
        fn median_lies_between_min_and_max(values in votes()) {
            let m = median(&values);
            prop_assert!(m.is_some());
            let m = m.unwrap_or_default();
            prop_assert!(Some(m) >= min(&values));
            prop_assert!(Some(m) <= max(&values));
        }

        #[test]
        fn median_is_order_independent(mut values in votes()) {
            let before = median(&values);
            values.reverse();
            prop_assert_eq!(before, median(&values));
        }

        #[test]
        fn average_lies_between_min_and_max(values in votes()) {
            let a = average(&values);
            prop_assert!(a >= min(&values));
            prop_assert!(a <= max(&values));
        }

        #[test]
        fn spread_within_tolerance_is_consistent(
            base in -1_000_000i32..1_000_000,
            offsets in prop::collection::vec(0i32..100, 2..=8),
        ) {
            let values: Vec<i32> = offsets.iter().map(|o| base + o).collect();
            for method in [
                VotingMethod::Median,
                VotingMethod::Average,
                VotingMethod::Min,
                VotingMethod::Max,
                VotingMethod::Majority,
            ] {
                let outcome = vote(&values, method, 100, None);
                prop_assert_eq!(outcome.map(|o| o.status), Some(SignalStatus::Ok));
            }
        }

        #[test]
        fn spread_over_tolerance_is_inconsistent(values in votes(), tolerance in 1u32..1000) {
            prop_assume!(values.len() > 1);
            prop_assume!(spread(&values) > i64::from(tolerance));
            let outcome = vote(&values, VotingMethod::Median, tolerance, None);
            prop_assert_eq!(outcome.map(|o| o.status), Some(SignalStatus::Inconsistent));
        }

        #[test]
        fn cyclic_fires_on_period_multiples(
            period in 1_000u64..100_000,
            jitter in prop::collection::vec(0u64..500, 50),
        ) {
            let config = CyclicOutputConfig::new(SignalId::new(0), 1, period);
            let built = Engine::builder().with_cyclic_output(config).build();
            prop_assert!(built.is_ok());
            let Ok(mut engine) = built else {
                return Ok(());
            };

            let mut fired = 0u64;
            for (cycle, j) in (1u64..).zip(jitter.iter()) {
                let now = cycle * period + j;
                engine.step(now, &[]);
                fired += u64::try_from(engine.outputs().len()).unwrap_or(0);
            }
            let cycles = u64::try_from(jitter.len()).unwrap_or(0);
            prop_assert_eq!(fired, cycles);
            let next = engine.cyclic_outputs().first().map(|c| c.next_deadline());
            prop_assert_eq!(next, Some((cycles + 1) * period));
        }

        #[test]
        fn staleness_never_clears_without_event(
            threshold in 1u64..1_000_000,
            steps in prop::collection::vec(1u64..200_000, 1..40),
        ) {
            let built = Engine::builder()
                .with_signal(SignalConfig::stale_after(SignalId::new(0), threshold))
                .build();
            let Ok(mut engine) = built else {
                return Err(TestCaseError::fail("engine build failed"));
            };
            engine.step(0, &[Event::ok(SignalId::new(0), 1, 0)]);

            let mut now = 0u64;
            let mut timed_out = false;
            for dt in steps {
                now += dt;
                engine.step(now, &[]);
                let status = engine.signal(SignalId::new(0)).map(|s| s.status);
                if timed_out {
                    prop_assert_eq!(status, Some(SignalStatus::Timeout));
                }
                let expected_timeout = now > threshold;
                prop_assert_eq!(status == Some(SignalStatus::Timeout), expected_timeout);
                timed_out = expected_timeout;
            }
        }

        #[test]
        fn pid_output_stays_within_limits(
            gains in (any::<i32>(), any::<i32>(), any::<i32>()),
            limit in 0i32..100_000,
            samples in prop::collection::vec((any::<i32>(), any::<i32>()), 2..30),
        ) {
            let (kp, ki, kd) = gains;
            let built = Engine::builder()
                .with_pid(
                    PidConfig::new(SignalId::new(0), SignalId::new(1), SignalId::new(2))
                        .with_gains(kp, ki, kd)
                        .with_output_limits(-limit, limit)
                        .with_sample_time(1_000),
                )
                .build();
            let Ok(mut engine) = built else {
                return Err(TestCaseError::fail("engine build failed"));
            };

            let mut now = 0u64;
            for (setpoint, measurement) in samples {
                now += 1_000;
                engine.step(now, &[
                    Event::ok(SignalId::new(0), setpoint, now),
                    Event::ok(SignalId::new(1), measurement, now),
                ]);
                let out = engine.value(SignalId::new(2)).unwrap_or(i32::MAX);
                prop_assert!((-limit..=limit).contains(&out));
            }
        }
    }
}

mod quickcheck_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn bounded(values: Vec<i32>) -> Vec<i32> {
        values.into_iter().take(8).collect()
    }

    #[quickcheck]
    fn min_max_are_literal_extremes(values: Vec<i32>) -> bool {
        let values = bounded(values);
        min(&values) == values.iter().copied().min() && max(&values) == values.iter().copied().max()
    }

    #[quickcheck]
    fn vote_is_none_only_when_empty(values: Vec<i32>, tolerance: u32) -> bool {
        let values = bounded(values);
        vote(&values, VotingMethod::Majority, tolerance, None).is_none() == values.is_empty()
    }

    #[quickcheck]
    fn merge_never_publishes_without_valid_input(values: Vec<i32>) -> bool {
        let values = bounded(values);
        let inputs: Vec<SignalId> = (0u8..8).map(SignalId::new).collect();
        let Ok(mut engine) = Engine::builder()
            .with_merge(MergeConfig::new(&inputs, SignalId::new(9), VotingMethod::Average))
            .build()
        else {
            return false;
        };
        engine.set_signal(SignalId::new(9), 4242, 0);

        let events: Vec<Event> = inputs
            .iter()
            .zip(values.iter().copied().chain(std::iter::repeat(0)))
            .map(|(&input, v)| Event::new(input, v, SignalStatus::Degraded, 1))
            .collect();
        engine.step(1, &events);

        engine.value(SignalId::new(9)) == Some(4242)
            && engine.signal(SignalId::new(9)).map(|s| s.status) == Some(SignalStatus::Error)
    }

    #[quickcheck]
    fn remap_invert_is_saturating(value: i32) -> bool {
        let remap = RemapConfig {
            invert: true,
            ..RemapConfig::new(SignalId::new(0), SignalId::new(1))
        };
        remap.apply(value) == value.saturating_neg()
    }
}
