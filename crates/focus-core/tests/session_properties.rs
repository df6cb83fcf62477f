//! Property tests for the session clock.

use chrono::{TimeZone, Utc};
use focus_core::{ManualClock, NullPlanner, Phase, Segment, SessionClock, SessionConfig};
use proptest::prelude::*;

fn config_strategy() -> impl Strategy<Value = SessionConfig> {
    (1u32..=60, 1u32..=30, 1u32..=45, 1u32..=8).prop_map(|(w, s, l, n)| SessionConfig {
        work_minutes: w,
        short_break_minutes: s,
        long_break_minutes: l,
        pomodoros_before_long_break: n,
    })
}

fn new_clock(config: SessionConfig) -> (SessionClock<ManualClock, NullPlanner>, ManualClock) {
    let time = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap());
    (SessionClock::new(config, time.clone(), NullPlanner), time)
}

proptest! {
    #[test]
    fn progress_always_within_unit_interval(
        config in config_strategy(),
        steps in prop::collection::vec(0i64..4000, 1..40),
    ) {
        let (mut clock, time) = new_clock(config);
        clock.start();
        for step in steps {
            time.advance_secs(step);
            clock.tick();
            let p = clock.progress();
            prop_assert!((0.0..=1.0).contains(&p), "progress {}", p);
            if !clock.is_running() {
                clock.start();
            }
        }
    }

    #[test]
    fn long_break_exactly_on_multiples_of_n(config in config_strategy(), rounds in 1u32..4) {
        let (mut clock, time) = new_clock(config);
        let n = config.pomodoros_before_long_break;
        let mut completed_work = 0u32;
        clock.start();

        while completed_work < rounds * n {
            let segment = clock.segment();
            time.advance_secs(config.duration_secs(segment) as i64);
            clock.tick();
            if segment == Segment::Work {
                completed_work += 1;
                let expected =
                    if completed_work % n == 0 { Phase::LongBreak } else { Phase::ShortBreak };
                prop_assert_eq!(clock.phase(), expected);
            }
            if !clock.is_running() {
                clock.start();
            }
        }
    }

    #[test]
    fn overdue_observation_moves_one_segment(
        config in config_strategy(),
        overdue_secs in 0i64..100_000,
    ) {
        let (mut clock, time) = new_clock(config);
        clock.start();
        time.advance_secs(config.duration_secs(Segment::Work) as i64 + overdue_secs);
        let events = clock.tick();
        prop_assert_eq!(events.iter().filter(|e| e.is_phase_change()).count(), 1);
        prop_assert_eq!(clock.cycles_completed(), 1);
        prop_assert_eq!(clock.remaining_secs(), config.duration_secs(clock.segment()));
    }

    #[test]
    fn pause_resume_without_elapsed_time_is_identity(
        config in config_strategy(),
        elapsed in 0i64..3600,
    ) {
        let (mut clock, time) = new_clock(config);
        clock.start();
        time.advance_secs(elapsed);
        clock.tick();
        let before = clock.remaining_secs();
        let phase = clock.phase();
        clock.pause();
        clock.resume();
        prop_assert_eq!(clock.remaining_secs(), before);
        prop_assert_eq!(clock.phase(), phase);
    }
}
