//! Penalty calculation
//!
//! Converts drowsiness episodes and bucketed rapid-maneuver counts into
//! point penalties and combines them into a bounded session safety score.

use crate::bucket::bucket_samples;
use crate::types::{
    BucketDetail, DrivingSession, DrowsinessEvent, DrowsyEpisodeDetail, SessionScore,
    TelemetrySample, TimeBucket,
};

/// Perfect score before any penalties apply
pub const MAX_SCORE: u32 = 100;

/// Penalty points for one drowsiness episode.
///
/// Tier table, pure in the episode duration:
/// - under 5 s: 0
/// - 5-9 s: 1
/// - 10-49 s: 2
/// - 50 s and over: 10
pub fn drowsy_penalty(duration_sec: u32) -> u32 {
    if duration_sec < 5 {
        0
    } else if duration_sec < 10 {
        1
    } else if duration_sec < 50 {
        2
    } else {
        10
    }
}

/// Penalty points for a session's rapid maneuvers: the sum of every bucket's
/// accel + decel total.
///
/// This is a full pass-through sum with no cap or threshold, so it equals the
/// ungrouped accel + decel sum; the grouping only matters for the per-bucket
/// detail surfaced to callers.
pub fn rapid_penalty(buckets: &[TimeBucket]) -> u64 {
    buckets.iter().map(TimeBucket::total).sum()
}

/// `max(0, 100 - total_penalty)`.
pub fn apply_penalty(total_penalty: u64) -> u32 {
    u64::from(MAX_SCORE).saturating_sub(total_penalty) as u32
}

/// Score one session from its raw telemetry.
///
/// A session with no samples and no drowsiness events scores exactly
/// [`MAX_SCORE`].
pub fn score_session(
    session: &DrivingSession,
    samples: &[TelemetrySample],
    events: &[DrowsinessEvent],
) -> SessionScore {
    let mut drowsy_total = 0u32;
    let mut eye_closure_count = 0u64;
    let mut head_drop_count = 0u64;
    let mut yawn_count = 0u64;
    let mut drowsy_episodes = Vec::with_capacity(events.len());

    for event in events {
        let penalty = drowsy_penalty(event.duration_sec);
        drowsy_total += penalty;
        eye_closure_count += u64::from(event.eye_closure_count);
        head_drop_count += u64::from(event.head_drop_count);
        yawn_count += u64::from(event.yawn_count);
        drowsy_episodes.push(DrowsyEpisodeDetail {
            detected_at: event.detected_at,
            duration_sec: event.duration_sec,
            penalty,
            eye_closure_count: event.eye_closure_count,
            head_drop_count: event.head_drop_count,
            yawn_count: event.yawn_count,
        });
    }

    let buckets = bucket_samples(samples);
    let rapid_total = rapid_penalty(&buckets);
    let rapid_buckets: Vec<BucketDetail> = buckets
        .iter()
        .map(|b| BucketDetail {
            window: b.key.label(),
            accel_sum: b.accel_sum,
            decel_sum: b.decel_sum,
            total: b.total(),
        })
        .collect();
    let rapid_accel_total = buckets.iter().map(|b| b.accel_sum).sum();
    let rapid_decel_total = buckets.iter().map(|b| b.decel_sum).sum();

    let total_penalty = u64::from(drowsy_total) + rapid_total;

    SessionScore {
        session_id: session.session_id.clone(),
        vehicle_id: session.vehicle_id.clone(),
        safety_score: apply_penalty(total_penalty),
        drowsy_penalty: drowsy_total,
        rapid_penalty: rapid_total,
        total_penalty,
        eye_closure_count,
        head_drop_count,
        yawn_count,
        rapid_accel_total,
        rapid_decel_total,
        drowsy_episodes,
        rapid_buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_session() -> DrivingSession {
        DrivingSession {
            session_id: "s-1".to_string(),
            vehicle_id: "v-1".to_string(),
            ..Default::default()
        }
    }

    fn make_event(duration_sec: u32) -> DrowsinessEvent {
        DrowsinessEvent {
            session_id: "s-1".to_string(),
            duration_sec,
            eye_closure_count: 1,
            ..Default::default()
        }
    }

    fn make_sample(min: u32, accel: u32, decel: u32) -> TelemetrySample {
        TelemetrySample {
            session_id: "s-1".to_string(),
            captured_at: Some(Utc.with_ymd_and_hms(2024, 3, 15, 5, min, 0).unwrap()),
            rapid_accel: Some(accel),
            rapid_decel: Some(decel),
            ..Default::default()
        }
    }

    #[test]
    fn test_drowsy_penalty_tier_boundaries() {
        assert_eq!(drowsy_penalty(0), 0);
        assert_eq!(drowsy_penalty(4), 0);
        assert_eq!(drowsy_penalty(5), 1);
        assert_eq!(drowsy_penalty(9), 1);
        assert_eq!(drowsy_penalty(10), 2);
        assert_eq!(drowsy_penalty(49), 2);
        assert_eq!(drowsy_penalty(50), 10);
        assert_eq!(drowsy_penalty(3600), 10);
    }

    #[test]
    fn test_drowsy_penalty_is_monotonic() {
        let mut previous = 0;
        for duration in 0..120 {
            let penalty = drowsy_penalty(duration);
            assert!(penalty >= previous, "penalty dropped at {duration}s");
            previous = penalty;
        }
    }

    #[test]
    fn test_episode_sequence_example() {
        // durations [4, 5, 9, 10, 49, 50] -> penalties [0, 1, 1, 2, 2, 10]
        let events: Vec<DrowsinessEvent> = [4, 5, 9, 10, 49, 50].iter().map(|&d| make_event(d)).collect();
        let score = score_session(&make_session(), &[], &events);

        let penalties: Vec<u32> = score.drowsy_episodes.iter().map(|e| e.penalty).collect();
        assert_eq!(penalties, vec![0, 1, 1, 2, 2, 10]);
        assert_eq!(score.drowsy_penalty, 16);
        assert_eq!(score.safety_score, 84);
    }

    #[test]
    fn test_empty_session_scores_perfect() {
        let score = score_session(&make_session(), &[], &[]);
        assert_eq!(score.safety_score, MAX_SCORE);
        assert_eq!(score.total_penalty, 0);
        assert!(score.drowsy_episodes.is_empty());
        assert!(score.rapid_buckets.is_empty());
    }

    #[test]
    fn test_score_floors_at_zero() {
        // 21 episodes of 10 points each blow well past 100
        let events: Vec<DrowsinessEvent> = (0..21).map(|_| make_event(60)).collect();
        let score = score_session(&make_session(), &[], &events);
        assert_eq!(score.drowsy_penalty, 210);
        assert_eq!(score.safety_score, 0);
    }

    #[test]
    fn test_score_never_exceeds_bounds() {
        for penalty in [0u64, 1, 50, 99, 100, 101, 10_000] {
            let score = apply_penalty(penalty);
            assert!(score <= MAX_SCORE);
        }
        assert_eq!(apply_penalty(0), 100);
        assert_eq!(apply_penalty(100), 0);
        assert_eq!(apply_penalty(101), 0);
    }

    #[test]
    fn test_rapid_penalty_from_bucketed_samples() {
        // one bucket at 05:50 totalling 21, per the reference example
        let samples = vec![make_sample(55, 3, 3), make_sample(56, 2, 3), make_sample(57, 4, 6)];
        let score = score_session(&make_session(), &samples, &[]);

        assert_eq!(score.rapid_penalty, 21);
        assert_eq!(score.rapid_accel_total, 9);
        assert_eq!(score.rapid_decel_total, 12);
        assert_eq!(score.safety_score, 79);
        assert_eq!(score.rapid_buckets.len(), 1);
        assert_eq!(score.rapid_buckets[0].window, "05:50");
        assert_eq!(score.rapid_buckets[0].total, 21);
    }

    #[test]
    fn test_combined_penalties() {
        let samples = vec![make_sample(1, 2, 1), make_sample(12, 0, 2)];
        let events = vec![make_event(12)];
        let score = score_session(&make_session(), &samples, &events);

        assert_eq!(score.drowsy_penalty, 2);
        assert_eq!(score.rapid_penalty, 5);
        assert_eq!(score.total_penalty, 7);
        assert_eq!(score.safety_score, 93);
    }
}
