//! Ten-minute time bucketing
//!
//! Groups a chronologically ordered telemetry sample stream into fixed
//! ten-minute wall-clock windows and sums the rapid-maneuver counts within
//! each window.

use crate::types::{BucketKey, TelemetrySample, TimeBucket};

/// Group a session's samples into ten-minute buckets.
///
/// The caller supplies samples in capture order; this function does not sort.
/// A bucket closes exactly when the key changes from the previous sample, so
/// an identical key reappearing later in an unsorted stream opens a second
/// bucket rather than merging into the first. Samples without a capture
/// timestamp are excluded entirely; missing incident counts add 0.
pub fn bucket_samples(samples: &[TelemetrySample]) -> Vec<TimeBucket> {
    let mut buckets = Vec::new();
    let mut current: Option<TimeBucket> = None;

    for sample in samples {
        let Some(ts) = sample.captured_at else {
            continue;
        };
        let key = BucketKey::from_timestamp(&ts);
        let accel = u64::from(sample.rapid_accel.unwrap_or(0));
        let decel = u64::from(sample.rapid_decel.unwrap_or(0));

        match &mut current {
            Some(bucket) if bucket.key == key => {
                bucket.accel_sum += accel;
                bucket.decel_sum += decel;
            }
            _ => {
                if let Some(closed) = current.take() {
                    buckets.push(closed);
                }
                current = Some(TimeBucket {
                    key,
                    accel_sum: accel,
                    decel_sum: decel,
                });
            }
        }
    }

    // flush the final open bucket
    if let Some(open) = current {
        buckets.push(open);
    }

    buckets
}
