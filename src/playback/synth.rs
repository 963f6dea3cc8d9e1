use rand::Rng;

use super::sample::Sample;
use crate::relay::meters_to_degrees;

pub const DEFAULT_SHADOW_OFFSET_M: f64 = 5.0;

/// Builds a stand-in history for a node without its own feed.
///
/// Every field is copied from `reference` except the position, which gets
/// independent uniform jitter of up to `max_offset_m` on each axis. The same
/// metres-per-degree factor is used for latitude and longitude. A
/// non-finite offset copies the reference unchanged.
pub fn synthesize<R: Rng + ?Sized>(reference: &[Sample], max_offset_m: f64, rng: &mut R) -> Vec<Sample> {
    let max = if max_offset_m.is_finite() {
        max_offset_m.abs()
    } else {
        log::warn!("Ignoring non-finite shadow offset {}", max_offset_m);
        0.0
    };

    reference
        .iter()
        .map(|s| {
            let lat_offset = meters_to_degrees(rng.gen_range(-max..=max));
            let lon_offset = meters_to_degrees(rng.gen_range(-max..=max));
            Sample {
                latitude: s.latitude + lat_offset,
                longitude: s.longitude + lon_offset,
                ..s.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::sample::sample_at;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn jitter_stays_within_bound() {
        let reference: Vec<Sample> = (0..5)
            .map(|i| sample_at(i, 36.75 + i as f64 * 0.001, 3.06))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);

        let out = synthesize(&reference, 5.0, &mut rng);

        assert_eq!(out.len(), 5);
        let bound = 5.0 / 111_000.0 + 1e-12;
        for (r, s) in reference.iter().zip(&out) {
            assert!((r.latitude - s.latitude).abs() <= bound);
            assert!((r.longitude - s.longitude).abs() <= bound);
        }
    }

    #[test]
    fn non_position_fields_are_copied() {
        let mut reference = sample_at(42, 36.75, 3.06);
        reference.speed_kmh = 12.5;
        reference.predicted_latitude = 36.8;
        reference.exit_probability = 1.0;
        reference.potential_connection_loss = 1.0;
        reference.obstacle_type = Some("building".into());
        let mut rng = StdRng::seed_from_u64(1);

        let out = synthesize(std::slice::from_ref(&reference), 5.0, &mut rng);
        let s = &out[0];

        assert_eq!(s.timestamp, 42);
        assert_eq!(s.speed_kmh, 12.5);
        assert_eq!(s.predicted_latitude, 36.8);
        assert_eq!(s.exit_probability, 1.0);
        assert_eq!(s.potential_connection_loss, 1.0);
        assert_eq!(s.obstacle_type.as_deref(), Some("building"));
    }

    #[test]
    fn zero_offset_reproduces_reference() {
        let reference = vec![sample_at(1, 36.75, 3.06)];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(synthesize(&reference, 0.0, &mut rng), reference);
    }

    #[test]
    fn non_finite_offset_does_not_panic() {
        let reference = vec![sample_at(1, 36.75, 3.06), sample_at(2, 36.76, 3.06)];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(synthesize(&reference, f64::NAN, &mut rng), reference);
        assert_eq!(synthesize(&reference, f64::INFINITY, &mut rng), reference);
    }
}
