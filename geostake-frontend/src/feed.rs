use tracing::{trace, warn};

use geostake_core::geometry::Point2;
use geostake_engine::fix::{FixType, Observation};
use geostake_engine::transform::CoordinateTransform;

/// 模拟观测的历元间隔（毫秒）。
pub const EPOCH_INTERVAL_MS: u64 = 1_000;

/// 模拟 GNSS 观测流：从起点直线走向终点，每个历元一条观测，最后一个历元恰好落在终点。
/// 首个历元为单点解，随后浮点解，后半程为固定解。
pub struct SimulatedFeed<'a> {
    transform: &'a dyn CoordinateTransform,
    from: (Point2, f64),
    to: (Point2, f64),
    epochs: usize,
    step: usize,
    start_epoch_ms: u64,
}

impl<'a> SimulatedFeed<'a> {
    pub fn new(
        transform: &'a dyn CoordinateTransform,
        from: (Point2, f64),
        to: (Point2, f64),
        epochs: usize,
    ) -> Self {
        Self {
            transform,
            from,
            to,
            epochs: epochs.max(1),
            step: 0,
            start_epoch_ms: 1_700_000_000_000,
        }
    }

    fn fix_for(&self, step: usize) -> FixType {
        if step == 0 {
            FixType::Single
        } else if step * 2 < self.epochs {
            FixType::RtkFloat
        } else {
            FixType::RtkFix
        }
    }
}

impl Iterator for SimulatedFeed<'_> {
    type Item = Observation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.epochs {
            return None;
        }
        let step = self.step;
        self.step += 1;

        let t = if self.epochs == 1 {
            1.0
        } else {
            step as f64 / (self.epochs - 1) as f64
        };
        let (from, from_height) = self.from;
        let (to, to_height) = self.to;
        let local = from.translate(from.vector_to(to).scale(t));
        let height = from_height + (to_height - from_height) * t;
        let fix_type = self.fix_for(step);

        let mut observation = match self.transform.inverse(local.x(), local.y()) {
            Ok((lat, lon)) => Observation::at(fix_type, lat, lon, Some(height)),
            Err(err) => {
                warn!(error = %err, "模拟观测反算失败，输出无解观测");
                Observation {
                    lat_deg: None,
                    lon_deg: None,
                    ..Observation::at(FixType::NoFix, 0.0, 0.0, None)
                }
            }
        };
        observation.epoch_ms = self.start_epoch_ms + step as u64 * EPOCH_INTERVAL_MS;
        observation.satellites_in_use = 18;
        if fix_type.is_rtk() {
            observation.hrms = Some(if fix_type == FixType::RtkFix { 0.012 } else { 0.25 });
            observation.vrms = Some(if fix_type == FixType::RtkFix { 0.02 } else { 0.4 });
            observation.pdop = Some(1.3);
        }
        trace!(step, fix = fix_type.describe(), "生成模拟观测");
        Some(observation)
    }
}

#[cfg(test)]
mod tests {
    use geostake_engine::transform::{LinearFallback, project_or_fallback};

    use super::*;

    #[test]
    fn feed_ends_exactly_on_target() {
        let feed = SimulatedFeed::new(
            &LinearFallback,
            (Point2::new(1000.0, 2000.0), 10.0),
            (Point2::new(1030.0, 2040.0), 12.0),
            5,
        );
        let observations: Vec<Observation> = feed.collect();
        assert_eq!(observations.len(), 5);
        assert_eq!(observations[0].fix_type, FixType::Single);
        assert_eq!(observations[4].fix_type, FixType::RtkFix);
        assert_eq!(observations[4].epoch_ms - observations[0].epoch_ms, 4_000);

        let (lat, lon) = observations[4].lat_lon().expect("fix");
        let last = project_or_fallback(&LinearFallback, lat, lon);
        assert!(last.distance_to(Point2::new(1030.0, 2040.0)) < 1e-6);
        assert_eq!(observations[4].ellipsoidal_height, Some(12.0));
    }
}
