//! 将配置文件中的数值转换为引擎使用的类型。

use tracing::warn;

use geostake_config::{DisplayConfig, ProjectionConfig, SnapConfig, StakeoutConfig};
use geostake_engine::errors::EngineError;
use geostake_engine::simplify::DisplaySimplification;
use geostake_engine::snap::{SnapMode, SnapSettings};
use geostake_engine::stakeout::{ToleranceAxis, Tolerances};
use geostake_engine::transform::{CoordinateTransform, LinearFallback, LocalPlaneProjector};

pub fn tolerances_from(config: &StakeoutConfig) -> Result<Tolerances, EngineError> {
    let mut tolerances = Tolerances::default()
        .with(ToleranceAxis::PointHorizontal, config.point_horizontal_tol)?
        .with(ToleranceAxis::PointVertical, config.point_vertical_tol)?
        .with(ToleranceAxis::LineLateral, config.line_lateral_tol)?
        .with(ToleranceAxis::LineChain, config.line_chain_tol)?
        .with(ToleranceAxis::RoadChain, config.road_chain_tol)?
        .with(ToleranceAxis::RoadLateral, config.road_lateral_tol)?
        .with(ToleranceAxis::RoadElevation, config.road_elevation_tol)?
        .with(ToleranceAxis::CadHorizontal, config.cad_horizontal_tol)?;
    tolerances.set_line_interval(config.line_interval)?;
    tolerances.set_road_interval(config.road_interval)?;
    Ok(tolerances)
}

pub fn snap_settings_from(config: &SnapConfig) -> Result<SnapSettings, EngineError> {
    let mut settings = SnapSettings::default();
    settings.enabled = config.enabled;
    settings.dynamic = config.dynamic;
    settings.mode = if config.world_mode {
        SnapMode::World
    } else {
        SnapMode::Pixel
    };
    settings.set_tolerance_px(config.tolerance_px)?;
    settings.set_world_tolerance_m(config.world_tolerance_m)?;
    Ok(settings)
}

pub fn simplification_from(config: &DisplayConfig) -> DisplaySimplification {
    DisplaySimplification {
        threshold: config.simplify_threshold,
        epsilon: config.simplify_epsilon,
    }
}

/// 未配置投影或投影参数无效时使用线性近似。
pub fn transform_from(projection: Option<&ProjectionConfig>) -> Box<dyn CoordinateTransform> {
    let Some(projection) = projection else {
        return Box::new(LinearFallback);
    };
    match LocalPlaneProjector::with_false_origin(
        projection.origin_lat,
        projection.origin_lon,
        projection.false_easting,
        projection.false_northing,
    ) {
        Ok(projector) => Box::new(projector),
        Err(err) => {
            warn!(error = %err, "投影参数无效，改用线性近似");
            Box::new(LinearFallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_reach_engine_types() {
        let config = StakeoutConfig {
            line_lateral_tol: 0.3,
            road_interval: 25.0,
            ..StakeoutConfig::default()
        };
        let tolerances = tolerances_from(&config).expect("valid tolerances");
        assert_eq!(tolerances.get(ToleranceAxis::LineLateral), 0.3);
        assert_eq!(tolerances.road_interval(), 25.0);

        let snap = snap_settings_from(&SnapConfig {
            world_mode: true,
            ..SnapConfig::default()
        })
        .expect("valid snap");
        assert_eq!(snap.mode, SnapMode::World);
        assert_eq!(snap.tolerance_px(), 24.0);
    }

    #[test]
    fn invalid_values_surface_engine_errors() {
        let config = StakeoutConfig {
            cad_horizontal_tol: -1.0,
            ..StakeoutConfig::default()
        };
        assert!(matches!(
            tolerances_from(&config),
            Err(EngineError::InvalidTolerance { axis: "cad_horizontal", .. })
        ));
    }

    #[test]
    fn transform_selection_follows_projection() {
        assert_eq!(transform_from(None).name(), "linear_fallback");
        let projection = ProjectionConfig {
            origin_lat: 41.0,
            origin_lon: 29.0,
            false_easting: 0.0,
            false_northing: 0.0,
        };
        assert_eq!(transform_from(Some(&projection)).name(), "local_plane");
        let broken = ProjectionConfig {
            origin_lat: 95.0,
            ..projection
        };
        assert_eq!(transform_from(Some(&broken)).name(), "linear_fallback");
    }
}
