use tracing::warn;

use geostake_core::geometry::Point2;

use crate::errors::EngineError;

/// 未配置投影时每度对应的米数（经纬度同值）。
pub const LINEAR_FALLBACK_M_PER_DEG: f64 = 111_000.0;
/// 局部平面投影的纬度每度米数。
pub const LOCAL_PLANE_M_PER_DEG: f64 = 111_320.0;

/// 经纬度与局部投影坐标（东, 北）之间的转换。
pub trait CoordinateTransform: Send + Sync {
    fn name(&self) -> &'static str;
    /// `(lat, lon)` -> `(easting, northing)`
    fn forward(&self, lat_deg: f64, lon_deg: f64) -> Result<(f64, f64), EngineError>;
    /// `(easting, northing)` -> `(lat, lon)`
    fn inverse(&self, easting: f64, northing: f64) -> Result<(f64, f64), EngineError>;
}

/// 线性近似：东 = 经度 × 111000，北 = 纬度 × 111000。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFallback;

impl LinearFallback {
    #[inline]
    pub fn project(lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        (
            lon_deg * LINEAR_FALLBACK_M_PER_DEG,
            lat_deg * LINEAR_FALLBACK_M_PER_DEG,
        )
    }
}

impl CoordinateTransform for LinearFallback {
    fn name(&self) -> &'static str {
        "linear_fallback"
    }

    fn forward(&self, lat_deg: f64, lon_deg: f64) -> Result<(f64, f64), EngineError> {
        Ok(Self::project(lat_deg, lon_deg))
    }

    fn inverse(&self, easting: f64, northing: f64) -> Result<(f64, f64), EngineError> {
        Ok((
            northing / LINEAR_FALLBACK_M_PER_DEG,
            easting / LINEAR_FALLBACK_M_PER_DEG,
        ))
    }
}

/// 以原点为中心的等距圆柱近似投影，经度方向按原点纬度余弦缩放。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPlaneProjector {
    origin_lat: f64,
    origin_lon: f64,
    false_easting: f64,
    false_northing: f64,
    lon_scale: f64,
}

impl LocalPlaneProjector {
    pub fn new(origin_lat: f64, origin_lon: f64) -> Result<Self, EngineError> {
        Self::with_false_origin(origin_lat, origin_lon, 0.0, 0.0)
    }

    pub fn with_false_origin(
        origin_lat: f64,
        origin_lon: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Result<Self, EngineError> {
        if !origin_lat.is_finite() || !origin_lon.is_finite() || origin_lat.abs() >= 90.0 {
            return Err(EngineError::Transform(format!(
                "invalid projection origin ({origin_lat}, {origin_lon})"
            )));
        }
        Ok(Self {
            origin_lat,
            origin_lon,
            false_easting,
            false_northing,
            lon_scale: LOCAL_PLANE_M_PER_DEG * origin_lat.to_radians().cos(),
        })
    }
}

impl CoordinateTransform for LocalPlaneProjector {
    fn name(&self) -> &'static str {
        "local_plane"
    }

    fn forward(&self, lat_deg: f64, lon_deg: f64) -> Result<(f64, f64), EngineError> {
        if !lat_deg.is_finite() || !lon_deg.is_finite() || lat_deg.abs() > 90.0 {
            return Err(EngineError::Transform(format!(
                "coordinate out of range ({lat_deg}, {lon_deg})"
            )));
        }
        Ok((
            self.false_easting + (lon_deg - self.origin_lon) * self.lon_scale,
            self.false_northing + (lat_deg - self.origin_lat) * LOCAL_PLANE_M_PER_DEG,
        ))
    }

    fn inverse(&self, easting: f64, northing: f64) -> Result<(f64, f64), EngineError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(EngineError::Transform(format!(
                "coordinate out of range ({easting}, {northing})"
            )));
        }
        Ok((
            self.origin_lat + (northing - self.false_northing) / LOCAL_PLANE_M_PER_DEG,
            self.origin_lon + (easting - self.false_easting) / self.lon_scale,
        ))
    }
}

/// 投影经纬度；转换失败时记录警告并退化为线性近似，调用方不会看到错误。
pub fn project_or_fallback(transform: &dyn CoordinateTransform, lat_deg: f64, lon_deg: f64) -> Point2 {
    let (e, n) = transform.forward(lat_deg, lon_deg).unwrap_or_else(|err| {
        warn!(
            transform = transform.name(),
            lat_deg,
            lon_deg,
            error = %err,
            "坐标转换失败，改用线性近似"
        );
        LinearFallback::project(lat_deg, lon_deg)
    });
    Point2::new(e, n)
}
