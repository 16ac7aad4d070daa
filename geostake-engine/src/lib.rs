pub mod alignment;
pub mod command;
pub mod hit_test;
pub mod session;
pub mod snap;
pub mod stakeout;
pub mod transform;
pub mod viewport;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum EngineError {
        #[error("tolerance `{axis}` must be positive, got {value}")]
        InvalidTolerance { axis: &'static str, value: f64 },
        #[error("station interval must be positive, got {0}")]
        InvalidInterval(f64),
        #[error("alignment length must be positive, got {0}")]
        InvalidLength(f64),
        #[error("alignment needs at least 2 vertices, got {0}")]
        AlignmentTooShort(usize),
        #[error("current position is not within tolerance")]
        NotWithinTolerance,
        #[error("stake point already saved for this target")]
        AlreadySaved,
        #[error("nothing to undo")]
        NothingToUndo,
        #[error("nothing to redo")]
        NothingToRedo,
        #[error("coordinate transform failed: {0}")]
        Transform(String),
    }
}

pub mod fix {
    use serde::{Deserialize, Serialize};

    /// GNSS 解算类型，`accuracy_level` 越高代表定位精度越好。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum FixType {
        NoFix,
        Single,
        Dgps,
        RtkFloat,
        RtkFix,
        Ppp,
        Manual,
    }

    impl FixType {
        #[inline]
        pub fn accuracy_level(self) -> u8 {
            match self {
                FixType::NoFix => 0,
                FixType::Single | FixType::Manual => 1,
                FixType::Dgps => 2,
                FixType::RtkFloat | FixType::Ppp => 3,
                FixType::RtkFix => 4,
            }
        }

        #[inline]
        pub fn is_rtk(self) -> bool {
            matches!(self, FixType::RtkFloat | FixType::RtkFix)
        }

        #[inline]
        pub fn is_differential(self) -> bool {
            self.accuracy_level() >= 2
        }

        pub fn describe(self) -> &'static str {
            match self {
                FixType::NoFix => "NO_FIX",
                FixType::Single => "SINGLE",
                FixType::Dgps => "DGPS",
                FixType::RtkFloat => "RTK_FLOAT",
                FixType::RtkFix => "RTK_FIX",
                FixType::Ppp => "PPP",
                FixType::Manual => "MANUAL",
            }
        }
    }

    /// 一次 GNSS 观测。经纬度缺失视为无解。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Observation {
        pub epoch_ms: u64,
        pub fix_type: FixType,
        pub lat_deg: Option<f64>,
        pub lon_deg: Option<f64>,
        pub ellipsoidal_height: Option<f64>,
        pub hrms: Option<f64>,
        pub vrms: Option<f64>,
        pub pdop: Option<f64>,
        pub satellites_in_use: u32,
    }

    impl Observation {
        /// 仅含经纬度与高程的观测，其余字段取空。
        pub fn at(fix_type: FixType, lat_deg: f64, lon_deg: f64, height: Option<f64>) -> Self {
            Self {
                epoch_ms: 0,
                fix_type,
                lat_deg: Some(lat_deg),
                lon_deg: Some(lon_deg),
                ellipsoidal_height: height,
                hrms: None,
                vrms: None,
                pdop: None,
                satellites_in_use: 0,
            }
        }

        /// 返回可用的经纬度；无解类型或缺失坐标返回 `None`。
        #[inline]
        pub fn lat_lon(&self) -> Option<(f64, f64)> {
            if self.fix_type == FixType::NoFix {
                return None;
            }
            match (self.lat_deg, self.lon_deg) {
                (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
                _ => None,
            }
        }

        #[inline]
        pub fn has_fix(&self) -> bool {
            self.lat_lon().is_some()
        }
    }

}

pub mod nearest {
    use serde::{Deserialize, Serialize};

    use geostake_core::entity::CadEntity;
    use geostake_core::geometry::angle::{angular_distance, bearing_deg, point_at, polar_deg};
    use geostake_core::geometry::Point2;

    /// 线段长度平方低于该值视为退化线段。
    pub const DEGENERATE_SEGMENT_EPSILON: f64 = 1e-12;
    /// 查询点与圆心距离低于该值时取 `center + (r, 0)`。
    pub const COINCIDENT_CENTER_EPSILON: f64 = 1e-6;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct SegmentProjection {
        pub point: Point2,
        /// 在线段上的参数位置，范围 `[0, 1]`。
        pub t: f64,
        pub distance: f64,
    }

    /// 点到线段的最近点，`t` 被限制在 `[0, 1]`。退化线段直接返回起点。
    pub fn project_on_segment(query: Point2, a: Point2, b: Point2) -> SegmentProjection {
        let ab = a.vector_to(b);
        let len2 = ab.length_squared();
        if len2 < DEGENERATE_SEGMENT_EPSILON {
            return SegmentProjection {
                point: a,
                t: 0.0,
                distance: query.distance_to(a),
            };
        }
        let t = (a.vector_to(query).dot(ab) / len2).clamp(0.0, 1.0);
        let point = a.translate(ab.scale(t));
        SegmentProjection {
            point,
            t,
            distance: query.distance_to(point),
        }
    }

    /// 依次扫描折线各段（闭合且超过两点时追加闭合段），距离相同时保留先出现的段。
    /// 返回最近点与所在段序号；空点列返回 `None`。
    pub fn nearest_on_path(
        points: &[Point2],
        closed: bool,
        query: Point2,
    ) -> Option<(usize, SegmentProjection)> {
        match points {
            [] => None,
            [single] => Some((
                0,
                SegmentProjection {
                    point: *single,
                    t: 0.0,
                    distance: query.distance_to(*single),
                },
            )),
            _ => {
                let closing = (closed && points.len() > 2)
                    .then(|| (points[points.len() - 1], points[0]));
                points
                    .windows(2)
                    .map(|pair| (pair[0], pair[1]))
                    .chain(closing)
                    .map(|(a, b)| project_on_segment(query, a, b))
                    .enumerate()
                    .fold(None, |best: Option<(usize, SegmentProjection)>, (index, hit)| {
                        match best {
                            Some((_, current)) if current.distance <= hit.distance => best,
                            _ => Some((index, hit)),
                        }
                    })
            }
        }
    }

    /// 实体上距离查询点最近的点。
    ///
    /// 圆弧角度采用数学约定（自东向逆时针），查询方向落在扫掠区间外时取角距较小的端点，
    /// 相等时取起点。无顶点的折线/多边形返回查询点本身。
    pub fn nearest_point_on_entity(entity: &CadEntity, query: Point2) -> Point2 {
        match entity {
            CadEntity::Line(line) => project_on_segment(query, line.start, line.end).point,
            CadEntity::Polyline(polyline) => {
                nearest_on_path(&polyline.points, polyline.is_closed, query)
                    .map(|(_, hit)| hit.point)
                    .unwrap_or(query)
            }
            CadEntity::Polygon(polygon) => nearest_on_path(polygon.outer_ring(), true, query)
                .map(|(_, hit)| hit.point)
                .unwrap_or(query),
            CadEntity::Circle(circle) => {
                let offset = circle.center.vector_to(query);
                match offset.normalize() {
                    Some(dir) if offset.length() >= COINCIDENT_CENTER_EPSILON => {
                        circle.center.translate(dir.scale(circle.radius))
                    }
                    _ => Point2::new(circle.center.x() + circle.radius, circle.center.y()),
                }
            }
            CadEntity::Arc(arc) => {
                let angle = polar_deg(arc.center, query);
                if arc.contains_angle(angle) {
                    point_at(arc.center, arc.radius, angle)
                } else {
                    let to_start = angular_distance(angle, arc.start_angle_deg);
                    let to_end = angular_distance(angle, arc.end_angle_deg);
                    if to_start <= to_end {
                        arc.start_point()
                    } else {
                        arc.end_point()
                    }
                }
            }
            CadEntity::Text(text) => text.position,
            CadEntity::Point(point) => point.position,
        }
    }

    /// 最近点结果：位置、距离以及自查询点指向最近点的方位角（自北顺时针）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct NearestPoint {
        pub point: Point2,
        pub distance: f64,
        pub bearing_deg: f64,
    }

    pub fn nearest_on_entity(entity: &CadEntity, query: Point2) -> NearestPoint {
        let point = nearest_point_on_entity(entity, query);
        NearestPoint {
            point,
            distance: query.distance_to(point),
            bearing_deg: bearing_deg(query, point),
        }
    }

}

pub mod simplify {
    use std::collections::BTreeSet;

    use tracing::debug;

    use geostake_core::entity::{CadEntity, Polygon, Polyline};
    use geostake_core::geometry::Point2;

    pub use geostake_core::entity::layers_of;

    pub const DEFAULT_SIMPLIFY_THRESHOLD: usize = 500;
    pub const DEFAULT_SIMPLIFY_EPSILON: f64 = 0.5;

    /// 点到弦 `a-b` 的垂距；弦退化时退化为到 `a` 的欧氏距离。
    pub fn perpendicular_distance(point: Point2, a: Point2, b: Point2) -> f64 {
        let chord = a.vector_to(b);
        let len = chord.length();
        if len <= f64::EPSILON {
            return point.distance_to(a);
        }
        (chord.cross(a.vector_to(point)) / len).abs()
    }

    /// Douglas-Peucker 抽稀，首尾点始终保留，少于 3 点原样返回。
    pub fn douglas_peucker(points: &[Point2], epsilon: f64) -> Vec<Point2> {
        if points.len() < 3 {
            return points.to_vec();
        }
        let mut keep = vec![false; points.len()];
        keep[0] = true;
        keep[points.len() - 1] = true;
        mark_kept(points, 0, points.len() - 1, epsilon, &mut keep);
        points
            .iter()
            .zip(keep)
            .filter_map(|(point, kept)| kept.then_some(*point))
            .collect()
    }

    fn mark_kept(points: &[Point2], first: usize, last: usize, epsilon: f64, keep: &mut [bool]) {
        if last <= first + 1 {
            return;
        }
        let (a, b) = (points[first], points[last]);
        let mut max_distance = 0.0;
        let mut index = first;
        for (offset, point) in points[first + 1..last].iter().enumerate() {
            let distance = perpendicular_distance(*point, a, b);
            if distance > max_distance {
                max_distance = distance;
                index = first + 1 + offset;
            }
        }
        if max_distance > epsilon {
            keep[index] = true;
            mark_kept(points, first, index, epsilon, keep);
            mark_kept(points, index, last, epsilon, keep);
        }
    }

    /// 大数据量显示时的抽稀参数。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct DisplaySimplification {
        /// 实体数达到该值才触发抽稀。
        pub threshold: usize,
        pub epsilon: f64,
    }

    impl Default for DisplaySimplification {
        fn default() -> Self {
            Self {
                threshold: DEFAULT_SIMPLIFY_THRESHOLD,
                epsilon: DEFAULT_SIMPLIFY_EPSILON,
            }
        }
    }

    impl DisplaySimplification {
        #[inline]
        pub fn applies_to(&self, count: usize) -> bool {
            count >= self.threshold
        }

        /// 返回用于显示的派生副本。折线与多边形外环被抽稀，多边形只保留外环；输入不变。
        pub fn apply(&self, entities: &[CadEntity]) -> Vec<CadEntity> {
            if !self.applies_to(entities.len()) {
                return entities.to_vec();
            }
            debug!(
                count = entities.len(),
                epsilon = self.epsilon,
                "实体数量较多，启用显示抽稀"
            );
            entities
                .iter()
                .map(|entity| match entity {
                    CadEntity::Polyline(polyline) => CadEntity::Polyline(Polyline {
                        points: douglas_peucker(&polyline.points, self.epsilon),
                        ..polyline.clone()
                    }),
                    CadEntity::Polygon(polygon) if !polygon.rings.is_empty() => {
                        CadEntity::Polygon(Polygon {
                            rings: vec![douglas_peucker(polygon.outer_ring(), self.epsilon)],
                            ..polygon.clone()
                        })
                    }
                    other => other.clone(),
                })
                .collect()
        }
    }

    pub fn simplify_for_display(entities: &[CadEntity]) -> Vec<CadEntity> {
        DisplaySimplification::default().apply(entities)
    }

    /// 仅保留图层处于激活集合中的实体；激活集合为空时没有可见实体。
    pub fn filter_by_layers(entities: &[CadEntity], active: &BTreeSet<String>) -> Vec<CadEntity> {
        entities
            .iter()
            .filter(|entity| active.contains(entity.layer_name()))
            .cloned()
            .collect()
    }

}
