use serde::{Deserialize, Serialize};
use tracing::debug;

use geostake_core::geometry::angle::bearing_deg;
use geostake_core::geometry::{Point2, Vector2};

use crate::errors::EngineError;
use crate::nearest::DEGENERATE_SEGMENT_EPSILON;

/// 生成桩点时末端允许的超出量（米）。
pub const STATION_END_SLACK_M: f64 = 0.01;
/// 最近桩点选择中横向偏距的权重。
pub const STATION_OFFSET_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentVertex {
    pub position: Point2,
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl AlignmentVertex {
    #[inline]
    pub fn new(position: Point2, elevation: Option<f64>) -> Self {
        Self {
            position,
            elevation,
        }
    }
}

/// 沿线按固定间距生成的桩点。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentStation {
    pub chain_m: f64,
    pub e: f64,
    pub n: f64,
    pub elevation: Option<f64>,
}

impl AlignmentStation {
    #[inline]
    pub fn position(&self) -> Point2 {
        Point2::new(self.e, self.n)
    }
}

/// 查询点在线路上的投影。偏距以行进方向右侧为正。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub chain_m: f64,
    pub offset_m: f64,
    /// 线路上的垂足。
    pub point: Point2,
    pub segment: usize,
    pub distance: f64,
}

/// 里程+偏距反算出的设计点。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainagePoint {
    pub point: Point2,
    pub elevation: Option<f64>,
}

/// 由有序折点构成的线路（至少两个折点），里程自首点起累计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AlignmentVertex>", into = "Vec<AlignmentVertex>")]
pub struct Alignment {
    vertices: Vec<AlignmentVertex>,
    cumulative: Vec<f64>,
}

impl TryFrom<Vec<AlignmentVertex>> for Alignment {
    type Error = EngineError;

    fn try_from(vertices: Vec<AlignmentVertex>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Alignment> for Vec<AlignmentVertex> {
    fn from(alignment: Alignment) -> Self {
        alignment.vertices
    }
}

/// 行进方向的右法向（东北坐标系）。
#[inline]
fn right_normal(direction: Vector2) -> Vector2 {
    Vector2::new(direction.y(), -direction.x())
}

impl Alignment {
    pub fn new(vertices: Vec<AlignmentVertex>) -> Result<Self, EngineError> {
        if vertices.len() < 2 {
            return Err(EngineError::AlignmentTooShort(vertices.len()));
        }
        let mut cumulative = Vec::with_capacity(vertices.len());
        let mut total = 0.0;
        cumulative.push(total);
        for pair in vertices.windows(2) {
            total += pair[0].position.distance_to(pair[1].position);
            cumulative.push(total);
        }
        Ok(Self {
            vertices,
            cumulative,
        })
    }

    pub fn from_points<I>(points: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Point2>,
    {
        Self::new(
            points
                .into_iter()
                .map(|position| AlignmentVertex::new(position, None))
                .collect(),
        )
    }

    /// 两点直线。
    pub fn straight(start: Point2, end: Point2) -> Self {
        Self {
            vertices: vec![
                AlignmentVertex::new(start, None),
                AlignmentVertex::new(end, None),
            ],
            cumulative: vec![0.0, start.distance_to(end)],
        }
    }

    /// 生成演示用的直线线路：自 `start` 沿方位角 `heading_deg` 每隔 `interval` 取一个折点，
    /// 高程按坡度 `grade` 线性变化。不足整段的末端补一个终点。
    pub fn synthetic(
        start: Point2,
        start_elevation: f64,
        heading_deg: f64,
        grade: f64,
        length: f64,
        interval: f64,
    ) -> Result<Self, EngineError> {
        if !(interval > 0.0) || !interval.is_finite() {
            return Err(EngineError::InvalidInterval(interval));
        }
        if !(length > 0.0) || !length.is_finite() {
            return Err(EngineError::InvalidLength(length));
        }
        let (sin, cos) = heading_deg.to_radians().sin_cos();
        let vertex_at = |chain: f64| {
            AlignmentVertex::new(
                Point2::new(start.x() + chain * sin, start.y() + chain * cos),
                Some(start_elevation + chain * grade),
            )
        };
        let count = ((length + 1e-6) / interval).floor() as u64 + 1;
        let mut vertices: Vec<AlignmentVertex> = (0..count)
            .map(|i| i as f64 * interval)
            .filter(|chain| *chain <= length + 1e-6)
            .map(vertex_at)
            .collect();
        let last_chain = (vertices.len() - 1) as f64 * interval;
        if length - last_chain > 1e-6 {
            vertices.push(vertex_at(length));
        }
        debug!(count = vertices.len(), length, interval, "已生成演示线路");
        Self::new(vertices)
    }

    #[inline]
    pub fn vertices(&self) -> &[AlignmentVertex] {
        &self.vertices
    }

    #[inline]
    pub fn total_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn start(&self) -> Point2 {
        self.vertices[0].position
    }

    #[inline]
    pub fn end(&self) -> Point2 {
        self.vertices[self.vertices.len() - 1].position
    }

    /// 首点到末点的方位角（自北顺时针）。
    #[inline]
    pub fn bearing_deg(&self) -> f64 {
        bearing_deg(self.start(), self.end())
    }

    pub fn points(&self) -> Vec<Point2> {
        self.vertices.iter().map(|vertex| vertex.position).collect()
    }

    /// 投影到欧氏距离最近的线段（相同时取先出现的段），退化线段跳过。
    /// 里程限制在 `[0, total_length]`；没有有效线段时返回 `None`。
    pub fn project(&self, query: Point2) -> Option<Projection> {
        let mut best: Option<Projection> = None;
        for (segment, pair) in self.vertices.windows(2).enumerate() {
            let (a, b) = (pair[0].position, pair[1].position);
            let ab = a.vector_to(b);
            let len2 = ab.length_squared();
            if len2 < DEGENERATE_SEGMENT_EPSILON {
                continue;
            }
            let len = len2.sqrt();
            let aq = a.vector_to(query);
            let t = (aq.dot(ab) / len2).clamp(0.0, 1.0);
            let point = a.translate(ab.scale(t));
            let distance = query.distance_to(point);
            if best.is_none_or(|current| distance < current.distance) {
                best = Some(Projection {
                    chain_m: (self.cumulative[segment] + t * len).clamp(0.0, self.total_length()),
                    offset_m: aq.cross(ab) / len,
                    point,
                    segment,
                    distance,
                });
            }
        }
        best
    }

    fn segment_direction(&self, segment: usize) -> Option<Vector2> {
        let a = self.vertices.get(segment)?.position;
        let b = self.vertices.get(segment + 1)?.position;
        a.vector_to(b).normalize()
    }

    /// 距 `segment` 最近的非退化线段方向，先向后再向前查找。
    fn direction_near(&self, segment: usize) -> Option<Vector2> {
        let count = self.vertices.len() - 1;
        let segment = segment.min(count - 1);
        (segment..count)
            .chain((0..segment).rev())
            .find_map(|index| self.segment_direction(index))
    }

    fn interpolate(&self, chain: f64) -> (Point2, Option<f64>, usize) {
        let total = self.total_length();
        if chain <= 0.0 {
            return (self.vertices[0].position, self.vertices[0].elevation, 0);
        }
        let last = self.vertices.len() - 1;
        if chain >= total {
            return (
                self.vertices[last].position,
                self.vertices[last].elevation,
                last - 1,
            );
        }
        let segment = self
            .cumulative
            .windows(2)
            .position(|pair| chain <= pair[1] && pair[1] - pair[0] > 0.0)
            .unwrap_or(last - 1);
        let (a, b) = (&self.vertices[segment], &self.vertices[segment + 1]);
        let length = self.cumulative[segment + 1] - self.cumulative[segment];
        let t = if length <= 1e-9 {
            0.0
        } else {
            (chain - self.cumulative[segment]) / length
        };
        let point = a.position.translate(a.position.vector_to(b.position).scale(t));
        let elevation = match (a.elevation, b.elevation) {
            (Some(za), Some(zb)) => Some(za + (zb - za) * t),
            _ => None,
        };
        (point, elevation, segment)
    }

    /// 自起点每隔 `interval` 米生成桩点，直到超出总长 `STATION_END_SLACK_M`。
    pub fn stations(&self, interval: f64) -> Result<Vec<AlignmentStation>, EngineError> {
        if !(interval > 0.0) || !interval.is_finite() {
            return Err(EngineError::InvalidInterval(interval));
        }
        let limit = self.total_length() + STATION_END_SLACK_M;
        let count = (limit / interval).floor() as u64 + 1;
        Ok((0..count)
            .map(|i| i as f64 * interval)
            .filter(|chain| *chain <= limit)
            .map(|chain| {
                let (point, elevation, _) = self.interpolate(chain);
                AlignmentStation {
                    chain_m: chain,
                    e: point.x(),
                    n: point.y(),
                    elevation,
                }
            })
            .collect())
    }
}

/// 最近桩点：最小化 `|Δ里程| + 0.5 * |偏距|`，相同时取先出现者。
pub fn nearest_station(
    stations: &[AlignmentStation],
    chain_m: f64,
    offset_m: f64,
) -> Option<&AlignmentStation> {
    let score = |station: &AlignmentStation| {
        (station.chain_m - chain_m).abs() + STATION_OFFSET_WEIGHT * offset_m.abs()
    };
    stations.iter().fold(None, |best, station| match best {
        Some(current) if score(current) <= score(station) => Some(current),
        _ => Some(station),
    })
}

/// 由里程和偏距反算设计点。超出两端时夹到首/末点，并沿首/末段的右法向偏移。
pub fn point_from_chainage_offset(alignment: &Alignment, chain_m: f64, offset_m: f64) -> ChainagePoint {
    let (base, elevation, segment) = alignment.interpolate(chain_m);
    let point = match alignment.direction_near(segment) {
        Some(direction) if offset_m.abs() > 0.0 => {
            base.translate(right_normal(direction).scale(offset_m))
        }
        _ => base,
    };
    ChainagePoint { point, elevation }
}
