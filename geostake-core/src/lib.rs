pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点（局部投影坐标，单位米），内部以 `glam::DVec2` 表示。x 为东坐标，y 为北坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 二维叉积（z 分量），`self × other`。
        #[inline]
        pub fn cross(self, other: Vector2) -> f64 {
            self.0.perp_dot(other.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算实体范围和视口裁剪。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        /// 构造边界框，自动整理分量顺序以保证 `min <= max`。
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            let lo = min.as_vec2().min(max.as_vec2());
            let hi = min.as_vec2().max(max.as_vec2());
            Self {
                min: Point2::from_vec(lo),
                max: Point2::from_vec(hi),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 无实体时使用的单位框 `(0,0)-(1,1)`。
        #[inline]
        pub fn unit() -> Self {
            Self::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0))
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        /// 四周各外扩 `pad`。
        #[inline]
        pub fn expand(&self, pad: f64) -> Self {
            let pad = DVec2::splat(pad);
            Self {
                min: Point2::from_vec(self.min.as_vec2() - pad),
                max: Point2::from_vec(self.max.as_vec2() + pad),
            }
        }

        /// 闭区间相交判定，边界接触也视为重叠。
        #[inline]
        pub fn overlaps(&self, other: &Bounds2D) -> bool {
            if self.is_empty() || other.is_empty() {
                return false;
            }
            self.max.x() >= other.min.x()
                && self.min.x() <= other.max.x()
                && self.max.y() >= other.min.y()
                && self.min.y() <= other.max.y()
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }
    }

    /// 角度工具，统一以度为单位。
    pub mod angle {
        use super::Point2;

        /// 起止角之差小于该值时视为整圆。
        pub const FULL_CIRCLE_EPSILON: f64 = 1e-9;

        /// 归一化到 `[0, 360)`。
        #[inline]
        pub fn normalize_deg(angle: f64) -> f64 {
            let result = angle.rem_euclid(360.0);
            // rem_euclid 对极小负数可能得到 360.0
            if result >= 360.0 { 0.0 } else { result }
        }

        /// 逆时针扫掠角（度），起止重合返回 360。
        pub fn sweep_deg(start: f64, end: f64) -> f64 {
            let start = normalize_deg(start);
            let end = normalize_deg(end);
            let mut sweep = end - start;
            if sweep.abs() < FULL_CIRCLE_EPSILON {
                return 360.0;
            }
            if sweep < 0.0 {
                sweep += 360.0;
            }
            sweep
        }

        /// 判断 `angle` 是否落在 `[start, end]` 逆时针区间内，支持跨 0° 的区间。
        pub fn in_sweep(angle: f64, start: f64, end: f64) -> bool {
            let a = normalize_deg(angle);
            let s = normalize_deg(start);
            let e = normalize_deg(end);
            if (s - e).abs() < FULL_CIRCLE_EPSILON {
                return true;
            }
            if s <= e {
                a >= s && a <= e
            } else {
                a >= s || a <= e
            }
        }

        /// 两个方向之间的最小夹角，范围 `[0, 180]`。
        #[inline]
        pub fn angular_distance(a: f64, b: f64) -> f64 {
            let diff = (normalize_deg(a) - normalize_deg(b)).abs();
            diff.min(360.0 - diff)
        }

        /// 数学方向角：自东向逆时针，`atan2(dN, dE)`，归一化到 `[0, 360)`。
        #[inline]
        pub fn polar_deg(center: Point2, point: Point2) -> f64 {
            let d = point.as_vec2() - center.as_vec2();
            normalize_deg(d.y.atan2(d.x).to_degrees())
        }

        /// 测量方位角：自北顺时针，`atan2(dE, dN)`，归一化到 `[0, 360)`。
        #[inline]
        pub fn bearing_deg(from: Point2, to: Point2) -> f64 {
            let d = to.as_vec2() - from.as_vec2();
            normalize_deg(d.x.atan2(d.y).to_degrees())
        }

        /// 圆心+半径+数学方向角对应的圆周点。
        #[inline]
        pub fn point_at(center: Point2, radius: f64, angle_deg: f64) -> Point2 {
            let rad = angle_deg.to_radians();
            Point2::new(
                center.x() + radius * rad.cos(),
                center.y() + radius * rad.sin(),
            )
        }
    }

}

pub mod entity {
    use serde::{Deserialize, Serialize};

    use crate::geometry::angle::{in_sweep, normalize_deg, point_at, sweep_deg};
    use crate::geometry::{Bounds2D, Point2};

    pub const DEFAULT_LAYER: &str = "default";

    /// 显示范围的留白比例（取较大跨度的 5%）。
    const BOUNDS_PADDING_RATIO: f64 = 0.05;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntityKind {
        Line,
        Polyline,
        Polygon,
        Circle,
        Arc,
        Text,
        Point,
    }

    impl EntityKind {
        pub fn describe(&self) -> &'static str {
            match self {
                EntityKind::Line => "line",
                EntityKind::Polyline => "polyline",
                EntityKind::Polygon => "polygon",
                EntityKind::Circle => "circle",
                EntityKind::Arc => "arc",
                EntityKind::Text => "text",
                EntityKind::Point => "point",
            }
        }
    }

    /// CAD 实体的封闭联合类型。新增变体时所有几何运算的 `match` 都必须更新。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum CadEntity {
        Line(Line),
        Polyline(Polyline),
        Polygon(Polygon),
        Circle(Circle),
        Arc(Arc),
        Text(Text),
        Point(StandalonePoint),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub points: Vec<Point2>,
        pub is_closed: bool,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    /// 多边形：第一个环为外边界，其余为洞，每个环隐式闭合。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polygon {
        pub rings: Vec<Vec<Point2>>,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    impl Polygon {
        #[inline]
        pub fn outer_ring(&self) -> &[Point2] {
            self.rings.first().map(Vec::as_slice).unwrap_or(&[])
        }

        #[inline]
        pub fn holes(&self) -> &[Vec<Point2>] {
            self.rings.get(1..).unwrap_or(&[])
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    /// 圆弧，角度以度储存，自起始角逆时针扫至终止角；起止相同视为整圆。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle_deg: f64,
        pub end_angle_deg: f64,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    impl Arc {
        #[inline]
        pub fn start_point(&self) -> Point2 {
            point_at(self.center, self.radius, self.start_angle_deg)
        }

        #[inline]
        pub fn end_point(&self) -> Point2 {
            point_at(self.center, self.radius, self.end_angle_deg)
        }

        #[inline]
        pub fn sweep_deg(&self) -> f64 {
            sweep_deg(self.start_angle_deg, self.end_angle_deg)
        }

        #[inline]
        pub fn contains_angle(&self, angle_deg: f64) -> bool {
            in_sweep(angle_deg, self.start_angle_deg, self.end_angle_deg)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub position: Point2,
        pub text: String,
        pub height: f64,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StandalonePoint {
        pub position: Point2,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color_index: Option<u8>,
    }

    impl CadEntity {
        pub fn line(start: Point2, end: Point2, layer: impl Into<String>) -> Self {
            CadEntity::Line(Line {
                start,
                end,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn polyline<I>(points: I, is_closed: bool, layer: impl Into<String>) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            CadEntity::Polyline(Polyline {
                points: points.into_iter().collect(),
                is_closed,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn polygon(rings: Vec<Vec<Point2>>, layer: impl Into<String>) -> Self {
            CadEntity::Polygon(Polygon {
                rings,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn circle(center: Point2, radius: f64, layer: impl Into<String>) -> Self {
            CadEntity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn arc(
            center: Point2,
            radius: f64,
            start_angle_deg: f64,
            end_angle_deg: f64,
            layer: impl Into<String>,
        ) -> Self {
            CadEntity::Arc(Arc {
                center,
                radius,
                start_angle_deg,
                end_angle_deg,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn text(
            position: Point2,
            text: impl Into<String>,
            height: f64,
            layer: impl Into<String>,
        ) -> Self {
            CadEntity::Text(Text {
                position,
                text: text.into(),
                height,
                layer: layer.into(),
                color_index: None,
            })
        }

        pub fn point(position: Point2, layer: impl Into<String>) -> Self {
            CadEntity::Point(StandalonePoint {
                position,
                layer: layer.into(),
                color_index: None,
            })
        }

        /// 返回带调色板索引的新实体，原实体保持不变。
        pub fn with_color_index(self, index: u8) -> Self {
            let index = Some(index);
            match self {
                CadEntity::Line(inner) => CadEntity::Line(Line {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Polyline(inner) => CadEntity::Polyline(Polyline {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Polygon(inner) => CadEntity::Polygon(Polygon {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Circle(inner) => CadEntity::Circle(Circle {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Arc(inner) => CadEntity::Arc(Arc {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Text(inner) => CadEntity::Text(Text {
                    color_index: index,
                    ..inner
                }),
                CadEntity::Point(inner) => CadEntity::Point(StandalonePoint {
                    color_index: index,
                    ..inner
                }),
            }
        }

        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                CadEntity::Line(_) => EntityKind::Line,
                CadEntity::Polyline(_) => EntityKind::Polyline,
                CadEntity::Polygon(_) => EntityKind::Polygon,
                CadEntity::Circle(_) => EntityKind::Circle,
                CadEntity::Arc(_) => EntityKind::Arc,
                CadEntity::Text(_) => EntityKind::Text,
                CadEntity::Point(_) => EntityKind::Point,
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                CadEntity::Line(line) => &line.layer,
                CadEntity::Polyline(polyline) => &polyline.layer,
                CadEntity::Polygon(polygon) => &polygon.layer,
                CadEntity::Circle(circle) => &circle.layer,
                CadEntity::Arc(arc) => &arc.layer,
                CadEntity::Text(text) => &text.layer,
                CadEntity::Point(point) => &point.layer,
            }
        }

        #[inline]
        pub fn color_index(&self) -> Option<u8> {
            match self {
                CadEntity::Line(line) => line.color_index,
                CadEntity::Polyline(polyline) => polyline.color_index,
                CadEntity::Polygon(polygon) => polygon.color_index,
                CadEntity::Circle(circle) => circle.color_index,
                CadEntity::Arc(arc) => arc.color_index,
                CadEntity::Text(text) => text.color_index,
                CadEntity::Point(point) => point.color_index,
            }
        }

        /// 可吸附的特征点：端点、折线顶点、外环顶点、圆/弧圆心、文字与点的插入点。
        pub fn snap_vertices(&self) -> Vec<Point2> {
            match self {
                CadEntity::Line(line) => vec![line.start, line.end],
                CadEntity::Polyline(polyline) => polyline.points.clone(),
                CadEntity::Polygon(polygon) => polygon.outer_ring().to_vec(),
                CadEntity::Circle(circle) => vec![circle.center],
                CadEntity::Arc(arc) => vec![arc.center],
                CadEntity::Text(text) => vec![text.position],
                CadEntity::Point(point) => vec![point.position],
            }
        }

        /// 计算实体的紧致 2D 范围（不留白）。圆弧按实际扫掠范围计算。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                CadEntity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                CadEntity::Polyline(polyline) => {
                    for point in &polyline.points {
                        bounds.include_point(*point);
                    }
                }
                CadEntity::Polygon(polygon) => {
                    for point in polygon.outer_ring() {
                        bounds.include_point(*point);
                    }
                }
                CadEntity::Circle(circle) => {
                    include_square(&mut bounds, circle.center, circle.radius);
                }
                CadEntity::Arc(arc) => {
                    arc_bounds(arc, &mut bounds);
                }
                CadEntity::Text(text) => {
                    bounds.include_point(text.position);
                }
                CadEntity::Point(point) => {
                    bounds.include_point(point.position);
                }
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    fn include_square(bounds: &mut Bounds2D, center: Point2, radius: f64) {
        let radius = radius.abs();
        bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
        bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center);
            return;
        }

        bounds.include_point(point_at(arc.center, radius, arc.start_angle_deg));
        bounds.include_point(point_at(arc.center, radius, arc.end_angle_deg));

        const QUADRANTS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];
        for base in QUADRANTS {
            if arc.contains_angle(base) {
                bounds.include_point(point_at(arc.center, radius, normalize_deg(base)));
            }
        }
    }

    /// 实体集合的显示范围：汇总所有顶点（圆与圆弧取 `center ± radius` 外接正方形），
    /// 并按较大跨度的 5% 四周留白。空集合返回单位框。
    pub fn bounds_of(entities: &[CadEntity]) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        for entity in entities {
            match entity {
                CadEntity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                CadEntity::Polyline(polyline) => {
                    for point in &polyline.points {
                        bounds.include_point(*point);
                    }
                }
                CadEntity::Polygon(polygon) => {
                    for point in polygon.outer_ring() {
                        bounds.include_point(*point);
                    }
                }
                CadEntity::Circle(circle) => include_square(&mut bounds, circle.center, circle.radius),
                CadEntity::Arc(arc) => include_square(&mut bounds, arc.center, arc.radius),
                CadEntity::Text(text) => bounds.include_point(text.position),
                CadEntity::Point(point) => bounds.include_point(point.position),
            }
        }
        if bounds.is_empty() {
            return Bounds2D::unit();
        }
        let pad = BOUNDS_PADDING_RATIO * bounds.width().max(bounds.height());
        bounds.expand(pad)
    }

    /// 按图层名去重并排序。
    pub fn layers_of(entities: &[CadEntity]) -> Vec<String> {
        let mut layers: Vec<String> = entities
            .iter()
            .map(|entity| entity.layer_name().to_string())
            .collect();
        layers.sort();
        layers.dedup();
        layers
    }

}

pub mod measure {
    use std::f64::consts::PI;

    use crate::entity::CadEntity;
    use crate::geometry::Point2;

    /// 折线长度：相邻点欧氏距离之和。
    pub fn polyline_length(points: &[Point2]) -> f64 {
        // 空迭代的 sum() 为 -0.0
        points
            .windows(2)
            .fold(0.0, |total, pair| total + pair[0].distance_to(pair[1]))
    }

    /// 鞋带公式（带符号），环隐式闭合。少于 3 点返回 0。
    pub fn polygon_area_signed(ring: &[Point2]) -> f64 {
        if ring.len() < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for (i, a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            sum += a.x() * b.y() - b.x() * a.y();
        }
        0.5 * sum
    }

    #[inline]
    pub fn polygon_area(ring: &[Point2]) -> f64 {
        polygon_area_signed(ring).abs()
    }

    /// 带洞多边形净面积：外环面积减去所有洞面积，下限为 0。
    pub fn polygon_net_area(rings: &[Vec<Point2>]) -> f64 {
        let Some((outer, holes)) = rings.split_first() else {
            return 0.0;
        };
        let holes: f64 = holes.iter().map(|ring| polygon_area(ring)).sum();
        (polygon_area(outer) - holes).max(0.0)
    }

    /// 单环周长（含闭合边）。
    pub fn polygon_perimeter(ring: &[Point2]) -> f64 {
        if ring.len() < 2 {
            return 0.0;
        }
        let closing = ring[ring.len() - 1].distance_to(ring[0]);
        polyline_length(ring) + closing
    }

    /// 所有环的周长之和。
    pub fn polygon_perimeter_rings(rings: &[Vec<Point2>]) -> f64 {
        rings
            .iter()
            .filter(|ring| ring.len() >= 2)
            .map(|ring| polygon_perimeter(ring))
            .sum()
    }

    pub fn polygon_outer_perimeter(rings: &[Vec<Point2>]) -> f64 {
        rings.first().map(|ring| polygon_perimeter(ring)).unwrap_or(0.0)
    }

    #[inline]
    pub fn circle_area(radius: f64) -> f64 {
        PI * radius * radius
    }

    #[inline]
    pub fn circle_circumference(radius: f64) -> f64 {
        2.0 * PI * radius
    }

    /// 弧长 `r * sweep`，零扫掠按整圆处理。
    #[inline]
    pub fn arc_length(radius: f64, start_deg: f64, end_deg: f64) -> f64 {
        radius * crate::geometry::angle::sweep_deg(start_deg, end_deg).to_radians()
    }

    impl CadEntity {
        /// 长度或周长；文字与点为 0。
        pub fn length_or_perimeter(&self) -> f64 {
            match self {
                CadEntity::Line(line) => line.start.distance_to(line.end),
                CadEntity::Polyline(polyline) => {
                    let open = polyline_length(&polyline.points);
                    if polyline.is_closed && polyline.points.len() > 2 {
                        open + polyline.points[polyline.points.len() - 1]
                            .distance_to(polyline.points[0])
                    } else {
                        open
                    }
                }
                CadEntity::Polygon(polygon) => polygon_perimeter_rings(&polygon.rings),
                CadEntity::Circle(circle) => circle_circumference(circle.radius),
                CadEntity::Arc(arc) => {
                    arc_length(arc.radius, arc.start_angle_deg, arc.end_angle_deg)
                }
                CadEntity::Text(_) | CadEntity::Point(_) => 0.0,
            }
        }

        /// 面积；只有多边形与圆有面积。
        pub fn area(&self) -> f64 {
            match self {
                CadEntity::Polygon(polygon) => polygon_net_area(&polygon.rings),
                CadEntity::Circle(circle) => circle_area(circle.radius),
                CadEntity::Line(_)
                | CadEntity::Polyline(_)
                | CadEntity::Arc(_)
                | CadEntity::Text(_)
                | CadEntity::Point(_) => 0.0,
            }
        }
    }

}
