use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use geostake_core::entity::CadEntity;
use geostake_core::geometry::Point2;
use geostake_core::geometry::angle::{in_sweep, normalize_deg};

use crate::viewport::Viewport;

/// 选择命中的像素阈值。
pub const DEFAULT_SELECT_THRESHOLD_PX: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// 实体在输入切片中的序号。
    pub index: usize,
    pub distance_px: f64,
}

fn segment_distance_px(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 == 0.0 {
        0.0
    } else {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    };
    (a + ab * t).distance(p)
}

fn path_distance_px(screen: &[DVec2], closed: bool, p: DVec2) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |d: f64| {
        if best.is_none_or(|current| d < current) {
            best = Some(d);
        }
    };
    for pair in screen.windows(2) {
        consider(segment_distance_px(pair[0], pair[1], p));
    }
    if closed && screen.len() > 2 {
        consider(segment_distance_px(screen[screen.len() - 1], screen[0], p));
    }
    best
}

/// 单个实体到屏幕点的像素距离；圆弧仅在屏幕方向角落入扫掠范围时参与判定。
pub fn entity_distance_px(entity: &CadEntity, screen: DVec2, viewport: &Viewport) -> Option<f64> {
    let to_screen = |points: &[Point2]| -> Vec<DVec2> {
        points.iter().map(|p| viewport.world_to_screen(*p)).collect()
    };
    match entity {
        CadEntity::Line(line) => Some(segment_distance_px(
            viewport.world_to_screen(line.start),
            viewport.world_to_screen(line.end),
            screen,
        )),
        CadEntity::Polyline(polyline) => {
            path_distance_px(&to_screen(&polyline.points), polyline.is_closed, screen)
        }
        CadEntity::Polygon(polygon) => {
            path_distance_px(&to_screen(polygon.outer_ring()), true, screen)
        }
        CadEntity::Circle(circle) => {
            let center = viewport.world_to_screen(circle.center);
            let radius = viewport.radius_to_px(circle.radius);
            Some((center.distance(screen) - radius).abs())
        }
        CadEntity::Arc(arc) => {
            let center = viewport.world_to_screen(arc.center);
            let radius = viewport.radius_to_px(arc.radius);
            let v = screen - center;
            // 屏幕 y 轴向下，取反后与世界角度一致
            let angle = normalize_deg((-v.y).atan2(v.x).to_degrees());
            in_sweep(angle, arc.start_angle_deg, arc.end_angle_deg)
                .then(|| (v.length() - radius).abs())
        }
        CadEntity::Text(text) => Some(viewport.world_to_screen(text.position).distance(screen)),
        CadEntity::Point(point) => Some(viewport.world_to_screen(point.position).distance(screen)),
    }
}

/// 屏幕空间最近实体。只评估包围盒与可见范围相交的实体，距离相同时取先出现者。
/// 返回值不做阈值过滤，调用方用 [`pick`] 或自行比较阈值。
pub fn hit_test(screen: DVec2, entities: &[CadEntity], viewport: &Viewport) -> Option<Hit> {
    let visible = viewport.visible_world_bounds();
    let mut best: Option<Hit> = None;
    for (index, entity) in entities.iter().enumerate() {
        let in_view = entity
            .bounds()
            .map(|bounds| bounds.overlaps(&visible))
            .unwrap_or(false);
        if !in_view {
            continue;
        }
        let Some(distance_px) = entity_distance_px(entity, screen, viewport) else {
            continue;
        };
        if best.is_none_or(|hit| distance_px < hit.distance_px) {
            best = Some(Hit { index, distance_px });
        }
    }
    trace!(?best, "命中测试完成");
    best
}

/// 命中测试并按阈值过滤（`distance_px <= threshold_px`）。
pub fn pick(
    screen: DVec2,
    entities: &[CadEntity],
    viewport: &Viewport,
    threshold_px: f64,
) -> Option<Hit> {
    hit_test(screen, entities, viewport).filter(|hit| hit.distance_px <= threshold_px)
}

#[cfg(test)]
mod tests {
    use geostake_core::geometry::Bounds2D;

    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(
            Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0)),
            100.0,
            100.0,
        )
    }

    #[test]
    fn nearest_line_is_selected() {
        let entities = vec![
            CadEntity::line(Point2::new(0.0, 10.0), Point2::new(100.0, 10.0), "A"),
            CadEntity::line(Point2::new(0.0, 50.0), Point2::new(100.0, 50.0), "B"),
        ];
        let view = viewport();
        let screen = view.world_to_screen(Point2::new(30.0, 47.0));
        let hit = hit_test(screen, &entities, &view).expect("hit");
        assert_eq!(hit.index, 1);
        assert!((hit.distance_px - 3.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_first_entity() {
        let entities = vec![
            CadEntity::point(Point2::new(40.0, 40.0), "A"),
            CadEntity::point(Point2::new(60.0, 40.0), "B"),
        ];
        let view = viewport();
        let screen = view.world_to_screen(Point2::new(50.0, 40.0));
        assert_eq!(hit_test(screen, &entities, &view).map(|hit| hit.index), Some(0));
    }

    #[test]
    fn circle_distance_is_to_circumference() {
        let entities = vec![CadEntity::circle(Point2::new(50.0, 50.0), 20.0, "C")];
        let view = viewport();
        let screen = view.world_to_screen(Point2::new(50.0, 50.0));
        let hit = hit_test(screen, &entities, &view).expect("hit");
        assert!((hit.distance_px - 20.0).abs() < 1e-9);
    }

    #[test]
    fn arc_only_counts_inside_its_range() {
        let entities = vec![CadEntity::arc(Point2::new(50.0, 50.0), 20.0, 0.0, 90.0, "C")];
        let view = viewport();

        let inside = view.world_to_screen(Point2::new(60.0, 60.0));
        assert!(hit_test(inside, &entities, &view).is_some());

        let outside = view.world_to_screen(Point2::new(40.0, 40.0));
        assert!(hit_test(outside, &entities, &view).is_none());
    }

    #[test]
    fn pick_applies_threshold_and_skips_offscreen() {
        let entities = vec![
            CadEntity::point(Point2::new(500.0, 500.0), "FAR"),
            CadEntity::point(Point2::new(10.0, 10.0), "NEAR"),
        ];
        let view = viewport();
        let near = view.world_to_screen(Point2::new(30.0, 10.0));
        let hit = pick(near, &entities, &view, DEFAULT_SELECT_THRESHOLD_PX).expect("within threshold");
        assert_eq!(hit.index, 1);

        let far = view.world_to_screen(Point2::new(90.0, 90.0));
        assert!(pick(far, &entities, &view, DEFAULT_SELECT_THRESHOLD_PX).is_none());
        assert!(hit_test(far, &entities, &view).is_some());
    }
}
