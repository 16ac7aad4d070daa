use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use geostake_core::entity::CadEntity;
use geostake_core::geometry::{Bounds2D, Point2};

use crate::errors::EngineError;
use crate::viewport::Viewport;

pub const PIXEL_TOLERANCE_PRESETS: [f64; 5] = [5.0, 10.0, 24.0, 40.0, 64.0];
pub const WORLD_TOLERANCE_PRESETS: [f64; 5] = [0.5, 1.0, 2.0, 5.0, 10.0];
pub const DEFAULT_PIXEL_TOLERANCE: f64 = 24.0;
pub const DEFAULT_WORLD_TOLERANCE: f64 = 1.0;

/// 网格目标主分割数。
const GRID_MAJOR_DIVISIONS: f64 = 8.0;
const DYNAMIC_MIN_ZOOM: f64 = 3.0;
const DYNAMIC_MAX_ZOOM: f64 = 23.0;
const DYNAMIC_REFERENCE_ZOOM: f64 = 18.0;
const DYNAMIC_MIN_PX: f64 = 4.0;
const DYNAMIC_MAX_PX: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapTarget {
    Vertex,
    Grid,
}

/// 吸附结果。`snapped` 为 `None` 时 `point` 即原始点。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapOutcome {
    pub point: Point2,
    pub snapped: Option<SnapTarget>,
}

impl SnapOutcome {
    #[inline]
    pub fn raw(point: Point2) -> Self {
        Self {
            point,
            snapped: None,
        }
    }

    #[inline]
    pub fn is_snapped(&self) -> bool {
        self.snapped.is_some()
    }
}

/// 所有实体的可吸附特征点，按实体顺序展开。
pub fn all_vertices(entities: &[CadEntity]) -> Vec<Point2> {
    entities.iter().flat_map(CadEntity::snap_vertices).collect()
}

/// "整数"步长：取 1、2、5、10 乘以 10 的幂中最接近 `raw` 的一档；非正数返回 1。
pub fn nice_step(raw: f64) -> f64 {
    if !(raw > 0.0) || !raw.is_finite() {
        return 1.0;
    }
    let scale = 10f64.powf(raw.log10().floor());
    let base = raw / scale;
    let nice = if base < 1.5 {
        1.0
    } else if base < 3.5 {
        2.0
    } else if base < 7.5 {
        5.0
    } else {
        10.0
    };
    nice * scale
}

/// 覆盖范围的网格交点，起点对齐到步长整数倍，终点包含 `max`。
pub fn grid_intersections(bounds: &Bounds2D) -> Vec<Point2> {
    if bounds.is_empty() {
        return Vec::new();
    }
    let step_x = nice_step(bounds.width() / GRID_MAJOR_DIVISIONS);
    let step_y = nice_step(bounds.height() / GRID_MAJOR_DIVISIONS);
    let start_x = (bounds.min().x() / step_x).floor() * step_x;
    let start_y = (bounds.min().y() / step_y).floor() * step_y;

    let axis = |start: f64, step: f64, end: f64| -> Vec<f64> {
        let count = ((end - start) / step).floor().max(0.0) as u64 + 1;
        (0..count)
            .map(|i| start + i as f64 * step)
            .filter(|value| *value <= end)
            .collect()
    };
    let xs = axis(start_x, step_x, bounds.max().x());
    let ys = axis(start_y, step_y, bounds.max().y());

    xs.iter()
        .flat_map(|x| ys.iter().map(move |y| Point2::new(*x, *y)))
        .collect()
}

/// 按地图缩放级别调整像素容差：放大时收紧，缩小时放宽，结果限制在 4–96 像素。
pub fn effective_tolerance_px(base_px: f64, zoom: f64) -> f64 {
    let zoom = zoom.clamp(DYNAMIC_MIN_ZOOM, DYNAMIC_MAX_ZOOM);
    let factor = (DYNAMIC_REFERENCE_ZOOM / zoom).clamp(0.4, 3.0);
    (base_px * factor).round().clamp(DYNAMIC_MIN_PX, DYNAMIC_MAX_PX)
}

fn nearest_on_screen(
    candidates: impl IntoIterator<Item = Point2>,
    screen: DVec2,
    viewport: &Viewport,
    best: &mut Option<(Point2, f64)>,
) -> bool {
    let mut improved = false;
    for candidate in candidates {
        let distance = viewport.world_to_screen(candidate).distance(screen);
        if best.is_none_or(|(_, current)| distance < current) {
            *best = Some((candidate, distance));
            improved = true;
        }
    }
    improved
}

/// 像素模式吸附：先找最近顶点，超出容差时追加网格交点再比较，最终结果仍须在容差内。
pub fn snap_pixel(
    screen: DVec2,
    entities: &[CadEntity],
    viewport: &Viewport,
    tolerance_px: f64,
) -> SnapOutcome {
    let raw = viewport.screen_to_world(screen);
    let mut best = None;
    nearest_on_screen(all_vertices(entities), screen, viewport, &mut best);
    let mut target = SnapTarget::Vertex;

    let vertex_ok = best.is_some_and(|(_, distance)| distance <= tolerance_px);
    if !vertex_ok {
        let grid = grid_intersections(&viewport.world_bounds());
        if nearest_on_screen(grid, screen, viewport, &mut best) {
            target = SnapTarget::Grid;
        }
    }

    match best {
        Some((point, distance)) if distance <= tolerance_px => {
            debug!(?target, distance, "像素吸附命中");
            SnapOutcome {
                point,
                snapped: Some(target),
            }
        }
        _ => SnapOutcome::raw(raw),
    }
}

/// 世界模式吸附：按米计算最近顶点，不回退到网格。
pub fn snap_world(query: Point2, entities: &[CadEntity], tolerance_m: f64) -> SnapOutcome {
    let best = all_vertices(entities)
        .into_iter()
        .map(|vertex| (vertex, vertex.distance_to(query)))
        .fold(None, |best: Option<(Point2, f64)>, (vertex, distance)| match best {
            Some((_, current)) if current <= distance => best,
            _ => Some((vertex, distance)),
        });
    match best {
        Some((point, distance)) if distance <= tolerance_m => {
            debug!(distance, "世界吸附命中");
            SnapOutcome {
                point,
                snapped: Some(SnapTarget::Vertex),
            }
        }
        _ => SnapOutcome::raw(query),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapMode {
    Pixel,
    World,
}

/// 吸附设置，两种模式互斥。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapSettingsValues", into = "SnapSettingsValues")]
pub struct SnapSettings {
    pub enabled: bool,
    pub mode: SnapMode,
    tolerance_px: f64,
    world_tolerance_m: f64,
    /// 启用后像素容差随地图缩放级别调整。
    pub dynamic: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SnapSettingsValues {
    enabled: bool,
    mode: SnapMode,
    tolerance_px: f64,
    world_tolerance_m: f64,
    dynamic: bool,
}

impl TryFrom<SnapSettingsValues> for SnapSettings {
    type Error = EngineError;

    fn try_from(values: SnapSettingsValues) -> Result<Self, Self::Error> {
        let mut settings = SnapSettings {
            enabled: values.enabled,
            mode: values.mode,
            dynamic: values.dynamic,
            ..SnapSettings::default()
        };
        settings.set_tolerance_px(values.tolerance_px)?;
        settings.set_world_tolerance_m(values.world_tolerance_m)?;
        Ok(settings)
    }
}

impl From<SnapSettings> for SnapSettingsValues {
    fn from(settings: SnapSettings) -> Self {
        Self {
            enabled: settings.enabled,
            mode: settings.mode,
            tolerance_px: settings.tolerance_px,
            world_tolerance_m: settings.world_tolerance_m,
            dynamic: settings.dynamic,
        }
    }
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SnapMode::Pixel,
            tolerance_px: DEFAULT_PIXEL_TOLERANCE,
            world_tolerance_m: DEFAULT_WORLD_TOLERANCE,
            dynamic: false,
        }
    }
}

fn next_preset(presets: &[f64], current: f64) -> f64 {
    presets
        .iter()
        .copied()
        .find(|preset| *preset > current + 1e-9)
        .unwrap_or(presets[0])
}

impl SnapSettings {
    #[inline]
    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    #[inline]
    pub fn world_tolerance_m(&self) -> f64 {
        self.world_tolerance_m
    }

    pub fn set_tolerance_px(&mut self, value: f64) -> Result<(), EngineError> {
        if !(value > 0.0) || !value.is_finite() {
            return Err(EngineError::InvalidTolerance {
                axis: "snap_px",
                value,
            });
        }
        self.tolerance_px = value;
        Ok(())
    }

    pub fn set_world_tolerance_m(&mut self, value: f64) -> Result<(), EngineError> {
        if !(value > 0.0) || !value.is_finite() {
            return Err(EngineError::InvalidTolerance {
                axis: "snap_world",
                value,
            });
        }
        self.world_tolerance_m = value;
        Ok(())
    }

    /// 切换到下一档像素容差预设，末档之后回到首档。
    pub fn cycle_pixel_tolerance(&mut self) -> f64 {
        self.tolerance_px = next_preset(&PIXEL_TOLERANCE_PRESETS, self.tolerance_px);
        self.tolerance_px
    }

    pub fn cycle_world_tolerance(&mut self) -> f64 {
        self.world_tolerance_m = next_preset(&WORLD_TOLERANCE_PRESETS, self.world_tolerance_m);
        self.world_tolerance_m
    }

    pub fn toggle_mode(&mut self) -> SnapMode {
        self.mode = match self.mode {
            SnapMode::Pixel => SnapMode::World,
            SnapMode::World => SnapMode::Pixel,
        };
        self.mode
    }

    /// 当前生效的像素容差；`map_zoom` 仅在动态模式下使用。
    pub fn pixel_tolerance_for(&self, map_zoom: Option<f64>) -> f64 {
        match map_zoom {
            Some(zoom) if self.dynamic => effective_tolerance_px(self.tolerance_px, zoom),
            _ => self.tolerance_px,
        }
    }

    /// 将一次点击解析为拾取点。未启用吸附时直接返回原始世界坐标。
    pub fn resolve(
        &self,
        screen: DVec2,
        entities: &[CadEntity],
        viewport: &Viewport,
        map_zoom: Option<f64>,
    ) -> SnapOutcome {
        if !self.enabled {
            return SnapOutcome::raw(viewport.screen_to_world(screen));
        }
        match self.mode {
            SnapMode::Pixel => snap_pixel(
                screen,
                entities,
                viewport,
                self.pixel_tolerance_for(map_zoom),
            ),
            SnapMode::World => snap_world(
                viewport.screen_to_world(screen),
                entities,
                self.world_tolerance_m,
            ),
        }
    }
}
