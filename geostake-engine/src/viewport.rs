use glam::DVec2;
use serde::{Deserialize, Serialize};

use geostake_core::entity::{CadEntity, bounds_of};
use geostake_core::geometry::{Bounds2D, Point2};

pub const MIN_SCALE: f64 = 0.25;
pub const MAX_SCALE: f64 = 20.0;
const DEFAULT_SCALE: f64 = 1.0;

/// 画布视口：世界范围铺满画布（y 轴翻转），再叠加用户缩放与平移。屏幕坐标单位为像素。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    world: Bounds2D,
    width_px: f64,
    height_px: f64,
    scale: f64,
    pan: DVec2,
}

impl Viewport {
    pub fn new(world: Bounds2D, width_px: f64, height_px: f64) -> Self {
        let world = if world.is_empty() {
            Bounds2D::unit()
        } else {
            world
        };
        Self {
            world,
            width_px: width_px.max(1.0),
            height_px: height_px.max(1.0),
            scale: DEFAULT_SCALE,
            pan: DVec2::ZERO,
        }
    }

    /// 以实体集合的显示范围创建视口。
    pub fn fit(entities: &[CadEntity], width_px: f64, height_px: f64) -> Self {
        Self::new(bounds_of(entities), width_px, height_px)
    }

    #[inline]
    fn clamp_scale(value: f64) -> f64 {
        value.clamp(MIN_SCALE, MAX_SCALE)
    }

    #[inline]
    pub fn world_bounds(&self) -> Bounds2D {
        self.world
    }

    #[inline]
    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    #[inline]
    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn pan(&self) -> DVec2 {
        self.pan
    }

    /// 设置缩放倍数（自动限制在合法范围内）。
    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = Self::clamp_scale(scale);
        }
    }

    /// 按乘法因子调整缩放。
    pub fn zoom_by(&mut self, factor: f64) {
        let target = if factor.is_finite() {
            self.scale * factor
        } else {
            self.scale
        };
        self.set_scale(target);
    }

    #[inline]
    pub fn set_pan(&mut self, pan: DVec2) {
        self.pan = pan;
    }

    #[inline]
    pub fn pan_by(&mut self, delta: DVec2) {
        self.pan += delta;
    }

    #[inline]
    fn span(value: f64) -> f64 {
        if value > 0.0 { value } else { 1.0 }
    }

    /// 世界坐标到屏幕像素坐标。
    pub fn world_to_screen(&self, point: Point2) -> DVec2 {
        let min = self.world.min();
        let sx = (point.x() - min.x()) / Self::span(self.world.width());
        let sy = 1.0 - (point.y() - min.y()) / Self::span(self.world.height());
        DVec2::new(sx * self.width_px, sy * self.height_px) * self.scale + self.pan
    }

    /// 屏幕像素坐标到世界坐标，`world_to_screen` 的逆变换。
    pub fn screen_to_world(&self, screen: DVec2) -> Point2 {
        let base = (screen - self.pan) / self.scale;
        let nx = base.x / self.width_px;
        let ny = base.y / self.height_px;
        let min = self.world.min();
        Point2::new(
            min.x() + nx * Self::span(self.world.width()),
            min.y() + (1.0 - ny) * Self::span(self.world.height()),
        )
    }

    /// 世界半径换算为像素半径。
    pub fn radius_to_px(&self, radius: f64) -> f64 {
        let world_max = Self::span(self.world.width().max(self.world.height()));
        let view_min = self.width_px.min(self.height_px);
        radius / world_max * view_min * self.scale
    }

    /// 当前画布可见的世界范围。
    pub fn visible_world_bounds(&self) -> Bounds2D {
        let top_left = self.screen_to_world(DVec2::ZERO);
        let bottom_right = self.screen_to_world(DVec2::new(self.width_px, self.height_px));
        Bounds2D::new(top_left, bottom_right)
    }
}
