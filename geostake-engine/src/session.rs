use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use geostake_core::geometry::Point2;
use geostake_core::measure::{polygon_area, polyline_length};

use crate::errors::EngineError;

pub const DEFAULT_UNDO_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeasureMode {
    #[default]
    Distance,
    Area,
}

impl MeasureMode {
    pub fn toggled(self) -> Self {
        match self {
            MeasureMode::Distance => MeasureMode::Area,
            MeasureMode::Area => MeasureMode::Distance,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            MeasureMode::Distance => "距离",
            MeasureMode::Area => "面积",
        }
    }
}

/// 量测会话：用户拾取的点列与有界撤销/重做快照栈。
///
/// 每次修改前把当前点列压入撤销栈并清空重做栈；栈深超过上限时丢弃最旧的快照。
/// 距离与面积在读取时重新计算。
#[derive(Debug, Clone)]
pub struct MeasurementSession {
    points: Vec<Point2>,
    undo_stack: VecDeque<Vec<Point2>>,
    redo_stack: VecDeque<Vec<Point2>>,
    max_depth: usize,
    mode: MeasureMode,
}

impl Default for MeasurementSession {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(stack: &mut VecDeque<Vec<Point2>>, snapshot: Vec<Point2>, max_depth: usize) {
    stack.push_back(snapshot);
    while stack.len() > max_depth {
        stack.pop_front();
    }
}

impl MeasurementSession {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_UNDO_DEPTH)
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            points: Vec::new(),
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            mode: MeasureMode::default(),
        }
    }

    fn record(&mut self) {
        push_bounded(&mut self.undo_stack, self.points.clone(), self.max_depth);
        self.redo_stack.clear();
    }

    pub fn add(&mut self, point: Point2) {
        self.record();
        self.points.push(point);
        debug!(count = self.points.len(), "已添加量测点");
    }

    /// 删除指定序号的点；越界时不做任何修改，也不记录快照。
    pub fn remove_at(&mut self, index: usize) -> Option<Point2> {
        if index >= self.points.len() {
            return None;
        }
        self.record();
        Some(self.points.remove(index))
    }

    /// 清空点列；已为空时不记录快照。
    pub fn clear(&mut self) -> bool {
        if self.points.is_empty() {
            return false;
        }
        self.record();
        self.points.clear();
        true
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        let previous = self.undo_stack.pop_back().ok_or(EngineError::NothingToUndo)?;
        let current = std::mem::replace(&mut self.points, previous);
        push_bounded(&mut self.redo_stack, current, self.max_depth);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EngineError> {
        let next = self.redo_stack.pop_back().ok_or(EngineError::NothingToRedo)?;
        let current = std::mem::replace(&mut self.points, next);
        push_bounded(&mut self.undo_stack, current, self.max_depth);
        Ok(())
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[inline]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    #[inline]
    pub fn mode(&self) -> MeasureMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) -> MeasureMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn total_distance(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// 不足 3 点时为 0。
    pub fn polygon_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        polygon_area(&self.points)
    }

    /// 当前模式下的量测值。
    pub fn measured_value(&self) -> f64 {
        match self.mode {
            MeasureMode::Distance => self.total_distance(),
            MeasureMode::Area => self.polygon_area(),
        }
    }
}
