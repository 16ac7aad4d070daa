//! 放样状态机：每次观测或目标变化时由 [`recompute`] 整体重算，用户确认通过 [`accept`] 进入已保存状态。

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use geostake_core::entity::CadEntity;
use geostake_core::geometry::Point2;
use geostake_core::geometry::angle::bearing_deg;

use crate::alignment::{Alignment, AlignmentStation, nearest_station, point_from_chainage_offset};
use crate::errors::EngineError;
use crate::fix::Observation;
use crate::nearest::nearest_on_entity;
use crate::transform::{CoordinateTransform, project_or_fallback};

pub const DEFAULT_POINT_HORIZONTAL_TOL: f64 = 0.10;
pub const DEFAULT_POINT_VERTICAL_TOL: f64 = 0.05;
pub const DEFAULT_LINE_LATERAL_TOL: f64 = 0.20;
pub const DEFAULT_LINE_CHAIN_TOL: f64 = 0.50;
pub const DEFAULT_LINE_INTERVAL: f64 = 10.0;
pub const DEFAULT_ROAD_CHAIN_TOL: f64 = 0.20;
pub const DEFAULT_ROAD_LATERAL_TOL: f64 = 0.10;
pub const DEFAULT_ROAD_ELEVATION_TOL: f64 = 0.05;
pub const DEFAULT_ROAD_INTERVAL: f64 = 20.0;
pub const DEFAULT_CAD_HORIZONTAL_TOL: f64 = 0.05;

/// 放样目标。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StakeTarget {
    Point {
        name: String,
        position: Point2,
        elevation: Option<f64>,
    },
    Line {
        name: String,
        start: Point2,
        end: Point2,
    },
    Road {
        name: String,
        alignment: Alignment,
        target_chain: Option<f64>,
        target_offset: f64,
    },
    Entity {
        entity: CadEntity,
    },
}

impl StakeTarget {
    pub fn name(&self) -> &str {
        match self {
            StakeTarget::Point { name, .. }
            | StakeTarget::Line { name, .. }
            | StakeTarget::Road { name, .. } => name.as_str(),
            StakeTarget::Entity { entity } => entity.kind().describe(),
        }
    }
}

/// 单项容差检查的轴。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceAxis {
    PointHorizontal,
    PointVertical,
    LineLateral,
    LineChain,
    RoadChain,
    RoadLateral,
    RoadElevation,
    CadHorizontal,
}

impl ToleranceAxis {
    pub fn describe(self) -> &'static str {
        match self {
            ToleranceAxis::PointHorizontal => "point_horizontal",
            ToleranceAxis::PointVertical => "point_vertical",
            ToleranceAxis::LineLateral => "line_lateral",
            ToleranceAxis::LineChain => "line_chain",
            ToleranceAxis::RoadChain => "road_chain",
            ToleranceAxis::RoadLateral => "road_lateral",
            ToleranceAxis::RoadElevation => "road_elevation",
            ToleranceAxis::CadHorizontal => "cad_horizontal",
        }
    }
}

/// 各类放样的容差与桩距。所有值必须为正，设置失败时保留原值。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ToleranceValues", into = "ToleranceValues")]
pub struct Tolerances {
    point_horizontal: f64,
    point_vertical: f64,
    line_lateral: f64,
    line_chain: f64,
    line_interval: f64,
    road_chain: f64,
    road_lateral: f64,
    road_elevation: f64,
    road_interval: f64,
    cad_horizontal: f64,
}

/// 序列化形式，反序列化后逐项校验。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ToleranceValues {
    point_horizontal: f64,
    point_vertical: f64,
    line_lateral: f64,
    line_chain: f64,
    line_interval: f64,
    road_chain: f64,
    road_lateral: f64,
    road_elevation: f64,
    road_interval: f64,
    cad_horizontal: f64,
}

impl TryFrom<ToleranceValues> for Tolerances {
    type Error = EngineError;

    fn try_from(values: ToleranceValues) -> Result<Self, Self::Error> {
        let mut tolerances = Tolerances::default()
            .with(ToleranceAxis::PointHorizontal, values.point_horizontal)?
            .with(ToleranceAxis::PointVertical, values.point_vertical)?
            .with(ToleranceAxis::LineLateral, values.line_lateral)?
            .with(ToleranceAxis::LineChain, values.line_chain)?
            .with(ToleranceAxis::RoadChain, values.road_chain)?
            .with(ToleranceAxis::RoadLateral, values.road_lateral)?
            .with(ToleranceAxis::RoadElevation, values.road_elevation)?
            .with(ToleranceAxis::CadHorizontal, values.cad_horizontal)?;
        tolerances.set_line_interval(values.line_interval)?;
        tolerances.set_road_interval(values.road_interval)?;
        Ok(tolerances)
    }
}

impl From<Tolerances> for ToleranceValues {
    fn from(tolerances: Tolerances) -> Self {
        Self {
            point_horizontal: tolerances.point_horizontal,
            point_vertical: tolerances.point_vertical,
            line_lateral: tolerances.line_lateral,
            line_chain: tolerances.line_chain,
            line_interval: tolerances.line_interval,
            road_chain: tolerances.road_chain,
            road_lateral: tolerances.road_lateral,
            road_elevation: tolerances.road_elevation,
            road_interval: tolerances.road_interval,
            cad_horizontal: tolerances.cad_horizontal,
        }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            point_horizontal: DEFAULT_POINT_HORIZONTAL_TOL,
            point_vertical: DEFAULT_POINT_VERTICAL_TOL,
            line_lateral: DEFAULT_LINE_LATERAL_TOL,
            line_chain: DEFAULT_LINE_CHAIN_TOL,
            line_interval: DEFAULT_LINE_INTERVAL,
            road_chain: DEFAULT_ROAD_CHAIN_TOL,
            road_lateral: DEFAULT_ROAD_LATERAL_TOL,
            road_elevation: DEFAULT_ROAD_ELEVATION_TOL,
            road_interval: DEFAULT_ROAD_INTERVAL,
            cad_horizontal: DEFAULT_CAD_HORIZONTAL_TOL,
        }
    }
}

#[inline]
fn positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

impl Tolerances {
    #[inline]
    pub fn get(&self, axis: ToleranceAxis) -> f64 {
        match axis {
            ToleranceAxis::PointHorizontal => self.point_horizontal,
            ToleranceAxis::PointVertical => self.point_vertical,
            ToleranceAxis::LineLateral => self.line_lateral,
            ToleranceAxis::LineChain => self.line_chain,
            ToleranceAxis::RoadChain => self.road_chain,
            ToleranceAxis::RoadLateral => self.road_lateral,
            ToleranceAxis::RoadElevation => self.road_elevation,
            ToleranceAxis::CadHorizontal => self.cad_horizontal,
        }
    }

    pub fn set(&mut self, axis: ToleranceAxis, value: f64) -> Result<(), EngineError> {
        if !positive(value) {
            return Err(EngineError::InvalidTolerance {
                axis: axis.describe(),
                value,
            });
        }
        let slot = match axis {
            ToleranceAxis::PointHorizontal => &mut self.point_horizontal,
            ToleranceAxis::PointVertical => &mut self.point_vertical,
            ToleranceAxis::LineLateral => &mut self.line_lateral,
            ToleranceAxis::LineChain => &mut self.line_chain,
            ToleranceAxis::RoadChain => &mut self.road_chain,
            ToleranceAxis::RoadLateral => &mut self.road_lateral,
            ToleranceAxis::RoadElevation => &mut self.road_elevation,
            ToleranceAxis::CadHorizontal => &mut self.cad_horizontal,
        };
        *slot = value;
        Ok(())
    }

    /// 构造时一次性设置多项容差，遇到第一个非法值即返回错误。
    pub fn with(mut self, axis: ToleranceAxis, value: f64) -> Result<Self, EngineError> {
        self.set(axis, value)?;
        Ok(self)
    }

    #[inline]
    pub fn line_interval(&self) -> f64 {
        self.line_interval
    }

    #[inline]
    pub fn road_interval(&self) -> f64 {
        self.road_interval
    }

    pub fn set_line_interval(&mut self, value: f64) -> Result<(), EngineError> {
        if !positive(value) {
            return Err(EngineError::InvalidInterval(value));
        }
        self.line_interval = value;
        Ok(())
    }

    pub fn set_road_interval(&mut self, value: f64) -> Result<(), EngineError> {
        if !positive(value) {
            return Err(EngineError::InvalidInterval(value));
        }
        self.road_interval = value;
        Ok(())
    }

    /// 恢复点放样的默认容差。
    pub fn reset_point(&mut self) {
        self.point_horizontal = DEFAULT_POINT_HORIZONTAL_TOL;
        self.point_vertical = DEFAULT_POINT_VERTICAL_TOL;
    }
}

/// 单轴检查结果；差值缺失视为不满足。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCheck {
    pub axis: ToleranceAxis,
    pub delta: Option<f64>,
    pub tolerance: f64,
    pub within: bool,
}

impl AxisCheck {
    fn evaluate(axis: ToleranceAxis, delta: Option<f64>, tolerances: &Tolerances) -> Self {
        let tolerance = tolerances.get(axis);
        Self {
            axis,
            delta,
            tolerance,
            within: delta.is_some_and(|value| value.abs() <= tolerance),
        }
    }
}

/// 一次重算得到的几何量。所有字段在缺少目标或投影失败时为空。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeoutResult {
    pub chain_m: Option<f64>,
    pub offset_m: Option<f64>,
    pub horizontal_distance_m: Option<f64>,
    /// 自当前位置指向 `target_point` 的方位角。
    pub bearing_deg: Option<f64>,
    pub vertical_delta_m: Option<f64>,
    pub nearest_station: Option<AlignmentStation>,
    /// 需要走到的点：点目标本身、线上最近桩、道路设计点或实体最近点。
    pub target_point: Option<Point2>,
    pub target_elevation: Option<f64>,
    pub delta_chain_m: Option<f64>,
    pub delta_lateral_m: Option<f64>,
    pub line_length_m: Option<f64>,
    pub line_bearing_deg: Option<f64>,
    pub bearing_to_end_deg: Option<f64>,
    pub checks: Vec<AxisCheck>,
    pub within_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StakeStatus {
    #[default]
    NoFix,
    NoTarget,
    OutOfTolerance,
    WithinTolerance,
    Saved,
}

/// 可渲染的放样状态。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeoutState {
    pub status: StakeStatus,
    pub observation: Option<Observation>,
    /// 当前位置（局部投影坐标）。
    pub position: Option<Point2>,
    pub elevation: Option<f64>,
    pub target: Option<StakeTarget>,
    pub result: StakeoutResult,
    /// 当前目标是否已保存过放样点，目标变化时清除。
    pub saved: bool,
    pub message: String,
}

pub struct StakeoutInputs<'a> {
    pub observation: Option<&'a Observation>,
    pub target: Option<&'a StakeTarget>,
    pub tolerances: &'a Tolerances,
    pub transform: &'a dyn CoordinateTransform,
}

/// 交给宿主持久化的放样记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub name: String,
    pub code: String,
    pub easting: f64,
    pub northing: f64,
    pub elevation: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hrms: Option<f64>,
    pub vrms: Option<f64>,
    pub pdop: Option<f64>,
    pub satellites: u32,
    pub fix_type: String,
    pub epoch_ms: u64,
}

fn evaluate_point(
    position: Point2,
    elevation: Option<f64>,
    target: Point2,
    target_elevation: Option<f64>,
    tolerances: &Tolerances,
) -> StakeoutResult {
    let horizontal = position.distance_to(target);
    let vertical = match (target_elevation, elevation) {
        (Some(design), Some(current)) => Some(design - current),
        _ => None,
    };
    StakeoutResult {
        horizontal_distance_m: Some(horizontal),
        bearing_deg: Some(bearing_deg(position, target)),
        vertical_delta_m: vertical,
        target_point: Some(target),
        target_elevation,
        checks: vec![
            AxisCheck::evaluate(ToleranceAxis::PointHorizontal, Some(horizontal), tolerances),
            AxisCheck::evaluate(ToleranceAxis::PointVertical, vertical, tolerances),
        ],
        ..StakeoutResult::default()
    }
}

fn evaluate_line(position: Point2, start: Point2, end: Point2, tolerances: &Tolerances) -> StakeoutResult {
    let alignment = Alignment::straight(start, end);
    let base = StakeoutResult {
        line_length_m: Some(alignment.total_length()),
        line_bearing_deg: Some(alignment.bearing_deg()),
        bearing_to_end_deg: Some(bearing_deg(position, end)),
        ..StakeoutResult::default()
    };
    let Some(projection) = alignment.project(position) else {
        return StakeoutResult {
            checks: vec![
                AxisCheck::evaluate(ToleranceAxis::LineLateral, None, tolerances),
                AxisCheck::evaluate(ToleranceAxis::LineChain, None, tolerances),
            ],
            ..base
        };
    };
    let stations = match alignment.stations(tolerances.line_interval()) {
        Ok(stations) => stations,
        Err(err) => {
            warn!(error = %err, "线放样桩号生成失败");
            Vec::new()
        }
    };
    let station = nearest_station(&stations, projection.chain_m, projection.offset_m).copied();
    let chain_delta = station.map(|station| station.chain_m - projection.chain_m);
    let target_point = station.map(|station| station.position());

    StakeoutResult {
        chain_m: Some(projection.chain_m),
        offset_m: Some(projection.offset_m),
        horizontal_distance_m: target_point.map(|point| position.distance_to(point)),
        bearing_deg: target_point.map(|point| bearing_deg(position, point)),
        nearest_station: station,
        target_point,
        delta_chain_m: chain_delta,
        delta_lateral_m: Some(-projection.offset_m),
        checks: vec![
            AxisCheck::evaluate(ToleranceAxis::LineLateral, Some(projection.offset_m), tolerances),
            AxisCheck::evaluate(ToleranceAxis::LineChain, chain_delta, tolerances),
        ],
        ..base
    }
}

fn evaluate_road(
    position: Point2,
    elevation: Option<f64>,
    alignment: &Alignment,
    target_chain: Option<f64>,
    target_offset: f64,
    tolerances: &Tolerances,
) -> StakeoutResult {
    let projection = alignment.project(position);
    let stations = match alignment.stations(tolerances.road_interval()) {
        Ok(stations) => stations,
        Err(err) => {
            warn!(error = %err, "道路放样桩号生成失败");
            Vec::new()
        }
    };
    let station = projection
        .and_then(|hit| nearest_station(&stations, hit.chain_m, hit.offset_m))
        .copied();
    let design = target_chain.map(|chain| point_from_chainage_offset(alignment, chain, target_offset));

    let delta_chain = match (target_chain, projection) {
        (Some(target), Some(hit)) => Some(target - hit.chain_m),
        _ => None,
    };
    let delta_lateral = projection.map(|hit| target_offset - hit.offset_m);
    let delta_elevation = match (design.and_then(|point| point.elevation), elevation) {
        (Some(design), Some(current)) => Some(design - current),
        _ => None,
    };
    let target_point = design.map(|point| point.point);

    StakeoutResult {
        chain_m: projection.map(|hit| hit.chain_m),
        offset_m: projection.map(|hit| hit.offset_m),
        horizontal_distance_m: target_point.map(|point| position.distance_to(point)),
        bearing_deg: target_point.map(|point| bearing_deg(position, point)),
        vertical_delta_m: delta_elevation,
        nearest_station: station,
        target_point,
        target_elevation: design.and_then(|point| point.elevation),
        delta_chain_m: delta_chain,
        delta_lateral_m: delta_lateral,
        line_length_m: Some(alignment.total_length()),
        checks: vec![
            AxisCheck::evaluate(ToleranceAxis::RoadChain, delta_chain, tolerances),
            AxisCheck::evaluate(ToleranceAxis::RoadLateral, delta_lateral, tolerances),
            AxisCheck::evaluate(ToleranceAxis::RoadElevation, delta_elevation, tolerances),
        ],
        ..StakeoutResult::default()
    }
}

fn evaluate_entity(position: Point2, entity: &CadEntity, tolerances: &Tolerances) -> StakeoutResult {
    let nearest = nearest_on_entity(entity, position);
    StakeoutResult {
        horizontal_distance_m: Some(nearest.distance),
        bearing_deg: Some(nearest.bearing_deg),
        target_point: Some(nearest.point),
        checks: vec![AxisCheck::evaluate(
            ToleranceAxis::CadHorizontal,
            Some(nearest.distance),
            tolerances,
        )],
        ..StakeoutResult::default()
    }
}

/// 按目标类型计算几何量与各轴检查。
pub fn evaluate(
    position: Point2,
    elevation: Option<f64>,
    target: &StakeTarget,
    tolerances: &Tolerances,
) -> StakeoutResult {
    let mut result = match target {
        StakeTarget::Point {
            position: target,
            elevation: target_elevation,
            ..
        } => evaluate_point(position, elevation, *target, *target_elevation, tolerances),
        StakeTarget::Line { start, end, .. } => evaluate_line(position, *start, *end, tolerances),
        StakeTarget::Road {
            alignment,
            target_chain,
            target_offset,
            ..
        } => evaluate_road(
            position,
            elevation,
            alignment,
            *target_chain,
            *target_offset,
            tolerances,
        ),
        StakeTarget::Entity { entity } => evaluate_entity(position, entity, tolerances),
    };
    result.within_all = !result.checks.is_empty() && result.checks.iter().all(|check| check.within);
    result
}

fn format_delta(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| "-".to_string())
}

fn status_message(status: StakeStatus, target: Option<&StakeTarget>, result: &StakeoutResult) -> String {
    match status {
        StakeStatus::NoFix => "等待 GNSS 定位".to_string(),
        StakeStatus::NoTarget => "请选择放样目标".to_string(),
        StakeStatus::WithinTolerance => "已到达目标".to_string(),
        StakeStatus::Saved => "放样点已保存".to_string(),
        StakeStatus::OutOfTolerance => match target {
            Some(StakeTarget::Road {
                target_chain: None, ..
            }) => "请输入目标里程".to_string(),
            Some(StakeTarget::Road { .. }) => format!(
                "ΔCh:{} ΔLat:{} ΔZ:{}",
                format_delta(result.delta_chain_m),
                format_delta(result.delta_lateral_m),
                format_delta(result.vertical_delta_m)
            ),
            Some(StakeTarget::Line { .. }) => format!(
                "ΔCh:{} Off:{}",
                format_delta(result.delta_chain_m),
                format_delta(result.offset_m)
            ),
            _ => format!("Δ={} m", format_delta(result.horizontal_distance_m)),
        },
    }
}

/// 根据上一状态与新输入重算放样状态。目标变化时清除已保存标记。
pub fn recompute(previous: StakeoutState, inputs: &StakeoutInputs<'_>) -> StakeoutState {
    let target = inputs.target.cloned();
    let saved = previous.saved && previous.target == target;
    let observation = inputs.observation.cloned();

    let fix = inputs
        .observation
        .and_then(|obs| obs.lat_lon().map(|lat_lon| (obs, lat_lon)));
    let Some((obs, (lat, lon))) = fix else {
        return StakeoutState {
            status: StakeStatus::NoFix,
            observation,
            target,
            saved,
            message: status_message(StakeStatus::NoFix, None, &StakeoutResult::default()),
            ..StakeoutState::default()
        };
    };

    let position = project_or_fallback(inputs.transform, lat, lon);
    let elevation = obs.ellipsoidal_height;

    let Some(current_target) = inputs.target else {
        return StakeoutState {
            status: StakeStatus::NoTarget,
            observation,
            position: Some(position),
            elevation,
            target,
            saved,
            message: status_message(StakeStatus::NoTarget, None, &StakeoutResult::default()),
            ..StakeoutState::default()
        };
    };

    let result = evaluate(position, elevation, current_target, inputs.tolerances);
    let status = match (result.within_all, saved) {
        (true, true) => StakeStatus::Saved,
        (true, false) => StakeStatus::WithinTolerance,
        (false, _) => StakeStatus::OutOfTolerance,
    };
    if status != previous.status {
        debug!(from = ?previous.status, to = ?status, name = current_target.name(), "放样状态变化");
    }
    let message = status_message(status, Some(current_target), &result);

    StakeoutState {
        status,
        observation,
        position: Some(position),
        elevation,
        target,
        result,
        saved,
        message,
    }
}

fn record_for(state: &StakeoutState, target: &StakeTarget, obs: &Observation, position: Point2) -> StakeRecord {
    let (name, code, easting, northing, elevation, latitude, longitude) = match target {
        StakeTarget::Point { name, .. } => (
            format!("{name}_STK"),
            "STK",
            position.x(),
            position.y(),
            obs.ellipsoidal_height,
            obs.lat_deg,
            obs.lon_deg,
        ),
        StakeTarget::Line { name, .. } => (
            format!("{}_{:.1}", name, state.result.chain_m.unwrap_or(0.0)),
            "LINE_STK",
            position.x(),
            position.y(),
            obs.ellipsoidal_height,
            obs.lat_deg,
            obs.lon_deg,
        ),
        StakeTarget::Road { target_chain, .. } => (
            format!("RD_{:.0}", target_chain.unwrap_or(0.0)),
            "ROAD_STK",
            position.x(),
            position.y(),
            obs.ellipsoidal_height,
            obs.lat_deg,
            obs.lon_deg,
        ),
        StakeTarget::Entity { .. } => {
            // 实体放样记录设计点而非当前位置
            let design = state.result.target_point.unwrap_or(position);
            (
                format!("CAD_{:05}", obs.epoch_ms % 100_000),
                "CAD_STK",
                design.x(),
                design.y(),
                None,
                None,
                None,
            )
        }
    };
    StakeRecord {
        name,
        code: code.to_string(),
        easting,
        northing,
        elevation,
        latitude,
        longitude,
        hrms: obs.hrms,
        vrms: obs.vrms,
        pdop: obs.pdop,
        satellites: obs.satellites_in_use,
        fix_type: obs.fix_type.describe().to_string(),
        epoch_ms: obs.epoch_ms,
    }
}

/// 用户确认保存。仅在 `WithinTolerance` 状态下成功，并将状态切换为 `Saved`。
pub fn accept(state: &mut StakeoutState) -> Result<StakeRecord, EngineError> {
    match state.status {
        StakeStatus::WithinTolerance => {}
        StakeStatus::Saved => return Err(EngineError::AlreadySaved),
        _ => return Err(EngineError::NotWithinTolerance),
    }
    let (Some(target), Some(obs), Some(position)) =
        (state.target.as_ref(), state.observation.as_ref(), state.position)
    else {
        return Err(EngineError::NotWithinTolerance);
    };
    let record = record_for(state, target, obs, position);
    info!(name = %record.name, code = %record.code, "放样点已确认");
    state.status = StakeStatus::Saved;
    state.saved = true;
    state.message = status_message(StakeStatus::Saved, None, &state.result);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use crate::fix::FixType;
    use crate::transform::LinearFallback;

    use super::*;

    const M: f64 = 111_000.0;

    /// 线性近似下对应局部坐标 `(e, n)` 的观测。
    fn obs_at(e: f64, n: f64, height: Option<f64>) -> Observation {
        Observation {
            epoch_ms: 1_700_000_123_456,
            hrms: Some(0.012),
            vrms: Some(0.02),
            pdop: Some(1.4),
            satellites_in_use: 21,
            ..Observation::at(FixType::RtkFix, n / M, e / M, height)
        }
    }

    fn run(
        previous: StakeoutState,
        observation: Option<&Observation>,
        target: Option<&StakeTarget>,
        tolerances: &Tolerances,
    ) -> StakeoutState {
        recompute(
            previous,
            &StakeoutInputs {
                observation,
                target,
                tolerances,
                transform: &LinearFallback,
            },
        )
    }

    fn point_target() -> StakeTarget {
        StakeTarget::Point {
            name: "P1".into(),
            position: Point2::new(1000.0, 2000.0),
            elevation: Some(50.0),
        }
    }

    #[test]
    fn states_progress_from_no_fix_to_within() {
        let tolerances = Tolerances::default();
        let target = point_target();

        let state = run(StakeoutState::default(), None, Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::NoFix);

        let obs = obs_at(1000.05, 2000.0, Some(50.02));
        let state = run(state, Some(&obs), None, &tolerances);
        assert_eq!(state.status, StakeStatus::NoTarget);

        let far = obs_at(1003.0, 2004.0, Some(50.0));
        let state = run(state, Some(&far), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::OutOfTolerance);
        assert!((state.result.horizontal_distance_m.unwrap() - 5.0).abs() < 1e-6);

        let state = run(state, Some(&obs), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::WithinTolerance);
        assert!(state.result.within_all);
        assert!((state.result.vertical_delta_m.unwrap() + 0.02).abs() < 1e-9);
        assert!((state.result.bearing_deg.unwrap() - 270.0).abs() < 1e-6);
    }

    #[test]
    fn missing_elevation_fails_vertical_check() {
        let tolerances = Tolerances::default();
        let target = point_target();
        let obs = obs_at(1000.0, 2000.0, None);
        let state = run(StakeoutState::default(), Some(&obs), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::OutOfTolerance);
        let vertical = state
            .result
            .checks
            .iter()
            .find(|check| check.axis == ToleranceAxis::PointVertical)
            .expect("vertical check");
        assert!(vertical.delta.is_none());
        assert!(!vertical.within);
    }

    #[test]
    fn accept_requires_within_tolerance_and_sticks_until_target_changes() {
        let tolerances = Tolerances::default();
        let target = point_target();
        let far = obs_at(1010.0, 2000.0, Some(50.0));
        let mut state = run(StakeoutState::default(), Some(&far), Some(&target), &tolerances);
        assert_eq!(accept(&mut state), Err(EngineError::NotWithinTolerance));

        let near = obs_at(1000.0, 2000.0, Some(50.0));
        let mut state = run(state, Some(&near), Some(&target), &tolerances);
        let record = accept(&mut state).expect("accept");
        assert_eq!(record.name, "P1_STK");
        assert_eq!(record.code, "STK");
        assert_eq!(record.fix_type, "RTK_FIX");
        assert_eq!(state.status, StakeStatus::Saved);
        assert_eq!(accept(&mut state), Err(EngineError::AlreadySaved));

        let state = run(state, Some(&near), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::Saved);

        let other = StakeTarget::Point {
            name: "P2".into(),
            position: Point2::new(1000.0, 2000.0),
            elevation: Some(50.0),
        };
        let state = run(state, Some(&near), Some(&other), &tolerances);
        assert_eq!(state.status, StakeStatus::WithinTolerance);
        assert!(!state.saved);
    }

    #[test]
    fn line_stakeout_uses_nearest_station() {
        let tolerances = Tolerances::default();
        let target = StakeTarget::Line {
            name: "L1".into(),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(100.0, 0.0),
        };
        let obs = obs_at(30.3, -0.1, None);
        let mut state = run(StakeoutState::default(), Some(&obs), Some(&target), &tolerances);
        let result = &state.result;
        assert!((result.chain_m.unwrap() - 30.3).abs() < 1e-6);
        assert!((result.offset_m.unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(result.nearest_station.unwrap().chain_m, 30.0);
        assert!((result.line_bearing_deg.unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(state.status, StakeStatus::WithinTolerance);
        let record = accept(&mut state).unwrap();
        assert_eq!(record.name, "L1_30.3");
        assert_eq!(record.code, "LINE_STK");
    }

    #[test]
    fn road_stakeout_reports_deltas_against_design_point() {
        let tolerances = Tolerances::default();
        let alignment = Alignment::synthetic(Point2::new(0.0, 0.0), 100.0, 0.0, 0.01, 200.0, 20.0)
            .expect("alignment");
        let target = StakeTarget::Road {
            name: "ROAD".into(),
            alignment,
            target_chain: Some(60.0),
            target_offset: 3.5,
        };
        // 北向行进，右侧为东
        let obs = obs_at(3.45, 60.1, Some(100.62));
        let mut state = run(StakeoutState::default(), Some(&obs), Some(&target), &tolerances);
        let result = &state.result;
        assert!((result.delta_chain_m.unwrap() + 0.1).abs() < 1e-6);
        assert!((result.delta_lateral_m.unwrap() - 0.05).abs() < 1e-6);
        assert!((result.vertical_delta_m.unwrap() + 0.02).abs() < 1e-6);
        let design = result.target_point.unwrap();
        assert!((design.x() - 3.5).abs() < 1e-9 && (design.y() - 60.0).abs() < 1e-9);
        assert_eq!(state.status, StakeStatus::WithinTolerance);
        let record = accept(&mut state).unwrap();
        assert_eq!(record.name, "RD_60");
        assert_eq!(record.code, "ROAD_STK");
    }

    #[test]
    fn road_without_target_chain_is_never_within() {
        let tolerances = Tolerances::default();
        let target = StakeTarget::Road {
            name: "ROAD".into(),
            alignment: Alignment::straight(Point2::new(0.0, 0.0), Point2::new(0.0, 100.0)),
            target_chain: None,
            target_offset: 0.0,
        };
        let obs = obs_at(0.0, 50.0, Some(10.0));
        let state = run(StakeoutState::default(), Some(&obs), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::OutOfTolerance);
        assert!((state.result.chain_m.unwrap() - 50.0).abs() < 1e-6);
        assert_eq!(state.message, "请输入目标里程");
    }

    #[test]
    fn entity_stakeout_records_design_point() {
        let tolerances = Tolerances::default();
        let target = StakeTarget::Entity {
            entity: CadEntity::circle(Point2::new(500.0, 500.0), 10.0, "CIRC"),
        };
        let obs = obs_at(510.03, 500.0, None);
        let mut state = run(StakeoutState::default(), Some(&obs), Some(&target), &tolerances);
        assert_eq!(state.status, StakeStatus::WithinTolerance);
        let record = accept(&mut state).unwrap();
        assert_eq!(record.code, "CAD_STK");
        assert_eq!(record.name, "CAD_23456");
        assert!((record.easting - 510.0).abs() < 1e-9);
        assert!(record.latitude.is_none());
    }

    #[test]
    fn tolerance_setters_reject_non_positive() {
        let mut tolerances = Tolerances::default();
        let err = tolerances.set(ToleranceAxis::LineLateral, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTolerance { axis: "line_lateral", .. }));
        assert_eq!(tolerances.get(ToleranceAxis::LineLateral), DEFAULT_LINE_LATERAL_TOL);
        assert!(tolerances.set_road_interval(-5.0).is_err());
        assert_eq!(tolerances.road_interval(), DEFAULT_ROAD_INTERVAL);
        tolerances.set(ToleranceAxis::PointHorizontal, 0.5).unwrap();
        tolerances.reset_point();
        assert_eq!(tolerances.get(ToleranceAxis::PointHorizontal), DEFAULT_POINT_HORIZONTAL_TOL);
    }

    #[test]
    fn deserialized_tolerances_are_validated() {
        let json = serde_json::to_string(&Tolerances::default()).unwrap();
        let restored: Tolerances = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, Tolerances::default());

        let zero_interval = json.replace("\"line_interval\":10.0", "\"line_interval\":0.0");
        assert_ne!(zero_interval, json);
        let err = serde_json::from_str::<Tolerances>(&zero_interval).unwrap_err();
        assert!(err.to_string().contains("station interval"), "{err}");

        let negative = json.replace("\"cad_horizontal\":0.05", "\"cad_horizontal\":-1.0");
        assert!(serde_json::from_str::<Tolerances>(&negative).is_err());
    }

    #[test]
    fn line_evaluation_keeps_station_with_valid_interval() {
        let target = StakeTarget::Line {
            name: "BL".into(),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(100.0, 0.0),
        };
        let result = evaluate(Point2::new(50.0, 0.0), None, &target, &Tolerances::default());
        assert!(result.within_all);
        assert_eq!(result.nearest_station.map(|station| station.chain_m), Some(50.0));
    }
}
