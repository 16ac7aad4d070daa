use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use geostake_config::AppConfig;
use geostake_core::entity::{CadEntity, bounds_of, layers_of};
use geostake_core::geometry::{Bounds2D, Point2, Vector2};
use geostake_engine::alignment::point_from_chainage_offset;
use geostake_engine::command::{CommandBus, CommandContext, CommandRequest};
use geostake_engine::hit_test::{Hit, pick};
use geostake_engine::nearest::nearest_on_entity;
use geostake_engine::session::MeasurementSession;
use geostake_engine::simplify::filter_by_layers;
use geostake_engine::snap::SnapOutcome;
use geostake_engine::stakeout::{
    StakeRecord, StakeStatus, StakeTarget, StakeoutInputs, StakeoutState, Tolerances, accept,
    recompute,
};
use geostake_engine::transform::CoordinateTransform;
use geostake_engine::viewport::Viewport;

use crate::errors::FrontendError;
use crate::feed::SimulatedFeed;
use crate::loader::{LoadedScene, SceneSource, load_scene_from_env_or_demo};
use crate::settings::{simplification_from, snap_settings_from, tolerances_from, transform_from};

const CANVAS_WIDTH_PX: f64 = 1280.0;
const CANVAS_HEIGHT_PX: f64 = 720.0;
/// 模拟观测的起点相对终点的偏移（米）。
const APPROACH_OFFSET: (f64, f64) = (-18.0, -11.0);

/// 一次放样演示的结果。
#[derive(Debug, Clone)]
pub struct StakeRun {
    pub label: String,
    pub status: StakeStatus,
    pub message: String,
    pub epochs: usize,
    pub record: Option<StakeRecord>,
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub source: SceneSource,
    pub entity_count: usize,
    pub layers: Vec<String>,
    pub bounds: Bounds2D,
    pub simplified: bool,
    pub picked: Option<(Hit, &'static str)>,
    pub snap: Option<SnapOutcome>,
    pub measured_distance: f64,
    pub measured_area: f64,
    pub runs: Vec<StakeRun>,
}

/// 用模拟观测驱动状态机，进入容差后立即确认保存。
fn run_stakeout(
    label: impl Into<String>,
    target: StakeTarget,
    end: (Point2, f64),
    epochs: usize,
    tolerances: &Tolerances,
    transform: &dyn CoordinateTransform,
) -> StakeRun {
    let label = label.into();
    let start = (
        end.0.translate(Vector2::new(APPROACH_OFFSET.0, APPROACH_OFFSET.1)),
        end.1 + 0.8,
    );
    let mut state = StakeoutState::default();
    let mut record = None;
    let mut used = 0;
    for observation in SimulatedFeed::new(transform, start, end, epochs) {
        used += 1;
        state = recompute(
            state,
            &StakeoutInputs {
                observation: Some(&observation),
                target: Some(&target),
                tolerances,
                transform,
            },
        );
        debug!(label = %label, status = ?state.status, message = %state.message, "放样历元");
        if state.status == StakeStatus::WithinTolerance {
            match accept(&mut state) {
                Ok(saved) => {
                    record = Some(saved);
                    break;
                }
                Err(err) => warn!(label = %label, error = %err, "确认放样点失败"),
            }
        }
    }
    StakeRun {
        label,
        status: state.status,
        message: state.message,
        epochs: used,
        record,
    }
}

fn stakeout_runs(
    scene: &LoadedScene,
    epochs: usize,
    tolerances: &Tolerances,
    transform: &dyn CoordinateTransform,
) -> Vec<StakeRun> {
    let mut runs = Vec::new();
    let entities = &scene.scene.entities;

    if let Some(position) = entities.iter().find_map(|entity| match entity {
        CadEntity::Point(point) => Some(point.position),
        _ => None,
    }) {
        let target = StakeTarget::Point {
            name: "CP1".into(),
            position,
            elevation: Some(852.40),
        };
        runs.push(run_stakeout("点放样", target, (position, 852.40), epochs, tolerances, transform));
    }

    if let Some((start, end)) = entities.iter().find_map(|entity| match entity {
        CadEntity::Line(line) => Some((line.start, line.end)),
        _ => None,
    }) {
        let direction = start.vector_to(end);
        let at_30m = direction
            .normalize()
            .map(|unit| start.translate(unit.scale(30.0)))
            .unwrap_or(start);
        let target = StakeTarget::Line {
            name: "BL".into(),
            start,
            end,
        };
        runs.push(run_stakeout("线放样", target, (at_30m, 850.0), epochs, tolerances, transform));
    }

    if let Some(alignment) = &scene.scene.alignment {
        let design = point_from_chainage_offset(alignment, 60.0, 3.5);
        let end = (design.point, design.elevation.unwrap_or(0.0));
        let target = StakeTarget::Road {
            name: "CL".into(),
            alignment: alignment.clone(),
            target_chain: Some(60.0),
            target_offset: 3.5,
        };
        runs.push(run_stakeout("道路放样", target, end, epochs, tolerances, transform));
    }

    if let Some(entity) = entities
        .iter()
        .find(|entity| matches!(entity, CadEntity::Circle(_) | CadEntity::Arc(_)))
    {
        let anchor = entity.snap_vertices().first().copied().unwrap_or(Point2::new(0.0, 0.0));
        let approach = anchor.translate(Vector2::new(APPROACH_OFFSET.0, APPROACH_OFFSET.1));
        let nearest = nearest_on_entity(entity, approach);
        let target = StakeTarget::Entity {
            entity: entity.clone(),
        };
        runs.push(run_stakeout("CAD 放样", target, (nearest.point, 850.0), epochs, tolerances, transform));
    }
    runs
}

/// 按配置运行演示流程并汇总结果，不输出任何内容。
pub fn build_report(config: &AppConfig, scene: LoadedScene) -> Result<DemoReport, FrontendError> {
    let tolerances = tolerances_from(&config.stakeout)?;
    let snap_settings = snap_settings_from(&config.snap)?;
    let simplification = simplification_from(&config.display);
    let transform = transform_from(config.stakeout.projection.as_ref());
    info!(transform = transform.name(), "已选择坐标转换");

    let entities = &scene.scene.entities;
    let layers = layers_of(entities);
    let active: BTreeSet<String> = layers.iter().cloned().collect();
    let visible = filter_by_layers(entities, &active);
    let display = simplification.apply(&visible);
    let viewport = Viewport::fit(&display, CANVAS_WIDTH_PX, CANVAS_HEIGHT_PX);

    let picked = entities
        .iter()
        .find_map(|entity| match entity {
            CadEntity::Circle(circle) => Some(circle.center),
            _ => None,
        })
        .and_then(|center| {
            let screen = viewport.world_to_screen(center);
            pick(screen, &display, &viewport, config.display.select_threshold_px)
        })
        .map(|hit| (hit, display[hit.index].kind().describe()));

    let mut session = MeasurementSession::new();
    let bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };
    let mut snap = None;
    if let Some(CadEntity::Polygon(polygon)) = entities.iter().find(|e| matches!(e, CadEntity::Polygon(_))) {
        for corner in polygon.outer_ring() {
            let screen = viewport.world_to_screen(*corner) + glam::DVec2::new(3.0, -2.0);
            let outcome = snap_settings.resolve(screen, &display, &viewport, None);
            let args = [outcome.point.x().to_string(), outcome.point.y().to_string()];
            let response = bus.dispatch(&CommandRequest::with_args("add_pick", args), &mut context);
            if !response.success {
                warn!(message = ?response.message, "量测点添加失败");
            }
            if snap.is_none() {
                snap = Some(outcome);
            }
        }
        let response = bus.dispatch(&CommandRequest::new("toggle_measure_mode"), &mut context);
        if response.success {
            info!(message = ?response.message, "量测模式已切换");
        } else {
            warn!(message = ?response.message, "量测模式切换失败");
        }
    }

    let runs = stakeout_runs(&scene, config.frontend.demo_epochs, &tolerances, transform.as_ref());

    Ok(DemoReport {
        entity_count: entities.len(),
        layers,
        bounds: bounds_of(entities),
        simplified: simplification.applies_to(visible.len()),
        picked,
        snap,
        measured_distance: session.total_distance(),
        measured_area: session.polygon_area(),
        runs,
        source: scene.source,
    })
}

/// 距离为拾取顺序的折线长度，不含闭合边。
fn measurement_line(report: &DemoReport) -> String {
    format!(
        "量测：距离 {:.3} m，面积 {:.3} m²",
        report.measured_distance, report.measured_area
    )
}

fn print_report(report: &DemoReport) {
    println!("GeoStake 放样引擎 CLI 演示");
    match &report.source {
        SceneSource::Json(path) => println!("已从 JSON 加载场景：{}", path.display()),
        SceneSource::Demo => println!("已构建内置示例场景"),
    }
    println!("实体数量 = {}，图层：{}", report.entity_count, report.layers.join(", "));
    println!(
        "范围 = ({:.3}, {:.3}) - ({:.3}, {:.3}){}",
        report.bounds.min().x(),
        report.bounds.min().y(),
        report.bounds.max().x(),
        report.bounds.max().y(),
        if report.simplified { "，已启用显示抽稀" } else { "" }
    );
    match &report.picked {
        Some((hit, kind)) => println!("拾取：#{} {} 距离 {:.1}px", hit.index, kind, hit.distance_px),
        None => println!("拾取：未命中任何实体"),
    }
    if let Some(snap) = &report.snap {
        println!(
            "吸附：({:.3}, {:.3}) {:?}",
            snap.point.x(),
            snap.point.y(),
            snap.snapped
        );
    }
    println!("{}", measurement_line(report));
    for run in &report.runs {
        println!("{}：{:?}（{} 历元）{}", run.label, run.status, run.epochs, run.message);
        if let Some(record) = &run.record {
            println!(
                "  记录 {} [{}] E={:.3} N={:.3} {}",
                record.name, record.code, record.easting, record.northing, record.fix_type
            );
        }
    }
}

/// CLI 演示：加载场景、拾取与吸附、量测，并对每类目标运行一次模拟放样。
pub fn run_demo(config: &AppConfig) -> Result<(), FrontendError> {
    let scene = load_scene_from_env_or_demo()?;
    let report = build_report(config, scene)?;
    info!(
        entity_count = report.entity_count,
        runs = report.runs.len(),
        "CLI 演示完成"
    );
    print_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::demo_scene;

    fn demo() -> LoadedScene {
        LoadedScene {
            scene: demo_scene().expect("demo scene"),
            source: SceneSource::Demo,
        }
    }

    #[test]
    fn demo_report_saves_every_target() {
        let report = build_report(&AppConfig::default(), demo()).expect("report");
        assert_eq!(report.entity_count, 7);
        assert_eq!(report.runs.len(), 4);
        for run in &report.runs {
            assert_eq!(run.status, StakeStatus::Saved, "{}: {}", run.label, run.message);
            assert!(run.record.is_some());
        }
        let codes: Vec<&str> = report
            .runs
            .iter()
            .filter_map(|run| run.record.as_ref().map(|record| record.code.as_str()))
            .collect();
        assert_eq!(codes, vec!["STK", "LINE_STK", "ROAD_STK", "CAD_STK"]);
        assert_eq!(report.picked.map(|(_, kind)| kind), Some("circle"));
    }

    #[test]
    fn parcel_corners_are_measured_without_snap() {
        let report = build_report(&AppConfig::default(), demo()).expect("report");
        let snap = report.snap.expect("snap outcome");
        assert!(!snap.is_snapped());
        // 未吸附时点击点偏离角点，面积接近 2400
        assert!((report.measured_area - 2400.0).abs() < 50.0);
    }

    #[test]
    fn world_snap_measures_exact_parcel() {
        let mut config = AppConfig::default();
        config.snap.enabled = true;
        config.snap.world_mode = true;
        let report = build_report(&config, demo()).expect("report");
        assert!(report.snap.expect("snap outcome").is_snapped());
        assert!((report.measured_area - 2400.0).abs() < 1e-6);
        assert!((report.measured_distance - 160.0).abs() < 1e-6);
        assert_eq!(measurement_line(&report), "量测：距离 160.000 m，面积 2400.000 m²");
    }
}
