use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use geostake_core::entity::CadEntity;
use geostake_core::geometry::Point2;
use geostake_engine::alignment::Alignment;
use geostake_engine::errors::EngineError;

use crate::errors::FrontendError;

/// 指定场景 JSON 文件的环境变量。
pub const SCENE_ENV_VAR: &str = "GEOSTAKE_SCENE_JSON";

/// 演示场景的投影坐标原点附近（东, 北）。
pub const DEMO_ORIGIN: (f64, f64) = (500_000.0, 4_540_000.0);

/// 场景来源，便于前端呈现加载信息。
#[derive(Debug, Clone)]
pub enum SceneSource {
    Json(PathBuf),
    Demo,
}

/// 场景文件：实体列表与可选的道路中线。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub entities: Vec<CadEntity>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
}

#[derive(Debug)]
pub struct LoadedScene {
    pub scene: SceneFile,
    pub source: SceneSource,
}

pub fn load_scene_file(path: &Path) -> Result<SceneFile, FrontendError> {
    let content = fs::read_to_string(path).map_err(|source| FrontendError::SceneIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| FrontendError::SceneParse {
        path: path.to_path_buf(),
        source,
    })
}

/// 从环境变量 `GEOSTAKE_SCENE_JSON` 指定的路径加载场景，失败则回退到内置示例。
pub fn load_scene_from_env_or_demo() -> Result<LoadedScene, FrontendError> {
    if let Some(path) = env::var_os(SCENE_ENV_VAR) {
        let path = PathBuf::from(path);
        match load_scene_file(&path) {
            Ok(scene) => {
                info!(path = %path.display(), count = scene.entities.len(), "从 JSON 加载场景成功");
                return Ok(LoadedScene {
                    scene,
                    source: SceneSource::Json(path),
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载场景失败，回退到内置示例");
            }
        }
    }
    Ok(LoadedScene {
        scene: demo_scene()?,
        source: SceneSource::Demo,
    })
}

fn local(e: f64, n: f64) -> Point2 {
    Point2::new(DEMO_ORIGIN.0 + e, DEMO_ORIGIN.1 + n)
}

/// 内置示例：带洞宗地、路缘弧、树、界桩、注记以及一条道路中线。
pub fn demo_scene() -> Result<SceneFile, EngineError> {
    let entities = vec![
        CadEntity::polygon(
            vec![
                vec![local(0.0, 0.0), local(60.0, 0.0), local(60.0, 40.0), local(0.0, 40.0)],
                vec![local(20.0, 10.0), local(30.0, 10.0), local(30.0, 20.0), local(20.0, 20.0)],
            ],
            "PARCEL",
        ),
        CadEntity::line(local(0.0, -5.0), local(60.0, -5.0), "BOUNDARY"),
        CadEntity::polyline(
            [local(-10.0, 45.0), local(15.0, 52.0), local(40.0, 48.0), local(70.0, 55.0)],
            false,
            "FENCE",
        ),
        CadEntity::circle(local(45.0, 25.0), 3.0, "TREE").with_color_index(3),
        CadEntity::arc(local(60.0, 40.0), 8.0, 0.0, 90.0, "CURB"),
        CadEntity::point(local(5.0, 5.0), "CONTROL"),
        CadEntity::text(local(2.0, 42.0), "宗地 A", 2.5, "TEXT"),
    ];
    // 中线方向：每单位里程北 0.45、东 0.30
    let heading = 0.30f64.atan2(0.45).to_degrees();
    let alignment = Alignment::synthetic(local(-20.0, -40.0), 850.0, heading, 0.0015, 200.0, 20.0)?;
    Ok(SceneFile {
        entities,
        alignment: Some(alignment),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_scene_has_alignment_and_entities() {
        let scene = demo_scene().expect("demo scene");
        assert_eq!(scene.entities.len(), 7);
        let alignment = scene.alignment.expect("alignment");
        assert!((alignment.total_length() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn scene_file_round_trips_through_json() {
        let scene = demo_scene().expect("demo scene");
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "{}", serde_json::to_string(&scene).unwrap()).unwrap();
        let loaded = load_scene_file(file.path()).expect("load scene");
        assert_eq!(loaded, scene);
    }

    #[test]
    fn broken_scene_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "{{\"entities\": 3}}").unwrap();
        let err = load_scene_file(file.path()).unwrap_err();
        assert!(matches!(err, FrontendError::SceneParse { .. }));
        let missing = load_scene_file(Path::new("/nonexistent/scene.json")).unwrap_err();
        assert!(matches!(missing, FrontendError::SceneIo { .. }));
    }
}
