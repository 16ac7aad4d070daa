use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "GEOSTAKE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub stakeout: StakeoutConfig,
    #[serde(default)]
    pub snap: SnapConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并校验数值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `GEOSTAKE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 所有容差、桩距与阈值必须为正。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stakeout;
        let checks = [
            ("stakeout.point_horizontal_tol", s.point_horizontal_tol),
            ("stakeout.point_vertical_tol", s.point_vertical_tol),
            ("stakeout.line_lateral_tol", s.line_lateral_tol),
            ("stakeout.line_chain_tol", s.line_chain_tol),
            ("stakeout.line_interval", s.line_interval),
            ("stakeout.road_chain_tol", s.road_chain_tol),
            ("stakeout.road_lateral_tol", s.road_lateral_tol),
            ("stakeout.road_elevation_tol", s.road_elevation_tol),
            ("stakeout.road_interval", s.road_interval),
            ("stakeout.cad_horizontal_tol", s.cad_horizontal_tol),
            ("snap.tolerance_px", self.snap.tolerance_px),
            ("snap.world_tolerance_m", self.snap.world_tolerance_m),
            ("display.simplify_epsilon", self.display.simplify_epsilon),
            ("display.select_threshold_px", self.display.select_threshold_px),
        ];
        for (key, value) in checks {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::Invalid { key, value });
            }
        }
        if let Some(projection) = &self.stakeout.projection {
            if !projection.origin_lat.is_finite() || projection.origin_lat.abs() >= 90.0 {
                return Err(ConfigError::Invalid {
                    key: "stakeout.projection.origin_lat",
                    value: projection.origin_lat,
                });
            }
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    #[default]
    Cli,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
    /// 演示放样时模拟的观测次数。
    #[serde(default = "FrontendConfig::default_demo_epochs")]
    pub demo_epochs: usize,
}

impl FrontendConfig {
    fn default_demo_epochs() -> usize {
        8
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_mode: FrontendMode::default(),
            demo_epochs: Self::default_demo_epochs(),
        }
    }
}

/// 局部平面投影参数；缺省时使用线性近似。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProjectionConfig {
    pub origin_lat: f64,
    pub origin_lon: f64,
    #[serde(default)]
    pub false_easting: f64,
    #[serde(default)]
    pub false_northing: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StakeoutConfig {
    pub point_horizontal_tol: f64,
    pub point_vertical_tol: f64,
    pub line_lateral_tol: f64,
    pub line_chain_tol: f64,
    pub line_interval: f64,
    pub road_chain_tol: f64,
    pub road_lateral_tol: f64,
    pub road_elevation_tol: f64,
    pub road_interval: f64,
    pub cad_horizontal_tol: f64,
    pub projection: Option<ProjectionConfig>,
}

impl Default for StakeoutConfig {
    fn default() -> Self {
        Self {
            point_horizontal_tol: 0.10,
            point_vertical_tol: 0.05,
            line_lateral_tol: 0.20,
            line_chain_tol: 0.50,
            line_interval: 10.0,
            road_chain_tol: 0.20,
            road_lateral_tol: 0.10,
            road_elevation_tol: 0.05,
            road_interval: 20.0,
            cad_horizontal_tol: 0.05,
            projection: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub enabled: bool,
    pub world_mode: bool,
    pub tolerance_px: f64,
    pub world_tolerance_m: f64,
    pub dynamic: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            world_mode: false,
            tolerance_px: 24.0,
            world_tolerance_m: 1.0,
            dynamic: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub simplify_threshold: usize,
    pub simplify_epsilon: f64,
    pub select_threshold_px: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            simplify_threshold: 500,
            simplify_epsilon: 0.5,
            select_threshold_px: 40.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置项 {key} 必须为正数，实际为 {value}")]
    Invalid { key: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Cli);
        assert_eq!(cfg.stakeout.point_horizontal_tol, 0.10);
        assert_eq!(cfg.stakeout.road_interval, 20.0);
        assert!(cfg.stakeout.projection.is_none());
        assert!(!cfg.snap.enabled);
        assert_eq!(cfg.display.simplify_threshold, 500);
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [frontend]
            default_mode = "cli"
            demo_epochs = 3

            [stakeout]
            point_horizontal_tol = 0.02
            line_interval = 5.0

            [stakeout.projection]
            origin_lat = 41.0
            origin_lon = 29.0
            false_easting = 500000.0

            [snap]
            enabled = true
            world_mode = true
            world_tolerance_m = 2.0
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.frontend.demo_epochs, 3);
        assert_eq!(cfg.stakeout.point_horizontal_tol, 0.02);
        assert_eq!(cfg.stakeout.point_vertical_tol, 0.05);
        assert_eq!(cfg.stakeout.line_interval, 5.0);
        let projection = cfg.stakeout.projection.expect("projection");
        assert_eq!(projection.false_easting, 500000.0);
        assert_eq!(projection.false_northing, 0.0);
        assert!(cfg.snap.enabled && cfg.snap.world_mode);
        assert_eq!(cfg.snap.tolerance_px, 24.0);
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [stakeout]
            road_interval = 0.0
            "#
        )
        .unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "stakeout.road_interval",
                ..
            }
        ));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[snap]\nenabled = \"maybe\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
