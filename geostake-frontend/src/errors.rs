use std::path::PathBuf;

use thiserror::Error;

use geostake_engine::errors::EngineError;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("读取场景文件 {path:?} 失败: {source}")]
    SceneIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析场景文件 {path:?} 失败: {source}")]
    SceneParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("配置无法应用到放样引擎: {0}")]
    Engine(#[from] EngineError),
}
