// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/replay.rs - 回放推理引擎
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Engine, ModelLoadError},
  tensor::Tensor,
};

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] ModelLoadError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输入形状错误: 期望 [1, S, S, 3], 实际 {0:?}")]
  InputShape(Vec<usize>),
}

/// 回放预先录制的输出张量，文件格式为 `{"shape": [...], "data": [...]}`。
///
/// 用于离线复现与测试，不依赖任何加速硬件。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  output: Tensor,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayEngineError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Self::load(url.path())
  }
}

impl ReplayEngine {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayEngineError> {
    let path = path.as_ref();
    info!("加载回放输出: {}", path.display());
    let content = std::fs::read(path)
      .inspect_err(|e| error!("无法读取回放文件 {}: {}", path.display(), e))
      .map_err(ModelLoadError::from)?;
    let output: Tensor = serde_json::from_slice(&content)
      .inspect_err(|e| error!("回放文件 {} 内容损坏: {}", path.display(), e))
      .map_err(ModelLoadError::corrupt)?;
    debug!(
      "回放输出形状: {:?}, 元素个数: {}",
      output.shape(),
      output.data().len()
    );
    Ok(Self { output })
  }

  pub fn from_tensor(output: Tensor) -> Self {
    Self { output }
  }
}

impl Engine for ReplayEngine {
  type Error = ReplayEngineError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    match input.shape() {
      &[1, h, w, 3] if h == w => Ok(self.output.clone()),
      shape => Err(ReplayEngineError::InputShape(shape.to_vec())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn loads_recorded_tensor_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"shape": [1, 1, 6], "data": [0.5, 0.5, 0.2, 0.2, 0.9, 0.9]}}"#).unwrap();

    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&format!("replay://{}", url.path())).unwrap();
    let engine = ReplayEngine::from_url(&url).unwrap();

    let output = engine.infer(&Tensor::zeros_nhwc(4)).unwrap();
    assert_eq!(output.shape(), &[1, 1, 6]);
    assert_eq!(output.data()[4], 0.9);
  }

  #[test]
  fn missing_file_is_load_error() {
    let err = ReplayEngine::load("/nonexistent/output.json").unwrap_err();
    assert!(matches!(
      err,
      ReplayEngineError::ModelLoadError(ModelLoadError::Io(_))
    ));
  }

  #[test]
  fn malformed_file_is_load_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "garbage").unwrap();
    let err = ReplayEngine::load(file.path()).unwrap_err();
    assert!(matches!(
      err,
      ReplayEngineError::ModelLoadError(ModelLoadError::Corrupt(_))
    ));
  }

  #[test]
  fn rejects_wrong_scheme_and_input_shape() {
    let url = Url::parse("rknn:///tmp/model.rknn").unwrap();
    assert!(matches!(
      ReplayEngine::from_url(&url),
      Err(ReplayEngineError::SchemeMismatch(_))
    ));

    let engine = ReplayEngine::from_tensor(Tensor::new(vec![1, 0, 6], Vec::<f32>::new()));
    let err = engine
      .infer(&Tensor::new(vec![1, 3, 4, 4], vec![0.0; 48]))
      .unwrap_err();
    assert!(matches!(err, ReplayEngineError::InputShape(_)));
  }
}
