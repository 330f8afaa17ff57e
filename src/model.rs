// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  postprocess::{Rect, ShapeMismatch},
  preprocess::InvalidImage,
  tensor::Tensor,
};

/// 帧到检测结果的模型，任务循环只依赖这个接口
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎：输入 `[1, S, S, 3]`，输出 `[1, N, 5+C]`。
///
/// 加载后只读；是否允许多线程同时推理取决于具体引擎，这里不加锁。
pub trait Engine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error>;
}

impl<E: Engine + ?Sized> Engine for &E {
  type Error = E::Error;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    (**self).infer(input)
  }
}

/// 置信度与 NMS 阈值。不做范围检查，超出 [0, 1] 时结果为全选或全不选
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub confidence: f32,
  pub nms: f32,
}

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.40;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.40;

impl Thresholds {
  pub fn new(confidence: f32, nms: f32) -> Self {
    Self { confidence, nms }
  }
}

impl Default for Thresholds {
  fn default() -> Self {
    Self::new(DEFAULT_CONF_THRESHOLD, DEFAULT_NMS_THRESHOLD)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem {
  pub class_id: usize,
  pub score: f32,
  pub rect: Rect,
}

/// 一次推理的检测结果，三个序列等长且下标一一对应，按分数降序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detection {
  boxes: Vec<Rect>,
  scores: Vec<f32>,
  labels: Vec<usize>,
}

impl Detection {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      boxes: Vec::with_capacity(capacity),
      scores: Vec::with_capacity(capacity),
      labels: Vec::with_capacity(capacity),
    }
  }

  pub fn push(&mut self, rect: Rect, score: f32, label: usize) {
    self.boxes.push(rect);
    self.scores.push(score);
    self.labels.push(label);
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn boxes(&self) -> &[Rect] {
    &self.boxes
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  pub fn iter(&self) -> impl ExactSizeIterator<Item = DetectItem> + '_ {
    self
      .boxes
      .iter()
      .zip(&self.scores)
      .zip(&self.labels)
      .map(|((&rect, &score), &class_id)| DetectItem {
        class_id,
        score,
        rect,
      })
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("无效图像: {0}")]
  InvalidImage(#[from] InvalidImage),
  #[error("输出形状不匹配: {0}")]
  ShapeMismatch(#[from] ShapeMismatch),
  #[error("推理错误: {0}")]
  InferenceError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectError {
  pub fn inference<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectError::InferenceError(Box::new(err))
  }
}

mod labels;
pub use self::labels::{COCO_LABELS, LabelError, Labels};

mod yolov5;
pub use self::yolov5::{
  DEFAULT_INPUT_SIZE, Yolov5, Yolov5BuildError, Yolov5Builder, Yolov5Session,
};

mod replay;
pub use self::replay::{ReplayEngine, ReplayEngineError};

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{RknnEngine, RknnEngineError};

/// 模型文件缺失、不可读或内容损坏
#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("无法读取模型文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件损坏: {0}")]
  Corrupt(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("不支持的模型: {0}")]
  Unsupported(String),
}

impl ModelLoadError {
  pub fn corrupt<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    ModelLoadError::Corrupt(Box::new(err))
  }
}

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("回放引擎错误: {0}")]
  ReplayEngineError(#[from] ReplayEngineError),
  #[cfg(feature = "rknpu")]
  #[error("RKNN 引擎错误: {0}")]
  RknnEngineError(#[from] RknnEngineError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl EngineError {
  /// 各后端的加载失败统一归为 [`ModelLoadError`]
  pub fn model_load(&self) -> Option<&ModelLoadError> {
    match self {
      EngineError::ReplayEngineError(ReplayEngineError::ModelLoadError(e)) => Some(e),
      #[cfg(feature = "rknpu")]
      EngineError::RknnEngineError(RknnEngineError::ModelLoadError(e)) => Some(e),
      _ => None,
    }
  }
}

/// 按 URL 方案选择的推理引擎
pub enum EngineWrapper {
  Replay(ReplayEngine),
  #[cfg(feature = "rknpu")]
  Rknn(RknnEngine),
}

impl FromUrl for EngineWrapper {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      ReplayEngine::SCHEME => Ok(EngineWrapper::Replay(ReplayEngine::from_url(url)?)),
      #[cfg(feature = "rknpu")]
      RknnEngine::SCHEME => Ok(EngineWrapper::Rknn(RknnEngine::from_url(url)?)),
      other => Err(EngineError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Engine for EngineWrapper {
  type Error = EngineError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    match self {
      EngineWrapper::Replay(engine) => engine.infer(input).map_err(EngineError::from),
      #[cfg(feature = "rknpu")]
      EngineWrapper::Rknn(engine) => engine.infer(input).map_err(EngineError::from),
    }
  }
}
