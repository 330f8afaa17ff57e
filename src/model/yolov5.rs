// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 检测流水线
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

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  frame::Frame,
  model::{DetectError, Detection, Engine, Model, Thresholds},
  postprocess::postprocess,
  preprocess::preprocess,
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Yolov5BuildError {
  #[error("模型输入尺寸必须大于 0")]
  ZeroInputSize,
  #[error("类别数必须大于 0")]
  ZeroClasses,
}

pub struct Yolov5Builder<E> {
  engine: E,
  input_size: u32,
  num_classes: Option<usize>,
}

impl<E: Engine> Yolov5Builder<E> {
  pub fn new(engine: E) -> Self {
    Self {
      engine,
      input_size: DEFAULT_INPUT_SIZE,
      num_classes: None,
    }
  }

  pub fn input_size(mut self, size: u32) -> Self {
    self.input_size = size;
    self
  }

  /// 不设置时由输出行长度推断
  pub fn num_classes(mut self, num_classes: Option<usize>) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn build(self) -> Result<Yolov5<E>, Yolov5BuildError> {
    if self.input_size == 0 {
      error!("模型输入尺寸为 0");
      return Err(Yolov5BuildError::ZeroInputSize);
    }
    if self.num_classes == Some(0) {
      error!("类别数为 0");
      return Err(Yolov5BuildError::ZeroClasses);
    }

    info!(
      "创建检测流水线: 输入尺寸 {}x{}, 类别数 {}",
      self.input_size,
      self.input_size,
      self
        .num_classes
        .map_or_else(|| "自动".to_string(), |c| c.to_string())
    );
    Ok(Yolov5 {
      engine: self.engine,
      input_size: self.input_size,
      num_classes: self.num_classes,
    })
  }
}

/// 单阶段检测器：预处理 → 推理 → 解码 → 过滤 → 抑制。
///
/// 调用之间不保留任何状态，阈值由调用者逐次传入。
pub struct Yolov5<E> {
  engine: E,
  input_size: u32,
  num_classes: Option<usize>,
}

impl<E: Engine> Yolov5<E> {
  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// 任一阶段失败都会中止本次调用，不返回部分结果
  pub fn run(&self, frame: &Frame, thresholds: &Thresholds) -> Result<Detection, DetectError> {
    let image_size = (frame.width(), frame.height());

    debug!("预处理输入帧");
    let input = preprocess(frame, self.input_size)?;

    debug!("执行模型推理");
    let output = self.engine.infer(&input).map_err(DetectError::inference)?;
    debug!("模型输出形状: {:?}", output.shape());

    debug!("后处理模型输出");
    let detection = postprocess(&output, self.num_classes, image_size, thresholds)?;
    debug!("检测到 {} 个物体", detection.len());

    Ok(detection)
  }

  /// 绑定一组阈值，得到可供任务循环使用的 [`Model`]
  pub fn configure(&self, confidence: f32, nms: f32) -> Yolov5Session<'_, E> {
    Yolov5Session {
      model: self,
      thresholds: Thresholds::new(confidence, nms),
    }
  }
}

pub struct Yolov5Session<'a, E> {
  model: &'a Yolov5<E>,
  thresholds: Thresholds,
}

impl<E> Yolov5Session<'_, E> {
  pub fn thresholds(&self) -> Thresholds {
    self.thresholds
  }
}

impl<E: Engine> Model for Yolov5Session<'_, E> {
  type Input = Frame;
  type Output = Detection;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.model.run(input, &self.thresholds)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::PixelOrder, tensor::Tensor};
  use std::cell::Cell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("引擎未加载")]
  struct NotLoaded;

  struct FixedEngine {
    output: Tensor,
    calls: Cell<usize>,
  }

  impl Engine for FixedEngine {
    type Error = NotLoaded;

    fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
      assert_eq!(input.shape(), &[1, 32, 32, 3]);
      self.calls.set(self.calls.get() + 1);
      Ok(self.output.clone())
    }
  }

  struct FailingEngine;

  impl Engine for FailingEngine {
    type Error = NotLoaded;

    fn infer(&self, _input: &Tensor) -> Result<Tensor, Self::Error> {
      Err(NotLoaded)
    }
  }

  fn frame(width: u32, height: u32) -> Frame {
    let data = vec![128u8; (width * height * 3) as usize];
    Frame::from_raw(width, height, 3, PixelOrder::Rgb, data).unwrap()
  }

  fn detector(rows: Vec<f32>, stride: usize) -> Yolov5<FixedEngine> {
    let anchors = rows.len() / stride;
    let engine = FixedEngine {
      output: Tensor::new(vec![1, anchors, stride], rows),
      calls: Cell::new(0),
    };
    Yolov5Builder::new(engine).input_size(32).build().unwrap()
  }

  #[test]
  fn run_produces_pixel_space_detections() {
    let yolo = detector(vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.9, 0.1], 7);
    let detection = yolo.run(&frame(100, 50), &Thresholds::new(0.4, 0.4)).unwrap();

    assert_eq!(detection.len(), 1);
    assert_eq!(detection.boxes()[0].left, 40);
    assert_eq!(detection.boxes()[0].top, 20);
    assert_eq!(detection.boxes()[0].width, 20);
    assert_eq!(detection.boxes()[0].height, 10);
    assert_eq!(detection.labels(), &[0]);
  }

  #[test]
  fn session_binds_thresholds() {
    let yolo = detector(vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.6], 6);
    let strict = yolo.configure(0.6, 0.4);
    let loose = yolo.configure(0.3, 0.4);

    assert!(strict.infer(&frame(10, 10)).unwrap().is_empty());
    assert_eq!(loose.infer(&frame(10, 10)).unwrap().len(), 1);
    assert_eq!(yolo.engine().calls.get(), 2);
  }

  #[test]
  fn no_state_is_retained_between_runs() {
    let yolo = detector(vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.9], 6);
    let t = Thresholds::default();
    let a = yolo.run(&frame(64, 64), &t).unwrap();
    let b = yolo.run(&frame(64, 64), &t).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 1);
  }

  #[test]
  fn invalid_image_skips_inference() {
    let yolo = detector(vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.9], 6);
    let err = yolo.run(&Frame::empty(), &Thresholds::default()).unwrap_err();
    assert!(matches!(err, DetectError::InvalidImage(_)));
    assert_eq!(yolo.engine().calls.get(), 0);
  }

  #[test]
  fn engine_failure_surfaces_as_inference_error() {
    let yolo = Yolov5Builder::new(FailingEngine)
      .input_size(32)
      .build()
      .unwrap();
    let err = yolo.run(&frame(8, 8), &Thresholds::default()).unwrap_err();
    assert!(matches!(err, DetectError::InferenceError(_)));
  }

  #[test]
  fn declared_class_count_is_checked() {
    let engine = FixedEngine {
      output: Tensor::new(vec![1, 1, 7], vec![0.0; 7]),
      calls: Cell::new(0),
    };
    let yolo = Yolov5Builder::new(engine)
      .input_size(32)
      .num_classes(Some(80))
      .build()
      .unwrap();
    let err = yolo.run(&frame(8, 8), &Thresholds::default()).unwrap_err();
    assert!(matches!(err, DetectError::ShapeMismatch(_)));
  }

  #[test]
  fn zero_sizes_are_rejected_at_build() {
    let engine = || FixedEngine {
      output: Tensor::new(vec![1, 0, 6], Vec::<f32>::new()),
      calls: Cell::new(0),
    };
    assert_eq!(
      Yolov5Builder::new(engine()).input_size(0).build().err(),
      Some(Yolov5BuildError::ZeroInputSize)
    );
    assert_eq!(
      Yolov5Builder::new(engine()).num_classes(Some(0)).build().err(),
      Some(Yolov5BuildError::ZeroClasses)
    );
  }
}
