// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess.rs - 检测结果后处理
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
use tracing::debug;

use crate::{
  model::{Detection, Thresholds},
  tensor::Tensor,
};

mod decode;
mod filter;
mod nms;

pub use self::decode::{BOX_FIELDS, PredictionRow, Predictions, ShapeMismatch, decode};
pub use self::filter::{Candidate, filter_candidates};
pub use self::nms::non_maximum_suppression;

/// 像素坐标下的轴对齐矩形，(left, top) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rect {
  pub left: i32,
  pub top: i32,
  pub width: i32,
  pub height: i32,
}

impl Rect {
  pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  pub fn right(&self) -> i32 {
    self.left.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.top.saturating_add(self.height)
  }

  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      return 0;
    }
    self.width as i64 * self.height as i64
  }

  pub fn intersection(&self, other: &Rect) -> i64 {
    let x1 = self.left.max(other.left) as i64;
    let y1 = self.top.max(other.top) as i64;
    let x2 = self.right().min(other.right()) as i64;
    let y2 = self.bottom().min(other.bottom()) as i64;

    let (w, h) = (x2 - x1, y2 - y1);
    if w <= 0 || h <= 0 { 0 } else { w * h }
  }

  /// 交并比，并集为零时返回 0
  pub fn iou(&self, other: &Rect) -> f32 {
    let intersection = self.intersection(other);
    let union = self.area() + other.area() - intersection;
    if union > 0 {
      (intersection as f64 / union as f64) as f32
    } else {
      0.0
    }
  }
}

/// 解码、过滤并抑制引擎输出，组装为最终检测结果。
///
/// `image_size` 为原始图像的 (宽, 高)。抑制不区分类别。
pub fn postprocess(
  output: &Tensor,
  num_classes: Option<usize>,
  image_size: (u32, u32),
  thresholds: &Thresholds,
) -> Result<Detection, ShapeMismatch> {
  let predictions = decode(output, num_classes)?;
  debug!(
    "解码输出: {} 个锚点, 每行 {} 个值",
    predictions.len(),
    predictions.stride()
  );

  let candidates = filter_candidates(&predictions, thresholds.confidence, image_size);
  debug!("置信度过滤后剩余 {} 个候选框", candidates.len());

  let rects: Vec<Rect> = candidates.iter().map(|c| c.rect).collect();
  let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
  let indices = non_maximum_suppression(&rects, &scores, thresholds.confidence, thresholds.nms);
  debug!("NMS 后保留 {} 个检测框", indices.len());

  let mut detection = Detection::with_capacity(indices.len());
  for i in indices {
    let Candidate {
      rect,
      score,
      class_id,
    } = candidates[i];
    detection.push(rect, score, class_id);
  }

  Ok(detection)
}
