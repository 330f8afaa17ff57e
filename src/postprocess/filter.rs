// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/filter.rs - 候选框置信度过滤
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

use tracing::trace;

use super::{PredictionRow, Predictions, Rect};

/// 通过置信度过滤的单个候选框，坐标为原图像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub rect: Rect,
  pub score: f32,
  pub class_id: usize,
}

/// 找到 `class_score * objectness` 最大的类别，相等时取较小的类别编号
fn best_class(row: &PredictionRow) -> (usize, f32) {
  let objectness = row.objectness();
  let mut class_id = 0usize;
  let mut confidence = f32::NEG_INFINITY;
  for (j, &class_score) in row.class_scores().iter().enumerate() {
    let score = class_score * objectness;
    if score > confidence {
      confidence = score;
      class_id = j;
    }
  }
  (class_id, confidence)
}

/// 中心点格式的归一化框转换为原图左上角格式的像素矩形，向零截断
fn to_pixel_rect(row: &PredictionRow, width: f32, height: f32) -> Rect {
  let (cx, cy, w, h) = (row.cx(), row.cy(), row.w(), row.h());
  Rect {
    left: ((cx - w / 2.0) * width) as i32,
    top: ((cy - h / 2.0) * height) as i32,
    width: (w * width) as i32,
    height: (h * height) as i32,
  }
}

/// 对每个锚点做两次阈值检查：先检查 objectness，再检查组合分数，
/// 两者都要求严格大于 `conf_threshold`。
///
/// 输出保持锚点顺序。宽或高截断后不为正的框被丢弃。
pub fn filter_candidates(
  predictions: &Predictions,
  conf_threshold: f32,
  (image_width, image_height): (u32, u32),
) -> Vec<Candidate> {
  let (width, height) = (image_width as f32, image_height as f32);
  let mut candidates = Vec::new();

  for (anchor, row) in predictions.rows().enumerate() {
    // NaN 也会在这里被拒绝
    if !(row.objectness() > conf_threshold) {
      continue;
    }

    let (class_id, confidence) = best_class(&row);
    if !(confidence > conf_threshold) {
      continue;
    }

    let rect = to_pixel_rect(&row, width, height);
    if rect.width <= 0 || rect.height <= 0 {
      trace!("锚点 {} 的检测框退化: {:?}", anchor, rect);
      continue;
    }

    candidates.push(Candidate {
      rect,
      score: confidence,
      class_id,
    });
  }

  candidates
}
