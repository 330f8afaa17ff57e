// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use super::Rect;

/// 贪心 NMS，不区分类别。
///
/// 只考虑分数严格大于 `score_threshold` 的框；按分数降序（稳定排序，
/// 分数相同时原始下标小者在前）依次选取，若与任一已保留框的 IoU
/// 大于 `nms_threshold` 则丢弃。返回保留框的下标，按分数降序。
pub fn non_maximum_suppression(
  rects: &[Rect],
  scores: &[f32],
  score_threshold: f32,
  nms_threshold: f32,
) -> Vec<usize> {
  debug_assert_eq!(rects.len(), scores.len());
  let count = rects.len().min(scores.len());

  let mut order: Vec<usize> = (0..count)
    .filter(|&i| scores[i] > score_threshold)
    .collect();
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut kept: Vec<usize> = Vec::with_capacity(order.len());
  'outer: for i in order {
    for &k in kept.iter() {
      if rects[i].iou(&rects[k]) > nms_threshold {
        continue 'outer;
      }
    }
    kept.push(i);
  }

  kept
}
