// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/decode.rs - 输出张量解码
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
use tracing::error;

use crate::tensor::Tensor;

/// 每行前 5 个值: cx, cy, w, h, objectness
pub const BOX_FIELDS: usize = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeMismatch {
  #[error("输出张量维度错误: 期望 [1, N, 5+C], 实际 {0:?}")]
  Rank(Vec<usize>),
  #[error("批大小必须为 1, 实际为 {0}")]
  Batch(usize),
  #[error("每行长度 {actual} 与类别数 {classes} 不符, 期望 {expected}")]
  Stride {
    expected: usize,
    actual: usize,
    classes: usize,
  },
  #[error("每行长度 {0} 不足以容纳任何类别")]
  StrideTooShort(usize),
  #[error("声明的元素个数 {declared} 与缓冲区长度 {actual} 不一致")]
  Length { declared: usize, actual: usize },
}

/// 单个锚点的预测: `[cx, cy, w, h, objectness, class_0 .. class_{C-1}]`，
/// 坐标相对于模型输入归一化到 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRow<'a>(&'a [f32]);

impl<'a> PredictionRow<'a> {
  pub fn cx(&self) -> f32 {
    self.0[0]
  }

  pub fn cy(&self) -> f32 {
    self.0[1]
  }

  pub fn w(&self) -> f32 {
    self.0[2]
  }

  pub fn h(&self) -> f32 {
    self.0[3]
  }

  pub fn objectness(&self) -> f32 {
    self.0[4]
  }

  pub fn class_scores(&self) -> &'a [f32] {
    &self.0[BOX_FIELDS..]
  }

  pub fn as_slice(&self) -> &'a [f32] {
    self.0
  }
}

/// 按锚点顺序排列的预测行视图，不复制缓冲区
#[derive(Debug, Clone, Copy)]
pub struct Predictions<'a> {
  data: &'a [f32],
  stride: usize,
}

impl<'a> Predictions<'a> {
  pub fn len(&self) -> usize {
    self.data.len() / self.stride
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn stride(&self) -> usize {
    self.stride
  }

  pub fn num_classes(&self) -> usize {
    self.stride - BOX_FIELDS
  }

  pub fn get(&self, index: usize) -> Option<PredictionRow<'a>> {
    let start = index.checked_mul(self.stride)?;
    let end = start.checked_add(self.stride)?;
    self.data.get(start..end).map(PredictionRow)
  }

  pub fn rows(&self) -> impl ExactSizeIterator<Item = PredictionRow<'a>> + 'a {
    self.data.chunks_exact(self.stride).map(PredictionRow)
  }
}

/// 将 `[1, N, 5+C]` 输出重解释为 N 个预测行，纯粹的形状变换。
///
/// `num_classes` 为 None 时类别数由行长度推断。
pub fn decode(tensor: &Tensor, num_classes: Option<usize>) -> Result<Predictions<'_>, ShapeMismatch> {
  let shape = tensor.shape();
  let &[batch, _anchors, stride] = shape else {
    error!("输出张量维度错误: {:?}", shape);
    return Err(ShapeMismatch::Rank(shape.to_vec()));
  };

  if batch != 1 {
    return Err(ShapeMismatch::Batch(batch));
  }

  match num_classes {
    Some(classes) if stride != classes + BOX_FIELDS => {
      error!("输出行长度 {} 与类别数 {} 不符", stride, classes);
      return Err(ShapeMismatch::Stride {
        expected: classes + BOX_FIELDS,
        actual: stride,
        classes,
      });
    }
    _ if stride <= BOX_FIELDS => return Err(ShapeMismatch::StrideTooShort(stride)),
    _ => {}
  }

  let declared = tensor.declared_len();
  if declared != tensor.data().len() {
    error!(
      "输出张量声明 {} 个元素, 实际缓冲区 {} 个",
      declared,
      tensor.data().len()
    );
    return Err(ShapeMismatch::Length {
      declared,
      actual: tensor.data().len(),
    });
  }

  Ok(Predictions {
    data: tensor.data(),
    stride,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_follow_buffer_order() {
    let data: Vec<f32> = (0..21).map(|v| v as f32 * 0.5).collect();
    let tensor = Tensor::new(vec![1, 3, 7], data.clone());
    let predictions = decode(&tensor, Some(2)).unwrap();

    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions.num_classes(), 2);
    for (i, row) in predictions.rows().enumerate() {
      assert_eq!(row.as_slice(), &data[i * 7..(i + 1) * 7]);
    }

    let row = predictions.get(1).unwrap();
    assert_eq!(row.cx(), 3.5);
    assert_eq!(row.objectness(), 5.5);
    assert_eq!(row.class_scores(), &[6.0, 6.5]);
    assert!(predictions.get(3).is_none());
    assert!(predictions.get(usize::MAX / 7).is_none());
    assert!(predictions.get(usize::MAX).is_none());
  }

  #[test]
  fn infers_class_count_from_stride() {
    let tensor = Tensor::new(vec![1, 2, 85], vec![0.0; 170]);
    assert_eq!(decode(&tensor, None).unwrap().num_classes(), 80);
  }

  #[test]
  fn zero_anchors_is_empty() {
    let tensor = Tensor::new(vec![1, 0, 6], Vec::<f32>::new());
    let predictions = decode(&tensor, Some(1)).unwrap();
    assert!(predictions.is_empty());
    assert_eq!(predictions.rows().count(), 0);
  }

  #[test]
  fn rejects_inconsistent_shapes() {
    let tensor = Tensor::new(vec![1, 2, 7], vec![0.0; 14]);
    assert_eq!(
      decode(&tensor, Some(3)).unwrap_err(),
      ShapeMismatch::Stride {
        expected: 8,
        actual: 7,
        classes: 3
      }
    );

    let tensor = Tensor::new(vec![1, 2, 7], vec![0.0; 13]);
    assert_eq!(
      decode(&tensor, Some(2)).unwrap_err(),
      ShapeMismatch::Length {
        declared: 14,
        actual: 13
      }
    );

    let tensor = Tensor::new(vec![2, 7], vec![0.0; 14]);
    assert!(matches!(decode(&tensor, None), Err(ShapeMismatch::Rank(_))));

    let tensor = Tensor::new(vec![2, 1, 7], vec![0.0; 14]);
    assert_eq!(decode(&tensor, None).unwrap_err(), ShapeMismatch::Batch(2));

    let tensor = Tensor::new(vec![1, 1, 5], vec![0.0; 5]);
    assert_eq!(
      decode(&tensor, None).unwrap_err(),
      ShapeMismatch::StrideTooShort(5)
    );
  }
}
