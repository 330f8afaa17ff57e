// 该文件是 Beifeng （北风） 项目的一部分。
// src/tensor.rs - 张量定义
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

use serde::{Deserialize, Serialize};

/// 稠密 f32 张量：形状加自有缓冲区。
///
/// 构造时不校验形状与缓冲区长度是否一致，推理引擎返回的张量
/// 可能不一致，由解码阶段负责拒绝。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
  shape: Box<[usize]>,
  data: Box<[f32]>,
}

impl Tensor {
  pub fn new(shape: impl Into<Box<[usize]>>, data: impl Into<Box<[f32]>>) -> Self {
    Self {
      shape: shape.into(),
      data: data.into(),
    }
  }

  /// NHWC 输入张量 `[1, S, S, 3]`，全零
  pub fn zeros_nhwc(size: usize) -> Self {
    Self::new(vec![1, size, size, 3], vec![0.0; size * size * 3])
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }

  /// 形状声明的元素个数
  pub fn declared_len(&self) -> usize {
    self.shape.iter().product()
  }

  pub fn is_consistent(&self) -> bool {
    self.declared_len() == self.data.len()
  }
}
