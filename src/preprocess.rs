// 该文件是 Beifeng （北风） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::imageops::{FilterType, resize};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{Frame, RGB_CHANNELS},
  tensor::Tensor,
};

const PIXEL_MAX: f32 = 255.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidImage {
  #[error("输入图像为空")]
  Empty,
  #[error("输入图像通道数不足: {0} < 3")]
  TooFewChannels(u8),
}

/// 将任意尺寸的图像缩放（不裁剪）到 `size x size`，转为 RGB 顺序，
/// 归一化到 `[0, 1]`，输出形状为 `[1, size, size, 3]` 的 NHWC 张量。
///
/// 源帧只读，通道重排发生在新的缓冲区中。
pub fn preprocess(frame: &Frame, size: u32) -> Result<Tensor, InvalidImage> {
  if frame.is_empty() {
    return Err(InvalidImage::Empty);
  }
  if frame.channels() < RGB_CHANNELS {
    return Err(InvalidImage::TooFewChannels(frame.channels()));
  }

  let rgb = frame
    .to_rgb_image()
    .ok_or(InvalidImage::TooFewChannels(frame.channels()))?;

  debug!(
    "预处理: {}x{} -> {}x{}",
    frame.width(),
    frame.height(),
    size,
    size
  );

  // Triangle 即双线性插值
  let resized = resize(&rgb, size, size, FilterType::Triangle);
  let data: Vec<f32> = resized
    .into_raw()
    .into_iter()
    .map(|v| v as f32 / PIXEL_MAX)
    .collect();

  let side = size as usize;
  Ok(Tensor::new(vec![1, side, side, RGB_CHANNELS as usize], data))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::PixelOrder;

  fn gradient(width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
      for x in 0..width {
        data.extend_from_slice(&[(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]);
      }
    }
    Frame::from_raw(width, height, 3, PixelOrder::Rgb, data).unwrap()
  }

  #[test]
  fn output_has_nhwc_shape_and_unit_range() {
    let tensor = preprocess(&gradient(37, 21), 16).unwrap();
    assert_eq!(tensor.shape(), &[1, 16, 16, 3]);
    assert!(tensor.is_consistent());
    assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn uniform_image_normalizes_exactly() {
    let frame = Frame::from_raw(5, 3, 3, PixelOrder::Rgb, [255u8, 0, 51].repeat(15)).unwrap();
    let tensor = preprocess(&frame, 8).unwrap();
    for px in tensor.data().chunks_exact(3) {
      assert_eq!(px[0], 1.0);
      assert_eq!(px[1], 0.0);
      assert!((px[2] - 0.2).abs() < 1e-6);
    }
  }

  #[test]
  fn bgr_input_is_reordered() {
    let frame = Frame::from_raw(2, 2, 3, PixelOrder::Bgr, [0u8, 0, 255].repeat(4)).unwrap();
    let tensor = preprocess(&frame, 2).unwrap();
    assert_eq!(&tensor.data()[..3], &[1.0, 0.0, 0.0]);
  }

  #[test]
  fn deterministic() {
    let frame = gradient(64, 48);
    let a = preprocess(&frame, 32).unwrap();
    let b = preprocess(&frame, 32).unwrap();
    let a_bits: Vec<u32> = a.data().iter().map(|v| v.to_bits()).collect();
    let b_bits: Vec<u32> = b.data().iter().map(|v| v.to_bits()).collect();
    assert_eq!(a_bits, b_bits);
  }

  #[test]
  fn rejects_empty_and_gray() {
    assert_eq!(preprocess(&Frame::empty(), 640).unwrap_err(), InvalidImage::Empty);

    let gray = Frame::from_raw(2, 2, 1, PixelOrder::Rgb, vec![0; 4]).unwrap();
    assert_eq!(
      preprocess(&gray, 640).unwrap_err(),
      InvalidImage::TooFewChannels(1)
    );
  }
}
