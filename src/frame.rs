// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - 图像帧定义
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

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

pub const RGB_CHANNELS: u8 = 3;

/// 像素通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelOrder {
  #[default]
  Rgb,
  /// 摄像头驱动常见的 BGR 顺序
  Bgr,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(u8),
}

/// 交织存储 (HWC) 的 8 位图像帧，原点位于左上角
#[derive(Debug, Clone)]
pub struct Frame {
  width: u32,
  height: u32,
  channels: u8,
  order: PixelOrder,
  data: Box<[u8]>,
}

impl Frame {
  pub fn from_raw(
    width: u32,
    height: u32,
    channels: u8,
    order: PixelOrder,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if channels == 0 || channels > 4 {
      return Err(FrameError::UnsupportedChannels(channels));
    }

    let expected = width as usize * height as usize * channels as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      channels,
      order,
      data: data.into_boxed_slice(),
    })
  }

  /// 空帧（零宽高），对应读取失败的视频帧
  pub fn empty() -> Self {
    Self {
      width: 0,
      height: 0,
      channels: RGB_CHANNELS,
      order: PixelOrder::Rgb,
      data: Box::new([]),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> u8 {
    self.channels
  }

  pub fn order(&self) -> PixelOrder {
    self.order
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0 || self.data.is_empty()
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  /// 生成 RGB 顺序的图像副本，多余的 alpha 通道被丢弃。
  /// 通道数少于 3 时返回 None。
  pub fn to_rgb_image(&self) -> Option<RgbImage> {
    if self.channels < RGB_CHANNELS {
      return None;
    }

    let channels = self.channels as usize;
    let width = self.width as usize;
    let data = &self.data;
    let (r, b) = match self.order {
      PixelOrder::Rgb => (0, 2),
      PixelOrder::Bgr => (2, 0),
    };

    Some(ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * width + x as usize) * channels;
      Rgb([data[idx + r], data[idx + 1], data[idx + b]])
    }))
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      channels: RGB_CHANNELS,
      order: PixelOrder::Rgb,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<DynamicImage> for Frame {
  fn from(image: DynamicImage) -> Self {
    let (width, height) = (image.width(), image.height());
    // 保留原始通道数，由预处理决定是否接受
    let (channels, data) = match image {
      DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
      DynamicImage::ImageLumaA8(img) => (2, img.into_raw()),
      DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
      DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
      other => {
        let color = other.color();
        if color.channel_count() >= RGB_CHANNELS && color.has_alpha() {
          (4, other.into_rgba8().into_raw())
        } else if color.channel_count() >= RGB_CHANNELS {
          (3, other.into_rgb8().into_raw())
        } else if color.has_alpha() {
          (2, other.into_luma_alpha8().into_raw())
        } else {
          (1, other.into_luma8().into_raw())
        }
      }
    };

    Self {
      width,
      height,
      channels,
      order: PixelOrder::Rgb,
      data: data.into_boxed_slice(),
    }
  }
}
