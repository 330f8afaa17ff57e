// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/image_directory.rs - 图像序列目录输入
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

// 与 image 启用的解码特性一致
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐帧读取目录中的图片，相当于解码后的视频帧序列。
///
/// 解码失败的文件产生空帧，由流水线报告为无效图像。
pub struct ImageDirectoryInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| {
        IMAGE_EXTENSIONS
          .iter()
          .any(|known| ext.eq_ignore_ascii_case(known))
      })
      .unwrap_or(false)
}

impl ImageDirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageDirectoryInputError> {
    let directory = directory.as_ref();
    let mut files = std::fs::read_dir(directory)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| is_image_file(path));
    files.sort();

    info!("目录 {} 中共有 {} 帧图像", directory.display(), files.len());
    Ok(Self {
      files: files.into(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.pop_front()?;
    debug!("读取帧: {}", path.display());

    let image = ImageReader::open(&path)
      .and_then(|reader| reader.with_guessed_format())
      .map_err(image::ImageError::IoError)
      .and_then(|reader| reader.decode());

    match image {
      Ok(image) => Some(Frame::from(image)),
      Err(e) => {
        warn!("无法解码 {}: {}", path.display(), e);
        Some(Frame::empty())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn frames_come_in_file_name_order() {
    let dir = tempfile::tempdir().unwrap();
    for (name, value) in [("b.png", 2u8), ("a.png", 1), ("c.png", 3)] {
      RgbImage::from_pixel(2, 2, Rgb([value, 0, 0]))
        .save(dir.path().join(name))
        .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
    std::fs::write(dir.path().join("anim.gif"), "no decoder").unwrap();
    std::fs::write(dir.path().join("photo.webp"), "no decoder").unwrap();

    let input = ImageDirectoryInput::open(dir.path()).unwrap();
    assert_eq!(input.remaining(), 3);
    let firsts: Vec<u8> = input.map(|frame| frame.as_raw()[0]).collect();
    assert_eq!(firsts, vec![1, 2, 3]);
  }

  #[test]
  fn undecodable_file_yields_empty_frame() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

    let mut input = ImageDirectoryInput::open(dir.path()).unwrap();
    assert!(input.next().unwrap().is_empty());
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_directory_is_an_error() {
    assert!(matches!(
      ImageDirectoryInput::open("/nonexistent/frames"),
      Err(ImageDirectoryInputError::IoError(_))
    ));
  }
}
