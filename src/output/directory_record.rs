// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{Detection, Labels},
  output::{
    Render,
    draw::{Draw, DrawError, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("帧通道数不足, 无法保存: {0}")]
  UnsupportedFrame(u8),
}

/// 每帧写入 `<dir>/<年>/<月>/<日>/<时-分-秒>-<序号>.png`。
///
/// 查询参数：`record=name|id` 保存原图并附带文本记录，`json` 改为 JSON 记录，
/// `always` 在没有检测结果时也保存，`font=<ttf>` 绘制标签文字。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: Option<Record>,
  frame_counter: AtomicU32,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let json = uri.query_pairs().any(|(k, _)| k == "json");
    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record {
        label_with_name: v != "id",
        json,
      })
      .or_else(|| {
        json.then_some(Record {
          label_with_name: true,
          json,
        })
      });

    let mut draw = Draw::default();
    if let Some((_, font)) = uri.query_pairs().find(|(k, _)| k == "font") {
      draw = draw.with_font_file(&*font)?;
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      record,
      frame_counter: AtomicU32::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn with_labels(mut self, labels: Labels) -> Self {
    self.draw = self.draw.with_labels(labels);
    self
  }

  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:06}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &Detection,
  ) -> Result<(), DirectoryRecordOutputError> {
    let mut image = frame
      .to_rgb_image()
      .ok_or(DirectoryRecordOutputError::UnsupportedFrame(frame.channels()))?;

    match &self.record {
      Some(record) => {
        image.save(path)?;
        record.record(self.draw.labels(), result, path)?;
      }
      None => {
        self.draw.draw_detections(&mut image, result);
        image.save(path)?;
      }
    }

    debug!("保存帧记录: {}", path.display());
    Ok(())
  }
}

impl Render<Frame, Detection> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &Detection) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path()?;
      self.save_result(&path, frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::PixelOrder, postprocess::Rect};

  fn saved_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
      for entry in std::fs::read_dir(d).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          out.push(path);
        }
      }
    }
    out.sort();
    out
  }

  fn frame() -> Frame {
    Frame::from_raw(8, 8, 3, PixelOrder::Rgb, vec![0; 8 * 8 * 3]).unwrap()
  }

  #[test]
  fn skips_empty_results_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&frame(), &Detection::new()).unwrap();
    assert!(saved_files(dir.path()).is_empty());

    let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&frame(), &Detection::new()).unwrap();
    assert_eq!(saved_files(dir.path()).len(), 1);
  }

  #[test]
  fn record_mode_writes_image_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record=id", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let mut detection = Detection::new();
    detection.push(Rect::new(1, 1, 4, 4), 0.75, 3);
    output.render_result(&frame(), &detection).unwrap();

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 2);
    let txt = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "txt"))
      .unwrap();
    assert_eq!(std::fs::read_to_string(txt).unwrap(), "3, 0.7500, 1, 1, 4, 4");
  }
}
