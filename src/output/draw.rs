// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::{borrow::Cow, path::Path};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect as DrawRect,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  model::{DetectItem, Detection, Labels},
  postprocess::Rect,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

pub struct Draw {
  labels: Labels,
  box_color: [u8; 3],
  font: Option<FontArc>,
  font_size: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      labels: Labels::default(),
      box_color: BOX_COLOR,
      font: None,
      font_size: LABEL_FONT_SIZE,
    }
  }
}

impl Draw {
  pub fn with_labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  /// 未加载字体时只绘制边框
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    self.font = Some(FontArc::try_from_vec(data)?);
    debug!("加载标签字体: {}", path.as_ref().display());
    Ok(self)
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  fn draw_box(&self, image: &mut RgbImage, rect: &Rect) {
    let color = Rgb(self.box_color);
    for t in 0..BOX_THICKNESS {
      let (w, h) = (rect.width - 2 * t, rect.height - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      let r = DrawRect::at(rect.left + t, rect.top + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, r, color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, font: &FontArc, item: &DetectItem) {
    let label = format!("{} {:.2}", self.labels.display(item.class_id), item.score);

    let text_width = (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32;
    let label_x = item.rect.left.max(0);
    let label_y = (item.rect.top - LABEL_TEXT_HEIGHT).max(0);

    // 确保标签不超出图像边界
    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = text_width.min(max_width);
    if label_width <= 0 {
      return;
    }

    let background = DrawRect::at(label_x, label_y).of_size(label_width as u32, LABEL_TEXT_HEIGHT as u32);
    draw_filled_rect_mut(image, background, Rgb(self.box_color));
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      PxScale::from(self.font_size),
      font,
      &label,
    );
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &Detection) {
    for item in result.iter() {
      self.draw_box(image, &item.rect);
      if let Some(font) = &self.font {
        self.draw_label(image, font, &item);
      }
    }
  }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
  #[serde(flatten)]
  detection: &'a Detection,
  names: Vec<Cow<'a, str>>,
}

/// 将检测结果写为文本或 JSON 记录
pub struct Record {
  pub label_with_name: bool,
  pub json: bool,
}

impl Record {
  pub fn lines(&self, labels: &Labels, result: &Detection) -> Vec<String> {
    result
      .iter()
      .map(|item| {
        let name = if self.label_with_name {
          labels.display(item.class_id).into_owned()
        } else {
          item.class_id.to_string()
        };
        let Rect {
          left,
          top,
          width,
          height,
        } = item.rect;
        format!("{}, {:.4}, {}, {}, {}, {}", name, item.score, left, top, width, height)
      })
      .collect()
  }

  pub fn record(
    &self,
    labels: &Labels,
    result: &Detection,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    if self.json {
      let record = JsonRecord {
        detection: result,
        names: result.labels().iter().map(|&id| labels.display(id)).collect(),
      };
      let content = serde_json::to_string_pretty(&record).map_err(std::io::Error::other)?;
      std::fs::write(path.with_extension("json"), content)
    } else {
      std::fs::write(path.with_extension("txt"), self.lines(labels, result).join("\n"))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection() -> Detection {
    let mut d = Detection::new();
    d.push(Rect::new(1, 1, 8, 8), 0.875, 0);
    d.push(Rect::new(-3, 5, 4, 100), 0.5, 200);
    d
  }

  #[test]
  fn draws_box_edges_and_clips() {
    let mut image = RgbImage::new(12, 12);
    Draw::default().draw_detections(&mut image, &detection());

    assert_eq!(image.get_pixel(1, 1).0, BOX_COLOR);
    assert_eq!(image.get_pixel(2, 2).0, BOX_COLOR);
    assert_eq!(image.get_pixel(8, 8).0, BOX_COLOR);
    // 框内部不被填充
    assert_eq!(image.get_pixel(4, 4).0, [0, 0, 0]);
  }

  #[test]
  fn text_record_uses_names_or_ids() {
    let labels = Labels::coco();
    let by_name = Record {
      label_with_name: true,
      json: false,
    };
    let lines = by_name.lines(&labels, &detection());
    assert_eq!(lines[0], "person, 0.8750, 1, 1, 8, 8");
    assert_eq!(lines[1], "200, 0.5000, -3, 5, 4, 100");

    let by_id = Record {
      label_with_name: false,
      json: false,
    };
    assert!(by_id.lines(&labels, &detection())[0].starts_with("0, "));
  }

  #[test]
  fn json_record_keeps_parallel_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    let record = Record {
      label_with_name: true,
      json: true,
    };
    record.record(&Labels::coco(), &detection(), &path).unwrap();

    let content = std::fs::read_to_string(dir.path().join("frame.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["boxes"].as_array().unwrap().len(), 2);
    assert_eq!(value["scores"].as_array().unwrap().len(), 2);
    assert_eq!(value["labels"][1], 200);
    assert_eq!(value["names"][0], "person");
    assert_eq!(value["boxes"][0]["width"], 8);
  }

  #[test]
  fn missing_font_is_an_error() {
    assert!(matches!(
      Draw::default().with_font_file("/nonexistent/font.ttf"),
      Err(DrawError::FontIo(_))
    ));
  }
}
