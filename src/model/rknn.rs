// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/rknn.rs - RKNN 推理引擎
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{COCO_LABELS, Engine, ModelLoadError},
  postprocess::BOX_FIELDS,
  tensor::Tensor,
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 1;

#[derive(Error, Debug)]
pub enum RknnEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] ModelLoadError),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数错误: {0}")]
  InvalidParameter(String),
}

fn corrupt(msg: &str, e: rknpu::Error) -> ModelLoadError {
  error!("{}: {}", msg, e);
  ModelLoadError::corrupt(e)
}

/// 单输入单输出的 RKNN 模型。
///
/// 模型在转换时内置了 1/255 归一化，输入以 u8 NHWC 送入 NPU；
/// 输出 0 按 `[1, N, 5+C]` 读取为 f32。
pub struct RknnEngine {
  context: Context,
  num_classes: usize,
}

impl FromUrlWithScheme for RknnEngine {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnEngine {
  type Error = RknnEngineError;

  /// `rknn:///path/model.rknn?classes=80`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnEngineError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut num_classes = COCO_LABELS.len();
    for (k, v) in url.query_pairs() {
      if k == "classes" {
        num_classes = v
          .parse()
          .map_err(|_| RknnEngineError::InvalidParameter(format!("classes={}", v)))?;
      }
    }

    Self::load(url.path(), num_classes, InitFlags::default())
  }
}

impl RknnEngine {
  pub fn load(path: &str, num_classes: usize, flags: InitFlags) -> Result<Self, RknnEngineError> {
    info!("加载模型文件: {}", path);
    let model_data = std::fs::read(path).map_err(ModelLoadError::from)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context =
      Context::new(&model_data, flags).map_err(|e| corrupt("无法创建推理上下文", e))?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => return Err(corrupt("无法查询 SDK 版本", e).into()),
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| corrupt("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| corrupt("无法获取输出数量", e))?;

    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(ModelLoadError::Unsupported(msg).into());
    }

    info!("模型加载完成");
    Ok(Self {
      context,
      num_classes,
    })
  }
}

impl Engine for RknnEngine {
  type Error = RknnEngineError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    // 输入值均为 k/255，还原为 u8 不损失精度
    let pixels: Vec<u8> = input
      .data()
      .iter()
      .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
      .collect();

    debug!("设置模型输入");
    self
      .context
      .set_input(0, &pixels, TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;
    let data = output.get_f32(0)?.to_vec();

    let stride = self.num_classes + BOX_FIELDS;
    let anchors = data.len() / stride;
    // 长度不整除时形状与缓冲区不一致，交由解码阶段报告
    Ok(Tensor::new(vec![1, anchors, stride], data))
  }
}
