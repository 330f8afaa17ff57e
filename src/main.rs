// 该文件是 Beifeng （北风） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use beifeng::{
  FromUrl,
  input::InputWrapper,
  model::{EngineWrapper, Labels, Yolov5Builder},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!(
    "置信度阈值: {}, NMS 阈值: {}",
    args.confidence, args.nms_threshold
  );

  let labels = match &args.labels {
    Some(path) => Labels::from_file(path)?,
    None => Labels::coco(),
  };
  info!("类别数量: {}", labels.len());

  let engine = EngineWrapper::from_url(&args.model)?;
  let model = Yolov5Builder::new(engine)
    .input_size(args.input_size)
    .num_classes(args.num_classes)
    .build()?;
  let session = model.configure(args.confidence, args.nms_threshold);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?.with_labels(labels);

  let summary = if input.is_single_frame() {
    OneShotTask.run_task(input, session, output)?
  } else {
    ContinuousTask::default()
      .with_frame_number(args.max_frames)
      .with_interrupt_handler()
      .run_task(input, session, output)?
  };

  info!(
    "处理完成: 共 {} 帧, 检测到 {} 个对象",
    summary.frames, summary.detections
  );

  Ok(())
}
