// 该文件是 edge-objdet 项目的一部分。
// src/main.rs - 目标检测主程序
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

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edge_objdet::{
  FromUrl,
  args::Args,
  config::{AcquisitionMode, Config},
  error::DetectorError,
  inference::{HttpInferenceClient, InferenceGateway},
  input::StreamSource,
  labels::LabelTable,
  output::{DETECTION_TYPE, DiscardSink, OverlayRenderer, SaveImageFileOutput, draw::load_font},
  task::{CameraStreamTask, Detector, LoopStats, Shutdown, SingleImageTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let stats = run(args).inspect_err(|e| error!("程序异常退出: {}", e))?;
  info!("处理完成: {:?}", stats);
  Ok(())
}

fn run(args: Args) -> Result<LoopStats, DetectorError> {
  let config = Config::from_args(args)?;

  info!("推理服务: {}", config.inference_endpoint);
  info!("模型标识: {}", config.model_identifier);
  info!("置信度阈值: {}", config.threshold);

  let shutdown = Shutdown::install()?;

  let labels = match &config.label_table_path {
    Some(path) => Some(Arc::new(LabelTable::load(path)?)),
    None => {
      info!("未设置标签文件，只绘制边框");
      None
    }
  };

  let mut renderer = OverlayRenderer::default().with_labels(labels);
  if let Some(path) = &config.font_path {
    match load_font(path) {
      Ok(font) => renderer = renderer.with_font(Some(font)),
      Err(e) => warn!("{}, 使用内置字体", e),
    }
  }

  let client =
    HttpInferenceClient::with_timeout(config.inference_endpoint.clone(), config.inference_timeout)?;
  let detector = Detector::new(
    InferenceGateway::new(client),
    config.model_identifier.clone(),
    config.threshold,
    renderer,
  );

  let stats = match &config.mode {
    AcquisitionMode::ImageSource(path) => {
      let output = SaveImageFileOutput::in_dir(&config.output_dir, DETECTION_TYPE);
      info!("结果保存到: {}", output.path().display());
      SingleImageTask::default()
        .with_policy(config.retry)
        .with_runs(config.run_limit)
        .with_shutdown(shutdown)
        .run_task(path, &detector, output)?
    }
    AcquisitionMode::StreamSource(url) => {
      info!("连接视频源: {}", url);
      let source = StreamSource::from_url(url)?;
      CameraStreamTask::default()
        .with_policy(config.retry)
        .with_frame_limit(config.frame_limit)
        .with_shutdown(shutdown)
        .run_task(source, &detector, DiscardSink)?
    }
  };

  Ok(stats)
}
