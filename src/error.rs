// 该文件是 edge-objdet 项目的一部分。
// src/error.rs - 程序级错误
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

use crate::{
  config::ConfigError,
  inference::HttpInferenceError,
  input::InputError,
  labels::LabelError,
  task::TaskError,
};

/// 启动与运行阶段可能出现的全部错误
#[derive(Error, Debug)]
pub enum DetectorError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Labels(#[from] LabelError),
  #[error("无法创建推理客户端: {0}")]
  Client(#[from] HttpInferenceError),
  #[error("无法打开视频源: {0}")]
  Source(#[from] InputError),
  #[error(transparent)]
  Task(#[from] TaskError),
  #[error("无法安装中断信号处理: {0}")]
  Signal(#[from] ctrlc::Error),
}
