// 该文件是 edge-objdet 项目的一部分。
// src/config.rs - 运行配置
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

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::args::Args;
use crate::task::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("缺少必需的配置项 {0}")]
  ConfigurationMissing(&'static str),
  #[error("配置项 {key} 的值 {value:?} 无效: {reason}")]
  InvalidConfiguration {
    key: &'static str,
    value: String,
    reason: String,
  },
}

/// 采集模式，启动时确定一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionMode {
  ImageSource(PathBuf),
  StreamSource(Url),
}

/// 进程生命周期内不变的配置
#[derive(Debug, Clone)]
pub struct Config {
  pub inference_endpoint: Url,
  pub threshold: f32,
  pub model_identifier: String,
  pub mode: AcquisitionMode,
  pub label_table_path: Option<PathBuf>,
  pub output_dir: PathBuf,
  pub font_path: Option<PathBuf>,
  pub retry: RetryPolicy,
  pub inference_timeout: Duration,
  pub run_limit: Option<u64>,
  pub frame_limit: Option<u64>,
}

impl Config {
  /// 校验参数并生成配置
  pub fn from_args(args: Args) -> Result<Self, ConfigError> {
    let inference_host = args
      .inference_host
      .filter(|host| !host.trim().is_empty())
      .ok_or(ConfigError::ConfigurationMissing("INFERENCE_HOST"))?;
    let model_identifier = args
      .model_path
      .filter(|model| !model.trim().is_empty())
      .ok_or(ConfigError::ConfigurationMissing("MODEL_PATH"))?;

    if args.threshold.is_nan() {
      return Err(ConfigError::InvalidConfiguration {
        key: "DETECTION_THRESHOLD",
        value: args.threshold.to_string(),
        reason: "不是数字".to_string(),
      });
    }

    let inference_endpoint = parse_endpoint("INFERENCE_HOST", &inference_host)?;

    let mode = match args.image_path {
      Some(path) => AcquisitionMode::ImageSource(path),
      None => {
        let capture = match args.capture_host {
          Some(host) => parse_endpoint("CAPTURE_HOST", &host)?,
          None => inference_endpoint.clone(),
        };
        AcquisitionMode::StreamSource(capture)
      }
    };

    let retry = RetryPolicy::default()
      .with_backoff(Duration::from_millis(args.retry_backoff_ms))
      .with_max_attempts(args.retry_max_attempts)
      .with_max_elapsed(args.retry_max_elapsed_secs.map(Duration::from_secs));

    Ok(Config {
      inference_endpoint,
      threshold: args.threshold,
      model_identifier,
      mode,
      label_table_path: args.object_list_path,
      output_dir: args.output_dir,
      font_path: args.font_path,
      retry,
      inference_timeout: Duration::from_secs(args.inference_timeout_secs),
      run_limit: args.run_limit,
      frame_limit: args.frame_limit,
    })
  }
}

/// 没有写方案的 `host:port` 视为 HTTP 地址
fn parse_endpoint(key: &'static str, value: &str) -> Result<Url, ConfigError> {
  let value = value.trim();
  let candidate = if value.contains("://") {
    value.to_string()
  } else {
    format!("http://{}", value)
  };

  Url::parse(&candidate).map_err(|e| ConfigError::InvalidConfiguration {
    key,
    value: value.to_string(),
    reason: e.to_string(),
  })
}
