// 该文件是 edge-objdet 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;

pub const DEFAULT_OUTPUT_DIR: &str = "/output";

/// 目标检测程序参数，均可通过环境变量提供
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理服务地址（必填），如 `inference-server:8501`
  #[arg(long, env = "INFERENCE_HOST", value_name = "HOST")]
  pub inference_host: Option<String>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "DETECTION_THRESHOLD", default_value_t = 0.5, value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 模型标识（必填），原样传给推理服务
  #[arg(long, env = "MODEL_PATH", value_name = "MODEL")]
  pub model_path: Option<String>,

  /// 输入图片路径，设置后进入单图模式
  #[arg(long, env = "IMAGE_PATH", value_name = "FILE")]
  pub image_path: Option<PathBuf>,

  /// 类别标签文件，不设置则不绘制标签
  #[arg(long, env = "OBJECT_LIST_PATH", value_name = "FILE")]
  pub object_list_path: Option<PathBuf>,

  /// 视频采集地址，默认与推理服务相同
  /// 支持格式:
  /// - HTTP: http://host:port
  /// - V4L2: v4l2:///dev/video0
  #[arg(long, env = "CAPTURE_HOST", value_name = "HOST")]
  pub capture_host: Option<String>,

  /// 单图模式的输出目录
  #[arg(long, env = "OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR, value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 标签字体文件，不设置则使用内置字体
  #[arg(long, env = "FONT_PATH", value_name = "FILE")]
  pub font_path: Option<PathBuf>,

  /// 推理失败后的等待时间（毫秒）
  #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 1000, value_name = "MS")]
  pub retry_backoff_ms: u64,

  /// 连续失败的最大次数，不设置表示无限重试
  #[arg(long, env = "RETRY_MAX_ATTEMPTS", value_name = "COUNT")]
  pub retry_max_attempts: Option<u32>,

  /// 连续失败的最长持续时间（秒）
  #[arg(long, env = "RETRY_MAX_ELAPSED_SECS", value_name = "SECS")]
  pub retry_max_elapsed_secs: Option<u64>,

  /// 单次推理请求超时（秒）
  #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = 10, value_name = "SECS")]
  pub inference_timeout_secs: u64,

  /// 单图模式最多运行的轮数，不设置表示一直运行
  #[arg(long, env = "RUN_LIMIT", value_name = "COUNT")]
  pub run_limit: Option<u64>,

  /// 视频流模式最多处理的帧数，不设置表示一直运行
  #[arg(long, env = "FRAME_LIMIT", value_name = "COUNT")]
  pub frame_limit: Option<u64>,
}
