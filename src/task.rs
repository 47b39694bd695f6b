// 该文件是 edge-objdet 项目的一部分。
// src/task.rs - 采集循环
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
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  detection::{self, FilteredDetectionSet, RawDetectionSet},
  inference::{InferenceClient, InferenceFailure, InferenceGateway},
  input::{Frame, FrameSource, ImageFileError, load_image},
  output::{FrameSink, OverlayRenderer},
};

mod retry;

pub use self::retry::{DEFAULT_BACKOFF, RetryPolicy, RetryState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("无法读取输入图片: {0}")]
  ResourceUnreadable(#[from] ImageFileError),
  #[error("重试 {attempts} 次后仍然失败: {last}")]
  RetriesExhausted {
    attempts: u32,
    #[source]
    last: BoxError,
  },
  #[error("输出失败: {0}")]
  Output(#[source] BoxError),
}

/// 收到中断信号后置位，循环在两次迭代之间检查
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
  /// 安装 Ctrl-C 处理函数，30 秒内未退出则强制结束进程
  pub fn install() -> Result<Self, ctrlc::Error> {
    let shutdown = Self::default();
    let flag = shutdown.clone();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      flag.request();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    Ok(shutdown)
  }

  pub fn request(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_requested(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 循环的计数器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
  /// 成功完成推理的帧（或单图模式下的轮次）
  pub completed: u64,
  /// 推理调用次数
  pub attempts: u64,
  /// 推理失败次数
  pub inference_failures: u64,
  /// 采集失败次数
  pub acquire_failures: u64,
  /// 因推理失败被丢弃的帧
  pub skipped_frames: u64,
  /// 绘制的检测框总数
  pub detections: u64,
  /// 最近一次成功推理的耗时
  pub last_inference: Option<Duration>,
}

/// 推理、过滤、绘制三个阶段，配置在构造后不再变化
pub struct Detector<C> {
  gateway: InferenceGateway<C>,
  model_identifier: String,
  threshold: f32,
  renderer: OverlayRenderer,
}

impl<C: InferenceClient> Detector<C> {
  pub fn new(
    gateway: InferenceGateway<C>,
    model_identifier: impl Into<String>,
    threshold: f32,
    renderer: OverlayRenderer,
  ) -> Self {
    Self {
      gateway,
      model_identifier: model_identifier.into(),
      threshold,
      renderer,
    }
  }

  pub fn gateway(&self) -> &InferenceGateway<C> {
    &self.gateway
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn infer(&self, frame: &Frame) -> Result<RawDetectionSet, InferenceFailure> {
    self.gateway.infer(frame, &self.model_identifier)
  }

  pub fn filter(&self, raw: &RawDetectionSet) -> FilteredDetectionSet {
    let filtered = detection::filter(raw, self.threshold);
    debug!(
      "阈值 {} 过滤后保留 {}/{} 个检测项",
      self.threshold,
      filtered.len(),
      raw.len()
    );
    filtered
  }

  pub fn detect(&self, frame: &Frame) -> Result<FilteredDetectionSet, InferenceFailure> {
    self.infer(frame).map(|raw| self.filter(&raw))
  }

  pub fn annotate<'f>(
    &self,
    frame: &'f mut Frame,
    detections: &FilteredDetectionSet,
  ) -> &'f mut Frame {
    self.renderer.render(frame, detections)
  }
}

pub trait Task<I, C, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &Detector<C>, output: O) -> Result<LoopStats, Self::Error>;
}

/// 单图模式：反复读取同一张图片，推理成功后保存标注结果
#[derive(Debug, Clone, Default)]
pub struct SingleImageTask {
  policy: RetryPolicy,
  runs: Option<u64>,
  shutdown: Shutdown,
}

impl SingleImageTask {
  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// 限制轮数，`None` 表示一直运行
  pub fn with_runs(mut self, runs: Option<u64>) -> Self {
    self.runs = runs;
    self
  }

  pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
    self.shutdown = shutdown;
    self
  }

  /// 一轮：读取、推理（失败重试）、过滤、绘制、保存。被中断时返回 `Ok(false)`
  fn run_once<C: InferenceClient, O: FrameSink>(
    &self,
    path: &Path,
    index: u64,
    detector: &Detector<C>,
    output: &mut O,
    stats: &mut LoopStats,
  ) -> Result<bool, TaskError> {
    let mut frame = load_image(path, index)?;
    let mut retry = self.policy.start();

    let (raw, elapsed) = loop {
      stats.attempts += 1;
      let now = Instant::now();
      match detector.infer(&frame) {
        Ok(raw) => break (raw, now.elapsed()),
        Err(e) => {
          stats.inference_failures += 1;
          if !retry.record_failure() {
            return Err(TaskError::RetriesExhausted {
              attempts: retry.failures(),
              last: Box::new(e),
            });
          }
          warn!(
            "第 {} 次推理失败: {}, {:?} 后重试",
            retry.failures(),
            e,
            retry.backoff()
          );
          thread::sleep(retry.backoff());
          if self.shutdown.is_requested() {
            return Ok(false);
          }
        }
      }
    };

    let detections = detector.filter(&raw);
    detector.annotate(&mut frame, &detections);
    output
      .write_frame(&frame, &detections)
      .map_err(|e| TaskError::Output(Box::new(e)))?;

    stats.completed += 1;
    stats.detections += detections.len() as u64;
    stats.last_inference = Some(elapsed);
    info!("图片推理总耗时: {} ms", elapsed.as_millis());
    Ok(true)
  }
}

impl<P: AsRef<Path>, C: InferenceClient, O: FrameSink> Task<P, C, O> for SingleImageTask {
  type Error = TaskError;

  fn run_task(
    self,
    input: P,
    detector: &Detector<C>,
    mut output: O,
  ) -> Result<LoopStats, Self::Error> {
    let path = input.as_ref();
    info!("单图模式: {}", path.display());
    let mut stats = LoopStats::default();

    let mut index = 0u64;
    while self.runs.is_none_or(|runs| index < runs) && !self.shutdown.is_requested() {
      if !self.run_once(path, index, detector, &mut output, &mut stats)? {
        break;
      }
      index += 1;

      // 两轮之间也等待一个退避间隔
      if self.runs.is_none_or(|runs| index < runs) {
        thread::sleep(self.policy.backoff);
      }
    }

    info!("单图任务结束: {:?}", stats);
    Ok(stats)
  }
}

/// 视频流模式：逐帧推理，失败的帧直接丢弃
#[derive(Debug, Clone, Default)]
pub struct CameraStreamTask {
  policy: RetryPolicy,
  frame_limit: Option<u64>,
  shutdown: Shutdown,
}

impl CameraStreamTask {
  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.frame_limit = frame_limit;
    self
  }

  pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
    self.shutdown = shutdown;
    self
  }

  /// 连续失败时退避；策略耗尽则结束循环
  fn back_off(&self, retry: &mut RetryState, error: BoxError) -> Result<(), TaskError> {
    if !retry.record_failure() {
      return Err(TaskError::RetriesExhausted {
        attempts: retry.failures(),
        last: error,
      });
    }
    warn!(
      "连续第 {} 次失败: {}, {:?} 后继续",
      retry.failures(),
      error,
      retry.backoff()
    );
    thread::sleep(retry.backoff());
    Ok(())
  }
}

impl<S: FrameSource, C: InferenceClient, O: FrameSink> Task<S, C, O> for CameraStreamTask {
  type Error = TaskError;

  fn run_task(
    self,
    mut input: S,
    detector: &Detector<C>,
    mut output: O,
  ) -> Result<LoopStats, Self::Error> {
    info!("视频流模式，开始处理...");
    let mut stats = LoopStats::default();
    let mut retry = self.policy.start();
    let mut frames = 0u64;

    loop {
      if self.shutdown.is_requested() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if self.frame_limit.is_some_and(|limit| frames >= limit) {
        info!("达到指定帧数 {}, 退出任务循环", frames);
        break;
      }

      let mut frame = match input.next_frame() {
        Ok(frame) => frame,
        Err(e) => {
          stats.acquire_failures += 1;
          self.back_off(&mut retry, Box::new(e))?;
          continue;
        }
      };
      frames += 1;
      debug!("处理第 {} 帧图像 (时间: {}ms)", frame.index, frame.timestamp_ms);

      stats.attempts += 1;
      let now = Instant::now();
      match detector.detect(&frame) {
        Ok(detections) => {
          let elapsed = now.elapsed();
          retry.reset();
          detector.annotate(&mut frame, &detections);
          output
            .write_frame(&frame, &detections)
            .map_err(|e| TaskError::Output(Box::new(e)))?;

          stats.completed += 1;
          stats.detections += detections.len() as u64;
          stats.last_inference = Some(elapsed);
          debug!(
            "第 {} 帧 (时间: {}ms) 推理完成，耗时: {:.2?}, {} 个检测项",
            frame.index,
            frame.timestamp_ms,
            elapsed,
            detections.len()
          );
        }
        Err(e) => {
          stats.inference_failures += 1;
          stats.skipped_frames += 1;
          self.back_off(&mut retry, Box::new(e))?;
        }
      }
    }

    info!("任务完成，退出: {:?}", stats);
    Ok(stats)
  }
}
