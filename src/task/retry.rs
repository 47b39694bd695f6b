// 该文件是 edge-objdet 项目的一部分。
// src/task/retry.rs - 重试策略
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

use std::time::{Duration, Instant};

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// 推理失败后的重试策略
///
/// 默认不设上限，每次失败后等待 1 秒。`max_attempts` 与 `max_elapsed`
/// 任意一个达到即视为耗尽。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub backoff: Duration,
  pub max_attempts: Option<u32>,
  pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      backoff: DEFAULT_BACKOFF,
      max_attempts: None,
      max_elapsed: None,
    }
  }
}

impl RetryPolicy {
  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
    self.max_attempts = max_attempts;
    self
  }

  pub fn with_max_elapsed(mut self, max_elapsed: Option<Duration>) -> Self {
    self.max_elapsed = max_elapsed;
    self
  }

  pub fn is_bounded(&self) -> bool {
    self.max_attempts.is_some() || self.max_elapsed.is_some()
  }

  pub fn start(&self) -> RetryState {
    RetryState {
      policy: *self,
      failures: 0,
      since: None,
    }
  }
}

/// 一段连续失败的计数
#[derive(Debug, Clone)]
pub struct RetryState {
  policy: RetryPolicy,
  failures: u32,
  since: Option<Instant>,
}

impl RetryState {
  /// 记录一次失败，返回是否还能继续重试
  pub fn record_failure(&mut self) -> bool {
    let since = *self.since.get_or_insert_with(Instant::now);
    self.failures = self.failures.saturating_add(1);

    let attempts_left = self
      .policy
      .max_attempts
      .is_none_or(|max| self.failures < max);
    let time_left = self
      .policy
      .max_elapsed
      .is_none_or(|max| since.elapsed() < max);
    attempts_left && time_left
  }

  pub fn reset(&mut self) {
    self.failures = 0;
    self.since = None;
  }

  pub fn failures(&self) -> u32 {
    self.failures
  }

  pub fn backoff(&self) -> Duration {
    self.policy.backoff
  }
}
