// 该文件是 edge-objdet 项目的一部分。
// src/output.rs - 输出定义
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

use std::convert::Infallible;

use crate::{detection::FilteredDetectionSet, input::Frame};

pub mod draw;
pub mod overlay;
mod save_image_file;

pub use self::overlay::OverlayRenderer;
pub use self::save_image_file::{DETECTION_TYPE, SaveImageFileError, SaveImageFileOutput};

/// 接收已标注的帧
pub trait FrameSink {
  type Error: std::error::Error + Send + Sync + 'static;

  fn write_frame(
    &mut self,
    frame: &Frame,
    detections: &FilteredDetectionSet,
  ) -> Result<(), Self::Error>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
  type Error = S::Error;

  fn write_frame(
    &mut self,
    frame: &Frame,
    detections: &FilteredDetectionSet,
  ) -> Result<(), Self::Error> {
    (**self).write_frame(frame, detections)
  }
}

/// 丢弃所有帧，视频流模式下的默认输出
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
  type Error = Infallible;

  fn write_frame(
    &mut self,
    _frame: &Frame,
    _detections: &FilteredDetectionSet,
  ) -> Result<(), Self::Error> {
    Ok(())
  }
}
