// 该文件是 edge-objdet 项目的一部分。
// src/input.rs - 图像/视频输入
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;

mod http_capture;
mod image_file;
#[cfg(feature = "v4l2_input")]
mod v4l2_source;

pub use self::http_capture::{HttpCaptureError, HttpCaptureSource};
pub use self::image_file::{ImageFileError, load_image};
#[cfg(feature = "v4l2_input")]
pub use self::v4l2_source::{V4l2Source, V4l2SourceError};

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64) -> Self {
    let timestamp_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 视频流采集参数，与推理服务端的采集接口约定一致，不可配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
  pub width: u32,
  pub height: u32,
  pub framerate: u32,
}

impl Default for StreamParams {
  fn default() -> Self {
    Self {
      width: 480,
      height: 320,
      framerate: 10,
    }
  }
}

/// 阻塞式帧来源，每次调用返回一帧
pub trait FrameSource {
  type Error: std::error::Error + Send + Sync + 'static;

  fn next_frame(&mut self) -> Result<Frame, Self::Error>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
  type Error = S::Error;

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    (**self).next_frame()
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("HTTP 采集错误: {0}")]
  HttpCapture(#[from] HttpCaptureError),
  #[cfg(feature = "v4l2_input")]
  #[error("V4L2 采集错误: {0}")]
  V4l2(#[from] V4l2SourceError),
  #[error("不支持的采集地址: {0}")]
  SchemeMismatch(String),
}

/// 根据地址方案选择的视频流来源
pub enum StreamSource {
  Http(HttpCaptureSource),
  #[cfg(feature = "v4l2_input")]
  V4l2(V4l2Source),
}

impl FromUrl for StreamSource {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if HttpCaptureSource::accepts(url) {
      return Ok(StreamSource::Http(HttpCaptureSource::from_url(url)?));
    }
    #[cfg(feature = "v4l2_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Source::SCHEME {
        return Ok(StreamSource::V4l2(V4l2Source::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.to_string()))
  }
}

impl FrameSource for StreamSource {
  type Error = InputError;

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    match self {
      StreamSource::Http(source) => source.next_frame().map_err(InputError::from),
      #[cfg(feature = "v4l2_input")]
      StreamSource::V4l2(source) => source.next_frame().map_err(InputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_is_stamped_with_wall_clock_time() {
    let before = chrono::Utc::now().timestamp_millis() as u64;
    let frame = Frame::new(RgbImage::new(2, 2), 5);
    let after = chrono::Utc::now().timestamp_millis() as u64;
    assert!((before..=after).contains(&frame.timestamp_ms));
    assert_eq!(frame.index, 5);
  }

  #[test]
  fn stream_params_are_fixed() {
    let params = StreamParams::default();
    assert_eq!((params.width, params.height, params.framerate), (480, 320, 10));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      StreamSource::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn http_scheme_selects_capture_client() {
    let url = Url::parse("http://127.0.0.1:8501").unwrap();
    assert!(matches!(
      StreamSource::from_url(&url),
      Ok(StreamSource::Http(_))
    ));
  }
}
