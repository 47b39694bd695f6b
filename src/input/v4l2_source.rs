// 该文件是 edge-objdet 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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
use tracing::{debug, error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

use super::{Frame, FrameSource, StreamParams};
use crate::{FromUrl, FromUrlWithScheme};

const V4L2_DEFAULT_DEVICE: &str = "/dev/video0";
const V4L2_BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2SourceError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("V4L2 设备 {0} 错误: {1}")]
  Device(String, std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("采集帧失败: {0}")]
  Capture(std::io::Error),
  #[error("帧数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  BufferSize { expected: usize, actual: usize },
}

/// 本地 V4L2 摄像头，以 YUYV 格式采集并转换为 RGB
pub struct V4l2Source {
  // 先于 device 释放
  stream: Stream<'static>,
  _device: Device,
  width: u32,
  height: u32,
  frame_index: u64,
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Source {
  type Error = V4l2SourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2SourceError::SchemaMismatch);
    }

    // v4l2:///dev/video0
    let device_path = match url.path() {
      "" | "/" => V4L2_DEFAULT_DEVICE.to_string(),
      path => path.to_string(),
    };
    let device_err = |e| V4l2SourceError::Device(device_path.clone(), e);

    let device = Device::with_path(&device_path).map_err(device_err)?;

    let params = StreamParams::default();
    let mut format = device.format().map_err(device_err)?;
    format.width = params.width;
    format.height = params.height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(device_err)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2SourceError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }

    device
      .set_params(&Parameters::with_fps(params.framerate))
      .map_err(device_err)?;

    info!(
      "打开 V4L2 设备 {}: {}x{} @ {} fps",
      device_path, format.width, format.height, params.framerate
    );

    let stream =
      Stream::with_buffers(&device, Type::VideoCapture, V4L2_BUFFER_COUNT).map_err(device_err)?;

    Ok(Self {
      stream,
      _device: device,
      width: format.width,
      height: format.height,
      frame_index: 0,
    })
  }
}

impl FrameSource for V4l2Source {
  type Error = V4l2SourceError;

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    let (buffer, meta) = self.stream.next().map_err(V4l2SourceError::Capture)?;
    debug!("采集第 {} 帧, 序号 {}", self.frame_index, meta.sequence);

    let rgb = yuyv_to_rgb(buffer);
    let expected = (self.width * self.height * 3) as usize;
    if rgb.len() < expected {
      return Err(V4l2SourceError::BufferSize {
        expected,
        actual: rgb.len(),
      });
    }

    let image = RgbImage::from_raw(self.width, self.height, rgb).ok_or(
      V4l2SourceError::BufferSize {
        expected,
        actual: 0,
      },
    )?;

    let frame = Frame::new(image, self.frame_index);
    self.frame_index += 1;
    Ok(frame)
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;

    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}
