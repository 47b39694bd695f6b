// 该文件是 edge-objdet 项目的一部分。
// src/input/http_capture.rs - HTTP 视频采集客户端
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

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use super::{Frame, FrameSource, StreamParams};
use crate::FromUrl;

#[derive(Error, Debug)]
pub enum HttpCaptureError {
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("HTTP 请求错误: {0}")]
  Request(#[from] reqwest::Error),
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("采集地址无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

/// 通过 HTTP 向采集服务拉取单帧图像
///
/// 每次调用 `GET {endpoint}/capture?width=..&height=..&framerate=..`，
/// 响应体是一张编码后的图片（JPEG/PNG）。
pub struct HttpCaptureSource {
  client: Client,
  capture_url: Url,
  params: StreamParams,
  frame_index: u64,
}

impl HttpCaptureSource {
  pub fn accepts(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
  }

  pub fn params(&self) -> StreamParams {
    self.params
  }

  pub fn capture_url(&self) -> &Url {
    &self.capture_url
  }
}

impl FromUrl for HttpCaptureSource {
  type Error = HttpCaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url) {
      error!(
        "URI scheme mismatch: expected 'http' or 'https', found '{}'",
        url.scheme()
      );
      return Err(HttpCaptureError::SchemeMismatch(url.scheme().to_string()));
    }

    let params = StreamParams::default();
    let mut capture_url = url.join("capture")?;
    capture_url
      .query_pairs_mut()
      .append_pair("width", &params.width.to_string())
      .append_pair("height", &params.height.to_string())
      .append_pair("framerate", &params.framerate.to_string());

    Ok(Self {
      client: Client::builder().build()?,
      capture_url,
      params,
      frame_index: 0,
    })
  }
}

impl FrameSource for HttpCaptureSource {
  type Error = HttpCaptureError;

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    let bytes = self
      .client
      .get(self.capture_url.clone())
      .send()?
      .error_for_status()?
      .bytes()?;
    let image = image::load_from_memory(&bytes)?.to_rgb8();

    debug!(
      "采集第 {} 帧: {}x{}, {} 字节",
      self.frame_index,
      image.width(),
      image.height(),
      bytes.len()
    );

    let frame = Frame::new(image, self.frame_index);
    self.frame_index += 1;
    Ok(frame)
  }
}
