// 该文件是 edge-objdet 项目的一部分。
// src/input/image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::debug;

use super::Frame;

#[derive(Error, Debug)]
pub enum ImageFileError {
  #[error("无法打开图片文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法解码图片文件 {path}: {source}")]
  Decode {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
}

/// 读取一张图片作为帧，每次调用都会重新从磁盘读取
pub fn load_image(path: impl AsRef<Path>, index: u64) -> Result<Frame, ImageFileError> {
  let path = path.as_ref();
  let image = ImageReader::open(path)
    .map_err(|source| ImageFileError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .decode()
    .map_err(|source| ImageFileError::Decode {
      path: path.to_path_buf(),
      source,
    })?
    .to_rgb8();

  debug!(
    "读取图片 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );

  Ok(Frame::new(image, index))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn loads_png_as_rgb_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.png");
    let mut image = RgbImage::new(4, 3);
    image.put_pixel(1, 2, Rgb([10, 20, 30]));
    image.save(&path).unwrap();

    let frame = load_image(&path, 7).unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 3));
    assert_eq!(frame.index, 7);
    assert_eq!(frame.image.get_pixel(1, 2), &Rgb([10, 20, 30]));
  }

  #[test]
  fn missing_file_reports_io_error() {
    let err = load_image("/nonexistent/input.jpg", 0).unwrap_err();
    assert!(matches!(err, ImageFileError::Io { .. }));
  }

  #[test]
  fn garbage_reports_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image").unwrap();

    let err = load_image(&path, 0).unwrap_err();
    assert!(matches!(err, ImageFileError::Decode { .. }));
  }
}
