// 该文件是 edge-objdet 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::info;

use crate::{detection::FilteredDetectionSet, input::Frame, output::FrameSink};

/// 检测类型，决定输出文件名
pub const DETECTION_TYPE: &str = "Objects";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("无法创建输出目录 {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法保存图像 {path}: {source}")]
  Save {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
}

/// 将标注后的帧保存到固定路径，每次覆盖
pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// `{dir}/{detection_type}-detector.jpg`
  pub fn in_dir(dir: impl AsRef<Path>, detection_type: &str) -> Self {
    Self::new(
      dir
        .as_ref()
        .join(format!("{}-detector.jpg", detection_type)),
    )
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl FrameSink for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn write_frame(
    &mut self,
    frame: &Frame,
    _detections: &FilteredDetectionSet,
  ) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(|source| SaveImageFileError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    frame
      .image
      .save(&self.path)
      .map_err(|source| SaveImageFileError::Save {
        path: self.path.clone(),
        source,
      })?;

    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn file_name_follows_detection_type() {
    let output = SaveImageFileOutput::in_dir("/output", DETECTION_TYPE);
    assert_eq!(output.path(), Path::new("/output/Objects-detector.jpg"));
  }

  #[test]
  fn saves_jpeg_and_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = SaveImageFileOutput::in_dir(dir.path().join("nested"), DETECTION_TYPE);
    let frame = Frame::new(RgbImage::from_pixel(8, 6, Rgb([0, 128, 255])), 0);

    output
      .write_frame(&frame, &FilteredDetectionSet::default())
      .unwrap();

    let saved = image::open(output.path()).unwrap();
    assert_eq!((saved.width(), saved.height()), (8, 6));
  }
}
