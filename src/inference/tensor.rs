// 该文件是 edge-objdet 项目的一部分。
// src/inference/tensor.rs - NHWC 批量张量
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

use serde::Serialize;

use crate::input::Frame;

const RGB_CHANNELS: usize = 3;

/// `uint8` 的 NHWC 张量，批量大小固定为 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchTensor {
  shape: [usize; 4],
  dtype: &'static str,
  #[serde(rename = "values")]
  data: Vec<u8>,
}

impl BatchTensor {
  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn dtype(&self) -> &'static str {
    self.dtype
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }
}

impl From<&Frame> for BatchTensor {
  fn from(frame: &Frame) -> Self {
    let height = frame.height() as usize;
    let width = frame.width() as usize;
    // RgbImage 本身就是按行排列的 HWC 数据
    let data = frame.image.as_raw().clone();
    debug_assert_eq!(data.len(), height * width * RGB_CHANNELS);

    Self {
      shape: [1, height, width, RGB_CHANNELS],
      dtype: "uint8",
      data,
    }
  }
}
