// 该文件是 edge-objdet 项目的一部分。
// src/output/draw.rs - 基于 imageproc 的绘图画布
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::info;

/// 像素坐标下的矩形，左上角与右下角均包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

/// 绘图接口，越界部分由实现负责裁剪
pub trait Canvas {
  fn dimensions(&self) -> (u32, u32);
  fn draw_rect(&mut self, rect: PixelRect, color: Rgb<u8>, thickness: u32);
  fn draw_label(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>);
}

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("字体文件无效 {0}")]
  Invalid(PathBuf),
  #[error("内置字体无效")]
  Embedded,
}

/// 内置字体 (DejaVu Sans)
pub fn embedded_font() -> Result<FontArc, FontError> {
  let font_data: &'static [u8] = include_bytes!("../../assets/font.ttf");
  FontArc::try_from_slice(font_data).map_err(|_| FontError::Embedded)
}

/// 从文件加载字体，用于替换内置字体
pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, FontError> {
  let path = path.as_ref();
  let data = std::fs::read(path).map_err(|source| FontError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let font = FontArc::try_from_vec(data).map_err(|_| FontError::Invalid(path.to_path_buf()))?;
  info!("加载字体: {}", path.display());
  Ok(font)
}

/// 在 `RgbImage` 上原地绘制；没有字体时不绘制文字
pub struct ImageCanvas<'a> {
  image: &'a mut RgbImage,
  font: Option<&'a FontArc>,
  scale: PxScale,
}

impl<'a> ImageCanvas<'a> {
  pub fn new(image: &'a mut RgbImage, font: Option<&'a FontArc>, font_size: f32) -> Self {
    Self {
      image,
      font,
      scale: PxScale::from(font_size),
    }
  }
}

impl Canvas for ImageCanvas<'_> {
  fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  fn draw_rect(&mut self, rect: PixelRect, color: Rgb<u8>, thickness: u32) {
    let (frame_width, frame_height) = self.image.dimensions();
    // 远离画面的边收到画面外一圈，避免坐标溢出
    let margin = i64::from(thickness) + 1;
    let clamp_x = |v: i32| i64::from(v).clamp(-margin, i64::from(frame_width) + margin) as i32;
    let clamp_y = |v: i32| i64::from(v).clamp(-margin, i64::from(frame_height) + margin) as i32;

    let left = clamp_x(rect.left.min(rect.right));
    let right = clamp_x(rect.left.max(rect.right));
    let top = clamp_y(rect.top.min(rect.bottom));
    let bottom = clamp_y(rect.top.max(rect.bottom));

    // 线宽向内收缩，直到矩形退化
    for inset in 0..thickness as i32 {
      let width = right - left - 2 * inset + 1;
      let height = bottom - top - 2 * inset + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let r = Rect::at(left + inset, top + inset).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(&mut *self.image, r, color);
    }
  }

  fn draw_label(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    if let Some(font) = self.font {
      draw_text_mut(&mut *self.image, color, x, y, self.scale, font, text);
    }
  }
}
