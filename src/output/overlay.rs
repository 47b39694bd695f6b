// 该文件是 edge-objdet 项目的一部分。
// src/output/overlay.rs - 目标检测结果叠加
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

use std::sync::Arc;

use ab_glyph::FontArc;
use image::Rgb;
use tracing::{info, warn};

use crate::{
  detection::{FilteredDetectionSet, NormalizedBox},
  input::Frame,
  labels::LabelTable,
  output::draw::{Canvas, ImageCanvas, PixelRect, embedded_font},
};

const BOX_COLOR: [u8; 3] = [200, 190, 1];
const BOX_THICKNESS: u32 = 2;
const LABEL_FONT_SIZE: f32 = 24.0;
// 标签文字位于边框左上角上方
const LABEL_OFFSET_Y: f32 = 10.0;

/// 归一化边框 `[y1, x1, y2, x2]` 转为像素坐标，向零截断
pub fn pixel_rect(bbox: &NormalizedBox, width: u32, height: u32) -> PixelRect {
  let (w, h) = (width as f32, height as f32);
  let [y1, x1, y2, x2] = *bbox;
  PixelRect {
    left: (x1 * w) as i32,
    top: (y1 * h) as i32,
    right: (x2 * w) as i32,
    bottom: (y2 * h) as i32,
  }
}

/// 标签文字的锚点
pub fn label_anchor(bbox: &NormalizedBox, width: u32, height: u32) -> (i32, i32) {
  let [y1, x1, _, _] = *bbox;
  (
    (x1 * width as f32) as i32,
    (y1 * height as f32 - LABEL_OFFSET_Y) as i32,
  )
}

pub struct OverlayRenderer {
  labels: Option<Arc<LabelTable>>,
  font: Option<FontArc>,
  color: Rgb<u8>,
  thickness: u32,
  font_size: f32,
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    Self {
      labels: None,
      font: embedded_font()
        .inspect_err(|e| warn!("{}, 标签文字将不会绘制", e))
        .ok(),
      color: Rgb(BOX_COLOR),
      thickness: BOX_THICKNESS,
      font_size: LABEL_FONT_SIZE,
    }
  }
}

impl OverlayRenderer {
  pub fn with_labels(mut self, labels: Option<Arc<LabelTable>>) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_font(mut self, font: Option<FontArc>) -> Self {
    self.font = font;
    self
  }

  /// 在帧上原地绘制检测结果，返回同一帧
  pub fn render<'f>(
    &self,
    frame: &'f mut Frame,
    detections: &FilteredDetectionSet,
  ) -> &'f mut Frame {
    let mut canvas = ImageCanvas::new(&mut frame.image, self.font.as_ref(), self.font_size);
    self.draw(&mut canvas, detections);
    frame
  }

  /// 绘制到任意画布上，返回绘制的边框数量
  pub fn draw<C: Canvas>(&self, canvas: &mut C, detections: &FilteredDetectionSet) -> usize {
    let (width, height) = canvas.dimensions();
    let mut drawn = 0;

    for item in detections.iter() {
      canvas.draw_rect(
        pixel_rect(&item.bbox, width, height),
        self.color,
        self.thickness,
      );
      drawn += 1;

      let Some(labels) = self.labels.as_deref() else {
        continue;
      };

      match labels.get(item.class_id) {
        Some(label) => {
          let (x, y) = label_anchor(&item.bbox, width, height);
          canvas.draw_label(label, x, y, self.color);
          info!("{} ({:.2})", label, item.score);
        }
        None => warn!("类别 {} 没有对应的标签", item.class_id),
      }
    }

    drawn
  }
}
