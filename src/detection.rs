// 该文件是 edge-objdet 项目的一部分。
// src/detection.rs - 检测结果与置信度过滤
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

use thiserror::Error;

/// 归一化边框，顺序为 `[y1, x1, y2, x2]`
pub type NormalizedBox = [f32; 4];

#[derive(Error, Debug, PartialEq, Eq)]
#[error("检测结果长度不一致: boxes={boxes}, scores={scores}, classes={classes}")]
pub struct LengthMismatch {
  pub boxes: usize,
  pub scores: usize,
  pub classes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: NormalizedBox,
}

/// 三个等长、按下标对齐的序列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
  boxes: Vec<NormalizedBox>,
  scores: Vec<f32>,
  classes: Vec<u32>,
}

/// 推理服务返回的原始检测结果
pub type RawDetectionSet = DetectionSet;

/// 经过阈值过滤后的检测结果
pub type FilteredDetectionSet = DetectionSet;

impl DetectionSet {
  pub fn new(
    boxes: Vec<NormalizedBox>,
    scores: Vec<f32>,
    classes: Vec<u32>,
  ) -> Result<Self, LengthMismatch> {
    if boxes.len() != scores.len() || boxes.len() != classes.len() {
      return Err(LengthMismatch {
        boxes: boxes.len(),
        scores: scores.len(),
        classes: classes.len(),
      });
    }

    Ok(Self {
      boxes,
      scores,
      classes,
    })
  }

  pub fn boxes(&self) -> &[NormalizedBox] {
    &self.boxes
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn classes(&self) -> &[u32] {
    &self.classes
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = DetectItem> + '_ {
    self
      .boxes
      .iter()
      .zip(&self.scores)
      .zip(&self.classes)
      .map(|((bbox, score), class_id)| DetectItem {
        class_id: *class_id,
        score: *score,
        bbox: *bbox,
      })
  }
}

impl FromIterator<DetectItem> for DetectionSet {
  fn from_iter<I: IntoIterator<Item = DetectItem>>(iter: I) -> Self {
    let mut set = DetectionSet::default();
    for item in iter {
      set.boxes.push(item.bbox);
      set.scores.push(item.score);
      set.classes.push(item.class_id);
    }
    set
  }
}

/// 保留 `score >= threshold` 的检测项，保持原有顺序。
///
/// 阈值不做范围检查：超出 `[0, 1]` 时结果为空或全部保留。
pub fn filter(raw: &RawDetectionSet, threshold: f32) -> FilteredDetectionSet {
  raw.iter().filter(|item| item.score >= threshold).collect()
}
