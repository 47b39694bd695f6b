// 该文件是 edge-objdet 项目的一部分。
// src/labels.rs - 类别标签表
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  ResourceUnreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("标签文件第 {line} 行格式错误: {content:?}")]
  MalformedEntry { line: usize, content: String },
}

/// 类别 ID 到显示名称的映射，启动时加载一次，之后只读。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: HashMap<u32, String>,
}

impl LabelTable {
  /// 从文本文件加载标签表，每行格式为 `<id> <label>[,<备注>]`。
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::ResourceUnreadable {
      path: path.to_path_buf(),
      source,
    })?;
    let table = Self::parse(&text)?;
    info!("标签加载完成，共 {} 个类别", table.len());
    Ok(table)
  }

  /// 解析标签文本。ID 重复时以后出现的为准。
  pub fn parse(text: &str) -> Result<Self, LabelError> {
    let mut labels = HashMap::new();

    for (index, row) in text.lines().enumerate() {
      let row = row.trim();
      if row.is_empty() {
        continue;
      }

      let malformed = || LabelError::MalformedEntry {
        line: index + 1,
        content: row.to_string(),
      };

      let (id, label) = row.split_once(' ').ok_or_else(malformed)?;
      let id: u32 = id.parse().map_err(|_| malformed())?;
      let label = label.trim();
      let label = label.split_once(',').map_or(label, |(head, _)| head).trim();

      if let Some(previous) = labels.insert(id, label.to_string()) {
        debug!("类别 {} 重复定义: {:?} 被 {:?} 覆盖", id, previous, label);
      }
    }

    Ok(Self { labels })
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.labels.get(&class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

impl FromIterator<(u32, String)> for LabelTable {
  fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}
