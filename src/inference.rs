// 该文件是 edge-objdet 项目的一部分。
// src/inference.rs - 推理网关
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  detection::{DetectionSet, LengthMismatch, NormalizedBox, RawDetectionSet},
  input::Frame,
};

mod http;
mod tensor;

pub use self::http::{HttpInferenceClient, HttpInferenceError};
pub use self::tensor::BatchTensor;

/// 推理请求：名为 `data` 的输入张量和模型标识
#[derive(Debug, Clone)]
pub struct InferRequest<'a> {
  pub data: BatchTensor,
  pub model: &'a str,
}

/// 带批量维度的输出，批量大小应为 1
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchedOutputs {
  #[serde(default)]
  pub boxes: Vec<Vec<NormalizedBox>>,
  #[serde(default)]
  pub scores: Vec<Vec<f32>>,
  #[serde(default)]
  pub classes: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InferResponse {
  pub success: bool,
  #[serde(default)]
  pub outputs: Option<BatchedOutputs>,
}

/// 推理服务客户端，对网关而言是黑盒
pub trait InferenceClient {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, request: &InferRequest<'_>) -> Result<InferResponse, Self::Error>;
}

impl<C: InferenceClient + ?Sized> InferenceClient for &C {
  type Error = C::Error;

  fn infer(&self, request: &InferRequest<'_>) -> Result<InferResponse, Self::Error> {
    (**self).infer(request)
  }
}

/// 推理失败，不携带任何部分结果
#[derive(Error, Debug)]
pub enum InferenceFailure {
  #[error("推理服务调用失败: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("推理服务返回失败")]
  Rejected,
  #[error("推理结果格式错误: {0}")]
  MalformedResponse(String),
}

impl From<LengthMismatch> for InferenceFailure {
  fn from(err: LengthMismatch) -> Self {
    InferenceFailure::MalformedResponse(err.to_string())
  }
}

pub struct InferenceGateway<C> {
  client: C,
}

impl<C: InferenceClient> InferenceGateway<C> {
  pub fn new(client: C) -> Self {
    Self { client }
  }

  pub fn client(&self) -> &C {
    &self.client
  }

  /// 提交一帧图像并返回原始检测结果
  pub fn infer(
    &self,
    frame: &Frame,
    model_identifier: &str,
  ) -> Result<RawDetectionSet, InferenceFailure> {
    let request = InferRequest {
      data: BatchTensor::from(frame),
      model: model_identifier,
    };
    debug!(
      "提交第 {} 帧, 张量形状 {:?}",
      frame.index,
      request.data.shape()
    );

    let response = self.client.infer(&request).map_err(|e| {
      warn!("推理服务调用失败: {}", e);
      InferenceFailure::Transport(Box::new(e))
    })?;

    if !response.success {
      warn!("推理服务返回失败");
      return Err(InferenceFailure::Rejected);
    }

    let outputs = response
      .outputs
      .ok_or_else(|| InferenceFailure::MalformedResponse("缺少输出".to_string()))?;
    let raw = unbatch(outputs)?;
    debug!("推理返回 {} 个检测项", raw.len());
    Ok(raw)
  }
}

/// 去掉批量维度并校验三个序列
fn unbatch(outputs: BatchedOutputs) -> Result<RawDetectionSet, InferenceFailure> {
  let BatchedOutputs {
    boxes,
    scores,
    classes,
  } = outputs;

  let boxes = single_batch("boxes", boxes)?;
  let scores = single_batch("scores", scores)?;

  // serde_json 会把超出 f32 范围的数解析为无穷大
  if let Some(bbox) = boxes.iter().find(|b| !b.iter().all(|v| v.is_finite())) {
    return Err(InferenceFailure::MalformedResponse(format!(
      "边框坐标无效: {:?}",
      bbox
    )));
  }
  if let Some(score) = scores.iter().find(|s| !s.is_finite()) {
    return Err(InferenceFailure::MalformedResponse(format!(
      "置信度无效: {}",
      score
    )));
  }

  let classes = single_batch("classes", classes)?
    .into_iter()
    .map(class_id)
    .collect::<Result<Vec<_>, _>>()?;

  Ok(DetectionSet::new(boxes, scores, classes)?)
}

fn single_batch<T>(name: &str, batched: Vec<Vec<T>>) -> Result<Vec<T>, InferenceFailure> {
  let batch = batched.len();
  let mut batched = batched.into_iter();
  match (batched.next(), batched.next()) {
    (Some(single), None) => Ok(single),
    _ => Err(InferenceFailure::MalformedResponse(format!(
      "{} 的批量大小为 {}, 期望为 1",
      name, batch
    ))),
  }
}

/// 类别以浮点数返回，按整数截断
fn class_id(value: f32) -> Result<u32, InferenceFailure> {
  if value.is_finite() && value >= 0.0 && value <= u32::MAX as f32 {
    Ok(value.trunc() as u32)
  } else {
    Err(InferenceFailure::MalformedResponse(format!(
      "类别 ID 无效: {}",
      value
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::cell::RefCell;

  #[derive(Debug, Error)]
  #[error("connection refused")]
  struct Refused;

  struct Fixed {
    response: Result<InferResponse, ()>,
    seen: RefCell<Vec<([usize; 4], String)>>,
  }

  impl InferenceClient for Fixed {
    type Error = Refused;

    fn infer(&self, request: &InferRequest<'_>) -> Result<InferResponse, Self::Error> {
      self
        .seen
        .borrow_mut()
        .push((request.data.shape(), request.model.to_string()));
      self.response.clone().map_err(|_| Refused)
    }
  }

  fn gateway(response: Result<InferResponse, ()>) -> InferenceGateway<Fixed> {
    InferenceGateway::new(Fixed {
      response,
      seen: RefCell::new(Vec::new()),
    })
  }

  fn frame() -> Frame {
    Frame::new(RgbImage::new(6, 4), 0)
  }

  fn ok(outputs: BatchedOutputs) -> Result<InferResponse, ()> {
    Ok(InferResponse {
      success: true,
      outputs: Some(outputs),
    })
  }

  #[test]
  fn unwraps_single_batch() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![[0.1, 0.2, 0.3, 0.4], [0.5, 0.5, 0.6, 0.6]]],
      scores: vec![vec![0.9, 0.4]],
      classes: vec![vec![1.0, 17.0]],
    }));

    let raw = gateway.infer(&frame(), "/models/ssd.tflite").unwrap();
    assert_eq!(raw.len(), 2);
    assert_eq!(raw.classes(), &[1, 17]);
    assert_eq!(raw.boxes()[0], [0.1, 0.2, 0.3, 0.4]);

    let seen = gateway.client().seen.borrow();
    assert_eq!(seen.as_slice(), &[([1, 4, 6, 3], "/models/ssd.tflite".to_string())]);
  }

  #[test]
  fn empty_result_is_valid() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![]],
      scores: vec![vec![]],
      classes: vec![vec![]],
    }));
    assert!(gateway.infer(&frame(), "m").unwrap().is_empty());
  }

  #[test]
  fn transport_error_is_failure() {
    let gateway = gateway(Err(()));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::Transport(_))
    ));
  }

  #[test]
  fn unsuccessful_response_is_rejected() {
    let gateway = gateway(Ok(InferResponse {
      success: false,
      outputs: Some(BatchedOutputs::default()),
    }));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::Rejected)
    ));
  }

  #[test]
  fn misaligned_outputs_are_malformed() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![[0.0; 4]]],
      scores: vec![vec![0.5, 0.6]],
      classes: vec![vec![1.0]],
    }));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::MalformedResponse(_))
    ));
  }

  #[test]
  fn batch_size_must_be_one() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![], vec![]],
      scores: vec![vec![], vec![]],
      classes: vec![vec![], vec![]],
    }));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::MalformedResponse(_))
    ));
  }

  #[test]
  fn infinite_box_coordinate_is_malformed() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![[0.1, 0.2, f32::INFINITY, 0.8]]],
      scores: vec![vec![0.9]],
      classes: vec![vec![1.0]],
    }));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::MalformedResponse(_))
    ));
  }

  #[test]
  fn out_of_range_json_values_are_malformed() {
    let response: InferResponse = serde_json::from_str(
      r#"{
        "success": true,
        "outputs": {
          "boxes": [[[0.1, 0.2, 1e40, 0.8]]],
          "scores": [[1e40]],
          "classes": [[1.0]]
        }
      }"#,
    )
    .unwrap();
    assert!(matches!(
      gateway(Ok(response)).infer(&frame(), "m"),
      Err(InferenceFailure::MalformedResponse(_))
    ));
  }

  #[test]
  fn infinite_score_is_malformed() {
    let gateway = gateway(ok(BatchedOutputs {
      boxes: vec![vec![[0.1, 0.2, 0.6, 0.8]]],
      scores: vec![vec![f32::INFINITY]],
      classes: vec![vec![1.0]],
    }));
    assert!(matches!(
      gateway.infer(&frame(), "m"),
      Err(InferenceFailure::MalformedResponse(_))
    ));
  }

  #[test]
  fn class_ids_are_truncated_and_non_negative() {
    assert_eq!(class_id(3.0).unwrap(), 3);
    assert_eq!(class_id(2.7).unwrap(), 2);
    assert!(class_id(-1.0).is_err());
    assert!(class_id(f32::INFINITY).is_err());
    assert!(class_id(f32::NAN).is_err());
  }
}
