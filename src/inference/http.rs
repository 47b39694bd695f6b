// 该文件是 edge-objdet 项目的一部分。
// src/inference/http.rs - HTTP 推理客户端
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

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::{BatchTensor, InferRequest, InferResponse, InferenceClient};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum HttpInferenceError {
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
  #[error("推理地址无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("HTTP 请求错误: {0}")]
  Request(#[from] reqwest::Error),
  #[error("推理响应无法解析: {0}")]
  Decode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct PredictInputs<'a> {
  data: &'a BatchTensor,
}

#[derive(Serialize)]
struct PredictBody<'a> {
  inputs: PredictInputs<'a>,
}

/// 以 JSON 方式调用推理服务的 predict 接口
pub struct HttpInferenceClient {
  client: Client,
  endpoint: Url,
}

impl HttpInferenceClient {
  pub fn new(endpoint: Url) -> Result<Self, HttpInferenceError> {
    Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
  }

  pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, HttpInferenceError> {
    if !matches!(endpoint.scheme(), "http" | "https") {
      return Err(HttpInferenceError::SchemeMismatch(
        endpoint.scheme().to_string(),
      ));
    }

    info!("推理服务地址: {}, 超时 {:?}", endpoint, timeout);
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint })
  }

  /// `{endpoint}/v1/models/{model}:predict`，模型标识整体做 URL 编码
  pub fn predict_url(&self, model: &str) -> Result<Url, HttpInferenceError> {
    let path = format!("v1/models/{}:predict", urlencoding::encode(model));
    Ok(self.endpoint.join(&path)?)
  }
}

impl InferenceClient for HttpInferenceClient {
  type Error = HttpInferenceError;

  fn infer(&self, request: &InferRequest<'_>) -> Result<InferResponse, Self::Error> {
    let url = self.predict_url(request.model)?;
    debug!("POST {}", url);

    let body = PredictBody {
      inputs: PredictInputs {
        data: &request.data,
      },
    };

    let text = self
      .client
      .post(url)
      .json(&body)
      .send()?
      .error_for_status()?
      .text()?;

    let response = serde_json::from_str::<InferResponse>(&text).inspect_err(|e| {
      debug!("无法解析的推理响应 ({}): {:.200}", e, text);
    })?;
    Ok(response)
  }
}
