// 该文件是 edge-objdet 项目的一部分。
// tests/pipeline.rs - 采集循环集成测试
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

use std::{
  cell::RefCell,
  collections::VecDeque,
  convert::Infallible,
  sync::Arc,
  time::Duration,
};

use image::{Rgb, RgbImage};
use thiserror::Error;

use edge_objdet::{
  detection::FilteredDetectionSet,
  inference::{BatchedOutputs, InferRequest, InferResponse, InferenceClient, InferenceGateway},
  input::{Frame, FrameSource},
  labels::LabelTable,
  output::{DETECTION_TYPE, FrameSink, OverlayRenderer, SaveImageFileOutput},
  task::{CameraStreamTask, Detector, RetryPolicy, SingleImageTask, Task, TaskError},
};

const BOX_COLOR: Rgb<u8> = Rgb([200, 190, 1]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Error)]
#[error("connection refused")]
struct Refused;

/// 按顺序返回预设结果，用完后一直失败
#[derive(Default)]
struct Scripted {
  replies: RefCell<VecDeque<Result<InferResponse, Refused>>>,
  calls: RefCell<usize>,
}

impl Scripted {
  fn new(replies: impl IntoIterator<Item = Result<InferResponse, Refused>>) -> Self {
    Self {
      replies: RefCell::new(replies.into_iter().collect()),
      calls: RefCell::new(0),
    }
  }
}

impl InferenceClient for Scripted {
  type Error = Refused;

  fn infer(&self, _request: &InferRequest<'_>) -> Result<InferResponse, Self::Error> {
    *self.calls.borrow_mut() += 1;
    self.replies.borrow_mut().pop_front().unwrap_or(Err(Refused))
  }
}

fn one_car_and_one_ghost() -> Result<InferResponse, Refused> {
  Ok(InferResponse {
    success: true,
    outputs: Some(BatchedOutputs {
      boxes: vec![vec![[0.1, 0.2, 0.6, 0.8], [0.0, 0.0, 0.5, 0.5]]],
      scores: vec![vec![0.9, 0.2]],
      classes: vec![vec![3.0, 1.0]],
    }),
  })
}

fn detector(client: Scripted) -> Detector<Scripted> {
  let labels = LabelTable::parse("1 person\n3 car,vehicle\n").unwrap();
  Detector::new(
    InferenceGateway::new(client),
    "/models/ssd.tflite",
    0.5,
    OverlayRenderer::default().with_labels(Some(Arc::new(labels))),
  )
}

fn detector_calls(detector: &Detector<Scripted>) -> std::cell::Ref<'_, usize> {
  detector.gateway().client().calls.borrow()
}

fn fast_retry() -> RetryPolicy {
  RetryPolicy::default().with_backoff(Duration::from_millis(1))
}

/// 记录写入的帧与检测数量
#[derive(Default)]
struct Recorder {
  frames: Vec<(Frame, usize)>,
}

impl FrameSink for Recorder {
  type Error = Infallible;

  fn write_frame(
    &mut self,
    frame: &Frame,
    detections: &FilteredDetectionSet,
  ) -> Result<(), Self::Error> {
    self.frames.push((frame.clone(), detections.len()));
    Ok(())
  }
}

#[derive(Debug, Error)]
#[error("camera unplugged")]
struct Unplugged;

/// 预设的帧序列，`None` 表示一次采集失败
struct ScriptedSource {
  frames: VecDeque<Option<Frame>>,
}

impl ScriptedSource {
  fn new(script: &[bool]) -> Self {
    let frames = script
      .iter()
      .enumerate()
      .map(|(index, ok)| ok.then(|| Frame::new(RgbImage::new(200, 100), index as u64)))
      .collect();
    Self { frames }
  }
}

impl FrameSource for ScriptedSource {
  type Error = Unplugged;

  fn next_frame(&mut self) -> Result<Frame, Self::Error> {
    self.frames.pop_front().flatten().ok_or(Unplugged)
  }
}

#[test]
fn single_image_retries_until_success_and_saves() {
  let dir = tempfile::tempdir().unwrap();
  let image_path = dir.path().join("street.png");
  RgbImage::new(200, 100).save(&image_path).unwrap();

  let detector = detector(Scripted::new([Err(Refused), one_car_and_one_ghost()]));
  let mut recorder = Recorder::default();

  let stats = SingleImageTask::default()
    .with_policy(fast_retry())
    .with_runs(Some(1))
    .run_task(&image_path, &detector, &mut recorder)
    .unwrap();

  assert_eq!(stats.attempts, 2);
  assert_eq!(stats.inference_failures, 1);
  assert_eq!(stats.completed, 1);
  assert_eq!(stats.detections, 1);
  assert!(stats.last_inference.is_some());

  let (frame, detections) = &recorder.frames[0];
  assert_eq!(recorder.frames.len(), 1);
  assert_eq!(*detections, 1);
  // 左上角附近是标签文字
  assert_eq!(frame.image.get_pixel(160, 10), &BOX_COLOR);
  assert_eq!(frame.image.get_pixel(40, 60), &BOX_COLOR);
  assert_eq!(frame.image.get_pixel(160, 60), &BOX_COLOR);
  assert_eq!(frame.image.get_pixel(100, 35), &BLACK);
  // 低于阈值的检测项不绘制
  assert_eq!(frame.image.get_pixel(0, 0), &BLACK);
}

#[test]
fn single_image_writes_detector_jpeg() {
  let dir = tempfile::tempdir().unwrap();
  let image_path = dir.path().join("street.png");
  RgbImage::new(200, 100).save(&image_path).unwrap();
  let output_dir = dir.path().join("output");

  let detector = detector(Scripted::new([one_car_and_one_ghost()]));
  let output = SaveImageFileOutput::in_dir(&output_dir, DETECTION_TYPE);
  let saved = output.path().to_path_buf();

  SingleImageTask::default()
    .with_policy(fast_retry())
    .with_runs(Some(1))
    .run_task(&image_path, &detector, output)
    .unwrap();

  assert_eq!(saved, output_dir.join("Objects-detector.jpg"));
  let reloaded = image::open(&saved).unwrap();
  assert_eq!((reloaded.width(), reloaded.height()), (200, 100));
}

#[test]
fn single_image_reloads_and_reruns() {
  let dir = tempfile::tempdir().unwrap();
  let image_path = dir.path().join("street.png");
  RgbImage::new(200, 100).save(&image_path).unwrap();

  let detector = detector(Scripted::new([
    one_car_and_one_ghost(),
    one_car_and_one_ghost(),
    one_car_and_one_ghost(),
  ]));
  let mut recorder = Recorder::default();

  let stats = SingleImageTask::default()
    .with_policy(fast_retry())
    .with_runs(Some(3))
    .run_task(&image_path, &detector, &mut recorder)
    .unwrap();

  assert_eq!(stats.completed, 3);
  let indices: Vec<u64> = recorder.frames.iter().map(|(f, _)| f.index).collect();
  assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn single_image_bounded_policy_is_exhausted() {
  let dir = tempfile::tempdir().unwrap();
  let image_path = dir.path().join("street.png");
  RgbImage::new(8, 8).save(&image_path).unwrap();

  let detector = detector(Scripted::default());
  let err = SingleImageTask::default()
    .with_policy(fast_retry().with_max_attempts(Some(3)))
    .with_runs(Some(1))
    .run_task(&image_path, &detector, Recorder::default())
    .unwrap_err();

  match err {
    TaskError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn unreadable_image_is_fatal() {
  let dir = tempfile::tempdir().unwrap();
  let detector = detector(Scripted::new([one_car_and_one_ghost()]));

  let err = SingleImageTask::default()
    .with_policy(fast_retry())
    .with_runs(Some(1))
    .run_task(dir.path().join("missing.jpg"), &detector, Recorder::default())
    .unwrap_err();

  assert!(matches!(err, TaskError::ResourceUnreadable(_)));
  assert_eq!(*detector_calls(&detector), 0);
}

#[test]
fn stream_skips_failed_frames_and_keeps_going() {
  let detector = detector(Scripted::new([
    one_car_and_one_ghost(),
    Err(Refused),
    one_car_and_one_ghost(),
  ]));
  let mut recorder = Recorder::default();

  let stats = CameraStreamTask::default()
    .with_policy(fast_retry())
    .with_frame_limit(Some(3))
    .run_task(ScriptedSource::new(&[true, true, true]), &detector, &mut recorder)
    .unwrap();

  assert_eq!(stats.attempts, 3);
  assert_eq!(stats.completed, 2);
  assert_eq!(stats.inference_failures, 1);
  assert_eq!(stats.skipped_frames, 1);
  assert_eq!(stats.detections, 2);

  let indices: Vec<u64> = recorder.frames.iter().map(|(f, _)| f.index).collect();
  assert_eq!(indices, vec![0, 2]);
}

#[test]
fn stream_acquisition_failures_back_off() {
  let detector = detector(Scripted::new([one_car_and_one_ghost()]));
  let mut recorder = Recorder::default();

  let stats = CameraStreamTask::default()
    .with_policy(fast_retry())
    .with_frame_limit(Some(1))
    .run_task(ScriptedSource::new(&[false, false, true]), &detector, &mut recorder)
    .unwrap();

  assert_eq!(stats.acquire_failures, 2);
  assert_eq!(stats.completed, 1);
  assert_eq!(recorder.frames.len(), 1);
}

#[test]
fn stream_consecutive_failures_exhaust_policy() {
  let detector = detector(Scripted::default());

  let err = CameraStreamTask::default()
    .with_policy(fast_retry().with_max_attempts(Some(2)))
    .run_task(
      ScriptedSource::new(&[true, true, true, true]),
      &detector,
      Recorder::default(),
    )
    .unwrap_err();

  assert!(matches!(err, TaskError::RetriesExhausted { attempts: 2, .. }));
}
