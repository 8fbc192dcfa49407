//! Shared helpers for pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tokio::sync::broadcast;

use courtline_models::{BallPosition, Decision, ServerMessage};
use courtline_queue::{MemoryQueue, OverflowPolicy};
use courtline_worker::{
    BallDetector, BounceClassifier, DecodedFrame, Detection, InMemoryCatalog, Pipeline,
    PipelineError, PipelineResult, RoomMessage, WorkerConfig,
};

/// Base64 JPEG of a grey `width` x 8 image.
pub fn jpeg_b64(width: u32) -> String {
    let height = 8;
    let pixels = vec![100u8; (width * height * 3) as usize];
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 75)
        .encode(&pixels, width, height, ColorType::Rgb8)
        .unwrap();
    STANDARD.encode(out)
}

/// Returns scripted ball positions, one entry per call.
#[derive(Default)]
pub struct ScriptedDetector {
    script: Mutex<VecDeque<DetectorStep>>,
    calls: AtomicUsize,
}

pub enum DetectorStep {
    Ball(f64, f64),
    Nothing,
    Fail,
}

impl ScriptedDetector {
    pub fn new(steps: impl IntoIterator<Item = DetectorStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, step: DetectorStep) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BallDetector for ScriptedDetector {
    async fn detect(&self, _frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DetectorStep::Nothing);
        match step {
            DetectorStep::Ball(x, y) => Ok(vec![Detection {
                label: "ball".to_string(),
                confidence: 0.9,
                center: BallPosition::new(x, y),
            }]),
            DetectorStep::Nothing => Ok(Vec::new()),
            DetectorStep::Fail => Err(PipelineError::detection("scripted failure")),
        }
    }
}

/// Fixed probability; records every window it sees.
pub struct FixedClassifier {
    probability: f32,
    windows: Mutex<Vec<Vec<[f32; 2]>>>,
}

impl FixedClassifier {
    pub fn new(probability: f32) -> Self {
        Self {
            probability,
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn windows(&self) -> Vec<Vec<[f32; 2]>> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl BounceClassifier for FixedClassifier {
    async fn bounce_probability(&self, window: &[[f32; 2]]) -> PipelineResult<f32> {
        self.windows.lock().unwrap().push(window.to_vec());
        Ok(self.probability)
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub detector: Arc<ScriptedDetector>,
    pub classifier: Arc<FixedClassifier>,
}

pub fn harness(catalog: InMemoryCatalog, detector: ScriptedDetector, probability: f32) -> Harness {
    let config = WorkerConfig {
        worker_count: 2,
        bounce_window: 8,
        replay_buffer_frames: 100,
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let detector = Arc::new(detector);
    let classifier = Arc::new(FixedClassifier::new(probability));
    let pipeline = Pipeline::new(
        config,
        Arc::new(MemoryQueue::new(64, OverflowPolicy::DropOldest)),
        Arc::new(catalog),
        detector.clone(),
        classifier.clone(),
    );
    Harness {
        pipeline,
        detector,
        classifier,
    }
}

/// Wait until `n` jobs have settled.
pub async fn wait_settled(pipeline: &Pipeline, n: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.settled_jobs() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("jobs did not settle in time");
}

/// Next decision in the room, skipping live previews.
pub async fn next_decision(rx: &mut broadcast::Receiver<RoomMessage>) -> Decision {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = rx.recv().await.expect("room closed");
            if let ServerMessage::Decision(d) = msg.as_ref() {
                return d.clone();
            }
        }
    })
    .await
    .expect("no decision received")
}
