use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::landmark::{DetectionFrame, HandDetection, Handedness, Landmark};
use crate::session::SessionHandle;

/// 手ランドマーク検出器（外部の推論モデル）との境界
///
/// `start` で受け取ったハンドルに検出結果を流し込む。
/// `start` が失敗した場合、セッションはフォールバックアニメーションに切り替わる。
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// 検出を開始する
    fn start(&mut self, handle: SessionHandle) -> Result<()>;

    /// セッション停止時に呼ばれる。以後ハンドルを使わないこと
    fn stop(&mut self);
}

/// 常に利用不可の検出器（モデル未ロード時の代替）
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FrameSource for UnavailableSource {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn start(&mut self, _handle: SessionHandle) -> Result<()> {
        bail!("hand landmark model not available: {}", self.reason)
    }

    fn stop(&mut self) {}
}

#[derive(Debug, Deserialize)]
struct RecordedHand {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    landmarks: Vec<Landmark>,
}

#[derive(Debug, Deserialize)]
struct RecordedLine {
    timestamp_ms: u64,
    #[serde(default)]
    hands: Vec<RecordedHand>,
}

/// タイムスタンプ付きの記録済みフレーム
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub timestamp_ms: u64,
    pub frame: DetectionFrame,
}

/// JSON Lines で記録した検出結果を再生するソース
///
/// 1行 = `{"timestamp_ms": u64, "hands": [{"handedness": "Left", "landmarks": [...]}]}`
///
/// 記録時の間隔どおりに tokio タスクからセッションへ流す。
pub struct ReplaySource {
    path: PathBuf,
    finished: CancellationToken,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl ReplaySource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            finished: CancellationToken::new(),
            task: None,
        }
    }

    /// 再生が最後まで終わるか止められたら cancel されるトークン
    pub fn finished(&self) -> CancellationToken {
        self.finished.clone()
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn start(&mut self, handle: SessionHandle) -> Result<()> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to open replay {}", self.path.display()))?;
        let frames = parse_recording(&content)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow!("replay needs a tokio runtime: {}", e))?;
        info!("Replaying {} frames from {}", frames.len(), self.path.display());

        let cancel = CancellationToken::new();
        let task = runtime.spawn(replay(frames, handle, cancel.clone(), self.finished.clone()));
        self.task = Some((cancel, task));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((cancel, task)) = self.task.take() {
            cancel.cancel();
            task.abort();
        }
        self.finished.cancel();
    }
}

async fn replay(
    frames: Vec<RecordedFrame>,
    handle: SessionHandle,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    let started = Instant::now();
    let first_ms = frames.first().map_or(0, |f| f.timestamp_ms);

    for recorded in &frames {
        let offset = Duration::from_millis(recorded.timestamp_ms.saturating_sub(first_ms));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(started + offset) => {}
        }
        // 記録は推論済みなのでチケットはすぐ返す
        if let Some(ticket) = handle.try_begin_frame() {
            handle.complete_frame(ticket, &recorded.frame, recorded.timestamp_ms);
        }
    }

    debug!("Replay finished: {:?}", handle.stats());
    finished.cancel();
}

/// 記録を解析する。handedness が欠けた手は捨てる
pub fn parse_recording(content: &str) -> Result<Vec<RecordedFrame>> {
    let mut frames = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let recorded: RecordedLine = serde_json::from_str(line)
            .with_context(|| format!("Invalid replay line {}", line_no + 1))?;

        let mut hands = Vec::with_capacity(recorded.hands.len());
        for hand in recorded.hands {
            match hand.handedness.as_deref().and_then(Handedness::from_label) {
                Some(handedness) => hands.push(HandDetection::new(handedness, hand.landmarks)),
                None => warn!(
                    "Replay line {}: dropping hand without handedness ({:?})",
                    line_no + 1,
                    hand.handedness
                ),
            }
        }

        frames.push(RecordedFrame {
            timestamp_ms: recorded.timestamp_ms,
            frame: DetectionFrame::new(hands),
        });
    }
    Ok(frames)
}
