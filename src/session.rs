//! ハンドトラッキングのセッション管理
//!
//! 左右の手スロットを持ち、検出コールバックまたはフォールバックの
//! 定周期タイマーから1フレームずつパイプラインを回す。
//! どちらの入力を使うかは開始時に検出器の可否で決まり、セッション中は変わらない。

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::output::{HandSink, HandUpdate};
use crate::pose::{DetectionFrame, FrameSource, Handedness};
use crate::tracker::HandsTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// 検出器からのフレームで追跡
    Tracking,
    /// 検出器が使えず待機アニメーション
    Fallback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_processed: u64,
    /// 推論中に届いて捨てたフレーム
    pub frames_dropped: u64,
    /// 停止後に届いた古い推論結果
    pub stale_results: u64,
    pub fallback_ticks: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    dropped: AtomicU64,
    stale: AtomicU64,
    ticks: AtomicU64,
}

/// ロックで保護される状態。シンクはロック中に呼ばれるのでセッションを呼び返してはいけない
struct Shared {
    sinks: [Box<dyn HandSink>; 2],
    tracker: Option<HandsTracker>,
    /// stop のたびに進む。チケットとの照合もこのロックの中で行う
    epoch: u64,
}

impl Shared {
    fn emit(&mut self, updates: &[HandUpdate; 2]) {
        for (sink, update) in self.sinks.iter_mut().zip(updates.iter()) {
            sink.apply(update);
        }
    }

    fn process(&mut self, frame: &DetectionFrame, timestamp_ms: u64) -> bool {
        let updates = match self
            .tracker
            .as_mut()
            .and_then(|tracker| tracker.process_frame(frame, timestamp_ms))
        {
            Some(updates) => updates,
            None => return false,
        };
        self.emit(&updates);
        true
    }
}

/// 推論1回分の許可。drop で次のフレームを受け付ける
pub struct FrameTicket {
    epoch: u64,
    gate: Arc<AtomicBool>,
}

impl Drop for FrameTicket {
    fn drop(&mut self) {
        self.gate.store(false, Ordering::Release);
    }
}

/// 検出器側に渡すセッションへの参照。スレッド・タスク間で共有できる
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Mutex<Shared>>,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl SessionHandle {
    /// 検出結果を1フレーム処理する。停止中・フォールバック中は何もしない
    pub fn on_frame(&self, frame: &DetectionFrame, timestamp_ms: u64) -> bool {
        let processed = self.shared.lock().process(frame, timestamp_ms);
        if processed {
            self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        processed
    }

    /// 新しい映像フレームを推論に回してよいか
    ///
    /// 前の推論が終わっていなければ None（そのフレームは捨てる）。
    pub fn try_begin_frame(&self) -> Option<FrameTicket> {
        let epoch = {
            let shared = self.shared.lock();
            match &shared.tracker {
                Some(tracker) if !tracker.is_fallback() => shared.epoch,
                _ => return None,
            }
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Inference still running, frame dropped");
            return None;
        }

        Some(FrameTicket {
            epoch,
            gate: self.in_flight.clone(),
        })
    }

    /// 推論結果を反映する。チケット発行後にセッションが止まっていれば捨てる
    pub fn complete_frame(&self, ticket: FrameTicket, frame: &DetectionFrame, timestamp_ms: u64) -> bool {
        let processed = {
            let mut shared = self.shared.lock();
            if ticket.epoch != shared.epoch {
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                debug!("Detection finished after session stop, ignored");
                return false;
            }
            shared.process(frame, timestamp_ms)
        };
        if processed {
            self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        drop(ticket);
        processed
    }

    /// フォールバックアニメーションを1ステップ進める
    pub fn tick(&self, elapsed_ms: u64) -> bool {
        let mut shared = self.shared.lock();
        let updates = match shared.tracker.as_mut().and_then(|tracker| tracker.tick(elapsed_ms)) {
            Some(updates) => updates,
            None => return false,
        };
        shared.emit(&updates);
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.counters.processed.load(Ordering::Relaxed),
            frames_dropped: self.counters.dropped.load(Ordering::Relaxed),
            stale_results: self.counters.stale.load(Ordering::Relaxed),
            fallback_ticks: self.counters.ticks.load(Ordering::Relaxed),
        }
    }
}

struct FallbackClock {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// ハンドトラッキングセッション
///
/// 描画側の左右シンクは生成時に受け取る。`start` で検出器を起動し、
/// 失敗すればフォールバックアニメーションの定周期タスクを立ち上げる。
/// `stop` は同期的にタイマーと検出器を止め、スロット状態を破棄する。
pub struct TrackingSession {
    config: Config,
    handle: SessionHandle,
    mode: Option<SessionMode>,
    source: Option<Box<dyn FrameSource>>,
    clock: Option<FallbackClock>,
}

impl TrackingSession {
    pub fn new(
        config: Config,
        left: Box<dyn HandSink>,
        right: Box<dyn HandSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Shared {
            sinks: [left, right],
            tracker: None,
            epoch: 0,
        };
        Ok(Self {
            config,
            handle: SessionHandle {
                shared: Arc::new(Mutex::new(shared)),
                in_flight: Arc::new(AtomicBool::new(false)),
                counters: Arc::new(Counters::default()),
            },
            mode: None,
            source: None,
            clock: None,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// 動作中のモード。停止中は None
    pub fn mode(&self) -> Option<SessionMode> {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// セッションを開始する。既に動いていれば現在のモードを返す
    ///
    /// 検出器の起動に失敗した場合はフォールバックモードになる（エラーではない）。
    /// フォールバックのタイマーは tokio ランタイム上で動くため、ランタイム外では Err。
    pub fn start(&mut self, mut source: Box<dyn FrameSource>) -> Result<SessionMode> {
        if let Some(mode) = self.mode {
            return Ok(mode);
        }

        self.handle.shared.lock().tracker = Some(HandsTracker::new(&self.config));

        let mode = match source.start(self.handle.clone()) {
            Ok(()) => {
                info!("Hand tracking started with '{}' source", source.name());
                self.source = Some(source);
                SessionMode::Tracking
            }
            Err(e) => {
                warn!("Frame source '{}' unavailable: {:#}", source.name(), e);
                source.stop();
                if let Err(e) = self.start_fallback() {
                    self.handle.shared.lock().tracker = None;
                    return Err(e);
                }
                info!("Hand tracking started in fallback animation mode");
                SessionMode::Fallback
            }
        };

        self.mode = Some(mode);
        Ok(mode)
    }

    fn start_fallback(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow!("fallback animation needs a tokio runtime: {}", e))?;

        if let Some(tracker) = self.handle.shared.lock().tracker.as_mut() {
            tracker.enter_fallback();
        }

        let cancel = CancellationToken::new();
        let period = Duration::from_millis(self.config.fallback.tick_ms);
        let task = runtime.spawn(run_fallback_clock(self.handle.clone(), period, cancel.clone()));
        self.clock = Some(FallbackClock { cancel, task });
        Ok(())
    }

    /// セッションを止めてスロット状態を破棄する
    ///
    /// 各シンクには最後に非表示の更新を1回だけ送る。以降の検出結果は無視される。
    pub fn stop(&mut self) {
        if self.mode.take().is_none() {
            return;
        }

        let clock = self.clock.take();
        if let Some(clock) = &clock {
            clock.cancel.cancel();
        }
        if let Some(mut source) = self.source.take() {
            source.stop();
        }

        {
            let mut shared = self.handle.shared.lock();
            shared.epoch += 1;
            shared.tracker = None;
            let hidden = Handedness::BOTH.map(HandUpdate::hidden);
            shared.emit(&hidden);
        }

        if let Some(clock) = clock {
            clock.task.abort();
        }
        info!("Hand tracking stopped");
    }

    pub fn on_frame(&self, frame: &DetectionFrame, timestamp_ms: u64) -> bool {
        self.handle.on_frame(frame, timestamp_ms)
    }

    pub fn tick(&self, elapsed_ms: u64) -> bool {
        self.handle.tick(elapsed_ms)
    }

    pub fn stats(&self) -> SessionStats {
        self.handle.stats()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_fallback_clock(handle: SessionHandle, period: Duration, cancel: CancellationToken) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                // stop がロックを持っている間に待っていた場合に備えて再確認
                if cancel.is_cancelled() {
                    break;
                }
                let elapsed_ms = started.elapsed().as_millis() as u64;
                handle.tick(elapsed_ms);
            }
        }
    }
    debug!("Fallback clock stopped");
}
