/// 手スロットの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandMode {
    /// 検出中（猶予時間内の未検出を含む）
    Tracking,
    /// 猶予時間を超えて未検出
    Lost,
    /// 検出器が使えずフォールバックアニメーションで駆動中
    FallbackIdle,
}

/// 状態遷移の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Changed { from: HandMode, to: HandMode },
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// 検出の新しさから手の表示状態を決める状態機械
///
/// 初期状態は Lost。検出があれば Tracking、最終検出から
/// `lost_timeout_ms` を超えて未検出なら Lost。
/// FallbackIdle はセッション単位のモードで、ここからは遷移しない。
#[derive(Debug, Clone)]
pub struct HandPresence {
    mode: HandMode,
    last_detection_ms: Option<u64>,
    lost_timeout_ms: u64,
}

impl HandPresence {
    pub fn new(lost_timeout_ms: u64) -> Self {
        Self {
            mode: HandMode::Lost,
            last_detection_ms: None,
            lost_timeout_ms,
        }
    }

    pub fn mode(&self) -> HandMode {
        self.mode
    }

    pub fn last_detection_ms(&self) -> Option<u64> {
        self.last_detection_ms
    }

    /// FallbackIdle はフォールバックが動いている間のみ存在するので常に表示
    pub fn visible(&self) -> bool {
        matches!(self.mode, HandMode::Tracking | HandMode::FallbackIdle)
    }

    /// このフレームで検出があった
    pub fn observe(&mut self, now_ms: u64) -> Transition {
        if self.mode == HandMode::FallbackIdle {
            return Transition::Unchanged;
        }
        self.last_detection_ms = Some(now_ms);
        self.set_mode(HandMode::Tracking)
    }

    /// このフレームで検出がなかった
    pub fn miss(&mut self, now_ms: u64) -> Transition {
        if self.mode != HandMode::Tracking {
            return Transition::Unchanged;
        }
        let expired = match self.last_detection_ms {
            // 時刻が巻き戻った場合は経過0扱い
            Some(last) => now_ms.saturating_sub(last) > self.lost_timeout_ms,
            None => true,
        };
        if expired {
            self.set_mode(HandMode::Lost)
        } else {
            Transition::Unchanged
        }
    }

    /// セッション開始時に検出器が使えなかった
    pub fn enter_fallback(&mut self) -> Transition {
        self.set_mode(HandMode::FallbackIdle)
    }

    fn set_mode(&mut self, to: HandMode) -> Transition {
        let from = self.mode;
        if from == to {
            return Transition::Unchanged;
        }
        self.mode = to;
        Transition::Changed { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_lost() {
        let p = HandPresence::new(500);
        assert_eq!(p.mode(), HandMode::Lost);
        assert!(!p.visible());
        assert_eq!(p.last_detection_ms(), None);
    }

    #[test]
    fn test_observe_enters_tracking() {
        let mut p = HandPresence::new(500);
        let t = p.observe(1000);
        assert_eq!(t, Transition::Changed { from: HandMode::Lost, to: HandMode::Tracking });
        assert!(p.visible());
        assert_eq!(p.last_detection_ms(), Some(1000));
        assert_eq!(p.observe(1033), Transition::Unchanged);
        assert_eq!(p.last_detection_ms(), Some(1033));
    }

    #[test]
    fn test_single_miss_within_grace_stays_visible() {
        let mut p = HandPresence::new(500);
        p.observe(1000);
        assert_eq!(p.miss(1033), Transition::Unchanged);
        assert!(p.visible());
        // ちょうど境界はまだ Tracking
        assert_eq!(p.miss(1500), Transition::Unchanged);
        assert!(p.visible());
    }

    #[test]
    fn test_gap_exceeding_timeout_hides() {
        let mut p = HandPresence::new(500);
        p.observe(1000);
        let t = p.miss(1600);
        assert_eq!(t, Transition::Changed { from: HandMode::Tracking, to: HandMode::Lost });
        assert!(!p.visible());
        // Lost のまま
        assert_eq!(p.miss(2000), Transition::Unchanged);
    }

    #[test]
    fn test_recover_after_lost() {
        let mut p = HandPresence::new(500);
        p.observe(0);
        p.miss(600);
        assert!(p.observe(700).is_changed());
        assert_eq!(p.mode(), HandMode::Tracking);
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut p = HandPresence::new(500);
        p.observe(1000);
        assert_eq!(p.miss(900), Transition::Unchanged);
        assert!(p.visible());
    }

    #[test]
    fn test_fallback_is_terminal() {
        let mut p = HandPresence::new(500);
        assert!(p.enter_fallback().is_changed());
        assert!(p.visible());
        assert_eq!(p.observe(10), Transition::Unchanged);
        assert_eq!(p.miss(10_000), Transition::Unchanged);
        assert_eq!(p.mode(), HandMode::FallbackIdle);
    }
}
