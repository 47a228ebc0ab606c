//! 指先とMCP関節の画像Y比較によるジェスチャー判定
//!
//! 画像座標（Y下向き）のまま判定する。ワールド座標は符号が逆なので使わない。
//! 手のひらがカメラを向いている前提で、手を回転させると判定は崩れる。

use crate::pose::landmark::{
    INDEX_MCP, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP, RING_MCP,
    RING_TIP, THUMB_IP, THUMB_TIP,
};
use crate::pose::Landmark;

/// (指先, 基準関節)。親指は IP 関節を基準にする
const FINGERS: [(usize, usize); 5] = [
    (THUMB_TIP, THUMB_IP),
    (INDEX_TIP, INDEX_MCP),
    (MIDDLE_TIP, MIDDLE_MCP),
    (RING_TIP, RING_MCP),
    (PINKY_TIP, PINKY_MCP),
];

/// 握り・開きとみなす指の本数
const MIN_FINGERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Fist,
    Pointing,
    OpenPalm,
    /// どのジェスチャーにも当てはまらない
    Neutral,
    /// ランドマーク不足・非有限値で判定できない
    Unknown,
}

impl Gesture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fist => "fist",
            Self::Pointing => "pointing",
            Self::OpenPalm => "open_palm",
            Self::Neutral => "neutral",
            Self::Unknown => "unknown",
        }
    }
}

/// 優先順位 Fist > Pointing > OpenPalm > Neutral
pub fn classify(landmarks: &[Landmark]) -> Gesture {
    if landmarks.len() < LANDMARK_COUNT {
        return Gesture::Unknown;
    }
    let uses_only_finite = FINGERS
        .iter()
        .all(|&(tip, mcp)| landmarks[tip].is_finite() && landmarks[mcp].is_finite());
    if !uses_only_finite {
        return Gesture::Unknown;
    }

    if is_fist(landmarks) {
        Gesture::Fist
    } else if is_pointing(landmarks) {
        Gesture::Pointing
    } else if is_open_palm(landmarks) {
        Gesture::OpenPalm
    } else {
        Gesture::Neutral
    }
}

/// 指先がMCPより下（画像Yが大きい）の指が4本以上
pub fn is_fist(landmarks: &[Landmark]) -> bool {
    count_fingers(landmarks, |tip, mcp| tip.y > mcp.y) >= MIN_FINGERS
}

/// 人差し指が伸びて中指が曲がっている
pub fn is_pointing(landmarks: &[Landmark]) -> bool {
    if landmarks.len() < LANDMARK_COUNT {
        return false;
    }
    let index_extended = landmarks[INDEX_TIP].y < landmarks[INDEX_MCP].y;
    let middle_closed = landmarks[MIDDLE_TIP].y > landmarks[MIDDLE_MCP].y;
    index_extended && middle_closed
}

/// 指先がMCPより上の指が4本以上
pub fn is_open_palm(landmarks: &[Landmark]) -> bool {
    count_fingers(landmarks, |tip, mcp| tip.y < mcp.y) >= MIN_FINGERS
}

fn count_fingers(landmarks: &[Landmark], pred: impl Fn(&Landmark, &Landmark) -> bool) -> usize {
    if landmarks.len() < LANDMARK_COUNT {
        return 0;
    }
    FINGERS
        .iter()
        .filter(|&&(tip, mcp)| pred(&landmarks[tip], &landmarks[mcp]))
        .count()
}
