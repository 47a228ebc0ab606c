use serde::Deserialize;

/// MediaPipe Hands の 21 ランドマーク数
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// 単一ランドマーク（検出器の正規化座標）
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下向きが正)
    pub y: f32,
    /// 相対深度（負がカメラに近い）。深度を出さない検出器では 0
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const BOTH: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    /// 検出器のラベル文字列から変換（大文字小文字は区別しない）
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// スロット配列のインデックス
    pub fn slot(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// 1つの手の検出結果
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HandDetection {
    pub handedness: Handedness,
    pub landmarks: Vec<Landmark>,
}

impl HandDetection {
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self { handedness, landmarks }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// 有限値の手首。これが無い検出は使えない
    pub fn wrist(&self) -> Option<&Landmark> {
        self.get(WRIST).filter(|w| w.is_finite())
    }

    /// 21点すべて揃っているか
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }
}

/// 1回の検出コールバック分の結果。空もあり得る
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub hands: Vec<HandDetection>,
}

impl DetectionFrame {
    pub fn new(hands: Vec<HandDetection>) -> Self {
        Self { hands }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// 手ごとに最後の使える検出を返す（同じ手が重複した場合は後勝ち）
    ///
    /// 手首が無い・非有限の検出は書き込みにならないので飛ばす。
    pub fn latest(&self, handedness: Handedness) -> Option<&HandDetection> {
        self.hands
            .iter()
            .rev()
            .find(|h| h.handedness == handedness && h.wrist().is_some())
    }

    pub fn contains(&self, handedness: Handedness) -> bool {
        self.hands.iter().any(|h| h.handedness == handedness)
    }
}
