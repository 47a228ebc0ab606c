use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub hands: HandsConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// 検出器の正規化座標 → ワールド座標の変換定数
///
/// 深度スケールは検出モデル・カメラごとに異なるため設定で変更できる。
#[derive(Debug, Deserialize, Clone)]
pub struct MappingConfig {
    /// X軸スケール（ミラー反転後に掛ける）
    #[serde(default = "default_x_scale")]
    pub x_scale: f32,
    /// Y軸スケール（上下反転後に掛ける）
    #[serde(default = "default_y_scale")]
    pub y_scale: f32,
    /// Z軸オフセット（手をシーン手前に置く）
    #[serde(default = "default_z_offset")]
    pub z_offset: f32,
    /// 検出器の相対深度に掛ける係数
    #[serde(default = "default_z_depth_scale")]
    pub z_depth_scale: f32,
    /// 全位置に加算する基準点（カメラ相対配置用）
    #[serde(default)]
    pub origin: [f32; 3],
}

fn default_x_scale() -> f32 { 3.0 }
fn default_y_scale() -> f32 { 2.0 }
fn default_z_offset() -> f32 { -0.5 }
fn default_z_depth_scale() -> f32 { -1.0 }

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            x_scale: default_x_scale(),
            y_scale: default_y_scale(),
            z_offset: default_z_offset(),
            z_depth_scale: default_z_depth_scale(),
            origin: [0.0; 3],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandsConfig {
    /// 平滑化係数 [0, 1)。大きいほど慣性が強い。0 で平滑化なし
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// 描画側へ渡す手モデルのスケール
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// 最終検出からこの時間を超えて未検出なら Lost
    #[serde(default = "default_lost_timeout_ms")]
    pub lost_timeout_ms: u64,
}

fn default_smoothing() -> f32 { 0.8 }
fn default_scale() -> f32 { 1.0 }
fn default_lost_timeout_ms() -> u64 { 500 }

impl Default for HandsConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            scale: default_scale(),
            lost_timeout_ms: default_lost_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    /// フォールバックアニメーションの更新間隔
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 { 50 }

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    /// 検出ごとにランドマークを debug ログへ出す
    #[serde(default)]
    pub draw_landmarks: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("smoothing must be in [0, 1), got {0}")]
    Smoothing(f32),
    #[error("hand scale must be finite and non-zero, got {0}")]
    Scale(f32),
    #[error("fallback tick interval must be positive")]
    TickInterval,
    #[error("mapping constant `{field}` is not finite")]
    Mapping { field: &'static str },
}

impl Config {
    /// 読み込んで検証する。範囲外の値もエラー
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content, path)
    }

    /// ファイルが無いときだけデフォルト設定を使う
    ///
    /// 読めるのに解析・検証に失敗した場合は、書かれた設定を捨てずにエラーを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("{} not found; using default config", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = self.hands.smoothing;
        if !s.is_finite() || !(0.0..1.0).contains(&s) {
            return Err(ConfigError::Smoothing(s));
        }
        let scale = self.hands.scale;
        if !scale.is_finite() || scale == 0.0 {
            return Err(ConfigError::Scale(scale));
        }
        if self.fallback.tick_ms == 0 {
            return Err(ConfigError::TickInterval);
        }

        let m = &self.mapping;
        let fields = [
            ("x_scale", m.x_scale),
            ("y_scale", m.y_scale),
            ("z_offset", m.z_offset),
            ("z_depth_scale", m.z_depth_scale),
            ("origin.x", m.origin[0]),
            ("origin.y", m.origin[1]),
            ("origin.z", m.origin[2]),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::Mapping { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mapping.x_scale, 3.0);
        assert_eq!(config.mapping.y_scale, 2.0);
        assert_eq!(config.mapping.z_offset, -0.5);
        assert_eq!(config.mapping.z_depth_scale, -1.0);
        assert_eq!(config.hands.lost_timeout_ms, 500);
        assert_eq!(config.fallback.tick_ms, 50);
        assert!(!config.debug.draw_landmarks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [mapping]
            z_depth_scale = -2.5

            [hands]
            smoothing = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.mapping.z_depth_scale, -2.5);
        assert_eq!(config.mapping.x_scale, 3.0);
        assert_eq!(config.hands.smoothing, 0.5);
        assert_eq!(config.hands.lost_timeout_ms, 500);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fallback]\ntick_ms = 20\n[debug]\ndraw_landmarks = true").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fallback.tick_ms, 20);
        assert!(config.debug.draw_landmarks);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/talava_hands.toml").unwrap();
        assert_eq!(config.hands.smoothing, 0.8);
    }

    #[test]
    fn test_load_or_default_negative_timeout_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[hands]\nsmoothing = 0.3\nlost_timeout_ms = -1").unwrap();
        // デフォルトに差し替えず呼び出し側へ返す
        assert!(Config::load_or_default(file.path()).is_err());
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_out_of_range_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[hands]\nsmoothing = 1.5").unwrap();
        let err = Config::load_or_default(file.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::Smoothing(1.5))
        );
    }

    #[test]
    fn test_load_or_default_keeps_written_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[hands]\nsmoothing = 0.3").unwrap();
        let config = Config::load_or_default(file.path()).unwrap();
        assert_eq!(config.hands.smoothing, 0.3);
        assert_eq!(config.hands.lost_timeout_ms, 500);
    }

    #[test]
    fn test_reject_smoothing_one() {
        let mut config = Config::default();
        config.hands.smoothing = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::Smoothing(1.0)));
        config.hands.smoothing = -0.1;
        assert!(config.validate().is_err());
        config.hands.smoothing = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reject_zero_tick() {
        let mut config = Config::default();
        config.fallback.tick_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::TickInterval));
    }

    #[test]
    fn test_reject_non_finite_mapping() {
        let mut config = Config::default();
        config.mapping.z_depth_scale = f32::NAN;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Mapping { field: "z_depth_scale" })
        );
    }
}
