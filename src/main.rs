use anyhow::Result;
use std::env;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use talava_hands::config::Config;
use talava_hands::output::LogSink;
use talava_hands::pose::{FrameSource, ReplaySource, UnavailableSource};
use talava_hands::session::{SessionMode, TrackingSession};

const CONFIG_PATH: &str = "config.toml";
const LOG_ENV: &str = "TALAVA_LOG";
/// フォールバック時に動かしておく時間
const FALLBACK_DEMO: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    let level = env::var(LOG_ENV)
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = Config::load_or_default(CONFIG_PATH)?;

    println!("Talava Hands {}", talava_hands::GIT_VERSION);
    println!(
        "Mapping: scale=({}, {}), z_offset={}, z_depth_scale={}",
        config.mapping.x_scale, config.mapping.y_scale, config.mapping.z_offset, config.mapping.z_depth_scale
    );
    println!(
        "Hands: smoothing={}, lost_timeout={}ms",
        config.hands.smoothing, config.hands.lost_timeout_ms
    );
    println!();

    let mut finished = None;
    let source: Box<dyn FrameSource> = match env::args().nth(1) {
        Some(path) => {
            let replay = ReplaySource::new(path);
            finished = Some(replay.finished());
            Box::new(replay)
        }
        None => Box::new(UnavailableSource::new("no replay given")),
    };

    let mut session = TrackingSession::new(config, Box::new(LogSink::new()), Box::new(LogSink::new()))?;
    let mode = session.start(source)?;

    match (mode, finished) {
        (SessionMode::Tracking, Some(finished)) => finished.cancelled().await,
        _ => tokio::time::sleep(FALLBACK_DEMO).await,
    }

    session.stop();
    info!("Done: {:?}", session.stats());
    Ok(())
}
