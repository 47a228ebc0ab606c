pub mod config;
pub mod output;
pub mod pose;
pub mod session;
pub mod tracker;

/// `git describe` で埋め込んだビルドバージョン
pub const GIT_VERSION: &str = env!("GIT_VERSION");
