use std::io::Write;

use chrono::Utc;
use log::info;

/// Installs the global logger. `RUST_LOG` wins when set, otherwise
/// `default_level` (e.g. `ClientConfig::log_level`) is used.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    let result = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}:{}] {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();

    if result.is_ok() {
        info!("ConnectHub logger initialized");
    }
}

/// Logger for tests; output is captured by the harness. Safe to call repeatedly.
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
