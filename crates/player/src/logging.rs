// Platform logger setup

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install the platform logger once; later calls are no-ops
///
/// Android logs go to logcat under the `Tonearm` tag. Elsewhere `env_logger`
/// is used at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("Tonearm"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            )
            .try_init();
        }
    });
}
