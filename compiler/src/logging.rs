//! Logging setup shared by the matlc binary and the test suites.
//!
//! Pass traces that belong to a compilation session travel through the
//! diagnostics reporter, not this module. The `log` macros cover what is
//! useful outside a session: recipe loading, registry construction, and
//! whatever per-module debugging `RUST_LOG` filters enable.
//!
//! ```bash
//! RUST_LOG=info ./matlc check pipeline.recipe
//! RUST_LOG=compiler::session=debug ./matlc check pipeline.recipe
//! RUST_LOG=compiler::passes=trace ./matlc check pipeline.recipe
//! ```

use env_logger::fmt::Formatter;
use env_logger::{Builder, Env};
use log::{LevelFilter, Record};
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Record format used by every initializer in this module. Lines carry the
/// module target, the same name `RUST_LOG` filters select on.
fn write_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "[{:5} {}] {}",
        record.level(),
        record.target(),
        record.args()
    )
}

/// Initialize from `RUST_LOG`, defaulting to `warn` when unset.
///
/// Later calls do nothing, so binaries and embedders can both call this.
pub fn init_from_env() {
    INIT.call_once(|| {
        Builder::from_env(Env::default().default_filter_or("warn"))
            .format(write_record)
            .init();
    });
}

/// Initialize at a fixed level, ignoring `RUST_LOG`.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        Builder::new()
            .filter_level(level)
            .format(write_record)
            .init();
    });
}

/// Initializer for tests. Routes records through the harness capture and
/// tolerates repeated calls across parallel test binaries.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .format(write_record)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_tolerates_repeat_calls() {
        init_test();
        init_test();
        init_test();
    }

    #[test]
    fn test_macros_log_without_panicking() {
        init_test();
        log::warn!("recipe contained no passes");
        log::debug!("skipping `sum` call with non-literal dimension");
        log::trace!("resolved `numel` to a double scalar");
    }
}
