use env_logger::DEFAULT_FILTER_ENV;
use env_logger::fmt::style::{AnsiColor, Style};
use log::LevelFilter;
use std::io::Write;

/// Crates whose debug output is enabled by `--debug`.
const DEBUG_MODULES: [&str; 2] = ["cloudpool", "swarm"];

/// Sets the behavior of the logger, based on passed environment variables
/// such as `RUST_LOG`.
pub fn setup_logging(verbose: bool) {
    let mut builder = env_logger::Builder::default();
    builder.filter_level(LevelFilter::Info);
    if verbose {
        for module in DEBUG_MODULES {
            builder.filter_module(module, LevelFilter::Debug);
        }
    }

    let has_debug = std::env::var(DEFAULT_FILTER_ENV)
        .map(|v| v.contains("debug"))
        .unwrap_or(false);

    if verbose || has_debug {
        builder.format_timestamp_millis();
    } else {
        // Shortened format
        // <time> <level> <message>
        builder.format(|buf, record| {
            let level_style = buf.default_level_style(record.level()).bold();
            let time_style = Style::new().fg_color(Some(AnsiColor::BrightBlack.into()));
            writeln!(
                buf,
                "{time_style}{}{time_style:#} {level_style}{}{level_style:#} {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        });
    }

    // Overwrite the defaults from env
    builder.parse_default_env();
    builder.init();
}
