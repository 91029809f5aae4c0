use data::log::Error;

use std::io;

/// Overrides the default level, e.g. `OPENCHART_LOG=trace`.
const LEVEL_ENV: &str = "OPENCHART_LOG";

pub fn setup(is_debug: bool) -> Result<(), Error> {
    let level = match std::env::var(LEVEL_ENV) {
        Ok(level) => level.parse::<log::LevelFilter>()?,
        Err(_) if is_debug => log::LevelFilter::Debug,
        Err(_) => log::LevelFilter::Info,
    };

    let mut logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}:{} [{}:{}] -- {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                message
            ));
        })
        .level(log::LevelFilter::Off)
        .level_for("openchart", level)
        .level_for("openchart_data", level)
        .level_for("openchart_exchange", level);

    if is_debug {
        logger = logger.chain(io::stdout());
    } else {
        logger = logger.chain(data::log::file()?);
    }

    logger.apply()?;
    Ok(())
}
