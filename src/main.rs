use anyhow::{Context, Result};

use device_key_registry::config::Config;

fn init_logger(level: log::LevelFilter) -> Result<()> {
    let base_config = fern::Dispatch::new();

    let stderr_config = fern::Dispatch::new()
        .level(log::LevelFilter::Warn)
        .level_for("device_key_registry", level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    base_config
        .chain(stderr_config)
        .apply()
        .context("Failed to install logger")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    init_logger(config.log_level)?;

    device_key_registry::server::start_server(config).await?;

    Ok(())
}
