use crate::cli::args::Args;
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::multiplex::Multiplexer;
use crate::core::resolver::DeviceResolver;
use crate::domain::config::MultiComConfig;
use crate::domain::error::MultiComResult;
use crate::infrastructure::config::{ConfigManager, LoadEvent};
use std::io::Write;
use tracing::{info, warn};

/// Load configuration, open devices and monitor them until Ctrl+C
pub async fn execute(args: Args) -> MultiComResult<()> {
    let mut writer = ConsoleWriter::new();
    let config = load_config(&ConfigManager::new(args.config), &mut writer)?;
    monitor(&config, &mut writer, interrupted()).await
}

/// Read and merge configuration files, reporting progress and failures
pub fn load_config<W: OutputWriter>(
    manager: &ConfigManager,
    writer: &mut W,
) -> MultiComResult<MultiComConfig> {
    let mut status = Ok(());
    let config = manager.load_config(|event| {
        let written = match event {
            LoadEvent::Reading(path) => {
                writer.write_message(&format!("Reading config file: {}", path.display()))
            }
            LoadEvent::Failed(e) => writer.write_error(&e.to_string()),
        };
        if status.is_ok() {
            status = written;
        }
    });
    status?;
    Ok(config)
}

/// Resolve devices, print the banner and run the multiplexer until `shutdown`
pub async fn monitor<O, E, F>(
    config: &MultiComConfig,
    writer: &mut ConsoleWriter<O, E>,
    shutdown: F,
) -> MultiComResult<()>
where
    O: Write,
    E: Write,
    F: std::future::Future<Output = ()>,
{
    let report = DeviceResolver::new().resolve_all(config);
    for failure in &report.failures {
        writer.write_error(&failure.to_string())?;
    }

    if report.devices.is_empty() {
        writer.write_error("No devices initialized, nothing to monitor")?;
        return Ok(());
    }

    let mut multiplexer = Multiplexer::new(report.devices)?;
    info!("Monitoring {} device(s)", multiplexer.len());
    writer.write_banner(&multiplexer.labels())?;

    let (out, err) = writer.streams();
    multiplexer.run(out, err, shutdown).await?;

    // Finish the line the terminal echoed ^C on
    writer.write_message("")?;
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
