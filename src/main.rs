use anyhow::{bail, Context, Result};
use scale_bridge::domain::models::RawPayload;
use scale_bridge::domain::settings::SettingsService;
use scale_bridge::infrastructure::bluetooth::protocol::{self, ScaleCommand};
use scale_bridge::infrastructure::logging;
use scale_bridge::infrastructure::platform::{LocalClock, SystemClock};
use scale_bridge::infrastructure::storage::{FingerprintStore, JsonFileStore};
use tracing::{error, info};

const USAGE: &str = "usage: scale_bridge <decode <hex> | frames | settings>";

fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;

    let _logging_guard = match logging::init_logger(settings_service.get()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logger: {}", e);
            None
        }
    };

    info!("Starting Scale Bridge");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["decode", hex] => {
            let payload = RawPayload::from_hex(hex)?;
            let measurement = match protocol::decode(&payload) {
                Ok(m) => m,
                Err(e) => {
                    error!("Decode failed: {}", e);
                    return Err(e.into());
                }
            };
            info!("Decoded {:?}", measurement);
            let json = measurement
                .to_payload()
                .to_json()
                .context("Failed to encode measurement")?;
            println!("{}", json);
        }
        ["frames"] => {
            let unit = settings_service.get().scale_unit;
            let now = SystemClock.now();
            for command in [ScaleCommand::SetUnit(unit), ScaleCommand::SetTime(now)] {
                let frame = RawPayload::new(command.to_bytes());
                println!("{:?}: {}", command, frame.to_hex());
            }
        }
        ["settings"] => {
            let json = serde_json::to_string_pretty(settings_service.get())?;
            println!("# {}", settings_service.path().display());
            println!("{}", json);

            let store = JsonFileStore::new(settings_service.get().state_file()?);
            match store.load() {
                Ok(Some(last)) => println!("# last delivered: {}", last),
                Ok(None) => println!("# nothing delivered yet"),
                Err(e) => error!("Cannot read {}: {}", store.path().display(), e),
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
