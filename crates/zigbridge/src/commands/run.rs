//! `zigbridge run`: the bridge on the console bus.

use std::io::IsTerminal;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use zigbridge_core::{
    Bridge, BridgeServices, ChannelPublisher, DeviceType, IeeeAddr, InMemoryNetwork,
    NetworkDevice, SettingsStore,
};

use crate::cli::{ColorMode, GlobalOpts, RunArgs};
use crate::console::{self, ConsoleInput, Printer};
use crate::error::CliError;
use crate::logging;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load_config(global)?;
    let bridge_config = config.bridge_config()?;
    let coordinator = config.coordinator_address()?;

    let settings_path = args.settings.unwrap_or_else(|| config.settings_path());
    let store = SettingsStore::open(&settings_path).map_err(|source| CliError::Settings {
        path: settings_path.display().to_string(),
        source,
    })?;

    let log_file = config.log_file();
    let (log_control, _log_guard) = logging::init_tracing(
        store.options().log_level,
        global.verbose,
        log_file.as_deref(),
        config.log.format,
    )?;

    let network = Arc::new(InMemoryNetwork::new(coordinator, config.coordinator_info()));
    seed_network(&network, &store);

    let (publisher, mut outbound) = ChannelPublisher::new();
    let bridge = Bridge::new(
        bridge_config,
        BridgeServices {
            store: Arc::new(store),
            network: Arc::clone(&network) as _,
            publisher: Arc::new(publisher),
            log_control: Arc::new(log_control),
        },
    );

    info!(settings = %settings_path.display(), "starting bridge");
    bridge.start().await;

    let printer = Printer::new(use_color(global.color));
    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            biased;
            Some(message) = outbound.recv() => printer.print(&mut stdout, &message)?,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                process_line(&bridge, &network, &line).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    bridge.shutdown().await;
    while let Ok(message) = outbound.try_recv() {
        printer.print(&mut stdout, &message)?;
    }
    Ok(())
}

async fn process_line(bridge: &Bridge, network: &InMemoryNetwork, line: &str) {
    let input = match console::parse_line(line) {
        Ok(Some(input)) => input,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, %line, "ignoring console input");
            return;
        }
    };

    let outcome = match input {
        ConsoleInput::Message(message) => match bridge.execute(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "bridge did not accept the message");
                return;
            }
        },
        ConsoleInput::Join(id) => {
            if !network.has_device(&id) {
                network.add_device(network_device(id.clone(), DeviceType::EndDevice, 0));
            }
            bridge.device_joined(&id).await
        }
        ConsoleInput::State(id, state) => bridge.device_state(&id, state).await,
    };
    debug!(?outcome, "console input handled");
}

/// Put every registered device on the simulated network.
fn seed_network(network: &InMemoryNetwork, store: &SettingsStore) {
    for (index, entry) in store.devices().into_iter().enumerate() {
        let address = u16::try_from(index + 1).unwrap_or(u16::MAX);
        network.add_device(network_device(entry.id, DeviceType::Router, address));
    }
}

fn network_device(id: IeeeAddr, device_type: DeviceType, network_address: u16) -> NetworkDevice {
    NetworkDevice {
        ieee_addr: id,
        device_type,
        network_address,
        manufacturer_id: None,
        model_id: None,
        power_source: None,
        model: None,
        last_seen: None,
    }
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}
