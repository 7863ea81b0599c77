use std::{sync::Arc, time::Duration};

use clap::Parser;
use simconn_cli::{
    client::SimulatorClient,
    command::ConnectorCommand,
    connector::{self, RunOptions},
    routine::HeatExchanger,
    seat::SimulatedSeat,
};
use simconn_license::ConnResult;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cmd = ConnectorCommand::parse();
    if let Err(err) = execute(cmd).await {
        tracing::error!(error = %err, "simconn failed");
        std::process::exit(1);
    }
}

async fn execute(cmd: ConnectorCommand) -> ConnResult<()> {
    match cmd {
        ConnectorCommand::Run {
            runs,
            concurrency,
            lock_time_ms,
            work_ms,
            seat_delay_ms,
            pause_ms,
            model,
        } => {
            let mut client = SimulatorClient::new();
            client.test_connection()?;
            client.open_model(&model).await?;
            tracing::info!(
                connector = client.connector_version(),
                simulator = client.simulator_version(),
                "Simulator connected"
            );

            let seat_delay = Duration::from_millis(seat_delay_ms);
            let seat = SimulatedSeat::new("simulator-seat", seat_delay);
            let controller = Arc::new(seat.controller(Duration::from_millis(lock_time_ms))?);

            let opts = RunOptions {
                runs,
                concurrency,
                work: Duration::from_millis(work_ms),
                pause: pause_ms.map(Duration::from_millis),
                model: client
                    .model_path()
                    .map_or(model, |path| path.display().to_string()),
            };
            let outcomes = connector::run_routines(controller.clone(), &opts).await?;
            for outcome in &outcomes {
                println!(
                    "run {:>3}: outlet_temp={} status={}",
                    outcome.index, outcome.outlet_temp, outcome.status
                );
            }

            let within = controller.lock_time() * 2 + seat_delay + Duration::from_secs(1);
            if !connector::wait_released(&controller, within).await {
                tracing::warn!("License still held at exit");
            }
            controller.dispose();

            println!(
                "license {}: seat checkouts: {}, returns: {}",
                controller.name(),
                seat.checkouts(),
                seat.returns()
            );
        }
        ConnectorCommand::Simulate {
            inlet_temp,
            flow_rate,
            heat_capacity,
            heat_transfer,
        } => {
            let output = HeatExchanger {
                inlet_temp,
                flow_rate,
                heat_capacity,
                heat_transfer,
            }
            .simulate()?;

            println!("outlet_temp: {}", output.outlet_temp);
            println!("heat_duty: {}", output.heat_duty);
            println!("temperature_rise: {}", output.temperature_rise);
            println!("efficiency: {}", output.efficiency);
            println!("status: {}", output.status.as_str());
        }
    }

    Ok(())
}
