use std::{ops::Range, sync::Arc, time::Duration};

use futures::{stream, StreamExt, TryStreamExt};
use simconn_license::{license::LeaseController, ConnResult};

use crate::routine::{variable, Arguments, SimulatorRoutine, Value};

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub runs: usize,
    pub concurrency: usize,
    pub work: Duration,
    pub pause: Option<Duration>,
    pub model: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub index: usize,
    pub outlet_temp: Value,
    pub status: Value,
}

/// Execute all routine runs. With a pause, the connector goes idle halfway.
pub async fn run_routines(
    controller: Arc<LeaseController>,
    opts: &RunOptions,
) -> ConnResult<Vec<RunOutcome>> {
    let split = match opts.pause {
        Some(_) => opts.runs / 2,
        None => opts.runs,
    };

    let mut outcomes = run_batch(&controller, 0..split, opts).await?;

    if let Some(pause) = opts.pause {
        tracing::info!(?pause, "Connector idle");
        tokio::time::sleep(pause).await;
    }

    outcomes.extend(run_batch(&controller, split..opts.runs, opts).await?);
    outcomes.sort_by_key(|outcome| outcome.index);
    Ok(outcomes)
}

/// Return false if the license is still held after `within`.
pub async fn wait_released(controller: &LeaseController, within: Duration) -> bool {
    let mut rx = controller.subscribe();
    tokio::time::timeout(within, rx.wait_for(|held| !*held))
        .await
        .is_ok_and(|changed| changed.is_ok())
}

async fn run_batch(
    controller: &Arc<LeaseController>,
    range: Range<usize>,
    opts: &RunOptions,
) -> ConnResult<Vec<RunOutcome>> {
    stream::iter(range)
        .map(|index| run_one(controller.clone(), index, opts))
        .buffer_unordered(opts.concurrency.max(1))
        .try_collect()
        .await
}

async fn run_one(
    controller: Arc<LeaseController>,
    index: usize,
    opts: &RunOptions,
) -> ConnResult<RunOutcome> {
    // The license server may be slow to answer.
    let acquiring = controller.clone();
    tokio::task::spawn_blocking(move || acquiring.acquire_lease()).await??;

    let _usage = controller.begin_usage()?;

    let mut routine = SimulatorRoutine::new(opts.model.as_str());
    routine.set_input(&variable("inlet_temp"), Value::Number(15.0 + index as f64))?;
    routine.set_input(
        &variable("heat_transfer"),
        Value::Number(5_000.0 * (index + 1) as f64),
    )?;

    let mut args = Arguments::new();
    args.insert("command".to_string(), "solve".to_string());
    routine.run_command(&args)?;
    tokio::time::sleep(opts.work).await;

    let outcome = RunOutcome {
        index,
        outlet_temp: routine.get_output(&variable("outlet_temp"))?.clone(),
        status: routine.get_output(&variable("status"))?.clone(),
    };
    tracing::info!(
        index,
        model = routine.model_path(),
        outlet_temp = %outcome.outlet_temp,
        status = %outcome.status,
        "Routine run completed"
    );
    Ok(outcome)
}
