use std::time::Duration;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use replication_graph::config::DriverConfig;
use replication_graph::graph::scheduler::TaskScheduler;
use replication_graph::graph::types::ReplicationFrame;
use replication_graph::scenario::{Scenario, ScenarioSpec};

#[cfg(feature = "console")]
use replication_graph::console::{self, ConsoleInput};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Replication graph driver v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let driver = DriverConfig::load_or_default();
    driver.validate()?;
    info!(
        "Configuration loaded: {} Hz, {} connections, frame limit {:?}",
        driver.tick_rate_hz, driver.connections, driver.frame_limit
    );

    let spec = ScenarioSpec::from_driver(&driver);
    let mut scenario = Scenario::build(&spec)?;

    // Driver-level deferred work
    let mut tasks: TaskScheduler<Scenario> = TaskScheduler::new();
    tasks.schedule(driver.census_delay_frames, "expected_actor_census", |scenario| {
        scenario.log_census();
    });

    #[cfg(feature = "console")]
    let console_input = {
        let input = ConsoleInput::default();
        input.spawn_stdin_reader()?;
        info!("Console ready, try `repgraph.print_routing`");
        input
    };

    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(driver.tick_rate_hz));
    let mut ticker = tokio::time::interval(tick_duration);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Shutdown signal handler
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut frame: ReplicationFrame = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received");
                break;
            }
        }

        #[cfg(feature = "console")]
        for line in console_input.drain() {
            match console::execute(&mut scenario.graph, &line) {
                Ok(output) => info!("{}", output),
                Err(e) => warn!("{}", e),
            }
        }

        tasks.run_due(frame, &mut scenario);

        let reports = scenario.run_frame(frame)?;
        if frame % driver.tick_rate_hz == 0 {
            for report in &reports {
                info!(
                    "Frame {} {}: {} candidates from {} lists, {} interest",
                    frame, report.connection, report.replication, report.lists, report.interest
                );
            }
        } else {
            debug!("Frame {} done", frame);
        }

        frame = frame.wrapping_add(1);
        if driver.frame_limit.map_or(false, |limit| u64::from(frame) >= limit) {
            info!("Frame limit {} reached", frame);
            break;
        }
    }

    info!("Driver stopped after {} frames", frame);
    Ok(())
}
