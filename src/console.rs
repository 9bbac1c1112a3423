//! Debug console commands
//!
//! `repgraph.print_routing`               print the class routing table
//! `repgraph.frequency_buckets <n>`       fix the frequency bucket count
//! `repgraph.alter_nearest_n <n>`         change K of the nearest-actor nodes
//! `repgraph.disable_spatial_rebuilds <0|1>`
//! `repgraph.dump`                        graph stats as JSON
//!
//! Mutating commands take effect at the start of the next replication frame.

use std::io::BufRead;
use std::str::FromStr;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::graph::replication_graph::ReplicationGraph;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command} expects an integer argument")]
    MissingArgument { command: &'static str },
    #[error("{command}: invalid argument '{value}'")]
    InvalidArgument { command: &'static str, value: String },
    #[error("Failed to serialize stats: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    PrintRouting,
    FrequencyBuckets(usize),
    AlterNearestN(usize),
    DisableSpatialRebuilds(bool),
    Dump,
}

impl ConsoleCommand {
    pub const PRINT_ROUTING: &'static str = "repgraph.print_routing";
    pub const FREQUENCY_BUCKETS: &'static str = "repgraph.frequency_buckets";
    pub const ALTER_NEAREST_N: &'static str = "repgraph.alter_nearest_n";
    pub const DISABLE_SPATIAL_REBUILDS: &'static str = "repgraph.disable_spatial_rebuilds";
    pub const DUMP: &'static str = "repgraph.dump";
}

fn int_arg(command: &'static str, arg: Option<&str>) -> Result<usize, ConsoleError> {
    let raw = arg.ok_or(ConsoleError::MissingArgument { command })?;
    raw.parse::<usize>().map_err(|_| ConsoleError::InvalidArgument {
        command,
        value: raw.to_string(),
    })
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match name.to_ascii_lowercase().as_str() {
            Self::PRINT_ROUTING => Ok(Self::PrintRouting),
            Self::DUMP => Ok(Self::Dump),
            Self::FREQUENCY_BUCKETS => {
                let count = int_arg(Self::FREQUENCY_BUCKETS, arg)?;
                if count == 0 {
                    return Err(ConsoleError::InvalidArgument {
                        command: Self::FREQUENCY_BUCKETS,
                        value: "0".to_string(),
                    });
                }
                Ok(Self::FrequencyBuckets(count))
            }
            Self::ALTER_NEAREST_N => Ok(Self::AlterNearestN(int_arg(Self::ALTER_NEAREST_N, arg)?)),
            Self::DISABLE_SPATIAL_REBUILDS => {
                Ok(Self::DisableSpatialRebuilds(int_arg(Self::DISABLE_SPATIAL_REBUILDS, arg)? != 0))
            }
            _ => Err(ConsoleError::UnknownCommand(name.to_string())),
        }
    }
}

/// Parse and apply one console line. Returns text to show the operator.
pub fn execute(graph: &mut ReplicationGraph, line: &str) -> Result<String, ConsoleError> {
    let command: ConsoleCommand = line.parse()?;
    let next = graph.frame().wrapping_add(1);

    let output = match command {
        ConsoleCommand::PrintRouting => graph.print_routing(),
        ConsoleCommand::Dump => {
            serde_json::to_string_pretty(&graph.stats()).map_err(|e| ConsoleError::Serialize(e.to_string()))?
        }
        ConsoleCommand::FrequencyBuckets(count) => {
            graph.schedule_next_frame("frequency_buckets", move |g| {
                g.set_frequency_bucket_count(count);
                info!("Frequency buckets set to {}", count);
            });
            format!("Frequency buckets -> {} at frame {}", count, next)
        }
        ConsoleCommand::AlterNearestN(n) => {
            graph.schedule_next_frame("alter_nearest_n", move |g| {
                g.set_max_nearest_actors(n);
                info!("Nearest actor count set to {}", n);
            });
            format!("Nearest N -> {} at frame {}", n, next)
        }
        ConsoleCommand::DisableSpatialRebuilds(disabled) => {
            graph.schedule_next_frame("disable_spatial_rebuilds", move |g| {
                g.set_disable_spatial_rebuilds(disabled);
                info!("Spatial rebuilds {}", if disabled { "disabled" } else { "enabled" });
            });
            format!("Spatial rebuilds disabled -> {} at frame {}", disabled, next)
        }
    };
    Ok(output)
}

/// Console lines submitted from a reader thread, drained by the tick loop
pub struct ConsoleInput {
    sender: Sender<String>,
    receiver: Receiver<String>,
}

impl ConsoleInput {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Non-blocking submit; false when the buffer is full
    pub fn try_submit(&self, line: impl Into<String>) -> bool {
        self.sender.try_send(line.into()).is_ok()
    }

    /// All lines submitted since the last drain
    pub fn drain(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }

    /// Forward non-empty stdin lines until stdin closes
    pub fn spawn_stdin_reader(&self) -> std::io::Result<JoinHandle<()>> {
        let sender = self.sender.clone();
        std::thread::Builder::new()
            .name("console-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Console read error: {}", e);
                            break;
                        }
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if sender.send(line.to_string()).is_err() {
                        break;
                    }
                }
                debug!("Console reader stopped");
            })
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new(64)
    }
}
