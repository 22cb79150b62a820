use clap::{Parser, Subcommand};
use dormancy::config::CullingPolicy;
use dormancy::simulation::Scenario;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "dormancy", version, about = "Resource activity lifecycle tooling")]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a scenario file against a manual clock and print the report as JSON
    Simulate {
        scenario: PathBuf,
        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Load and validate a culling policy file
    CheckConfig { policy: PathBuf },
}

impl App {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Simulate { scenario, pretty } => {
                let scenario = Scenario::from_path(&scenario)?;
                let report = scenario.run()?;
                info!(
                    steps = report.steps.len(),
                    culled = report.totals.culled,
                    remaining = report.remaining.len(),
                    "scenario finished"
                );
                let json = if pretty {
                    serde_json::to_string_pretty(&report)?
                } else {
                    serde_json::to_string(&report)?
                };
                println!("{}", json);
            }
            Command::CheckConfig { policy } => {
                let policy = CullingPolicy::from_path(&policy)?;
                let mut classes = policy.classes.keys().cloned().collect::<Vec<_>>();
                classes.sort();
                println!(
                    "ok: default lifetime={}ms total_lifetime={}ms dormant_grace={}ms, {} class override(s){}",
                    policy.default.lifetime_ms,
                    policy.default.total_lifetime_ms,
                    policy.default.dormant_grace_ms,
                    classes.len(),
                    if classes.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", classes.join(", "))
                    }
                );
            }
        }
        Ok(())
    }
}
