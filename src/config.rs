//! Configuration and CLI argument handling

use std::time::Duration;

use clap::Parser;

use crate::plan::{PlanRules, DEFAULT_CALORIES_PER_SECOND, DEFAULT_REST_SENTINEL};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "workout-session")]
#[command(about = "Guided workout session runtime behind a small HTTP API")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Timer sampling interval in milliseconds
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(10..=100))]
    pub tick_ms: u64,

    /// Catalog id that marks a rest step
    #[arg(long, default_value = DEFAULT_REST_SENTINEL)]
    pub rest_sentinel: String,

    /// Calorie burn for exercises without their own rate
    #[arg(long, default_value_t = DEFAULT_CALORIES_PER_SECOND)]
    pub default_calories_per_second: f64,

    /// Base URL of the fitness backend; reports are only logged when unset
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn plan_rules(&self) -> PlanRules {
        PlanRules::new(self.rest_sentinel.clone(), self.default_calories_per_second)
    }
}
