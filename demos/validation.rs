//! Validation example: nested validators sharing one report.
//!
//! A server config validates its listeners. Each listener reports its own
//! issues, and the outer validation prints a one-line summary.

use std::sync::Arc;
use tracing_triage::{
    Checks, MessageKind, MessageList, Scales, TransmitError, Validation, Validator,
};

struct Endpoint {
    name: &'static str,
    port: u32,
    tls: bool,
}

impl Validation for Endpoint {
    fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
        checks.problem_if_not_in_range(self.port, 1, 65535, self.name)?;
        checks.warning_if(!self.tls, "$ does not use TLS", &[&self.name])?;
        Ok(())
    }
}

struct ServerConfig {
    endpoints: Vec<Endpoint>,
    workers: Option<u32>,
}

impl Validation for ServerConfig {
    fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
        checks.problem_if_none(self.workers.as_ref(), "workers must be set", &[])?;
        for endpoint in &self.endpoints {
            let valid = checks.validate(endpoint)?;
            println!("  endpoint {:<8} valid: {}", endpoint.name, valid);
        }
        Ok(())
    }

    fn validation_target(&self) -> &str {
        "server config"
    }

    fn should_show_report(&self) -> bool {
        true
    }
}

fn main() -> Result<(), TransmitError> {
    println!("=== Nested Validation Example ===\n");

    let config = ServerConfig {
        endpoints: vec![
            Endpoint {
                name: "public",
                port: 443,
                tls: true,
            },
            Endpoint {
                name: "admin",
                port: 70000,
                tls: false,
            },
            Endpoint {
                name: "metrics",
                port: 9090,
                tls: false,
            },
        ],
        workers: Some(8),
    };

    let report = MessageList::new(Arc::new(Scales::standard()));
    let valid = config.validate(&report)?;

    println!("\nConfig valid: {}\n", valid);
    for line in report.formatted() {
        println!("  {}", line);
    }

    println!();
    for line in report.statistics(&[MessageKind::Problem, MessageKind::Warning]) {
        println!("{}", line);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
