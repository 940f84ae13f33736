use std::time::Instant;

use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(env: &Environment, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels based on environment
        match env {
            Environment::Dev => "crud_template=debug,tower_http=debug,sqlx=warn,info".into(),
            Environment::Staging => "crud_template=debug,tower_http=info,sqlx=warn,info".into(),
            Environment::Prod => "crud_template=info,tower_http=info,sqlx=error,warn".into(),
        }
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!("Logging initialized for {:?} environment", env);
}

/// Logs how long an operation took when dropped.
#[derive(Debug)]
pub struct ExecutionTimer {
    operation: &'static str,
    started: Instant,
}

impl ExecutionTimer {
    pub fn start(operation: &'static str) -> Self {
        tracing::trace!(operation, "Started");
        Self {
            operation,
            started: Instant::now(),
        }
    }
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if std::thread::panicking() {
            tracing::error!(operation = self.operation, elapsed_ms, "Aborted");
        } else {
            tracing::debug!(operation = self.operation, elapsed_ms, "Finished");
        }
    }
}
