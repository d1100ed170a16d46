use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use bulksend_infra::jobs::{
    InMemoryJobStore, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobOrchestrator,
    OrchestratorConfig,
};
use bulksend_mail::{Dispatcher, SmtpMailerConfig};

use crate::config::AppConfig;

/// Shared state handed to every handler.
pub struct AppServices {
    pub orchestrator: Arc<JobOrchestrator>,
    pub executor: JobExecutor,
    pub max_upload_bytes: usize,
}

/// Wire the production services: lettre for SMTP, OAuth providers unavailable.
///
/// Must be called from inside a tokio runtime; the executor starts here.
pub fn build_services(config: &AppConfig) -> (Arc<AppServices>, JobExecutorHandle) {
    let dispatcher = Dispatcher::new(SmtpMailerConfig {
        timeout: config.smtp_timeout,
        hello_name: None,
    });
    build_services_with(config, dispatcher)
}

/// Same as [`build_services`] with a caller-supplied dispatcher.
pub fn build_services_with(
    config: &AppConfig,
    dispatcher: Dispatcher,
) -> (Arc<AppServices>, JobExecutorHandle) {
    let store = InMemoryJobStore::arc(config.retention);
    let orchestrator = Arc::new(JobOrchestrator::new(
        store,
        dispatcher,
        OrchestratorConfig {
            send_timeout: config.send_timeout,
        },
    ));

    let (executor, handle) = JobExecutor::spawn(
        orchestrator.clone(),
        JobExecutorConfig::default()
            .with_name("email-jobs")
            .with_max_concurrent(config.max_concurrent_jobs),
    );

    let services = Arc::new(AppServices {
        orchestrator,
        executor,
        max_upload_bytes: config.max_upload_bytes,
    });
    (services, handle)
}

/// Periodically apply the retention policy so expired jobs go away even
/// when no new jobs arrive.
pub fn spawn_pruner(orchestrator: Arc<JobOrchestrator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = orchestrator.prune().await;
            if evicted > 0 {
                debug!(evicted, "retention sweep");
            }
        }
    })
}
