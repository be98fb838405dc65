use crate::config::RepairConfig;
use crate::error::AppError;
use crate::services::message_service::MessageService;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

/// Periodically recomputes every conversation's unread counters from the message log.
#[derive(Debug)]
pub struct UnreadRepairWorker {
    message_service: MessageService,
    config: RepairConfig,
}

impl UnreadRepairWorker {
    #[must_use]
    pub const fn new(message_service: MessageService, config: RepairConfig) -> Self {
        Self { message_service, config }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.config.interval_secs == 0 {
            tracing::info!("Unread repair worker disabled");
            return;
        }

        let period = Duration::from_secs(self.config.interval_secs);
        // First pass after one full period, not at boot.
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_repair()
                        .instrument(tracing::info_span!("unread_repair_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Unread repair iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Unread repair loop shutting down...");
    }

    /// Runs one full repair pass.
    ///
    /// # Errors
    /// Returns an error if the conversation ids cannot be listed.
    #[tracing::instrument(
        skip(self),
        err,
        fields(scanned = tracing::field::Empty, corrected = tracing::field::Empty)
    )]
    pub async fn perform_repair(&self) -> Result<(), AppError> {
        tracing::debug!("Running unread counter repair...");

        let report = self.message_service.repair_all(self.config.batch_size).await?;

        tracing::Span::current().record("scanned", report.scanned);
        tracing::Span::current().record("corrected", report.corrected);
        if report.corrected > 0 || report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                corrected = report.corrected,
                failed = report.failed,
                "Unread repair pass finished"
            );
        }

        Ok(())
    }
}
