//! Runs commands queued by the backend on site equipment.

use std::sync::Arc;

use chrono::Utc;

use sitelink_cloud::{CloudClient, CommandResultReport, PendingCommand};
use sitelink_common::{CommandHandler, CommandOutcome, DeviceCommand};

use crate::error::Result;
use crate::registration::StationIdentity;

/// Summary of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Commands fetched from the backend.
    pub fetched: usize,
    /// Commands whose execution succeeded.
    pub succeeded: usize,
    /// Results the backend accepted.
    pub reported: usize,
}

/// Fetches pending commands, executes them and reports the results.
pub struct CommandExecutor {
    cloud: Arc<CloudClient>,
    handler: Arc<dyn CommandHandler>,
    identity: Arc<StationIdentity>,
}

impl CommandExecutor {
    pub fn new(
        cloud: Arc<CloudClient>,
        handler: Arc<dyn CommandHandler>,
        identity: Arc<StationIdentity>,
    ) -> Self {
        Self {
            cloud,
            handler,
            identity,
        }
    }

    /// Run one cycle.
    ///
    /// Only the fetch can fail the cycle. Each command is executed and
    /// reported on its own; a failed execution is reported as a failed
    /// result and a failed report is logged before moving on.
    pub async fn process_pending_commands(&self) -> Result<CycleReport> {
        let station_id = self.identity.station_id();
        let pending = self.cloud.get_pending_commands(&station_id).await?;

        let mut report = CycleReport {
            fetched: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            tracing::debug!(station = %station_id, "No pending commands");
            return Ok(report);
        }

        tracing::info!(station = %station_id, count = pending.len(), "Processing pending commands");

        for command in &pending {
            let outcome = self.execute(command).await;
            if outcome.success {
                report.succeeded += 1;
            }

            let result = to_result_report(&outcome);
            match self
                .cloud
                .report_command_result(&station_id, command.id, &result)
                .await
            {
                Ok(()) => report.reported += 1,
                Err(e) => {
                    tracing::warn!(
                        station = %station_id,
                        command_id = command.id,
                        error = %e,
                        "Failed to report command result"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn execute(&self, pending: &PendingCommand) -> CommandOutcome {
        let command = DeviceCommand {
            id: pending.id,
            command_type: pending.command_type.clone(),
            params: pending.params.clone(),
        };

        match self.handler.execute(&command).await {
            Ok(outcome) => {
                tracing::info!(
                    command_id = command.id,
                    command_type = %command.command_type,
                    success = outcome.success,
                    return_code = outcome.return_code,
                    "Command executed"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    command_id = command.id,
                    command_type = %command.command_type,
                    error = %e,
                    "Command execution failed"
                );
                CommandOutcome::failed(e.to_string())
            }
        }
    }
}

pub fn to_result_report(outcome: &CommandOutcome) -> CommandResultReport {
    CommandResultReport {
        success: outcome.success,
        output: outcome.output.clone(),
        return_code: outcome.return_code,
        error: outcome.error.clone(),
        executed_at: Utc::now(),
    }
}
