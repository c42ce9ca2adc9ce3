mod run;

use crate::tls::{ConnectorConfig, ProtocolMode};

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Inspect {
        hosts: Vec<String>,
        port: i32,
        mode: ProtocolMode,
        config: ConnectorConfig,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
