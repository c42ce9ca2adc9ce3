use super::Action;
use crate::tls::{Connector, ProtocolMode, SessionSummary};
use anyhow::Context;
use futures::future::join_all;
use serde::Serialize;

/// One inspected endpoint, as printed
#[derive(Debug, Serialize)]
struct Report<'a> {
    host: &'a str,
    port: i32,
    mode: ProtocolMode,
    summary: SessionSummary,
}

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> anyhow::Result<()> {
    match action {
        Action::Inspect {
            hosts,
            port,
            mode,
            config,
        } => {
            let connector = Connector::new(config);

            let attempts = hosts.iter().map(|host| {
                let connector = &connector;
                async move {
                    connector
                        .retrieve(host, port, mode)
                        .await
                        .map(|summary| Report {
                            host,
                            port,
                            mode,
                            summary,
                        })
                        .with_context(|| format!("cannot inspect {host:?}"))
                }
            });

            let reports = join_all(attempts)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;

            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
    }
}
