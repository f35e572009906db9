//! `meshctl check`

use anyhow::{bail, Result};
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{color_status, print_error, print_success, OutputFormat};

/// Check the server is ready and list component health
pub async fn check(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let readiness = client.readiness().await?;
    let health = client.health().await.ok();

    if format == OutputFormat::Json {
        let report = serde_json::json!({ "readiness": readiness, "health": health });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(health) = &health {
            for (name, component) in &health.components {
                let status = component.status.as_str();
                match &component.message {
                    Some(message) => {
                        println!("{:<16} {} ({})", name, color_status(status), message.dimmed())
                    }
                    None => println!("{:<16} {}", name, color_status(status)),
                }
            }
        }

        if readiness.ready {
            print_success("telemetry server is ready");
        } else {
            print_error(&format!(
                "telemetry server is not ready: {}",
                readiness.reason.as_deref().unwrap_or("unknown reason")
            ));
        }
    }

    if !readiness.ready {
        bail!("readiness check failed");
    }
    Ok(())
}
