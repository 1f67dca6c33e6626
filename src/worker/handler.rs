use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::app::App;
use crate::core::config::AppConfig;
use crate::core::models::QueuedEvent;

/// Built on the first record a container sees and reused while it stays warm.
static APP: OnceCell<App> = OnceCell::const_new();

async fn app() -> Result<&'static App, Error> {
    APP.get_or_try_init(|| async {
        let config = AppConfig::from_env().map_err(|e| {
            error!("Config error: {}", e);
            Error::from(e)
        })?;
        App::from_config(&config).map_err(|e| {
            error!("Failed to initialise worker: {}", e);
            Error::from(e.to_string())
        })
    })
    .await
}

/// Pulls every SQS record body out of the Lambda payload, in order.
///
/// # Errors
///
/// Fails when the payload has no `Records` array.
pub fn parse_records(payload: &Value) -> Result<Vec<QueuedEvent>, Error> {
    let records = payload
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::from("Failed to extract SQS records"))?;

    let mut events = Vec::with_capacity(records.len());
    for record in records {
        let Some(body) = record.get("body").and_then(Value::as_str) else {
            warn!("SQS record without a body, skipping");
            continue;
        };
        match serde_json::from_str::<QueuedEvent>(body) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Failed to parse SQS message body into QueuedEvent: {}", e),
        }
    }
    Ok(events)
}

/// Lambda handler for the worker entrypoint. Parses SQS records and
/// dispatches each one in order.
///
/// # Errors
///
/// Fails when the app cannot be built or the payload is not an SQS batch.
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<(), Error> {
    let app = app().await?;
    let events = parse_records(&event.payload)?;
    info!(records = events.len(), "Worker Lambda received SQS batch");

    for queued in events {
        let correlation_id = queued.correlation_id().to_string();
        if let Err(e) = app.dispatch(queued).await {
            error!(correlation_id = %correlation_id, error = %e, "Event processing failed");
        }
    }
    Ok(())
}

pub use self::function_handler as handler;
