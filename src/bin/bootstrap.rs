// Lambda bootstrap entry point for the worker function

#[cfg(feature = "worker")]
#[path = "worker.rs"]
mod worker;

use lambda_runtime::{Error, run, service_fn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    taskbot::setup_logging();

    #[cfg(feature = "worker")]
    {
        run(service_fn(worker::handler)).await?;
    }
    #[cfg(not(feature = "worker"))]
    {
        panic!("'worker' feature must be enabled");
    }

    Ok(())
}
