use crate::orchestrator::{OrchestratorClient, OrchestratorError};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Polls an async backend task until it completes.
///
/// The loop observes three outcomes: SUCCESS, FAILURE (surfaced with the
/// backend's error text) and deadline exceeded. A timeout is a failure,
/// never success; there is no cancellation path once the task was issued.
pub async fn wait_for_task(
    client: &OrchestratorClient,
    taskid: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), OrchestratorError> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        let task = client.task_status(taskid).await?;
        match task.status.as_str() {
            "SUCCESS" => return Ok(()),
            "FAILURE" => {
                return Err(OrchestratorError::TaskFailed {
                    task: taskid.to_string(),
                    message: task
                        .error
                        .unwrap_or_else(|| "no error detail reported".to_string()),
                })
            }
            _ => {}
        }

        if Instant::now() >= deadline {
            return Err(OrchestratorError::TaskTimeout {
                task: taskid.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        sleep(interval).await;
    }
}

/// Waits on a taskid when the backend returned one; synchronous backend
/// operations return none and complete immediately.
pub async fn wait_if_task(
    client: &OrchestratorClient,
    taskid: Option<&str>,
    timeout: Duration,
    interval: Duration,
) -> Result<(), OrchestratorError> {
    match taskid {
        Some(taskid) => wait_for_task(client, taskid, timeout, interval).await,
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
