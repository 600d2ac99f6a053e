use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::model::{AnalyzeResponse, StreamEvent};

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

type RunHandle = JoinHandle<anyhow::Result<AnalyzeResponse>>;

enum State {
    Running {
        rx: mpsc::Receiver<String>,
        task: RunHandle,
    },
    Done,
}

/// Relays progress from a running pipeline task, then its outcome.
///
/// Every queued status message is delivered before the terminal `summary`
/// or `error` event. The stream ends once the task has finished and the
/// channel is drained, even if the task still holds its sender.
pub fn progress_events(
    rx: mpsc::Receiver<String>,
    task: RunHandle,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    futures::stream::unfold(State::Running { rx, task }, next_event)
}

async fn next_event(state: State) -> Option<(StreamEvent, State)> {
    let State::Running { mut rx, task } = state else {
        return None;
    };

    loop {
        match tokio::time::timeout(POLL_INTERVAL, rx.recv()).await {
            Ok(Some(message)) => {
                return Some((StreamEvent::Status { message }, State::Running { rx, task }));
            }
            Ok(None) => return Some((finish(task).await, State::Done)),
            Err(_) if task.is_finished() && rx.is_empty() => {
                return Some((finish(task).await, State::Done));
            }
            Err(_) => continue,
        }
    }
}

async fn finish(task: RunHandle) -> StreamEvent {
    match task.await {
        Ok(Ok(response)) => StreamEvent::Summary(response),
        Ok(Err(err)) => {
            tracing::warn!(error = %format!("{err:#}"), "streamed run failed");
            StreamEvent::Error {
                message: format!("{err:#}"),
            }
        }
        Err(err) => StreamEvent::Error {
            message: format!("run aborted: {err}"),
        },
    }
}
