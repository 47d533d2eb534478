//! Background compile worker
//!
//! One tokio task drains a bounded queue of compile requests. Each request
//! is answered through its [`CompileTicket`]. Cancelling or dropping a ticket
//! aborts the compile, which kills the running subprocess and removes its
//! work area.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::compiler::{LatexCompiler, PipelineError, Rendered};
use crate::templates::{TemplateId, TemplateStore};

/// A fragment to compile, with an optional template version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub text: String,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
}

impl CompileRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            template_id: None,
        }
    }

    pub fn with_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }
}

type Reply = Result<Rendered, PipelineError>;

struct Job {
    request: CompileRequest,
    reply: oneshot::Sender<Reply>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("request", &self.request).finish()
    }
}

/// Pending result of a submitted request
///
/// Awaiting the ticket yields the compile result, or
/// [`PipelineError::Cancelled`] if the ticket was cancelled first.
#[derive(Debug)]
pub struct CompileTicket {
    receiver: oneshot::Receiver<Reply>,
}

impl CompileTicket {
    /// Abort the compile if it has not finished yet
    pub fn cancel(&mut self) {
        self.receiver.close();
    }
}

impl Future for CompileTicket {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PipelineError::Cancelled)))
    }
}

/// Handle to a running compile worker
#[derive(Debug)]
pub struct CompileWorker {
    sender: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl CompileWorker {
    /// Start the worker on the current tokio runtime
    ///
    /// At most `capacity` requests wait in the queue (at least one).
    pub fn spawn<S>(compiler: Arc<LatexCompiler<S>>, capacity: usize) -> Self
    where
        S: TemplateStore + Send + Sync + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                run_job(&compiler, job).await;
            }
            tracing::debug!("Compile worker stopped");
        });

        Self { sender, handle }
    }

    /// Queue a request, waiting for room if the queue is full
    pub async fn submit(&self, request: CompileRequest) -> Result<CompileTicket, PipelineError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Job { request, reply })
            .await
            .map_err(|_| PipelineError::WorkerClosed)?;
        Ok(CompileTicket { receiver })
    }

    /// Queue a request, failing immediately if the queue is full
    pub fn try_submit(&self, request: CompileRequest) -> Result<CompileTicket, PipelineError> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .try_send(Job { request, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PipelineError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PipelineError::WorkerClosed,
            })?;
        Ok(CompileTicket { receiver })
    }

    /// Stop accepting requests and wait until every queued request is done
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.handle.await {
            tracing::error!("Compile worker task failed: {}", e);
        }
    }
}

async fn run_job<S: TemplateStore>(compiler: &LatexCompiler<S>, job: Job) {
    let Job { request, mut reply } = job;

    if reply.is_closed() {
        tracing::debug!("Skipping cancelled compile request");
        return;
    }

    let result = tokio::select! {
        _ = reply.closed() => None,
        result = compiler.render(&request.text, request.template_id) => Some(result),
    };

    match result {
        Some(result) => {
            // The ticket may have been dropped in the meantime
            let _ = reply.send(result);
        }
        None => tracing::info!("Compile request cancelled"),
    }
}
