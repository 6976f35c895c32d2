//! Stdio transport.
//!
//! Reads one request per line from stdin and writes responses and
//! notifications to stdout through a single writer task, so lines never
//! interleave. Every request runs in its own task: a `cancel` is handled
//! while the query it targets is still running.

use crate::db::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::notify::{Notification, Notifier};
use crate::service::ExplorerService;
use crate::transport::Transport;
use crate::transport::protocol::{self, Outgoing};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

enum Envelope {
    Line(Outgoing),
    Close,
}

/// Sending half of the output queue; also the notifier handed to the service.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Receiving half, drained by the writer task.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

/// Create the output queue.
pub fn outbox() -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, Inbox { rx })
}

impl Outbox {
    pub fn send(&self, line: Outgoing) {
        if self.tx.send(Envelope::Line(line)).is_err() {
            debug!("Output closed, dropping line");
        }
    }

    fn close(&self) {
        let _ = self.tx.send(Envelope::Close);
    }
}

impl Notifier for Outbox {
    fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, "Sending notification");
        self.send(Outgoing::notification(notification));
    }
}

/// Why the serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    InputClosed,
    Signal,
}

pub struct StdioTransport<D: Driver> {
    service: ExplorerService<D>,
    outbox: Outbox,
    inbox: Mutex<Option<Inbox>>,
}

impl<D: Driver> StdioTransport<D> {
    /// `outbox` should be the notifier the service was built with.
    pub fn new(service: ExplorerService<D>, outbox: Outbox, inbox: Inbox) -> Self {
        Self {
            service,
            outbox,
            inbox: Mutex::new(Some(inbox)),
        }
    }

    /// Serve requests from `reader` until EOF or a shutdown signal.
    ///
    /// On EOF in-flight requests are allowed to finish; on a signal they are
    /// aborted. Every session pool is closed before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> DbResult<Stop>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let inbox = self
            .inbox
            .lock()
            .map_err(|_| DbError::internal("Transport state poisoned"))?
            .take()
            .ok_or_else(|| DbError::internal("Transport is already running"))?;
        let writer_task = tokio::spawn(write_lines(inbox, writer));

        let mut lines = reader.lines();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let shutdown = wait_for_signal();
        tokio::pin!(shutdown);

        let stop = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.dispatch(&line, &mut tasks),
                    Ok(None) => {
                        info!("Input closed");
                        break Stop::InputClosed;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break Stop::InputClosed;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Request task failed");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Stop::Signal;
                }
            }
        };

        match stop {
            Stop::InputClosed => {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        warn!(error = %e, "Request task failed");
                    }
                }
            }
            Stop::Signal => tasks.shutdown().await,
        }

        self.service.shutdown().await;

        self.outbox.close();
        if let Err(e) = writer_task.await {
            warn!(error = %e, "Output writer failed");
        }
        Ok(stop)
    }

    fn dispatch(&self, line: &str, tasks: &mut JoinSet<()>) {
        if line.trim().is_empty() {
            return;
        }
        match protocol::parse_request(line) {
            Ok(request) => {
                let service = self.service.clone();
                let outbox = self.outbox.clone();
                tasks.spawn(async move {
                    let response = protocol::respond(&service, request).await;
                    outbox.send(response);
                });
            }
            Err(response) => {
                warn!("Rejected malformed request");
                self.outbox.send(response);
            }
        }
    }
}

impl<D: Driver> Transport for StdioTransport<D> {
    async fn run(&self) -> DbResult<()> {
        info!("Serving JSON-lines protocol on stdio");

        let reader = BufReader::new(tokio::io::stdin());
        let stop = self.serve(reader, tokio::io::stdout()).await?;

        if stop == Stop::Signal {
            // A blocking stdin read cannot be interrupted.
            info!("Exiting process");
            std::process::exit(0);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

async fn write_lines<W: AsyncWrite + Unpin>(mut inbox: Inbox, mut writer: W) {
    while let Some(Envelope::Line(line)) = inbox.rx.recv().await {
        let mut text = match serde_json::to_string(&line) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode output line");
                continue;
            }
        };
        text.push('\n');
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            warn!(error = %e, "Failed to write output");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!(error = %e, "Failed to flush output");
            break;
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
