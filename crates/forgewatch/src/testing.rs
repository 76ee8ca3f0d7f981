//! Scripted transport used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::codec::QueryKind;
use crate::endpoint::PrinterEndpoint;
use crate::error::TransportError;
use crate::transport::Transport;

/// What the fake printer does for one request.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Reply(Vec<u8>),
    Fail(TransportError),
    /// Never answers.
    Hang,
    /// Answers after a delay.
    Slow(Duration, Vec<u8>),
}

/// Plays back [`Step`]s in order and records what was sent.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(PrinterEndpoint, Vec<u8>)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        }
    }

    pub(crate) fn push(&self, steps: impl IntoIterator<Item = Step>) {
        self.steps.lock().unwrap().extend(steps);
    }

    pub(crate) fn requests(&self) -> Vec<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn endpoints(&self) -> Vec<PrinterEndpoint> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(e, _)| e.clone())
            .collect()
    }

    /// Highest number of concurrent `send` calls seen.
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        endpoint: &PrinterEndpoint,
        request: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.clone(), request.to_vec()));
        let step = self.steps.lock().unwrap().pop_front();

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        match step {
            Some(Step::Reply(bytes)) => Ok(bytes),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Slow(delay, bytes)) => {
                tokio::time::sleep(delay).await;
                Ok(bytes)
            }
            None => Err(TransportError::ConnectionRefused("script exhausted".into())),
        }
    }
}

/// A well-formed reply for `kind` with the given body lines.
pub(crate) fn reply(kind: QueryKind, body: &str) -> Vec<u8> {
    format!("CMD {} Received.\r\n{body}ok\r\n", kind.command()).into_bytes()
}

/// Replies for one full cycle of a printer mid-print.
pub(crate) fn printing_cycle() -> Vec<Step> {
    vec![
        Step::Reply(reply(
            QueryKind::Temperature,
            "T0:210.0/215.0 T1:0.0/0.0 B:60.0/60.0\r\n",
        )),
        Step::Reply(reply(
            QueryKind::Progress,
            "SD printing byte 45/100\r\nLayer: 12/230\r\n",
        )),
        Step::Reply(reply(
            QueryKind::MachineState,
            "MachineStatus: BUILDING_FROM_SD\r\nMoveMode: MOVING\r\nCurrentFile: benchy.gcode\r\n",
        )),
        Step::Reply(reply(
            QueryKind::Layer,
            "SD printing byte 45/100\r\nLayer: 12/230\r\n",
        )),
    ]
}

pub(crate) fn refused() -> Step {
    Step::Fail(TransportError::ConnectionRefused("connection refused".into()))
}
