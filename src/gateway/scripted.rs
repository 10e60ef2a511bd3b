//! In-memory gateway for exercising connections without a network.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::ExitStatus;
use crate::error::GatewayError;

use super::traits::Gateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Connect(Option<String>),
    Run(String),
    NextLine,
    Get(String, PathBuf),
    GetString(String),
    Put(PathBuf, String),
    PutString(String, String),
}

/// Shared view of what a [`ScriptedGateway`] was asked to do.
#[derive(Debug, Clone, Default)]
pub(crate) struct Probe {
    calls: Arc<Mutex<Vec<Call>>>,
    connected: Arc<AtomicBool>,
}

impl Probe {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub(crate) fn connects(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect(_)))
    }

    /// Simulate the session dropping underneath the connection.
    pub(crate) fn drop_session(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) struct ScriptedGateway {
    accept: Result<bool, GatewayError>,
    output: Vec<String>,
    pending: VecDeque<String>,
    status: ExitStatus,
    files: HashMap<String, String>,
    transfer_error: Option<GatewayError>,
    probe: Probe,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            accept: Ok(true),
            output: Vec::new(),
            pending: VecDeque::new(),
            status: ExitStatus::Code(0),
            files: HashMap::new(),
            transfer_error: None,
            probe: Probe::default(),
        }
    }

    pub(crate) fn refusing(mut self) -> Self {
        self.accept = Ok(false);
        self
    }

    pub(crate) fn erroring(mut self, message: &str) -> Self {
        self.accept = Err(GatewayError::new(message));
        self
    }

    pub(crate) fn already_connected(self) -> Self {
        self.probe.connected.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_output<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = lines.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn with_status(mut self, status: ExitStatus) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_string(), contents.to_string());
        self
    }

    pub(crate) fn failing_transfers(mut self, message: &str) -> Self {
        self.transfer_error = Some(GatewayError::new(message));
        self
    }

    pub(crate) fn probe(&self) -> Probe {
        self.probe.clone()
    }

    fn transfer_check(&self) -> Result<(), GatewayError> {
        match &self.transfer_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn read_remote(&self, remote: &str) -> Result<String, GatewayError> {
        self.transfer_check()?;
        self.files
            .get(remote)
            .cloned()
            .ok_or_else(|| GatewayError::new(format!("{}: No such file or directory", remote)))
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn connect(&mut self, username: Option<&str>) -> Result<bool, GatewayError> {
        self.probe.record(Call::Connect(username.map(str::to_string)));
        let accepted = self.accept.clone()?;
        if accepted {
            self.probe.connected.store(true, Ordering::SeqCst);
        }
        Ok(accepted)
    }

    fn connected(&self) -> bool {
        self.probe.connected.load(Ordering::SeqCst)
    }

    async fn run(&mut self, command: &str) -> Result<(), GatewayError> {
        self.probe.record(Call::Run(command.to_string()));
        self.pending = self.output.iter().cloned().collect();
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, GatewayError> {
        self.probe.record(Call::NextLine);
        Ok(self.pending.pop_front())
    }

    fn status(&self) -> ExitStatus {
        self.status
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), GatewayError> {
        self.probe
            .record(Call::Get(remote.to_string(), local.to_path_buf()));
        let contents = self.read_remote(remote)?;
        tokio::fs::write(local, contents)
            .await
            .map_err(|e| GatewayError::new(e.to_string()))
    }

    async fn get_string(&mut self, remote: &str) -> Result<String, GatewayError> {
        self.probe.record(Call::GetString(remote.to_string()));
        self.read_remote(remote)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), GatewayError> {
        self.probe
            .record(Call::Put(local.to_path_buf(), remote.to_string()));
        self.transfer_check()?;
        let contents = tokio::fs::read_to_string(local)
            .await
            .map_err(|e| GatewayError::new(e.to_string()))?;
        self.files.insert(remote.to_string(), contents);
        Ok(())
    }

    async fn put_string(&mut self, remote: &str, contents: &str) -> Result<(), GatewayError> {
        self.probe
            .record(Call::PutString(remote.to_string(), contents.to_string()));
        self.transfer_check()?;
        self.files.insert(remote.to_string(), contents.to_string());
        Ok(())
    }
}
