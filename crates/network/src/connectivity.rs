// crates/network/src/connectivity.rs
//! Network connectivity monitoring
//!
//! Hosts report raw online/offline observations; the monitor publishes a
//! transition only once it has held for the debounce window, so a flapping
//! link does not trigger a sync storm.

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Debounce state machine over raw connectivity observations
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    published: bool,
    candidate: Option<(bool, Instant)>,
}

impl Debouncer {
    /// Creates a debouncer starting from a known state
    pub fn new(initial: bool, window: Duration) -> Self {
        Self {
            window,
            published: initial,
            candidate: None,
        }
    }

    /// Returns the last published state
    pub fn current(&self) -> bool {
        self.published
    }

    /// Records a raw observation; returns the new state if it is published now
    pub fn observe(&mut self, online: bool, at: Instant) -> Option<bool> {
        if online == self.published {
            self.candidate = None;
            return None;
        }

        match self.candidate {
            Some((value, _)) if value == online => {}
            _ => self.candidate = Some((online, at)),
        }

        self.poll(at)
    }

    /// Publishes the pending transition if it has held for the window
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        let (value, since) = self.candidate?;
        if now.saturating_duration_since(since) >= self.window {
            self.published = value;
            self.candidate = None;
            Some(value)
        } else {
            None
        }
    }

    /// When the pending transition would be published, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.map(|(_, since)| since + self.window)
    }
}

/// Debounced connectivity monitor task
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Spawns the monitor on the current tokio runtime
    ///
    /// The task stops when every [`ConnectivityHandle`] has been dropped.
    pub fn spawn(initial: bool, debounce: Duration) -> (ConnectivityHandle, ConnectivitySignal) {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial);

        tokio::spawn(run_monitor(
            Debouncer::new(initial, debounce),
            report_rx,
            state_tx,
        ));

        (
            ConnectivityHandle { reports: report_tx },
            ConnectivitySignal {
                rx: state_rx,
                _source: None,
            },
        )
    }
}

async fn run_monitor(
    mut debouncer: Debouncer,
    mut reports: mpsc::UnboundedReceiver<bool>,
    state: watch::Sender<bool>,
) {
    let publish = |online: bool| {
        log::info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        state.send_replace(online);
    };

    loop {
        let deadline = debouncer.deadline();
        let wait = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            report = reports.recv() => match report {
                Some(online) => {
                    if let Some(changed) = debouncer.observe(online, Instant::now()) {
                        publish(changed);
                    }
                }
                None => break,
            },
            _ = wait => {
                if let Some(changed) = debouncer.poll(Instant::now()) {
                    publish(changed);
                }
            }
        }
    }

    log::debug!("Connectivity monitor stopped");
}

/// Sender side for raw platform connectivity reports
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    reports: mpsc::UnboundedSender<bool>,
}

impl ConnectivityHandle {
    /// Reports a raw observation
    pub fn report(&self, online: bool) -> NetworkResult<()> {
        self.reports
            .send(online)
            .map_err(|_| NetworkError::MonitorClosed)
    }

    /// Reports that the platform says the device is online
    pub fn set_online(&self) -> NetworkResult<()> {
        self.report(true)
    }

    /// Reports that the platform says the device is offline
    pub fn set_offline(&self) -> NetworkResult<()> {
        self.report(false)
    }
}

/// Read side of the debounced connectivity state
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    rx: watch::Receiver<bool>,
    // Keeps a fixed signal's channel open
    _source: Option<Arc<watch::Sender<bool>>>,
}

impl ConnectivitySignal {
    /// A signal that never changes
    pub fn fixed(online: bool) -> Self {
        let (tx, rx) = watch::channel(online);
        Self {
            rx,
            _source: Some(Arc::new(tx)),
        }
    }

    /// Wraps a receiver driven by the caller
    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx, _source: None }
    }

    /// Returns the current debounced state
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next published transition and returns the new state
    pub async fn changed(&mut self) -> NetworkResult<bool> {
        self.rx
            .changed()
            .await
            .map_err(|_| NetworkError::MonitorClosed)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Returns a fresh receiver for the debounced state
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

/// Probes a health endpoint and feeds the result to the monitor
#[derive(Clone)]
pub struct ConnectivityChecker {
    client: Client,
    check_urls: Vec<Url>,
}

impl ConnectivityChecker {
    /// Creates a checker probing a single URL
    pub fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            check_urls: vec![url],
        }
    }

    /// Creates a connectivity checker with custom URLs
    pub fn with_urls(client: Client, urls: Vec<Url>) -> Self {
        Self {
            client,
            check_urls: urls,
        }
    }

    /// Checks if any probe URL answers
    pub async fn is_online(&self) -> bool {
        for url in &self.check_urls {
            if self.client.is_accessible(url.clone()).await {
                return true;
            }
        }
        false
    }

    /// Checks network connectivity and returns error if offline
    pub async fn check(&self) -> NetworkResult<()> {
        if self.is_online().await {
            Ok(())
        } else {
            Err(NetworkError::NetworkUnavailable)
        }
    }

    /// Probes once and reports the result to the monitor
    pub async fn probe(&self, handle: &ConnectivityHandle) -> NetworkResult<bool> {
        let online = self.is_online().await;
        handle.report(online)?;
        Ok(online)
    }

    /// Probes every `interval` until `shutdown` flips to true or the monitor stops
    pub fn spawn(
        self,
        handle: ConnectivityHandle,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.probe(&handle).await.is_err() {
                            break;
                        }
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
