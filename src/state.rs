//! Process-wide application state shared by all handlers.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::config::ServerConfig;
use crate::core::llm::{ChatSettings, OpenAIChatClient, SharedChatCompletion};
use crate::store::{FeedbackSink, MemoryCaseStore, SharedCaseStore, load_seed_dir};

/// Why a WebSocket connection slot was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    pub cases: SharedCaseStore,
    pub feedback: FeedbackSink,
    pub chat: SharedChatCompletion,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build state from configuration, seeding cases from `cases_dir` if set.
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let seeds = match config.cases_dir.as_deref() {
            Some(dir) => load_seed_dir(dir)?,
            None => Vec::new(),
        };
        let cases: SharedCaseStore = Arc::new(MemoryCaseStore::with_cases(seeds));
        let chat: SharedChatCompletion =
            Arc::new(OpenAIChatClient::new(ChatSettings::from_config(&config))?);

        info!(
            cases = cases.len(),
            realtime_vendor = %config.realtime.vendor,
            realtime_credentials = config.has_realtime_credentials(),
            chat_credentials = chat.is_configured(),
            "Application state initialised"
        );

        Ok(Self::with_components(config, cases, chat))
    }

    /// Build state around existing stores and a chat client.
    pub fn with_components(
        config: ServerConfig,
        cases: SharedCaseStore,
        chat: SharedChatCompletion,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            cases,
            feedback: FeedbackSink::new(),
            chat,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket slot for `ip`, honouring the global and per-IP caps.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let per_ip_limit = self.config.max_connections_per_ip;

        // Holding the entry serialises acquisitions for one IP
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= per_ip_limit {
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                drop(per_ip);
                self.ip_connections.remove_if(&ip, |_, count| *count == 0);
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::SeqCst);
        }

        *per_ip += 1;
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}
