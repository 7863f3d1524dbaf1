use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_core::{ChannelId, ChatPlatform, Result, SummaryConfig};
use relay_plugin_inference::{InferenceRequest, Priority, SchedulerHandle};
use tracing::{debug, info, warn};

use crate::delivery::{deliver, frame_chunks};
use crate::prompt::{Snapshot, SUPERVISOR_ROLE};

#[derive(Debug, Clone)]
pub struct SummarySettings {
    /// Messages between two snapshots of the same channel.
    pub snapshot_interval: u64,
    /// Messages fetched per snapshot.
    pub snapshot_limit: usize,
    pub reporting_channel: ChannelId,
    pub summary_tokens: u32,
    pub chunk_chars: usize,
    pub chunk_delay: Duration,
    pub message_chars: usize,
}

impl SummarySettings {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            snapshot_interval: config.snapshot_interval,
            snapshot_limit: config.snapshot_limit,
            reporting_channel: config.reporting_channel,
            summary_tokens: config.summary_tokens,
            chunk_chars: config.chunk_chars,
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
            message_chars: config.message_chars,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelSummaryState {
    pub message_count: u64,
    pub latest_summary: Option<String>,
}

/// Periodically summarizes channels through the scheduler and posts the
/// results to the reporting channel.
pub struct ChannelSummaryManager {
    scheduler: SchedulerHandle,
    platform: Arc<dyn ChatPlatform>,
    settings: SummarySettings,
    channels: Mutex<HashMap<ChannelId, ChannelSummaryState>>,
}

impl ChannelSummaryManager {
    pub fn new(
        scheduler: SchedulerHandle,
        platform: Arc<dyn ChatPlatform>,
        settings: SummarySettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            platform,
            settings,
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Counts one inbound message and snapshots the channel when the count
    /// before this message is a multiple of the interval.
    ///
    /// Returns whether a summary job was submitted.
    pub async fn observe(self: &Arc<Self>, channel: ChannelId) -> bool {
        let due = {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            let state = channels.entry(channel).or_default();
            let due = state.message_count % self.settings.snapshot_interval == 0;
            state.message_count += 1;
            due
        };
        if !due {
            return false;
        }
        match self.take_snapshot(channel).await {
            Ok(submitted) => submitted,
            Err(e) => {
                warn!(%channel, "Snapshot failed: {e}");
                false
            }
        }
    }

    pub fn summary(&self, channel: ChannelId) -> Option<String> {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&channel)
            .and_then(|state| state.latest_summary.clone())
    }

    pub fn message_count(&self, channel: ChannelId) -> u64 {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&channel)
            .map_or(0, |state| state.message_count)
    }

    pub fn tracked_channels(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    async fn take_snapshot(self: &Arc<Self>, channel: ChannelId) -> Result<bool> {
        let history = self
            .platform
            .fetch_history(channel, self.settings.snapshot_limit)
            .await?;
        let snapshot = Snapshot::from_history(history, self.settings.message_chars);
        if snapshot.is_empty() {
            debug!(%channel, "Nothing to summarize");
            return Ok(false);
        }
        info!(
            %channel,
            lines = snapshot.transcript.len(),
            authors = snapshot.authors.len(),
            "Taking snapshot of channel history"
        );

        let manager = self.clone();
        let request = InferenceRequest::new(snapshot.to_prompt(), move |summary| async move {
            manager.record_summary(channel, summary);
            Ok(())
        })
        .priority(Priority::Supervisory)
        .role(SUPERVISOR_ROLE)
        .max_output_tokens(self.settings.summary_tokens);
        self.scheduler.submit(request);
        Ok(true)
    }

    /// Stores the new summary and posts it from a separate task so the
    /// scheduler worker is not held up by delivery pacing.
    fn record_summary(self: &Arc<Self>, channel: ChannelId, summary: String) {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(channel)
            .or_default()
            .latest_summary = Some(summary.clone());
        info!(%channel, chars = summary.len(), "Channel summary updated");

        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.post_summary(channel, &summary).await {
                warn!(%channel, "Summary delivery failed: {e}");
            }
        });
    }

    async fn post_summary(&self, channel: ChannelId, summary: &str) -> Result<()> {
        let name = self.platform.channel_name(channel).await?;
        let messages = frame_chunks(summary, &name, self.settings.chunk_chars);
        let sent = deliver(
            self.platform.as_ref(),
            self.settings.reporting_channel,
            &messages,
            self.settings.chunk_delay,
        )
        .await?;
        debug!(%channel, sent, "Summary posted");
        Ok(())
    }
}
