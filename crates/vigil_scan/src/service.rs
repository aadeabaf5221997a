//! Scan core: gates, submission, history and reporting.

use crate::poll::{await_verdict, sha256_hex};
use crate::views;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use vigil_core::{
    Clock, GuildScanConfig, MemberInfo, ScanGlobalConfig, ScanRecord,
};
use vigil_error::{ScanError, ScanErrorKind, ScanResult};
use vigil_interface::{AttachmentRef, ChatPlatform, IncomingMessage, VerdictService};
use vigil_rate_limit::SlidingWindowLimiter;
use vigil_storage::{
    ADMIN_PAGE_SIZE, ExportFormat, HistoryLog, Page, ScanConfigStore, ScanStats, USER_PAGE_SIZE,
    paginate,
};

/// A file to scan on behalf of a member.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct ScanRequest {
    /// Guild
    pub guild_id: u64,
    /// Channel the file came from; the result card is posted here
    pub channel_id: u64,
    /// Requesting member
    pub member: MemberInfo,
    /// File name
    #[new(into)]
    pub filename: String,
    /// Content
    pub bytes: Vec<u8>,
    /// Submitted by auto-scan rather than by hand
    #[new(default)]
    pub auto: bool,
}

/// The scan subsystem.
pub struct ScanCore {
    platform: Arc<dyn ChatPlatform>,
    service: Arc<dyn VerdictService>,
    config: Arc<ScanConfigStore>,
    history: Arc<HistoryLog>,
    clock: Arc<dyn Clock>,
    limiter: SlidingWindowLimiter,
    enabled: bool,
}

impl std::fmt::Debug for ScanCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCore")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Whether `member` may run scan admin actions.
pub fn is_scan_admin(guild: &GuildScanConfig, member: &MemberInfo) -> bool {
    *member.is_administrator() || member.has_any_role(&guild.admin_roles)
}

impl ScanCore {
    /// Core over the given platform, verdict service, stores and clock.
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        service: Arc<dyn VerdictService>,
        config: Arc<ScanConfigStore>,
        history: Arc<HistoryLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platform,
            service,
            config,
            history,
            limiter: SlidingWindowLimiter::new(Arc::clone(&clock)),
            clock,
            enabled: true,
        }
    }

    /// Set the process-wide switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Chat platform.
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Whole scan configuration. Its `Debug` output redacts the key.
    pub async fn global_config(&self) -> ScanGlobalConfig {
        self.config.snapshot().await
    }

    /// One guild's scan settings.
    pub async fn guild_config(&self, guild_id: u64) -> GuildScanConfig {
        self.config.guild(guild_id).await
    }

    /// Access gates that do not consume anything: enabled, blacklist, role,
    /// channel.
    fn check_access(
        &self,
        global: &ScanGlobalConfig,
        guild: &GuildScanConfig,
        member: &MemberInfo,
        channel_id: u64,
    ) -> ScanResult<()> {
        let user_id = *member.user_id();
        if !self.enabled || !global.enabled || !guild.enabled {
            debug!("Scanning disabled");
            return Err(ScanError::new(ScanErrorKind::Disabled));
        }
        if guild.blacklisted_user_ids.contains(&user_id) {
            debug!(user_id, "Blacklisted user refused");
            return Err(ScanError::new(ScanErrorKind::Blacklisted));
        }
        if guild.require_role && !member.has_any_role(&guild.allowed_roles) {
            debug!(user_id, "Scanner role missing");
            return Err(ScanError::new(ScanErrorKind::NoRole));
        }
        if !guild.allowed_channels.is_empty()
            && !guild.allowed_channels.contains(&channel_id)
            && !guild.auto_scan_channels.contains(&channel_id)
        {
            debug!(channel_id, "Channel not allowed");
            return Err(ScanError::new(ScanErrorKind::ChannelNotAllowed));
        }
        Ok(())
    }

    /// Every gate in order. Admits one request against the member's window
    /// and returns the API key on success.
    fn check_gates(
        &self,
        global: &ScanGlobalConfig,
        guild_id: u64,
        member: &MemberInfo,
        channel_id: u64,
        size_bytes: u64,
    ) -> ScanResult<String> {
        let guild = global.guild(guild_id);
        self.check_access(global, &guild, member, channel_id)?;

        let window = Duration::minutes(guild.rate_limit.window_minutes as i64);
        if let Err(limited) = self.limiter.try_admit(
            &(guild_id, *member.user_id()),
            guild.rate_limit.per_user,
            window,
        ) {
            return Err(ScanError::new(ScanErrorKind::RateLimited {
                retry_after_secs: limited.retry_after_secs(),
            }));
        }

        let limit_bytes = global.max_file_size_bytes();
        if size_bytes > limit_bytes {
            debug!(size_bytes, limit_bytes, "File too large");
            return Err(ScanError::new(ScanErrorKind::TooLarge {
                size_bytes,
                limit_bytes,
            }));
        }

        match global.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(ScanError::new(ScanErrorKind::NotConfigured)),
        }
    }

    /// Gates a member must pass before the upload widget waits for a file.
    pub async fn preflight(
        &self,
        guild_id: u64,
        member: &MemberInfo,
        channel_id: u64,
    ) -> ScanResult<()> {
        let global = self.config.snapshot().await;
        self.check_access(&global, &global.guild(guild_id), member, channel_id)?;
        if !global.has_api_key() {
            return Err(ScanError::new(ScanErrorKind::NotConfigured));
        }
        Ok(())
    }

    /// Scan a file.
    ///
    /// Gates run in order (enabled, blacklist, role, channel, rate limit,
    /// size, API key). A completed scan is appended to the history, its
    /// card is posted in the originating channel and, for detections, an
    /// alert goes to the guild's alert channel. Verdict service failures end
    /// the request without a record.
    #[instrument(
        skip(self, request),
        fields(
            guild_id = request.guild_id,
            user_id = *request.member.user_id(),
            filename = %request.filename,
            size = request.bytes.len()
        )
    )]
    pub async fn scan(&self, request: ScanRequest) -> ScanResult<ScanRecord> {
        let global = self.config.snapshot().await;
        let size_bytes = request.bytes.len() as u64;
        let api_key = self.check_gates(
            &global,
            request.guild_id,
            &request.member,
            request.channel_id,
            size_bytes,
        )?;
        self.submit_and_record(&global, &api_key, request, size_bytes)
            .await
    }

    /// Scan an attachment, checking its declared size before downloading.
    #[instrument(skip(self, member, attachment), fields(user_id = *member.user_id(), filename = %attachment.filename))]
    pub async fn scan_attachment(
        &self,
        guild_id: u64,
        channel_id: u64,
        member: &MemberInfo,
        attachment: &AttachmentRef,
        auto: bool,
    ) -> ScanResult<ScanRecord> {
        let global = self.config.snapshot().await;
        let api_key =
            self.check_gates(&global, guild_id, member, channel_id, attachment.size)?;
        let bytes = self
            .platform
            .download_attachment(&attachment.url)
            .await
            .map_err(|e| ScanError::new(ScanErrorKind::NetworkError(e.kind.to_string())))?;
        let size_bytes = bytes.len() as u64;
        let limit_bytes = global.max_file_size_bytes();
        if size_bytes > limit_bytes {
            return Err(ScanError::new(ScanErrorKind::TooLarge {
                size_bytes,
                limit_bytes,
            }));
        }
        let mut request = ScanRequest::new(
            guild_id,
            channel_id,
            member.clone(),
            attachment.filename.clone(),
            bytes,
        );
        request.auto = auto;
        self.submit_and_record(&global, &api_key, request, size_bytes)
            .await
    }

    async fn submit_and_record(
        &self,
        global: &ScanGlobalConfig,
        api_key: &str,
        request: ScanRequest,
        size_bytes: u64,
    ) -> ScanResult<ScanRecord> {
        let sha256 = sha256_hex(&request.bytes);
        let sha_prefix = &sha256[..16];
        info!(sha = %sha_prefix, auto = request.auto, "Submitting file");

        let analysis_id = self
            .service
            .submit(api_key, &request.filename, request.bytes)
            .await?;
        let snapshot = await_verdict(self.service.as_ref(), api_key, &analysis_id).await?;

        let record = ScanRecord {
            timestamp: self.clock.now(),
            guild_id: request.guild_id,
            user_id: *request.member.user_id(),
            channel_id: request.channel_id,
            filename: request.filename,
            size_bytes,
            sha256: sha256.clone(),
            verdict_snapshot: snapshot,
        };
        self.history.append(record.clone()).await?;
        let stats = &record.verdict_snapshot.stats;
        info!(
            sha = %record.sha_prefix(),
            malicious = stats.malicious,
            suspicious = stats.suspicious,
            "Scan complete"
        );

        if let Err(e) = self
            .platform
            .send_message(record.channel_id, &views::result_card(&record))
            .await
        {
            warn!(error = %e, "Could not post result card");
        }

        let guild = global.guild(record.guild_id);
        if guild.alerts_enabled
            && stats.is_threat()
            && let Some(channel) = guild.alert_channel_id
            && let Err(e) = self
                .platform
                .send_message(channel, &views::threat_alert(&record))
                .await
        {
            warn!(error = %e, "Could not post threat alert");
        }
        Ok(record)
    }

    /// Scan the first attachment of a message posted in an auto-scan
    /// channel. `None` when the message is not eligible.
    ///
    /// Failures are reported in the channel as a failure card, except when
    /// scanning is disabled.
    pub async fn auto_scan(&self, message: &IncomingMessage) -> Option<ScanResult<ScanRecord>> {
        if *message.author.is_bot() {
            return None;
        }
        let guild_id = message.guild_id?;
        let attachment = message.attachments.first()?;
        let guild = self.config.guild(guild_id).await;
        if !guild.auto_scan_channels.contains(&message.channel_id) {
            return None;
        }
        if message.attachments.len() > 1 {
            debug!(ignored = message.attachments.len() - 1, "Scanning first attachment only");
        }
        let result = self
            .scan_attachment(guild_id, message.channel_id, &message.author, attachment, true)
            .await;
        if let Err(e) = &result {
            self.report_failure(message.channel_id, &attachment.filename, e)
                .await;
        }
        Some(result)
    }

    /// Post a failure card for `err`. Disabled scanners stay silent.
    pub async fn report_failure(&self, channel_id: u64, filename: &str, err: &ScanError) {
        if err.kind == ScanErrorKind::Disabled {
            return;
        }
        if let Err(e) = self
            .platform
            .send_message(channel_id, &views::failure_card(filename, &err.user_message()))
            .await
        {
            warn!(error = %e, "Could not post failure card");
        }
    }

    /// Post the scan panel.
    #[instrument(skip(self))]
    pub async fn open_panel(&self, guild_id: u64, channel_id: u64) -> ScanResult<u64> {
        let message_id = self
            .platform
            .send_message(channel_id, &views::panel_message())
            .await
            .map_err(|e| ScanError::new(ScanErrorKind::NetworkError(e.kind.to_string())))?;
        info!(message_id, "Scan panel posted");
        Ok(message_id)
    }

    /// Store a new API key, or clear it with `None`.
    pub async fn set_api_key(&self, key: Option<String>) -> ScanResult<()> {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let present = key.is_some();
        self.config.update(|config| config.api_key = key).await?;
        info!(present, "Scan API key updated");
        Ok(())
    }

    /// Change a guild's scan settings and persist them.
    pub async fn update_guild<R>(
        &self,
        guild_id: u64,
        change: impl FnOnce(&mut GuildScanConfig) -> R,
    ) -> ScanResult<R> {
        let value = self.config.update_guild(guild_id, change).await?;
        info!(guild_id, "Scan settings updated");
        Ok(value)
    }

    /// Change process-wide scan settings other than the key.
    pub async fn update_global<R>(
        &self,
        change: impl FnOnce(&mut ScanGlobalConfig) -> R,
    ) -> ScanResult<R> {
        Ok(self.config.update(change).await?)
    }

    /// Page of a member's own scans, newest first.
    pub async fn user_history(&self, guild_id: u64, user_id: u64, page: usize) -> Page<ScanRecord> {
        let records = self.history.filter_by_user(guild_id, user_id).await;
        paginate(&records, page, USER_PAGE_SIZE)
    }

    /// Page of every scan in a guild, newest first.
    pub async fn admin_history(&self, guild_id: u64, page: usize) -> Page<ScanRecord> {
        let records = self.history.filter_by_guild(guild_id).await;
        paginate(&records, page, ADMIN_PAGE_SIZE)
    }

    /// Most recent record whose digest starts with `sha_prefix`.
    pub async fn find(&self, guild_id: u64, sha_prefix: &str) -> ScanResult<ScanRecord> {
        self.history
            .find(guild_id, sha_prefix)
            .await
            .ok_or_else(|| ScanError::new(ScanErrorKind::NoSuchRecord))
    }

    /// A guild's history as JSON or CSV.
    pub async fn export(&self, guild_id: u64, format: ExportFormat) -> ScanResult<Vec<u8>> {
        Ok(self.history.export(guild_id, format).await?)
    }

    /// Drop a guild's records older than `days`. Returns the number removed.
    pub async fn cleanup(&self, guild_id: u64, days: u32) -> ScanResult<usize> {
        Ok(self
            .history
            .cleanup_older_than(guild_id, days, self.clock.now())
            .await?)
    }

    /// Totals for a guild.
    pub async fn stats(&self, guild_id: u64) -> ScanStats {
        self.history.stats(guild_id).await
    }
}
