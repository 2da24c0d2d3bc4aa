//! Platform data collection. [`YouTubeCollector`] talks to the YouTube Data
//! API v3 and writes entities and snapshots through the store.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use scout_db::{NewEntity, NewSnapshot};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::store::ScoutStore;
use crate::types::{CollectorResult, DiscoveredChannel};

pub const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const PLATFORM: &str = "youtube";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SEARCH_MAX_RESULTS: &str = "12";
/// Channel ids accepted by one `channels.list` call.
const CHANNEL_BATCH: usize = 50;
const RECENT_UPLOADS: &str = "10";

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9._-]{3,30})").expect("valid handle regex"));

/// Source of per-run entity snapshots.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Collects channels found by `keywords` plus the given platform ids,
    /// recording one entity upsert and one snapshot per channel.
    ///
    /// Per-keyword and per-channel failures are returned in
    /// [`CollectorResult::errors`] rather than aborting the collection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only when collection cannot proceed at all.
    async fn collect(
        &self,
        run_id: Uuid,
        keywords: &[String],
        platform_ids: &[String],
    ) -> Result<CollectorResult, PipelineError>;

    /// Resolves discovered channels to platform ids, skipping any that cannot
    /// be found.
    async fn resolve_channels(&self, channels: &[DiscoveredChannel]) -> Vec<String>;
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct ChannelIdItem {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    #[serde(default)]
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
    content_details: Option<ChannelContentDetails>,
    topic_details: Option<TopicDetails>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
    country: Option<String>,
    default_language: Option<String>,
}

/// Counts arrive as decimal strings.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicDetails {
    #[serde(default)]
    topic_categories: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    #[serde(default)]
    snippet: PlaylistSnippet,
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    video_id: Option<String>,
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
struct RecentUpload {
    video_id: Option<String>,
    title: String,
    published_at: DateTime<Utc>,
}

fn parse_count(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|s| s.parse::<i64>().ok())
}

/// Last path segment of the first topic URL, e.g. `.../wiki/Music` gives `Music`.
fn category_from_topics(topics: Option<&TopicDetails>) -> Option<String> {
    topics?
        .topic_categories
        .first()
        .and_then(|url| url.rsplit('/').next())
        .map(|s| s.replace('_', " "))
        .filter(|s| !s.is_empty())
}

/// Average days between consecutive uploads, or `None` with fewer than two.
fn average_upload_gap_days(uploads: &[RecentUpload]) -> Option<f64> {
    if uploads.len() < 2 {
        return None;
    }
    let newest = uploads.iter().map(|u| u.published_at).max()?;
    let oldest = uploads.iter().map(|u| u.published_at).min()?;
    #[allow(clippy::cast_precision_loss)]
    let gaps = (uploads.len() - 1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let span_days = (newest - oldest).num_seconds() as f64 / 86_400.0;
    Some((span_days / gaps * 100.0).round() / 100.0)
}

/// Extracts `@handle` from a handle, channel URL, or bare name.
fn extract_handle(raw: &str) -> Option<String> {
    HANDLE_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| format!("@{}", m.as_str()))
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

pub struct YouTubeCollector {
    http: Client,
    api_key: String,
    base_url: String,
    store: Arc<dyn ScoutStore>,
}

impl YouTubeCollector {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        store: Arc<dyn ScoutStore>,
        timeout_secs: u64,
    ) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: YOUTUBE_API_BASE_URL.to_string(),
            store,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PipelineError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::PlatformApi {
                status: response.status().as_u16(),
                context: endpoint.to_string(),
            });
        }

        Ok(response.json().await?)
    }

    async fn search_channels(&self, keyword: &str) -> Result<Vec<String>, PipelineError> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("part", "id"),
                    ("type", "channel"),
                    ("q", keyword),
                    ("maxResults", SEARCH_MAX_RESULTS),
                ],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.channel_id)
            .collect())
    }

    async fn channel_details(&self, ids: &[String]) -> Result<Vec<ChannelItem>, PipelineError> {
        let joined = ids.join(",");
        let response: ListResponse<ChannelItem> = self
            .get_json(
                "channels",
                &[
                    ("part", "snippet,statistics,contentDetails,topicDetails"),
                    ("id", &joined),
                    ("maxResults", "50"),
                ],
            )
            .await?;
        Ok(response.items)
    }

    async fn recent_uploads(&self, playlist_id: &str) -> Result<Vec<RecentUpload>, PipelineError> {
        let response: ListResponse<PlaylistItem> = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", RECENT_UPLOADS),
                ],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let details = item.content_details;
                let published_at = details
                    .as_ref()
                    .and_then(|d| d.video_published_at)
                    .or(item.snippet.published_at)?;
                Some(RecentUpload {
                    video_id: details.and_then(|d| d.video_id),
                    title: item.snippet.title,
                    published_at,
                })
            })
            .collect())
    }

    async fn channel_id_for_handle(&self, handle: &str) -> Result<Option<String>, PipelineError> {
        let response: ListResponse<ChannelIdItem> = self
            .get_json("channels", &[("part", "id"), ("forHandle", handle)])
            .await?;
        Ok(response.items.into_iter().next().map(|item| item.id))
    }

    async fn channel_id_for_name(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[("part", "id"), ("type", "channel"), ("q", name), ("maxResults", "1")],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .find_map(|item| item.id.channel_id))
    }

    /// Upserts the channel and writes its snapshot. Returns `false` when the
    /// run already holds a snapshot for this channel.
    async fn save_channel(&self, run_id: Uuid, channel: &ChannelItem) -> Result<bool, PipelineError> {
        let uploads = match channel
            .content_details
            .as_ref()
            .and_then(|d| d.related_playlists.uploads.as_deref())
        {
            Some(playlist) => self.recent_uploads(playlist).await.unwrap_or_else(|e| {
                tracing::warn!(channel_id = %channel.id, error = %e, "recent uploads unavailable");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let entity_id = self
            .store
            .upsert_entity(&NewEntity {
                platform: PLATFORM,
                platform_id: &channel.id,
                channel_title: Some(channel.snippet.title.as_str()),
                channel_description: channel.snippet.description.as_deref(),
                country: channel.snippet.country.as_deref(),
                language: channel.snippet.default_language.as_deref(),
                published_at: channel.snippet.published_at,
            })
            .await?;

        let recent_videos = uploads
            .iter()
            .map(|u| json!({"video_id": u.video_id, "title": u.title, "published_at": u.published_at}))
            .collect::<Vec<_>>();
        let category = category_from_topics(channel.topic_details.as_ref());

        let inserted = self
            .store
            .insert_snapshot(&NewSnapshot {
                run_id,
                entity_id,
                subscriber_count: parse_count(channel.statistics.subscriber_count.as_ref()),
                view_count: parse_count(channel.statistics.view_count.as_ref()),
                video_count: parse_count(channel.statistics.video_count.as_ref()),
                upload_freq_days: average_upload_gap_days(&uploads),
                category: category.as_deref(),
                recent_videos_json: serde_json::Value::Array(recent_videos),
            })
            .await?;

        Ok(inserted.is_some())
    }
}

#[async_trait]
impl Collector for YouTubeCollector {
    async fn collect(
        &self,
        run_id: Uuid,
        keywords: &[String],
        platform_ids: &[String],
    ) -> Result<CollectorResult, PipelineError> {
        let mut result = CollectorResult::default();
        let mut channel_ids: Vec<String> = Vec::new();

        for keyword in keywords {
            match self.search_channels(keyword).await {
                Ok(ids) => ids.into_iter().for_each(|id| push_unique(&mut channel_ids, id)),
                Err(e) => {
                    tracing::warn!(%run_id, keyword, error = %e, "channel search failed");
                    result.errors.push(format!("Search failed for keyword {keyword:?}: {e}"));
                }
            }
        }
        for id in platform_ids {
            push_unique(&mut channel_ids, id.clone());
        }

        tracing::info!(%run_id, channels = channel_ids.len(), "collecting channel details");

        for batch in channel_ids.chunks(CHANNEL_BATCH) {
            let channels = match self.channel_details(batch).await {
                Ok(channels) => channels,
                Err(e) => {
                    tracing::warn!(%run_id, batch = batch.len(), error = %e, "channel details failed");
                    result
                        .errors
                        .push(format!("Failed to fetch details for {} channels: {e}", batch.len()));
                    continue;
                }
            };

            for channel in &channels {
                match self.save_channel(run_id, channel).await {
                    Ok(inserted) => {
                        result.entity_count += 1;
                        if inserted {
                            result.snapshot_count += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%run_id, channel_id = %channel.id, error = %e, "failed to save channel");
                        result
                            .errors
                            .push(format!("Failed to process channel {}: {e}", channel.id));
                    }
                }
            }
        }

        Ok(result)
    }

    async fn resolve_channels(&self, channels: &[DiscoveredChannel]) -> Vec<String> {
        let mut ids = Vec::new();
        for channel in channels {
            let lookup = match channel
                .handle
                .as_deref()
                .and_then(extract_handle)
                .or_else(|| extract_handle(&channel.name))
            {
                Some(handle) => self.channel_id_for_handle(&handle).await,
                None => self.channel_id_for_name(&channel.name).await,
            };
            match lookup {
                Ok(Some(id)) => push_unique(&mut ids, id),
                Ok(None) => {
                    tracing::debug!(name = %channel.name, "discovered channel not found");
                }
                Err(e) => {
                    tracing::warn!(name = %channel.name, error = %e, "channel lookup failed");
                }
            }
        }
        ids
    }
}
