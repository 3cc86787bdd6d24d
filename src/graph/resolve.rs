//! Secondary media-URL lookups.
//!
//! Listing pages for videos (and sometimes photos/reels) carry no
//! playable source; one extra per-item query fills it in. Video sources
//! are picked in fixed quality preference order.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::listing::MediaKind;
use crate::resolver::{MediaResolver, ResolveError, ResolvedMedia};

use super::client::GraphClient;
use super::take_path;

const VIDEO_INFO_DOC_ID: &str = "26374037368876407";
const LARGEST_PHOTO_DOC_ID: &str = "7830475950340566";

#[derive(Deserialize)]
struct VideoInfo {
    browser_native_hd_url: Option<String>,
    playable_url_quality_hd: Option<String>,
    browser_native_sd_url: Option<String>,
    playable_url: Option<String>,
    original_width: Option<u32>,
    original_height: Option<u32>,
}

impl VideoInfo {
    /// Source URL in quality preference order.
    fn source(self) -> Option<String> {
        self.browser_native_hd_url
            .or(self.playable_url_quality_hd)
            .or(self.browser_native_sd_url)
            .or(self.playable_url)
    }
}

#[derive(Deserialize)]
struct PhotoImage {
    uri: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// [`MediaResolver`] backed by the platform's per-item queries.
pub struct GraphResolver {
    client: Arc<GraphClient>,
}

impl GraphResolver {
    /// Creates a resolver over `client`.
    #[must_use]
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    async fn video_source(&self, item_id: &str) -> Result<ResolvedMedia, ResolveError> {
        let response = self
            .client
            .query(
                VIDEO_INFO_DOC_ID,
                Some("CometTahoeRootQuery"),
                json!({
                    "caller": "TAHOE",
                    "chainingCursor": null,
                    "chainingSeedVideoId": null,
                    "channelEntryPoint": "TAHOE",
                    "channelID": "",
                    "feedbackSource": 41,
                    "feedLocation": "TAHOE",
                    "focusCommentID": null,
                    "isCrawler": false,
                    "privacySelectorRenderLocation": "COMET_STREAM",
                    "renderLocation": "video_channel",
                    "scale": 1,
                    "streamChainingSection": false,
                    "useDefaultActor": false,
                    "videoChainingContext": null,
                    "videoID": item_id,
                }),
            )
            .await
            .map_err(|e| ResolveError::request(item_id, e))?;

        let info = extract_video_info(response).ok_or_else(|| ResolveError::no_url(item_id))?;
        let (width, height) = (info.original_width, info.original_height);
        let url = info.source().ok_or_else(|| ResolveError::no_url(item_id))?;
        Ok(ResolvedMedia {
            download_url: url,
            width,
            height,
        })
    }

    async fn largest_photo(&self, item_id: &str) -> Result<ResolvedMedia, ResolveError> {
        let response = self
            .client
            .query(
                LARGEST_PHOTO_DOC_ID,
                Some("CometPhotoRootContentQuery"),
                json!({
                    "UFI2CommentsProvider_commentsKey": "CometPhotoRootQuery",
                    "feedbackSource": 65,
                    "feedLocation": "COMET_MEDIA_VIEWER",
                    "isMediaset": false,
                    "nodeID": item_id,
                    "privacySelectorRenderLocation": "COMET_MEDIA_VIEWER",
                    "renderLocation": "permalink",
                    "scale": 2,
                    "useDefaultActor": false,
                    "useHScroll": false,
                    "focusCommentID": null,
                }),
            )
            .await
            .map_err(|e| ResolveError::request(item_id, e))?;

        let image = extract_photo_image(response).ok_or_else(|| ResolveError::no_url(item_id))?;
        let (width, height) = (image.width, image.height);
        let url = image.uri.ok_or_else(|| ResolveError::no_url(item_id))?;
        Ok(ResolvedMedia {
            download_url: url,
            width,
            height,
        })
    }
}

fn extract_video_info(response: Value) -> Option<VideoInfo> {
    let video = take_path(response, &["data", "video"])?;
    serde_json::from_value(video).ok()
}

fn extract_photo_image(response: Value) -> Option<PhotoImage> {
    let image = take_path(response, &["data", "currMedia", "image"])?;
    serde_json::from_value(image).ok()
}

#[async_trait]
impl MediaResolver for GraphResolver {
    #[instrument(level = "debug", skip(self))]
    async fn resolve(&self, item_id: &str, kind: MediaKind) -> Result<ResolvedMedia, ResolveError> {
        match kind {
            MediaKind::Photo => self.largest_photo(item_id).await,
            MediaKind::Video | MediaKind::Reel => self.video_source(item_id).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_video_source_preference_order() {
        let info: VideoInfo = serde_json::from_value(json!({
            "playable_url": "https://cdn/plain.mp4",
            "browser_native_sd_url": "https://cdn/sd.mp4",
            "browser_native_hd_url": "https://cdn/hd.mp4",
        }))
        .unwrap();
        assert_eq!(info.source().as_deref(), Some("https://cdn/hd.mp4"));

        let info: VideoInfo = serde_json::from_value(json!({
            "playable_url": "https://cdn/plain.mp4",
            "browser_native_sd_url": "https://cdn/sd.mp4",
        }))
        .unwrap();
        assert_eq!(info.source().as_deref(), Some("https://cdn/sd.mp4"));
    }

    #[test]
    fn test_extract_video_info_missing_video_is_none() {
        assert!(extract_video_info(json!({"data": {}})).is_none());
        assert!(extract_video_info(json!({"data": {"video": null}})).is_none());
    }

    #[test]
    fn test_extract_photo_image() {
        let image = extract_photo_image(json!({
            "data": {"currMedia": {
                "accessibility_caption": "A cat",
                "image": {"uri": "https://cdn/full.jpg", "width": 2048, "height": 1365}
            }}
        }))
        .unwrap();
        assert_eq!(image.uri.as_deref(), Some("https://cdn/full.jpg"));
        assert_eq!(image.width, Some(2048));
    }
}
