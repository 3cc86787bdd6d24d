//! Per-collection [`ListingSource`] implementations.
//!
//! One persisted query exists per media kind and owning-entity kind; this
//! module maps each response shape into a well-typed [`Page`]. Connection
//! envelopes that are missing entirely are a [`ListingError`]; individual
//! edges missing their id are platform junk and are skipped with a
//! warning rather than killing the run.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use crate::listing::{ListingError, ListingSource, MediaItem, MediaKind, Page};

use super::client::{GraphClient, GraphError};
use super::entity::{EntityAbout, EntityKind};
use super::take_path;

const USER_PHOTOS_DOC_ID: &str = "4820192058049838";
const GROUP_PHOTOS_DOC_ID: &str = "6022153214500431";
const USER_VIDEOS_DOC_ID: &str = "3975496529227403";
const GROUP_VIDEOS_DOC_ID: &str = "6553573504724585";
const USER_REELS_DOC_ID: &str = "7821270511254925";

// Collection node ids are "app_collection:<entity>:<app>:<surface>",
// base64-encoded. The app/surface pairs are fixed per media kind.
const PHOTOS_COLLECTION_SUFFIX: &str = "2305272732:5";
const VIDEOS_COLLECTION_SUFFIX: &str = "1560653304174514:133";
const REELS_COLLECTION_SUFFIX: &str = "168684841768375:260";

const PAGE_SIZE: u32 = 8;
const REELS_PAGE_SIZE: u32 = 10;

fn collection_node_id(entity_id: &str, suffix: &str) -> String {
    BASE64.encode(format!("app_collection:{entity_id}:{suffix}"))
}

/// Decodes a base64 `...:<item id>` node id, falling back to the raw
/// string when it is not in that shape.
fn decoded_item_id(raw: &str) -> String {
    BASE64
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.rsplit(':').next().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

#[derive(Deserialize)]
struct PageInfo {
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Connection<E> {
    #[serde(default = "Vec::new")]
    edges: Vec<E>,
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct PictureUri {
    uri: Option<String>,
}

#[derive(Deserialize)]
struct TextField {
    text: Option<String>,
}

#[derive(Deserialize)]
struct IdRef {
    id: Option<String>,
}

#[derive(Deserialize)]
struct UserPhotoEdge {
    cursor: Option<String>,
    node: Option<UserPhotoNode>,
}

#[derive(Deserialize)]
struct UserPhotoNode {
    id: Option<String>,
    image: Option<PictureUri>,
    node: Option<UserPhotoInner>,
}

#[derive(Deserialize)]
struct UserPhotoInner {
    viewer_image: Option<PictureUri>,
    accessibility_caption: Option<String>,
}

#[derive(Deserialize)]
struct GroupPhotoEdge {
    cursor: Option<String>,
    node: Option<GroupPhotoNode>,
}

#[derive(Deserialize)]
struct GroupPhotoNode {
    id: Option<String>,
    image: Option<PictureUri>,
    viewer_image: Option<PictureUri>,
    accessibility_caption: Option<String>,
}

#[derive(Deserialize)]
struct VideoEdge {
    cursor: Option<String>,
    node: Option<VideoNode>,
}

#[derive(Deserialize)]
struct VideoNode {
    node: Option<IdRef>,
    title: Option<TextField>,
    image: Option<PictureUri>,
}

#[derive(Deserialize)]
struct ReelEdge {
    cursor: Option<String>,
    profile_reel_node: Option<ReelNode>,
}

#[derive(Deserialize)]
struct ReelNode {
    id: Option<String>,
    node: Option<ReelInner>,
}

#[derive(Deserialize)]
struct ReelInner {
    video: Option<IdRef>,
    message: Option<TextField>,
    short_form_video_context: Option<ShortFormContext>,
}

#[derive(Deserialize)]
struct ShortFormContext {
    playback_video: Option<PlaybackVideo>,
}

#[derive(Deserialize)]
struct PlaybackVideo {
    browser_native_hd_url: Option<String>,
    browser_native_sd_url: Option<String>,
    image: Option<PictureUri>,
}

/// A paginated listing of one media collection of one entity.
pub struct GraphListing {
    client: Arc<GraphClient>,
    entity_id: String,
    entity_kind: EntityKind,
    media: MediaKind,
}

impl std::fmt::Debug for GraphListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphListing")
            .field("entity_id", &self.entity_id)
            .field("entity_kind", &self.entity_kind)
            .field("media", &self.media)
            .finish_non_exhaustive()
    }
}

impl GraphListing {
    /// Creates the listing source for `entity`'s `media` collection.
    ///
    /// Pages use the individual-account queries; groups have their own.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnsupportedCollection`] for combinations the
    /// platform has no query for (group reels).
    pub fn new(
        client: Arc<GraphClient>,
        entity: &EntityAbout,
        media: MediaKind,
    ) -> Result<Self, GraphError> {
        if entity.kind == EntityKind::Group && media == MediaKind::Reel {
            return Err(GraphError::UnsupportedCollection {
                entity: entity.kind,
                media,
            });
        }
        Ok(Self {
            client,
            entity_id: entity.id.clone(),
            entity_kind: entity.kind,
            media,
        })
    }

    /// Runs `doc_id` and deserializes the connection at `path`.
    async fn connection<E: DeserializeOwned>(
        &self,
        doc_id: &str,
        friendly_name: Option<&str>,
        variables: Value,
        path: &[&str],
    ) -> Result<Connection<E>, ListingError> {
        let response = self
            .client
            .query(doc_id, friendly_name, variables)
            .await
            .map_err(ListingError::request)?;

        let connection = take_path(response, path)
            .ok_or_else(|| ListingError::malformed(format!("missing {}", path.join("."))))?;
        serde_json::from_value(connection)
            .map_err(|e| ListingError::malformed(format!("bad connection shape: {e}")))
    }

    async fn user_photos(&self, cursor: &str) -> Result<Page, ListingError> {
        let connection: Connection<UserPhotoEdge> = self
            .connection(
                USER_PHOTOS_DOC_ID,
                Some("ProfileCometAppCollectionPhotosRendererPaginationQuery"),
                json!({
                    "count": PAGE_SIZE,
                    "cursor": cursor,
                    "scale": 1,
                    "id": collection_node_id(&self.entity_id, PHOTOS_COLLECTION_SUFFIX),
                }),
                &["data", "node", "pageItems"],
            )
            .await?;

        let mut items = Vec::with_capacity(connection.edges.len());
        for edge in connection.edges {
            let Some(node) = edge.node else {
                warn!("skipping photo edge without node");
                continue;
            };
            let Some(raw_id) = node.id else {
                warn!("skipping photo edge without id");
                continue;
            };
            let inner = node.node;
            let full_image = inner
                .as_ref()
                .and_then(|i| i.viewer_image.as_ref())
                .and_then(|v| v.uri.clone());
            let thumbnail = node
                .image
                .and_then(|i| i.uri)
                .or_else(|| full_image.clone())
                .unwrap_or_default();
            let cursor = edge.cursor.unwrap_or_default();

            let mut item = match full_image {
                Some(url) => MediaItem::with_download_url(
                    decoded_item_id(&raw_id),
                    cursor,
                    MediaKind::Photo,
                    thumbnail,
                    url,
                ),
                None => MediaItem::new(decoded_item_id(&raw_id), cursor, MediaKind::Photo, thumbnail),
            };
            if let Some(caption) = inner.and_then(|i| i.accessibility_caption) {
                item = item.with_title(caption);
            }
            items.push(item);
        }

        Ok(Page {
            items,
            next_cursor: connection.page_info.and_then(|p| p.end_cursor),
        })
    }

    async fn group_photos(&self, cursor: &str) -> Result<Page, ListingError> {
        let connection: Connection<GroupPhotoEdge> = self
            .connection(
                GROUP_PHOTOS_DOC_ID,
                Some("GroupsCometMediaPhotosTabGridQuery"),
                json!({
                    "count": PAGE_SIZE,
                    "cursor": cursor,
                    "scale": 1,
                    "id": self.entity_id,
                }),
                &["data", "node", "group_mediaset", "media"],
            )
            .await?;

        let mut items = Vec::with_capacity(connection.edges.len());
        for edge in connection.edges {
            let Some(node) = edge.node else {
                warn!("skipping photo edge without node");
                continue;
            };
            let Some(id) = node.id else {
                warn!("skipping photo edge without id");
                continue;
            };
            let full_image = node.viewer_image.and_then(|v| v.uri);
            let thumbnail = node
                .image
                .and_then(|i| i.uri)
                .or_else(|| full_image.clone())
                .unwrap_or_default();
            let cursor = edge.cursor.unwrap_or_default();

            let mut item = match full_image {
                Some(url) => {
                    MediaItem::with_download_url(id, cursor, MediaKind::Photo, thumbnail, url)
                }
                None => MediaItem::new(id, cursor, MediaKind::Photo, thumbnail),
            };
            if let Some(caption) = node.accessibility_caption {
                item = item.with_title(caption);
            }
            items.push(item);
        }

        Ok(Page {
            items,
            next_cursor: connection.page_info.and_then(|p| p.end_cursor),
        })
    }

    async fn videos(&self, cursor: &str) -> Result<Page, ListingError> {
        // User and group video edges share a shape; only the query and the
        // connection path differ.
        let connection: Connection<VideoEdge> = if self.entity_kind == EntityKind::Group {
            self.connection(
                GROUP_VIDEOS_DOC_ID,
                Some("GroupsCometVideosRootQueryContainerQuery"),
                json!({
                    "cursor": cursor,
                    "count": PAGE_SIZE,
                    "scale": 2,
                    "groupID": self.entity_id,
                }),
                &["data", "group", "group_mediaset", "media"],
            )
            .await?
        } else {
            self.connection(
                USER_VIDEOS_DOC_ID,
                None,
                json!({
                    "cursor": cursor,
                    "count": PAGE_SIZE,
                    "scale": 1,
                    "id": collection_node_id(&self.entity_id, VIDEOS_COLLECTION_SUFFIX),
                }),
                &["data", "node", "pageItems"],
            )
            .await?
        };

        let mut items = Vec::with_capacity(connection.edges.len());
        for edge in connection.edges {
            let Some(node) = edge.node else {
                warn!("skipping video edge without node");
                continue;
            };
            let Some(id) = node.node.and_then(|r| r.id) else {
                warn!("skipping video edge without id");
                continue;
            };
            let thumbnail = node.image.and_then(|i| i.uri).unwrap_or_default();

            // The listing never carries the playable source; the resolver
            // fills it in per item.
            let mut item = MediaItem::new(
                id,
                edge.cursor.unwrap_or_default(),
                MediaKind::Video,
                thumbnail,
            );
            if let Some(title) = node.title.and_then(|t| t.text) {
                item = item.with_title(title);
            }
            items.push(item);
        }

        Ok(Page {
            items,
            next_cursor: connection.page_info.and_then(|p| p.end_cursor),
        })
    }

    async fn user_reels(&self, cursor: &str) -> Result<Page, ListingError> {
        let connection: Connection<ReelEdge> = self
            .connection(
                USER_REELS_DOC_ID,
                Some("ProfileCometAppCollectionReelsRendererPaginationQuery"),
                json!({
                    "count": REELS_PAGE_SIZE,
                    "cursor": cursor,
                    "feedLocation": "COMET_MEDIA_VIEWER",
                    "feedbackSource": 65,
                    "focusCommentID": null,
                    "renderLocation": null,
                    "scale": 1,
                    "useDefaultActor": true,
                    "id": collection_node_id(&self.entity_id, REELS_COLLECTION_SUFFIX),
                }),
                &["data", "node", "aggregated_fb_shorts"],
            )
            .await?;

        let end_cursor = connection.page_info.and_then(|p| p.end_cursor);
        let mut items = Vec::with_capacity(connection.edges.len());
        for edge in connection.edges {
            let Some(reel) = edge.profile_reel_node else {
                warn!("skipping reel edge without node");
                continue;
            };
            let inner = reel.node;
            let id = inner
                .as_ref()
                .and_then(|i| i.video.as_ref())
                .and_then(|v| v.id.clone())
                .or_else(|| reel.id.as_deref().map(decoded_item_id));
            let Some(id) = id else {
                warn!("skipping reel edge without id");
                continue;
            };

            let playback = inner
                .as_ref()
                .and_then(|i| i.short_form_video_context.as_ref())
                .and_then(|c| c.playback_video.as_ref());
            let source = playback.and_then(|p| {
                p.browser_native_hd_url
                    .clone()
                    .or_else(|| p.browser_native_sd_url.clone())
            });
            let thumbnail = playback
                .and_then(|p| p.image.as_ref())
                .and_then(|i| i.uri.clone())
                .unwrap_or_default();
            let cursor = edge
                .cursor
                .or_else(|| end_cursor.clone())
                .unwrap_or_default();

            let mut item = match source {
                Some(url) => {
                    MediaItem::with_download_url(id, cursor, MediaKind::Reel, thumbnail, url)
                }
                None => MediaItem::new(id, cursor, MediaKind::Reel, thumbnail),
            };
            if let Some(message) = inner.and_then(|i| i.message).and_then(|m| m.text) {
                item = item.with_title(message);
            }
            items.push(item);
        }

        Ok(Page {
            items,
            next_cursor: end_cursor,
        })
    }
}

#[async_trait]
impl ListingSource for GraphListing {
    async fn fetch_page(&self, cursor: &str) -> Result<Page, ListingError> {
        match self.media {
            MediaKind::Photo => {
                if self.entity_kind == EntityKind::Group {
                    self.group_photos(cursor).await
                } else {
                    self.user_photos(cursor).await
                }
            }
            MediaKind::Video => self.videos(cursor).await,
            MediaKind::Reel => self.user_reels(cursor).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_node_id_round_trips() {
        let encoded = collection_node_id("1001", PHOTOS_COLLECTION_SUFFIX);
        let decoded = String::from_utf8(BASE64.decode(&encoded).unwrap()).unwrap();
        assert_eq!(decoded, "app_collection:1001:2305272732:5");
    }

    #[test]
    fn test_decoded_item_id_takes_last_segment() {
        let raw = BASE64.encode("S:_Ifeed:12345");
        assert_eq!(decoded_item_id(&raw), "12345");
    }

    #[test]
    fn test_decoded_item_id_falls_back_to_raw() {
        assert_eq!(decoded_item_id("not base64!!"), "not base64!!");
    }

    #[test]
    fn test_user_photo_connection_deserializes() {
        let connection: Connection<UserPhotoEdge> = serde_json::from_value(json!({
            "edges": [{
                "cursor": "c1",
                "node": {
                    "id": BASE64.encode("S:_I:777"),
                    "image": {"uri": "https://cdn/thumb.jpg"},
                    "node": {
                        "viewer_image": {"uri": "https://cdn/full.jpg"},
                        "accessibility_caption": "A dog"
                    }
                }
            }],
            "page_info": {"end_cursor": "c1", "has_next_page": true}
        }))
        .unwrap();
        assert_eq!(connection.edges.len(), 1);
        assert_eq!(connection.page_info.unwrap().end_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_connection_tolerates_missing_edges() {
        let connection: Connection<VideoEdge> =
            serde_json::from_value(json!({"page_info": {"end_cursor": null}})).unwrap();
        assert!(connection.edges.is_empty());
    }
}
