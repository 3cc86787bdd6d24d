//! Target entity lookup.
//!
//! Resolves an operator-supplied id into the owning entity's kind and
//! display info via the hovercard query. The platform reports pages as
//! `user` nodes whose profile transition path starts with `PAGE`.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use super::client::{GraphClient, GraphError};

const ENTITY_ABOUT_DOC_ID: &str = "7257793420991802";

/// The kind of entity that owns the mirrored collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// An individual account.
    User,
    /// A page (individual-account API surface, page semantics).
    Page,
    /// A group.
    Group,
}

/// Basic info about the target entity.
#[derive(Debug, Clone)]
pub struct EntityAbout {
    /// Entity kind.
    pub kind: EntityKind,
    /// Canonical entity id (may differ from the operator-supplied one).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Profile URL.
    pub profile_url: Option<String>,
}

#[derive(Deserialize)]
struct AboutEnvelope {
    data: Option<AboutData>,
}

#[derive(Deserialize)]
struct AboutData {
    node: Option<AboutNode>,
}

#[derive(Deserialize)]
struct AboutNode {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    id: Option<String>,
    comet_hovercard_renderer: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct HovercardCard {
    id: Option<String>,
    name: Option<String>,
    profile_picture: Option<PictureUri>,
    profile_url: Option<String>,
    url: Option<String>,
    profile_plus_transition_path: Option<String>,
}

#[derive(Deserialize)]
struct PictureUri {
    uri: Option<String>,
}

/// Looks up the entity behind `entity_id`.
///
/// # Errors
///
/// Returns [`GraphError::EntityNotFound`] when the id matches nothing,
/// [`GraphError::UnsupportedEntity`] for typenames other than
/// user/page/group, and the usual transport/shape errors otherwise.
#[instrument(level = "debug", skip(client))]
pub async fn entity_about(
    client: &GraphClient,
    entity_id: &str,
) -> Result<EntityAbout, GraphError> {
    let response = client
        .query(
            ENTITY_ABOUT_DOC_ID,
            Some("CometHovercardQueryRendererQuery"),
            json!({
                "actionBarRenderLocation": "WWW_COMET_HOVERCARD",
                "context": "DEFAULT",
                "entityID": entity_id,
                "includeTdaInfo": true,
                "scale": 1,
            }),
        )
        .await?;

    parse_entity_about(entity_id, response)
}

/// Converts a hovercard response into [`EntityAbout`].
fn parse_entity_about(entity_id: &str, response: Value) -> Result<EntityAbout, GraphError> {
    let envelope: AboutEnvelope = serde_json::from_value(response)?;
    let Some(node) = envelope.data.and_then(|d| d.node) else {
        return Err(GraphError::EntityNotFound {
            entity_id: entity_id.to_string(),
        });
    };

    let type_name = node
        .typename
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !matches!(type_name.as_str(), "user" | "page" | "group") {
        return Err(GraphError::UnsupportedEntity { type_name });
    }

    let card_value = node
        .comet_hovercard_renderer
        .and_then(|mut renderer| renderer.remove(&type_name))
        .ok_or_else(|| GraphError::malformed("hovercard renderer missing entity card"))?;
    let card: HovercardCard = serde_json::from_value(card_value)?;

    let kind = match type_name.as_str() {
        "group" => EntityKind::Group,
        _ => {
            let is_page = card
                .profile_plus_transition_path
                .as_deref()
                .is_some_and(|path| path.starts_with("PAGE"));
            if is_page {
                EntityKind::Page
            } else {
                EntityKind::User
            }
        }
    };

    let id = node
        .id
        .or(card.id)
        .ok_or_else(|| GraphError::malformed("entity card has no id"))?;
    let name = card
        .name
        .ok_or_else(|| GraphError::malformed("entity card has no name"))?;

    Ok(EntityAbout {
        kind,
        id,
        name,
        avatar_url: card.profile_picture.and_then(|p| p.uri),
        profile_url: card.profile_url.or(card.url),
    })
}
