use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single listing entry, as seen on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStub {
    /// Opaque identifier (e.g. `t3_abc123`).
    pub id: String,
    pub community: String,
    /// Epoch milliseconds.
    pub posted_at_millis: i64,
    pub author: String,
    /// Absolute URL of the item's detail page.
    pub url: String,
}

/// Full record for one item, including its discussion tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub stub: ItemStub,
    pub media_type: String,
    pub media_url: Option<String>,
    pub is_promoted: bool,
    pub is_gallery: bool,
    pub title: String,
    pub score: i64,
    pub body_text: String,
    pub discussion: Vec<DiscussionNode>,
}

/// One comment in a discussion tree. Parents own their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionNode {
    pub id: Option<String>,
    /// Empty when the comment is deleted.
    pub author: String,
    /// Timestamp string as rendered by the source, empty if absent.
    pub posted_at: String,
    pub text: String,
    pub score: i64,
    pub children: Vec<DiscussionNode>,
    pub is_deleted: bool,
    pub is_collapsed: bool,
}

impl DiscussionNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(DiscussionNode::subtree_len).sum::<usize>()
    }
}

/// The record handed to the sink: an [`ItemDetail`] stamped with its capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedItem {
    #[serde(flatten)]
    pub detail: ItemDetail,
    pub captured_at: DateTime<Utc>,
}

impl CapturedItem {
    pub fn new(detail: ItemDetail, captured_at: DateTime<Utc>) -> Self {
        Self {
            detail,
            captured_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.detail.stub.id
    }
}
