//! Attribute schemas.
//!
//! Each bag of `data-*` attributes the crawler reads is decoded once into one
//! of these structs. Absent attributes take the documented default instead of
//! being looked up ad hoc at every use site.

use scraper::ElementRef;

use super::has_class;

/// Attributes of a row on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingAttributes {
    /// `data-fullname`, required.
    pub id: String,
    /// `data-subreddit`, defaults to `""`.
    pub community: String,
    /// `data-timestamp` in epoch millis, required.
    pub timestamp_millis: i64,
    /// `data-author`, defaults to `""`.
    pub author: String,
    /// `data-permalink`, required; may be relative.
    pub permalink: String,
}

impl ListingAttributes {
    /// Decode a listing row. Returns the name of the first missing or
    /// malformed required attribute on failure.
    pub fn from_element(element: ElementRef<'_>) -> Result<Self, &'static str> {
        let attr = |name| element.value().attr(name).filter(|v| !v.is_empty());

        let id = attr("data-fullname").ok_or("data-fullname")?;
        let timestamp_millis = attr("data-timestamp")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or("data-timestamp")?;
        let permalink = attr("data-permalink").ok_or("data-permalink")?;

        Ok(Self {
            id: id.to_string(),
            community: attr("data-subreddit").unwrap_or_default().to_string(),
            timestamp_millis,
            author: attr("data-author").unwrap_or_default().to_string(),
            permalink: permalink.to_string(),
        })
    }
}

/// Attributes of the primary content container on a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostAttributes {
    /// `data-kind`, defaults to `""`.
    pub media_type: String,
    /// `data-url`; absent or empty is `None`.
    pub media_url: Option<String>,
    /// `data-promoted == "true"`.
    pub is_promoted: bool,
    /// `data-is-gallery == "true"`.
    pub is_gallery: bool,
}

impl PostAttributes {
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let attr = |name| element.value().attr(name);

        Self {
            media_type: attr("data-kind").unwrap_or_default().to_string(),
            media_url: attr("data-url")
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            is_promoted: attr("data-promoted") == Some("true"),
            is_gallery: attr("data-is-gallery") == Some("true"),
        }
    }
}

/// Attributes of one comment item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentAttributes {
    /// `data-fullname`, optional.
    pub id: Option<String>,
    /// `data-author`; always `""` for deleted comments.
    pub author: String,
    /// Class list contains `deleted`.
    pub is_deleted: bool,
    /// Class list contains `collapsed`.
    pub is_collapsed: bool,
}

impl CommentAttributes {
    pub fn from_element(element: ElementRef<'_>) -> Self {
        let is_deleted = has_class(element, "deleted");
        let is_collapsed = has_class(element, "collapsed");
        let author = if is_deleted {
            String::new()
        } else {
            element
                .value()
                .attr("data-author")
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: element
                .value()
                .attr("data-fullname")
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            author,
            is_deleted,
            is_collapsed,
        }
    }
}
