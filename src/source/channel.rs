//! Channel references

use crate::error::{Result, SourceError};
use std::fmt;
use url::Url;

/// A channel as written in the configuration
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// `@handle` (bare or `youtube.com/@handle`)
    Handle(String),
    /// `youtube.com/channel/UC...`
    ChannelId(String),
    /// `youtube.com/c/name` (legacy custom URL)
    Custom(String),
    /// `youtube.com/user/name` (legacy username)
    User(String),
}

impl ChannelRef {
    /// Parse a channel reference
    ///
    /// Accepts a bare `@handle` or an http(s) URL on `youtube.com` / `www.youtube.com` whose
    /// path starts with `/@handle`, `/channel/ID`, `/c/NAME` or `/user/NAME`. Anything after
    /// the name (e.g. `/videos`) is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use tubeshelf::source::ChannelRef;
    ///
    /// assert_eq!(
    ///     ChannelRef::parse("https://www.youtube.com/@SomeChannel/videos").unwrap(),
    ///     ChannelRef::Handle("SomeChannel".into())
    /// );
    /// assert!(ChannelRef::parse("https://example.com/@x").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = || SourceError::ChannelNotResolved(input.to_string());

        if let Some(handle) = input.strip_prefix('@') {
            return valid_name(handle)
                .map(|h| ChannelRef::Handle(h.to_string()))
                .ok_or_else(|| invalid().into());
        }

        let url = Url::parse(input).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid().into());
        }
        if !matches!(url.host_str(), Some("youtube.com" | "www.youtube.com")) {
            return Err(invalid().into());
        }

        let mut segments = url.path_segments().ok_or_else(invalid)?;
        let first = segments.next().unwrap_or_default();

        let parsed = if let Some(handle) = first.strip_prefix('@') {
            valid_name(handle).map(|h| ChannelRef::Handle(h.to_string()))
        } else {
            let name = segments.next().and_then(valid_name);
            match first {
                "channel" => name.map(|n| ChannelRef::ChannelId(n.to_string())),
                "c" => name.map(|n| ChannelRef::Custom(n.to_string())),
                "user" => name.map(|n| ChannelRef::User(n.to_string())),
                _ => None,
            }
        };

        parsed.ok_or_else(|| invalid().into())
    }

    /// The name or id carried by the reference
    pub fn name(&self) -> &str {
        match self {
            ChannelRef::Handle(n)
            | ChannelRef::ChannelId(n)
            | ChannelRef::Custom(n)
            | ChannelRef::User(n) => n,
        }
    }

    /// Public upload feed query for this channel, when one can be built without the API
    ///
    /// Channel ids starting with `UC` use `channel_id=`; handles and usernames use `user=`.
    /// Custom names need an id lookup first and return `None`.
    pub fn feed_query(&self) -> Option<String> {
        match self {
            ChannelRef::ChannelId(id) if id.starts_with("UC") => {
                Some(format!("channel_id={id}"))
            }
            ChannelRef::Handle(name) | ChannelRef::User(name) => Some(format!("user={name}")),
            ChannelRef::ChannelId(_) | ChannelRef::Custom(_) => None,
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Handle(n) => write!(f, "@{n}"),
            ChannelRef::ChannelId(id) => write!(f, "channel/{id}"),
            ChannelRef::Custom(n) => write!(f, "c/{n}"),
            ChannelRef::User(n) => write!(f, "user/{n}"),
        }
    }
}

impl std::str::FromStr for ChannelRef {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Non-empty run of word characters, `-` or `.`
fn valid_name(name: &str) -> Option<&str> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    ok.then_some(name)
}

/// Extract a video id from a watch URL (`watch?v=ID`, `youtu.be/ID`, `/shorts/ID`)
pub fn video_id_from_url(input: &str) -> Option<String> {
    let url = Url::parse(input.trim()).ok()?;
    let host = url.host_str()?;

    if host == "youtu.be" {
        return url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    if !(host == "youtube.com" || host.ends_with(".youtube.com")) {
        return None;
    }

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return (!v.is_empty()).then(|| v.into_owned());
    }

    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next()) {
        (Some("shorts" | "live" | "embed"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}
