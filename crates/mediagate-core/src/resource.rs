//! Mapping between web media resources and OS permissions.
//!
//! The embedded web layer speaks in media resources ("video-capture"), the
//! host OS in permissions ("android.permission.CAMERA"). Every resource is
//! backed by exactly one permission; a permission may back several resources.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// Media capability requested by embedded web content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaResource {
    /// Camera stream.
    VideoCapture,
    /// Microphone stream.
    AudioCapture,
}

impl MediaResource {
    /// All supported resources.
    pub const ALL: [Self; 2] = [Self::VideoCapture, Self::AudioCapture];

    /// Canonical web identifier.
    pub const fn web_id(self) -> &'static str {
        match self {
            Self::VideoCapture => "video-capture",
            Self::AudioCapture => "audio-capture",
        }
    }

    /// Parse a web identifier, accepting the WebKit resource aliases.
    ///
    /// Returns `None` for anything this bridge does not support.
    pub fn from_web_id(id: &str) -> Option<Self> {
        match id {
            "video-capture" | "android.webkit.resource.VIDEO_CAPTURE" => Some(Self::VideoCapture),
            "audio-capture" | "android.webkit.resource.AUDIO_CAPTURE" => Some(Self::AudioCapture),
            _ => None,
        }
    }

    /// The OS permission backing this resource.
    pub const fn os_permission(self) -> OsPermission {
        match self {
            Self::VideoCapture => OsPermission::Camera,
            Self::AudioCapture => OsPermission::Microphone,
        }
    }
}

impl fmt::Display for MediaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.web_id())
    }
}

/// Host OS permission grant unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsPermission {
    Camera,
    Microphone,
}

impl OsPermission {
    /// All known permissions.
    pub const ALL: [Self; 2] = [Self::Camera, Self::Microphone];

    /// Platform permission name as reported by the OS.
    pub const fn platform_name(self) -> &'static str {
        match self {
            Self::Camera => "android.permission.CAMERA",
            Self::Microphone => "android.permission.RECORD_AUDIO",
        }
    }

    /// Short name used in config files and on the command line.
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
        }
    }

    /// Look up a permission by its platform name.
    pub fn from_platform_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.platform_name() == name)
    }
}

impl fmt::Display for OsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for OsPermission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.short_name().eq_ignore_ascii_case(s) || p.platform_name() == s)
            .ok_or_else(|| Error::UnknownPermission(s.to_string()))
    }
}

/// OS permissions needed to satisfy a set of media resources.
pub fn os_permissions_for(resources: &BTreeSet<MediaResource>) -> BTreeSet<OsPermission> {
    resources.iter().map(|r| r.os_permission()).collect()
}

/// Subset of `resources` whose backing permission is in `granted_os`.
///
/// Turns an OS-level partial grant back into a web-level partial grant.
pub fn media_resources_granted(
    resources: &BTreeSet<MediaResource>,
    granted_os: &BTreeSet<OsPermission>,
) -> BTreeSet<MediaResource> {
    resources
        .iter()
        .copied()
        .filter(|r| granted_os.contains(&r.os_permission()))
        .collect()
}

/// Parse web identifiers, dropping the ones this bridge does not support.
pub fn parse_web_resources<S: AsRef<str>>(ids: &[S]) -> BTreeSet<MediaResource> {
    ids.iter()
        .filter_map(|id| {
            let id = id.as_ref();
            let parsed = MediaResource::from_web_id(id);
            if parsed.is_none() {
                debug!(resource = id, "Dropping unsupported media resource");
            }
            parsed
        })
        .collect()
}
