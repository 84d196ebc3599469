//! Artist content shown inside the phone's apps.

use serde::{Deserialize, Serialize};
use tracing::warn;

const BUNDLED: &str = include_str!("../../assets/default_content.json");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ArtistContent {
    pub tracks: Vec<Track>,
    pub releases: Vec<Release>,
    pub photos: Vec<Photo>,
    pub messages: Vec<MessageSeed>,
    pub notes: Vec<NoteSeed>,
    pub collaborators: Vec<Collaborator>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub title: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Release {
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageSeed {
    pub from: String,
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoteSeed {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Collaborator {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ArtistContent {
    /// The content compiled into the binary. Used until (and unless) a remote
    /// bundle loads.
    pub fn bundled() -> Self {
        match serde_json::from_str(BUNDLED) {
            Ok(content) => content,
            Err(e) => {
                warn!("bundled artist content is malformed, using empty content: {e}");
                Self::default()
            }
        }
    }
}
