//! Audio data plane: ICY framing, the metadata registry, the fan-out
//! broadcaster, the source ingester, and the playlist fallback feeder.

pub mod broadcaster;
pub mod icy;
pub mod metadata;
pub mod playlist;
pub mod source;

/// Now-playing metadata snapshot, shared between the source/playlist feeders
/// (writers) and the ICY injector and status endpoint (readers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl StreamMetadata {
    /// Formats as Icecast's conventional `artist - title` display string, or
    /// `None` if neither field is set.
    #[must_use]
    pub fn display(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{artist} - {title}")),
            (None, Some(title)) => Some(title.clone()),
            (Some(artist), None) => Some(artist.clone()),
            (None, None) => None,
        }
    }
}
