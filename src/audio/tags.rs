//! Display metadata read from track tags.

use serde::Serialize;
use symphonia::core::meta::{MetadataRevision, StandardTagKey};

/// Best-effort display metadata. Playback never depends on any of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl TrackTags {
    /// Merges the tags of one metadata revision. Fields that are already set win,
    /// so the first source applied takes precedence.
    pub fn apply_revision(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let Some(key) = tag.std_key else { continue };
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                StandardTagKey::TrackTitle => fill_text(&mut self.title, value),
                StandardTagKey::Artist => fill_text(&mut self.artist, value),
                StandardTagKey::Album => fill_text(&mut self.album, value),
                StandardTagKey::AlbumArtist => fill_text(&mut self.album_artist, value),
                StandardTagKey::Composer => fill_text(&mut self.composer, value),
                StandardTagKey::Genre => fill_text(&mut self.genre, value),
                StandardTagKey::Comment => fill_text(&mut self.comment, value),
                StandardTagKey::Lyrics => fill_text(&mut self.lyrics, value),
                StandardTagKey::Date | StandardTagKey::ReleaseDate | StandardTagKey::OriginalDate => {
                    if self.year.is_none() {
                        self.year = parse_year(value);
                    }
                }
                StandardTagKey::TrackNumber => {
                    fill_position(&mut self.track_number, &mut self.track_total, value)
                }
                StandardTagKey::TrackTotal => fill_number(&mut self.track_total, value),
                StandardTagKey::DiscNumber => {
                    fill_position(&mut self.disc_number, &mut self.disc_total, value)
                }
                StandardTagKey::DiscTotal => fill_number(&mut self.disc_total, value),
                _ => {}
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn fill_text(field: &mut Option<String>, value: &str) {
    if field.is_none() {
        *field = Some(value.to_string());
    }
}

fn fill_number(field: &mut Option<u32>, value: &str) {
    if field.is_none() {
        *field = value.trim().parse().ok();
    }
}

/// Handles both plain numbers and the `3/12` position form used by ID3.
fn fill_position(number: &mut Option<u32>, total: &mut Option<u32>, value: &str) {
    let (head, tail) = match value.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (value, None),
    };
    fill_number(number, head);
    if let Some(tail) = tail {
        fill_number(total, tail);
    }
}

fn parse_year(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}
