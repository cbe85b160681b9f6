//! Serde model of the thread JSON document.

use scraper::Html;
use serde::Deserialize;

use crate::checksum::{decode_md5, Md5Digest};

/// One post. Only the fields the downloader needs; everything else is ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub no: u64,
    /// Subject (OP only, optional).
    #[serde(default)]
    pub sub: Option<String>,
    /// Comment HTML.
    #[serde(default)]
    pub com: Option<String>,
    /// Server-side file stem (upload timestamp in ms).
    #[serde(default)]
    pub tim: Option<u64>,
    /// File extension including the dot.
    #[serde(default)]
    pub ext: Option<String>,
    /// Original upload name without extension.
    #[serde(default)]
    pub filename: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub fsize: Option<u64>,
    /// Base64 MD5 of the file.
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub filedeleted: u8,
}

impl Post {
    /// The attached file as `(tim, ext)`, when there is one that can be fetched.
    pub fn attachment(&self) -> Option<(u64, &str)> {
        if self.filedeleted != 0 {
            return None;
        }
        let tim = self.tim?;
        let ext = self.ext.as_deref()?;
        Some((tim, ext))
    }

    /// Decoded file digest; `None` when absent or malformed.
    pub fn md5_digest(&self) -> Option<Md5Digest> {
        self.md5.as_deref().and_then(decode_md5)
    }

    /// Subject if present, else comment, as plain text.
    pub fn description(&self) -> Option<String> {
        [self.sub.as_deref(), self.com.as_deref()]
            .into_iter()
            .flatten()
            .map(html_to_text)
            .find(|s| !s.is_empty())
    }
}

/// Flattens comment HTML to text: tags dropped, entities decoded, whitespace
/// collapsed. Adjacent text nodes are joined with a space so `<br>` still
/// separates words.
pub(crate) fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let joined = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
