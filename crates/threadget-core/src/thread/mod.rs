//! Imageboard thread: URL parsing, JSON document, descriptor extraction.
//!
//! Extraction is pure and deterministic; the only network I/O here is
//! `fetch_thread_json`.

mod fetch;
mod model;
mod url;

pub use fetch::{fetch_thread_json, save_thread_json, THREAD_JSON_NAME};
pub use model::Post;
pub use url::ThreadUrl;

use serde::Deserialize;
use serde_json::Value;

use crate::descriptor::Descriptor;
use crate::url_model::sanitize_filename;

/// Longest description kept in a thread directory name, in characters.
const DESCRIPTION_CHARS: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("not a thread URL: {0:?}")]
    MalformedUrl(String),
    #[error("thread not found (404): {0}")]
    NotFound(String),
    #[error("{url}: HTTP {status}")]
    Http { url: String, status: u32 },
    #[error("fetch thread: {0}")]
    Transport(#[source] curl::Error),
    #[error("malformed thread JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("thread has no posts")]
    NoPosts,
    #[error("{0}")]
    Io(#[source] std::io::Error),
}

#[derive(Deserialize)]
struct Document {
    posts: Vec<Value>,
}

/// A fetched thread: its posts plus the raw document for the snapshot.
#[derive(Debug, Clone)]
pub struct Thread {
    url: ThreadUrl,
    posts: Vec<Post>,
    raw: Value,
}

impl Thread {
    /// Parses the thread JSON. The document must be an object with a
    /// non-empty `posts` array; individual posts that do not decode are
    /// skipped with a warning.
    pub fn from_json(url: ThreadUrl, json: &[u8]) -> Result<Self, ThreadError> {
        let raw: Value = serde_json::from_slice(json).map_err(ThreadError::Json)?;
        let doc = Document::deserialize(&raw).map_err(ThreadError::Json)?;
        let mut posts = Vec::with_capacity(doc.posts.len());
        for (i, value) in doc.posts.into_iter().enumerate() {
            match serde_json::from_value::<Post>(value) {
                Ok(post) => posts.push(post),
                Err(e) => tracing::warn!(thread = %url, index = i, error = %e, "skipping malformed post"),
            }
        }
        if posts.is_empty() {
            return Err(ThreadError::NoPosts);
        }
        Ok(Self { url, posts, raw })
    }

    pub fn url(&self) -> &ThreadUrl {
        &self.url
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Opening post (never absent: construction requires one post).
    pub fn op(&self) -> &Post {
        &self.posts[0]
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// `4chan - <board> - <op no>[ - <description>]`, sanitized.
    pub fn dir_name(&self) -> String {
        thread_dir_name(self.url.board(), self.op().no, self.op().description().as_deref())
    }

    /// One descriptor per post with a fetchable file, in post order.
    ///
    /// The target name is `<tim> - <uploader's file name><ext>`, sanitized,
    /// or `<tim><ext>` when the post has no usable file name. Names may still
    /// collide; the orchestrator resolves that before scheduling.
    pub fn descriptors(&self, media_base: &str) -> Vec<Descriptor> {
        self.posts
            .iter()
            .filter_map(|post| self.descriptor_for(post, media_base))
            .collect()
    }

    fn descriptor_for(&self, post: &Post, media_base: &str) -> Option<Descriptor> {
        let (tim, ext) = post.attachment()?;
        if !is_extension(ext) {
            tracing::warn!(post = post.no, ext, "skipping file with odd extension");
            return None;
        }
        let name = post
            .filename
            .as_deref()
            .filter(|stem| !stem.trim_matches([' ', '.']).is_empty())
            .map(|stem| sanitize_filename(&format!("{} - {}{}", tim, stem, ext)))
            .unwrap_or_else(|| format!("{}{}", tim, ext));
        let source_url = self.url.media_url(media_base, tim, ext);
        match Descriptor::new(source_url, name, self.url.thread_id(), post.fsize) {
            Ok(d) => Some(match post.md5_digest() {
                Some(digest) => d.with_md5(digest),
                None => d,
            }),
            Err(e) => {
                tracing::warn!(post = post.no, error = %e, "skipping file");
                None
            }
        }
    }
}

/// Parses `json` and returns its descriptors. No network I/O.
pub fn extract(
    json: &[u8],
    url: &ThreadUrl,
    media_base: &str,
) -> Result<Vec<Descriptor>, ThreadError> {
    Ok(Thread::from_json(url.clone(), json)?.descriptors(media_base))
}

/// Directory name for a thread: `4chan - <board> - <op no>[ - <description>]`
/// with the description cut to 80 characters and the whole name sanitized.
pub fn thread_dir_name(board: &str, op_no: u64, description: Option<&str>) -> String {
    let mut name = format!("4chan - {} - {}", board, op_no);
    if let Some(desc) = description {
        let desc: String = desc.chars().take(DESCRIPTION_CHARS).collect();
        let desc = desc.trim();
        if !desc.is_empty() {
            name.push_str(" - ");
            name.push_str(desc);
        }
    }
    sanitize_filename(&name)
}

fn is_extension(ext: &str) -> bool {
    ext.len() > 1
        && ext.len() <= 16
        && ext.starts_with('.')
        && ext[1..].chars().all(|c| c.is_ascii_alphanumeric())
}
