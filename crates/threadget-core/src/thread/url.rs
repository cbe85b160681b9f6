//! Thread page URLs and the JSON API endpoint derived from them.

use std::fmt;
use ::url::Url;

use super::ThreadError;

/// A board + thread number pair, parsed from a thread page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUrl {
    board: String,
    thread_id: u64,
}

const HOSTS: [&str; 2] = ["4chan.org", "4channel.org"];

impl ThreadUrl {
    pub fn new(board: impl Into<String>, thread_id: u64) -> Self {
        Self {
            board: board.into(),
            thread_id,
        }
    }

    /// Parses `https://boards.4chan.org/<board>/thread/<id>[/slug][#anchor]`.
    /// `4channel.org` hosts and the legacy `/res/` path are accepted too.
    pub fn parse(input: &str) -> Result<Self, ThreadError> {
        let malformed = || ThreadError::MalformedUrl(input.to_string());
        let url = Url::parse(input.trim()).map_err(|_| malformed())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(malformed());
        }
        let host = url.host_str().ok_or_else(malformed)?;
        let known = HOSTS
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{}", h)));
        if !known {
            return Err(malformed());
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [board, "thread" | "res", id, ..] if is_board_name(board) => {
                let id = id.trim_end_matches(".html");
                let thread_id = id.parse::<u64>().map_err(|_| malformed())?;
                Ok(Self::new(*board, thread_id))
            }
            _ => Err(malformed()),
        }
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// `<api_base>/<board>/thread/<id>.json`
    pub fn api_endpoint(&self, api_base: &str) -> String {
        format!(
            "{}/{}/thread/{}.json",
            api_base.trim_end_matches('/'),
            self.board,
            self.thread_id
        )
    }

    /// `<media_base>/<board>/<tim><ext>`
    pub fn media_url(&self, media_base: &str, tim: u64, ext: &str) -> String {
        format!("{}/{}/{}{}", media_base.trim_end_matches('/'), self.board, tim, ext)
    }
}

impl fmt::Display for ThreadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.board, self.thread_id)
    }
}

fn is_board_name(s: &str) -> bool {
    !s.is_empty() && s.len() <= 16 && s.chars().all(|c| c.is_ascii_alphanumeric())
}
