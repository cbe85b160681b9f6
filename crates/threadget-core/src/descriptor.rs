//! Descriptor: one remote media file to materialize in the target directory.

use serde::Serialize;
use std::fmt;

use crate::checksum::Md5Digest;

/// Reason a descriptor was rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("target name is empty")]
    EmptyTargetName,
    #[error("target name {0:?} is not a plain file name")]
    NotAFileName(String),
}

/// Immutable record identifying one remote file.
///
/// `target_name` is a bare file name (no separators, not `.`/`..`) so joining
/// it onto the target directory can never escape it. The source URL is kept
/// verbatim; a malformed URL surfaces as a permanent fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    source_url: String,
    target_name: String,
    thread_id: u64,
    expected_size: Option<u64>,
    expected_md5: Option<Md5Digest>,
}

impl Descriptor {
    pub fn new(
        source_url: impl Into<String>,
        target_name: impl Into<String>,
        thread_id: u64,
        expected_size: Option<u64>,
    ) -> Result<Self, DescriptorError> {
        let target_name = target_name.into();
        validate_target_name(&target_name)?;
        Ok(Self {
            source_url: source_url.into(),
            target_name,
            thread_id,
            expected_size,
            expected_md5: None,
        })
    }

    /// Attaches the content digest announced by the thread metadata.
    pub fn with_md5(mut self, digest: Md5Digest) -> Self {
        self.expected_md5 = Some(digest);
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Size in bytes announced by the thread metadata, if any.
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    pub fn expected_md5(&self) -> Option<&Md5Digest> {
        self.expected_md5.as_ref()
    }

    /// Copy of this descriptor under another (already validated) name.
    /// Used by collision resolution before scheduling.
    pub(crate) fn renamed(&self, target_name: String) -> Self {
        Self {
            target_name,
            ..self.clone()
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.target_name, self.source_url)
    }
}

fn validate_target_name(name: &str) -> Result<(), DescriptorError> {
    if name.is_empty() {
        return Err(DescriptorError::EmptyTargetName);
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(DescriptorError::NotAFileName(name.to_string()));
    }
    Ok(())
}
