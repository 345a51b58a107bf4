use std::{fmt, str::FromStr, sync::LazyLock};

use getset::Getters;
use regex::Regex;

use crate::ConfigError;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static REGISTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?(?::[0-9]+)?$").unwrap()
});

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$")
        .unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w[\w.-]{0,127}$").unwrap());

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*:[a-zA-Z0-9=_-]{32,}$").unwrap()
});

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A container image reference as understood by the container engine.
///
/// Supported formats include:
/// - "repository"
/// - "repository:tag"
/// - "registry/repository:tag"
/// - "registry:port/repository@algorithm:digest"
///
/// Unlike a fully-qualified OCI reference, no default registry or tag is filled in; the
/// reference is handed to the engine exactly as given, and names output files as given.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ImageRef {
    /// The reference as given, trimmed.
    raw: String,

    /// The registry host, if the reference names one.
    registry: Option<String>,

    /// The repository path.
    repository: String,

    /// The tag, if any.
    tag: Option<String>,

    /// The digest, if any.
    digest: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageRef {
    /// Returns a file name stem derived from the reference.
    ///
    /// ## Examples
    ///
    /// ```
    /// use flatimg::config::ImageRef;
    ///
    /// let image: ImageRef = "ghcr.io/acme/base:1.0".parse().unwrap();
    /// assert_eq!(image.file_stem(), "ghcr.io_acme_base:1.0");
    /// ```
    pub fn file_stem(&self) -> String {
        flatutils::sanitize_name_for_path(&self.raw)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for ImageRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = |reason: String| ConfigError::InvalidImageReference {
            reference: s.to_string(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("reference is empty".into()));
        }

        let (name_and_tag, digest) = match raw.split_once('@') {
            Some((name, digest)) => {
                if !DIGEST_RE.is_match(digest) {
                    return Err(invalid(format!("invalid digest: {digest}")));
                }
                (name, Some(digest.to_string()))
            }
            None => (raw, None),
        };

        // A ':' only starts a tag when it comes after the last '/', otherwise it is a port.
        let (name, tag) = match name_and_tag.rfind(':') {
            Some(idx) if !name_and_tag[idx..].contains('/') => (
                &name_and_tag[..idx],
                Some(name_and_tag[idx + 1..].to_string()),
            ),
            _ => (name_and_tag, None),
        };

        let (registry, repository) = extract_registry(name);

        if let Some(registry) = &registry {
            if !REGISTRY_RE.is_match(registry) {
                return Err(invalid(format!("invalid registry: {registry}")));
            }
        }

        if !REPOSITORY_RE.is_match(repository) {
            return Err(invalid(format!("invalid repository: {repository}")));
        }

        if let Some(tag) = &tag {
            if !TAG_RE.is_match(tag) {
                return Err(invalid(format!("invalid tag: {tag}")));
            }
        }

        Ok(ImageRef {
            raw: raw.to_string(),
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Splits a leading registry host off the name, if the first segment looks like one.
fn extract_registry(name: &str) -> (Option<String>, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first.to_string()), rest)
        }
        _ => (None, name),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
