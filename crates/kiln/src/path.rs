//! Component reference paths
//!
//! A reference has the shape
//! `[prefix]/components/<name>[/instances/<id>][.<ext>][@<version>]`, where
//! the prefix is usually a site host such as `example.com`.

use crate::error::PathError;
use std::fmt;
use std::str::FromStr;

/// Marker segment that introduces the component name
pub const COMPONENTS_SEGMENT: &str = "/components/";

/// Marker segment that introduces an instance id
pub const INSTANCES_SEGMENT: &str = "/instances/";

/// Pseudo-version used for listing; never a write target
pub const LIST_VERSION: &str = "list";

pub const LATEST_VERSION: &str = "latest";
pub const PUBLISHED_VERSION: &str = "published";

/// Labels moved along with a publish
const PUBLISH_BOOKKEEPING: &[VersionLabel] = &[VersionLabel::Latest];

/// Characters that may not appear in a tag name
const FORBIDDEN_TAG_CHARS: &[char] = &['/', '@', ' ', '\t', '\n', '\r'];

/// Extract the component name from a reference.
///
/// Strips a trailing slash, `.<ext>`, `@<version>` and everything from
/// `/instances/` onward. Unknown trailing segments (for example
/// `/components/name/schema`) are ignored as well.
///
/// ```
/// use kiln::path::get_name;
///
/// assert_eq!(get_name("/components/name/instances/id").unwrap(), "name");
/// assert_eq!(get_name("/components/name@published").unwrap(), "name");
/// assert!(get_name("/pages/home").is_err());
/// ```
pub fn get_name(reference: &str) -> Result<String, PathError> {
    let start = reference
        .find(COMPONENTS_SEGMENT)
        .ok_or_else(|| PathError::NotAComponent {
            reference: reference.to_string(),
        })?;

    let rest = &reference[start + COMPONENTS_SEGMENT.len()..];
    let end = rest.find(['/', '.', '@']).unwrap_or(rest.len());
    let name = &rest[..end];

    if name.is_empty() {
        return Err(PathError::invalid(reference, "empty component name"));
    }

    Ok(name.to_string())
}

/// The version label a write targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionLabel {
    /// The unversioned key; always holds the most recent write
    Latest,
    /// The publicly visible version
    Published,
    /// A user-supplied named snapshot
    Tag(String),
}

impl VersionLabel {
    /// Parse a version string as a write target.
    ///
    /// `list` is reserved and rejected.
    pub fn parse(version: &str) -> Result<Self, PathError> {
        match version {
            LATEST_VERSION => Ok(VersionLabel::Latest),
            PUBLISHED_VERSION => Ok(VersionLabel::Published),
            other => Self::tag(other),
        }
    }

    /// Build a tag label, validating the tag name
    pub fn tag(tag: &str) -> Result<Self, PathError> {
        validate_tag(tag)?;
        Ok(VersionLabel::Tag(tag.to_string()))
    }

    /// The label for an optional version segment; no version means latest
    pub fn for_write(version: Option<&str>) -> Result<Self, PathError> {
        version.map_or(Ok(VersionLabel::Latest), Self::parse)
    }

    pub fn as_str(&self) -> &str {
        match self {
            VersionLabel::Latest => LATEST_VERSION,
            VersionLabel::Published => PUBLISHED_VERSION,
            VersionLabel::Tag(tag) => tag.as_str(),
        }
    }

    /// Labels written alongside this one in the same batch.
    ///
    /// Publishing also moves latest.
    pub fn bookkeeping(&self) -> &'static [VersionLabel] {
        match self {
            VersionLabel::Published => PUBLISH_BOOKKEEPING,
            _ => &[],
        }
    }

    /// Whether writes under this label snapshot referenced data
    pub fn is_snapshot(&self) -> bool {
        !matches!(self, VersionLabel::Latest)
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_tag(tag: &str) -> Result<(), PathError> {
    if tag == LIST_VERSION {
        return Err(PathError::ReservedVersion {
            reference: tag.to_string(),
            version: tag.to_string(),
        });
    }

    if tag.is_empty() || tag.len() > 128 {
        return Err(PathError::InvalidTag {
            tag: tag.to_string(),
            reason: "Tag length must be 1-128 characters".to_string(),
        });
    }

    if let Some(ch) = tag.chars().find(|c| FORBIDDEN_TAG_CHARS.contains(c)) {
        return Err(PathError::InvalidTag {
            tag: tag.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }

    Ok(())
}

/// A parsed component reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentPath {
    /// Everything before `/components/`, e.g. a site host
    pub prefix: String,
    pub name: String,
    pub instance: Option<String>,
    pub extension: Option<String>,
    pub version: Option<String>,
}

impl ComponentPath {
    /// Parse a reference string strictly
    pub fn parse(reference: &str) -> Result<Self, PathError> {
        let start = reference
            .find(COMPONENTS_SEGMENT)
            .ok_or_else(|| PathError::NotAComponent {
                reference: reference.to_string(),
            })?;

        let prefix = &reference[..start];
        let rest = reference[start + COMPONENTS_SEGMENT.len()..].trim_end_matches('/');

        let (rest, version) = match rest.split_once('@') {
            Some((_, "")) => return Err(PathError::invalid(reference, "empty version")),
            Some((rest, version)) => (rest, Some(version.to_string())),
            None => (rest, None),
        };

        // The extension can only live on the last segment
        let last_segment = rest.rfind('/').map_or(0, |i| i + 1);
        let (rest, extension) = match rest[last_segment..].find('.') {
            Some(dot) => {
                let ext = &rest[last_segment + dot + 1..];
                if ext.is_empty() {
                    return Err(PathError::invalid(reference, "empty extension"));
                }
                (&rest[..last_segment + dot], Some(ext.to_string()))
            }
            None => (rest, None),
        };

        let (name, instance) = match rest.split_once(INSTANCES_SEGMENT) {
            Some((name, id)) => (name, Some(id)),
            None => (rest, None),
        };

        if name.is_empty() {
            return Err(PathError::invalid(reference, "empty component name"));
        }
        if name.contains('/') {
            return Err(PathError::invalid(
                reference,
                format!("unexpected segment after component name: {name}"),
            ));
        }
        if let Some(id) = instance {
            if id.is_empty() || id.contains('/') {
                return Err(PathError::invalid(reference, "invalid instance id"));
            }
        }

        Ok(ComponentPath {
            prefix: prefix.to_string(),
            name: name.to_string(),
            instance: instance.map(str::to_string),
            extension,
            version,
        })
    }

    /// The unversioned key: `<prefix>/components/<name>[/instances/<id>]`
    pub fn base(&self) -> String {
        let mut key = format!("{}{}{}", self.prefix, COMPONENTS_SEGMENT, self.name);
        if let Some(ref id) = self.instance {
            key.push_str(INSTANCES_SEGMENT);
            key.push_str(id);
        }
        key
    }

    /// The key a read of this reference targets
    pub fn store_key(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{}", self.base(), version),
            None => self.base(),
        }
    }

    /// The key this component is stored under for `label`
    pub fn key_for(&self, label: &VersionLabel) -> String {
        match label {
            VersionLabel::Latest => self.base(),
            other => format!("{}@{}", self.base(), other),
        }
    }

    /// The write target named by this reference's version segment
    pub fn write_label(&self) -> Result<VersionLabel, PathError> {
        VersionLabel::for_write(self.version.as_deref()).map_err(|e| match e {
            PathError::ReservedVersion { version, .. } => PathError::ReservedVersion {
                reference: self.to_string(),
                version,
            },
            other => other,
        })
    }

    pub fn is_instance(&self) -> bool {
        self.instance.is_some()
    }
}

impl FromStr for ComponentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base())?;
        if let Some(ref ext) = self.extension {
            write!(f, ".{ext}")?;
        }
        if let Some(ref version) = self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}
