//! Access levels and documentation status
//!
//! This module provides the two attributes that decide whether an entity
//! takes part in linking and in the index: its C++-style access level and
//! its documentation status.

/// Access level of a documented entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    /// Public member (available to users)
    #[default]
    Public,

    /// Protected member
    Protected,

    /// Private member; never linked to and never indexed
    Private,
}

impl Access {
    /// Check if this is publicly visible
    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public)
    }

    /// Get index/display string
    pub fn name(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }

    /// Parse an index attribute value; unknown values read as public
    pub fn from_name(name: &str) -> Self {
        match name {
            "protected" => Access::Protected,
            "private" => Access::Private,
            _ => Access::Public,
        }
    }
}

/// Documentation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Normal, documented entity
    #[default]
    Active,

    /// Subject to change
    Preliminary,

    /// Marked `\deprecated`
    Deprecated,

    /// Marked `\internal`
    Internal,

    /// Public in the API but deliberately left undocumented
    DontDocument,
}

impl Status {
    /// Get index/display string
    pub fn name(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Preliminary => "preliminary",
            Status::Deprecated => "deprecated",
            Status::Internal => "internal",
            Status::DontDocument => "ignored",
        }
    }

    /// Parse an index attribute value. `obsolete` is the older spelling of
    /// `deprecated`; unknown values read as active.
    pub fn from_name(name: &str) -> Self {
        match name {
            "preliminary" => Status::Preliminary,
            "deprecated" | "obsolete" => Status::Deprecated,
            "internal" => Status::Internal,
            "ignored" => Status::DontDocument,
            _ => Status::Active,
        }
    }

    /// Check if this should be included in documentation
    pub fn should_document(&self) -> bool {
        !matches!(self, Status::Internal | Status::DontDocument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access() {
        assert!(Access::Public.is_public());
        assert!(!Access::Private.is_public());
        assert_eq!(Access::from_name(Access::Protected.name()), Access::Protected);
        assert_eq!(Access::from_name("bogus"), Access::Public);
    }

    #[test]
    fn test_status() {
        for status in [
            Status::Active,
            Status::Preliminary,
            Status::Deprecated,
            Status::Internal,
            Status::DontDocument,
        ] {
            assert_eq!(Status::from_name(status.name()), status);
        }
        assert_eq!(Status::from_name("obsolete"), Status::Deprecated);
        assert!(!Status::Internal.should_document());
        assert!(Status::Deprecated.should_document());
    }
}
