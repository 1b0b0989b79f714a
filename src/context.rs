//! Explicit per-request session context.
//!
//! Every operation that depends on who is acting takes a [`RequestContext`]
//! argument instead of reading process-wide session state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

pub const ADMINISTRATOR: &str = "Administrator";
pub const GUEST: &str = "Guest";

pub const STUDIO_APP: &str = "Studio App";
pub const STUDIO_PAGE: &str = "Studio Page";
pub const STUDIO_RESOURCE: &str = "Studio Resource";
pub const STUDIO_PAGE_VARIABLE: &str = "Studio Page Variable";
pub const STUDIO_PAGE_WATCHER: &str = "Studio Page Watcher";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    Read,
    Write,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }
}

/// The acting principal and site for one request or command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user: String,
    pub site: String,
    grants: HashSet<(String, PermissionType)>,
}

impl RequestContext {
    pub fn new(user: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            site: site.into(),
            grants: HashSet::new(),
        }
    }

    /// The superuser context used by CLI commands.
    pub fn administrator(site: impl Into<String>) -> Self {
        Self::new(ADMINISTRATOR, site)
    }

    pub fn guest(site: impl Into<String>) -> Self {
        Self::new(GUEST, site)
    }

    pub fn grant(mut self, doctype: impl Into<String>, ptype: PermissionType) -> Self {
        self.grants.insert((doctype.into(), ptype));
        self
    }

    /// Parses a grant list like `Studio App:write, Studio Page:write`.
    ///
    /// Entries that do not parse are skipped. A write grant implies read.
    pub fn with_grant_list(mut self, list: &str) -> Self {
        for entry in list.split(',') {
            let Some((doctype, ptype)) = entry.trim().rsplit_once(':') else {
                continue;
            };
            let Some(ptype) = PermissionType::from_str(ptype.trim()) else {
                continue;
            };
            let doctype = doctype.trim();
            if doctype.is_empty() {
                continue;
            }
            if ptype == PermissionType::Write {
                self.grants.insert((doctype.to_string(), PermissionType::Read));
            }
            self.grants.insert((doctype.to_string(), ptype));
        }
        self
    }

    pub fn is_administrator(&self) -> bool {
        self.user == ADMINISTRATOR
    }

    pub fn has_permission(&self, doctype: &str, ptype: PermissionType) -> bool {
        self.is_administrator() || self.grants.contains(&(doctype.to_string(), ptype))
    }

    /// Fails with [`StudioError::PermissionDenied`] unless every doctype is granted.
    pub fn require(&self, doctypes: &[&str], ptype: PermissionType) -> Result<(), StudioError> {
        for doctype in doctypes {
            if !self.has_permission(doctype, ptype) {
                return Err(StudioError::PermissionDenied(format!(
                    "{} lacks {} access on {}",
                    self.user,
                    ptype.as_str(),
                    doctype
                )));
            }
        }
        Ok(())
    }

    /// Whether the user may edit Studio apps: write on both apps and pages.
    pub fn can_edit_apps(&self) -> bool {
        self.has_permission(STUDIO_APP, PermissionType::Write)
            && self.has_permission(STUDIO_PAGE, PermissionType::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_has_every_permission() {
        let ctx = RequestContext::administrator("site");
        assert!(ctx.can_edit_apps());
        assert!(ctx.has_permission("Anything", PermissionType::Write));
    }

    #[test]
    fn app_editing_needs_both_grants() {
        let ctx = RequestContext::new("jane@example.com", "site")
            .grant(STUDIO_APP, PermissionType::Write);
        assert!(!ctx.can_edit_apps());

        let ctx = ctx.grant(STUDIO_PAGE, PermissionType::Write);
        assert!(ctx.can_edit_apps());
    }

    #[test]
    fn parses_grant_lists() {
        let ctx = RequestContext::new("jane@example.com", "site")
            .with_grant_list("Studio App:write, Studio Page:write,bogus,:read,Studio Resource:admin");

        assert!(ctx.can_edit_apps());
        assert!(ctx.has_permission(STUDIO_PAGE, PermissionType::Read));
        assert!(!ctx.has_permission(STUDIO_RESOURCE, PermissionType::Read));
    }

    #[test]
    fn require_names_the_missing_doctype() {
        let ctx = RequestContext::guest("site");
        let err = ctx
            .require(&[STUDIO_APP, STUDIO_PAGE], PermissionType::Write)
            .unwrap_err();
        assert!(err.to_string().contains(STUDIO_APP));
    }
}
