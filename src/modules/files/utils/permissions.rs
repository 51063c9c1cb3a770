//! Requested mode and ownership of managed files

use crate::channel::FileAttributes;

/// Mode and ownership a file module enforces on its destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePermissions {
    pub mode: Option<u32>,
    /// User name or numeric uid
    pub owner: Option<String>,
    /// Group name or numeric gid
    pub group: Option<String>,
}

impl FilePermissions {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.owner.is_none() && self.group.is_none()
    }

    /// Whether any requested attribute differs from `current`
    pub fn differs_from(&self, current: &FileAttributes) -> bool {
        self.mode.is_some_and(|mode| mode != current.mode)
            || self.owner.as_deref().is_some_and(|owner| !current.owned_by(owner))
            || self.group.as_deref().is_some_and(|group| !current.in_group(group))
    }
}

/// Octal permission bits such as `0644`, `755` or `0o600`
pub fn parse_mode(value: &str) -> Option<u32> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(8)) {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}
