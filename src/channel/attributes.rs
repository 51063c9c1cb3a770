//! Mode and ownership of paths on the target

use serde::{Deserialize, Serialize};

/// Permission bits and ownership of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Permission bits including setuid, setgid and sticky
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Owner name, when the target can resolve `uid`
    pub owner: Option<String>,
    /// Group name, when the target can resolve `gid`
    pub group: Option<String>,
}

impl FileAttributes {
    /// Whether `owner` names the owning user, by name or numeric id
    pub fn owned_by(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner) || owner.parse::<u32>().ok() == Some(self.uid)
    }

    /// Whether `group` names the owning group, by name or numeric id
    pub fn in_group(&self, group: &str) -> bool {
        self.group.as_deref() == Some(group) || group.parse::<u32>().ok() == Some(self.gid)
    }

    /// POSIX one-liner listing `path` with numeric ids, then with names.
    /// Parsed by [`FileAttributes::from_ls_output`].
    pub fn ls_script(path: &str) -> String {
        let q = shell_words::quote(path);
        format!("ls -nd {q} && ls -ld {q}")
    }

    pub fn from_ls_output(output: &str) -> Result<Self, String> {
        let unexpected = || format!("Unexpected ls output: {}", output.trim());

        let mut lines = output.lines();
        let (Some(numeric), Some(named)) = (lines.next(), lines.next()) else {
            return Err(unexpected());
        };
        let numeric: Vec<&str> = numeric.split_whitespace().collect();
        let named: Vec<&str> = named.split_whitespace().collect();
        if numeric.len() < 4 || named.len() < 4 {
            return Err(unexpected());
        }

        Ok(Self {
            mode: parse_symbolic_mode(numeric[0]).ok_or_else(unexpected)?,
            uid: numeric[2].parse().map_err(|_| unexpected())?,
            gid: numeric[3].parse().map_err(|_| unexpected())?,
            owner: Some(named[2].to_string()),
            group: Some(named[3].to_string()),
        })
    }
}

/// Permission bits of an `ls -l` mode field such as `-rwsr-x--T`.
///
/// Trailing ACL or extended attribute markers (`+`, `@`, `.`) are ignored.
pub fn parse_symbolic_mode(field: &str) -> Option<u32> {
    let chars: Vec<char> = field.chars().collect();
    if chars.len() < 10 {
        return None;
    }

    let mut mode = 0;
    for (class, triplet) in chars[1..10].chunks(3).enumerate() {
        let shift = 6 - 3 * class as u32;
        let special = 0o4000 >> class;

        match triplet[0] {
            'r' => mode |= 0o4 << shift,
            '-' => {}
            _ => return None,
        }
        match triplet[1] {
            'w' => mode |= 0o2 << shift,
            '-' => {}
            _ => return None,
        }
        match (class, triplet[2]) {
            (_, 'x') => mode |= 0o1 << shift,
            (0 | 1, 's') | (2, 't') => mode |= (0o1 << shift) | special,
            (0 | 1, 'S') | (2, 'T') => mode |= special,
            (_, '-') => {}
            _ => return None,
        }
    }

    Some(mode)
}
