//! Admin IP allow-list.
//!
//! A flat set of addresses, independent of sessions. The file format is
//! one address per line; blank lines and `#` comments are ignored.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use tracing::{info, warn};

use crate::SessionError;

#[derive(Debug, Clone, Default)]
pub struct AdminList {
    ips: HashSet<IpAddr>,
}

impl AdminList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a list. Lines that are not IP addresses are skipped with a
    /// warning.
    pub fn load_from_str(text: &str) -> Self {
        let mut list = Self::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<IpAddr>() {
                Ok(ip) => {
                    list.ips.insert(ip);
                }
                Err(_) => warn!(line = n + 1, entry = line, "skipping invalid admin IP"),
            }
        }
        list
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let list = Self::load_from_str(&text);
        info!(path = %path.display(), count = list.len(), "admin list loaded");
        Ok(list)
    }

    /// Returns `false` if the address was already present.
    pub fn add(&mut self, ip: IpAddr) -> bool {
        self.ips.insert(ip)
    }

    /// Returns `false` if the address was not present.
    pub fn remove(&mut self, ip: &IpAddr) -> bool {
        self.ips.remove(ip)
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.ips.contains(ip)
    }

    pub fn clear(&mut self) {
        self.ips.clear();
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    /// Addresses in sorted order.
    pub fn to_vec(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.ips.iter().copied().collect();
        ips.sort();
        ips
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_str_skips_comments_blanks_and_garbage() {
        let list = AdminList::load_from_str(
            "# admins\n\n192.168.1.10\n  10.0.0.2  \nnot-an-ip\n::1\n",
        );
        assert_eq!(list.len(), 3);
        assert!(list.contains(&"10.0.0.2".parse().unwrap()));
        assert!(list.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn test_add_remove_report_change() {
        let mut list = AdminList::new();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(list.add(ip));
        assert!(!list.add(ip));
        assert!(list.remove(&ip));
        assert!(!list.remove(&ip));
        assert!(list.is_empty());
    }

    #[test]
    fn test_load_from_path_missing_file_is_error() {
        let result = AdminList::load_from_path("/nonexistent/boardcast/admins.txt");
        assert!(matches!(result, Err(SessionError::AdminList(_))));
    }
}
