use std::collections::HashSet;

use crate::model::attachment::{PreviewUrl, random_suffix, unix_millis};

/// Owner of the `blob:` preview handles created for staged files.
///
/// A handle stays live from [`create`](Self::create) until
/// [`revoke`](Self::revoke). `data:` previews are not tracked.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashSet<PreviewUrl>,
}

impl PreviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> PreviewUrl {
        loop {
            let url = PreviewUrl::new(format!(
                "blob:helpdesk/{}-{}",
                unix_millis(),
                random_suffix(12)
            ));
            if self.live.insert(url.clone()) {
                return url;
            }
        }
    }

    /// Release a handle. Returns false for untracked or already revoked URLs.
    pub fn revoke(&mut self, url: &PreviewUrl) -> bool {
        url.is_object_url() && self.live.remove(url)
    }

    #[must_use]
    pub fn is_live(&self, url: &PreviewUrl) -> bool {
        self.live.contains(url)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Revoke every handle, returning how many were live.
    pub fn revoke_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_revoke() {
        let mut registry = PreviewRegistry::new();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a, b);
        assert!(a.is_object_url());
        assert_eq!(registry.live_count(), 2);

        assert!(registry.revoke(&a));
        assert!(!registry.revoke(&a));
        assert!(!registry.is_live(&a));
        assert!(registry.is_live(&b));
    }

    #[test]
    fn data_urls_are_not_tracked() {
        let mut registry = PreviewRegistry::new();
        let inline = PreviewUrl::new("data:image/png;base64,AAAA");
        assert!(!registry.revoke(&inline));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn revoke_all_empties_registry() {
        let mut registry = PreviewRegistry::new();
        registry.create();
        registry.create();
        assert_eq!(registry.revoke_all(), 2);
        assert_eq!(registry.live_count(), 0);
    }
}
