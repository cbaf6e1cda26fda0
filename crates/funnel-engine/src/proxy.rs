//! Per-run egress identity pool.
//!
//! Pool and used-set live for exactly one run. An identity whose
//! attempt failed session-fatally is marked used and never handed out
//! again within the run; once every identity is used the pool reports
//! exhaustion, unless the reuse policy is on, in which case it starts
//! over from the full pool.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use cartprobe_core_types::EgressIdentity;

pub struct IdentityPool {
    /// Candidate proxy endpoints; `None` is the direct connection.
    proxies: Vec<Option<String>>,
    user_agents: Vec<String>,
    used: HashSet<Option<String>>,
    reuse_on_exhaustion: bool,
}

impl IdentityPool {
    pub fn new(proxies: &[String], user_agents: &[String], reuse_on_exhaustion: bool) -> Self {
        let proxies = if proxies.is_empty() {
            vec![None]
        } else {
            proxies.iter().cloned().map(Some).collect()
        };
        Self {
            proxies,
            user_agents: user_agents.to_vec(),
            used: HashSet::new(),
            reuse_on_exhaustion,
        }
    }

    pub fn size(&self) -> usize {
        self.proxies.len()
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.used.len() >= self.proxies.len()
    }

    /// Next identity to attempt with: an unused proxy paired with a
    /// random user agent. `None` means the pool is exhausted and reuse
    /// is off.
    pub fn next_identity(&mut self) -> Option<EgressIdentity> {
        let mut rng = rand::thread_rng();
        let proxy = match self
            .proxies
            .iter()
            .find(|proxy| !self.used.contains(*proxy))
        {
            Some(proxy) => proxy.clone(),
            None if self.reuse_on_exhaustion => {
                self.proxies[rng.gen_range(0..self.proxies.len())].clone()
            }
            None => return None,
        };
        Some(EgressIdentity {
            proxy,
            user_agent: self
                .user_agents
                .choose(&mut rng)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Mark an identity's proxy as burned for this run.
    pub fn mark_used(&mut self, identity: &EgressIdentity) {
        self.used.insert(identity.proxy.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<String> {
        vec!["UA/1.0".into()]
    }

    #[test]
    fn empty_proxy_list_means_one_direct_identity() {
        let mut pool = IdentityPool::new(&[], &agents(), false);
        assert_eq!(pool.size(), 1);
        let identity = pool.next_identity().unwrap();
        assert!(identity.proxy.is_none());
        pool.mark_used(&identity);
        assert!(pool.is_exhausted());
        assert!(pool.next_identity().is_none());
    }

    #[test]
    fn burned_identities_are_not_reissued() {
        let proxies = vec!["http://p1:3128".to_string(), "http://p2:3128".to_string()];
        let mut pool = IdentityPool::new(&proxies, &agents(), false);

        let first = pool.next_identity().unwrap();
        pool.mark_used(&first);
        let second = pool.next_identity().unwrap();
        assert_ne!(first.proxy, second.proxy);
        pool.mark_used(&second);
        assert!(pool.next_identity().is_none());
    }

    #[test]
    fn reuse_policy_survives_exhaustion() {
        let proxies = vec!["http://p1:3128".to_string()];
        let mut pool = IdentityPool::new(&proxies, &agents(), true);
        let identity = pool.next_identity().unwrap();
        pool.mark_used(&identity);
        assert!(pool.is_exhausted());
        // Reuse is on: the pool keeps serving from the full set.
        assert!(pool.next_identity().is_some());
    }
}
