//! Network identities and per-network chain-id metadata.
//!
//! Fetching the live chain id belongs to the transport layer. This module
//! only carries the declared per-network defaults and a cache for values the
//! transport has already fetched, so the data model stays free of I/O.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::encoding::{CanonicalDeserialize, CanonicalSerialize, Decoder};
use crate::error::SextantError;

/// Numeric chain identifier mixed into every signing message via the
/// transaction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u8);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CanonicalSerialize for ChainId {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.canonical_serialize(writer)
    }
}

impl CanonicalDeserialize for ChainId {
    fn canonical_deserialize(decoder: &mut Decoder<'_>) -> Result<Self, SextantError> {
        Ok(ChainId(decoder.read_u8()?))
    }
}

/// The networks a client can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Local,
}

impl Network {
    /// Declared fallback chain ids, used only when no fetched value is
    /// available. Devnet rotates its id on redeploy, so the default there is
    /// a last resort.
    pub const fn default_chain_id(&self) -> ChainId {
        match self {
            Network::Mainnet => ChainId(1),
            Network::Testnet => ChainId(2),
            Network::Devnet => ChainId(3),
            Network::Local => ChainId(4),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Local => "local",
        };
        write!(f, "{}", name)
    }
}

/// Memoized chain ids keyed by network. Concurrent readers are fine; a
/// redundant store after a racy cache miss is benign.
#[derive(Default)]
pub struct ChainIdCache {
    inner: RwLock<HashMap<Network, ChainId>>,
}

impl ChainIdCache {
    pub fn new() -> Self {
        ChainIdCache { inner: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, network: Network) -> Option<ChainId> {
        self.inner.read().expect("chain id cache poisoned").get(&network).copied()
    }

    /// Record a chain id the transport fetched.
    pub fn store(&self, network: Network, chain_id: ChainId) {
        self.inner.write().expect("chain id cache poisoned").insert(network, chain_id);
    }

    /// Resolve the chain id for `network`: cached value first, then a
    /// freshly fetched one (which is cached), then the declared default.
    /// The default is the one sanctioned silent recovery in this crate.
    pub fn resolve(&self, network: Network, fetched: Option<u8>) -> ChainId {
        if let Some(cached) = self.get(network) {
            return cached;
        }
        if let Some(id) = fetched {
            let chain_id = ChainId(id);
            self.store(network, chain_id);
            return chain_id;
        }
        let fallback = network.default_chain_id();
        tracing::warn!("no chain id available for {}, using default {}", network, fallback);
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_defaults() {
        assert_eq!(Network::Mainnet.default_chain_id(), ChainId(1));
        assert_eq!(Network::Testnet.default_chain_id(), ChainId(2));
        assert_eq!(Network::Devnet.default_chain_id(), ChainId(3));
        assert_eq!(Network::Local.default_chain_id(), ChainId(4));
    }

    #[test]
    fn test_resolution_order() {
        let cache = ChainIdCache::new();
        // Nothing fetched: declared default, not cached.
        assert_eq!(cache.resolve(Network::Devnet, None), ChainId(3));
        assert_eq!(cache.get(Network::Devnet), None);

        // Fetched value wins and is memoized.
        assert_eq!(cache.resolve(Network::Devnet, Some(68)), ChainId(68));
        assert_eq!(cache.get(Network::Devnet), Some(ChainId(68)));

        // Cache beats a later (stale) fetch.
        assert_eq!(cache.resolve(Network::Devnet, Some(69)), ChainId(68));
    }

    #[test]
    fn test_concurrent_readers() {
        use std::sync::Arc;
        let cache = Arc::new(ChainIdCache::new());
        cache.store(Network::Mainnet, ChainId(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(cache.resolve(Network::Mainnet, None), ChainId(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
