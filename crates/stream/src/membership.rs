use sha2::{Digest, Sha256};
use shardlife_common::Quadkey;

use crate::{MembershipError, WorldRange};

/// This node's place in the cluster: its index in the sorted member list, the
/// member count, and how many members should cover each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub index: usize,
    pub count: usize,
    pub replicas: usize,
}

impl Membership {
    pub fn new(index: usize, count: usize, replicas: usize) -> Result<Self, MembershipError> {
        if count == 0 {
            return Err(MembershipError::Empty);
        }
        if index >= count {
            return Err(MembershipError::IndexOutOfRange { index, count });
        }
        if replicas == 0 {
            return Err(MembershipError::NoReplicas);
        }
        Ok(Self {
            index,
            count,
            replicas,
        })
    }

    /// A cluster of one.
    pub fn solo() -> Self {
        Self {
            index: 0,
            count: 1,
            replicas: 1,
        }
    }

    /// Indices of every other member.
    pub fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).filter(move |peer| *peer != self.index)
    }
}

/// Sorted list of member addresses, the source of the membership feed.
///
/// Indices are positions in the sorted list, so every node that sees the same
/// addresses derives the same index for each of them.
#[derive(Debug, Clone)]
pub struct MemberList {
    address: String,
    addresses: Vec<String>,
    replicas: usize,
    checksum: Option<String>,
}

impl MemberList {
    /// A list containing only this node.
    pub fn new(address: impl Into<String>, replicas: usize) -> Self {
        let address = address.into();
        let mut list = Self {
            addresses: vec![address.clone()],
            address,
            replicas,
            checksum: None,
        };
        list.update_checksum();
        list
    }

    /// Add a member. Returns whether the list changed.
    pub fn add(&mut self, address: &str) -> bool {
        match self.addresses.binary_search_by(|a| a.as_str().cmp(address)) {
            Ok(_) => false,
            Err(at) => {
                self.addresses.insert(at, address.to_owned());
                self.update_checksum();
                true
            }
        }
    }

    /// Remove a member. This node itself is never removed.
    pub fn remove(&mut self, address: &str) -> bool {
        if address == self.address {
            return false;
        }
        match self.addresses.binary_search_by(|a| a.as_str().cmp(address)) {
            Ok(at) => {
                self.addresses.remove(at);
                self.update_checksum();
                true
            }
            Err(_) => false,
        }
    }

    /// Apply a batch of joins and departures. Returns whether anything changed.
    pub fn add_remove(&mut self, plus: &[&str], minus: &[&str]) -> bool {
        let mut changed = false;
        for address in minus {
            changed |= self.remove(address);
        }
        for address in plus {
            changed |= self.add(address);
        }
        changed
    }

    pub fn membership(&self) -> Membership {
        let index = self
            .addresses
            .binary_search(&self.address)
            .unwrap_or_default();
        Membership {
            index,
            count: self.addresses.len(),
            replicas: self.replicas,
        }
    }

    pub fn whoami(&self) -> &str {
        &self.address
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn address(&self, index: usize) -> Option<&str> {
        self.addresses.get(index).map(String::as_str)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses
            .binary_search_by(|a| a.as_str().cmp(address))
            .is_ok()
    }

    /// SHA-256 over the comma-joined sorted addresses, in hex.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Address of the member that owns `key` under an even split.
    pub fn lookup(&self, range: &WorldRange, key: &Quadkey) -> Option<&str> {
        self.address(range.lookup(key))
    }

    fn update_checksum(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.addresses.join(",").as_bytes());
        self.checksum = Some(format!("{:x}", hasher.finalize()));
    }
}
