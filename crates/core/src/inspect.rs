//! Serializable snapshots of nodes and of a whole network, for diagnostics and tests.

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;
use crate::dht::PeerRing;
use crate::dht::SuccessorReader;
use crate::lookup::LookupSummary;
use crate::network::Network;
use crate::node::Node;
use crate::node::NodeState;
use crate::sim::Timestamp;

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInspect {
    pub now: Timestamp,
    pub processed: u64,
    pub pending: usize,
    pub ring_closure: bool,
    pub nodes: Vec<NodeInspect>,
    pub lookups: LookupSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInspect {
    pub did: Did,
    pub state: NodeState,
    pub incarnation: u64,
    pub dht: DHTInspect,
    pub storage: StorageInspect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DHTInspect {
    pub did: Did,
    pub successors: Vec<Did>,
    #[serde(default)]
    pub predecessor: Option<Did>,
    /// Runs of equal entries as `(entry, first index, last index)`, indexed from 1.
    pub finger_table: Vec<(Option<Did>, u64, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInspect {
    pub keys: Vec<Did>,
}

impl NetworkInspect {
    pub fn inspect(network: &Network) -> Self {
        Self {
            now: network.now(),
            processed: network.processed(),
            pending: network.pending(),
            ring_closure: network.ring_closure(),
            nodes: network.nodes().map(NodeInspect::inspect).collect(),
            lookups: network.lookups().summary(),
        }
    }
}

impl NodeInspect {
    pub fn inspect(node: &Node) -> Self {
        Self {
            did: node.did(),
            state: node.state(),
            incarnation: node.incarnation(),
            dht: DHTInspect::inspect(node.ring()),
            storage: StorageInspect {
                keys: node.storage().keys().copied().collect(),
            },
        }
    }
}

impl DHTInspect {
    pub fn inspect(dht: &PeerRing) -> Self {
        let finger_table = compress_iter(dht.finger.list().iter().copied())
            .into_iter()
            .map(|(x, start, end)| (x, start + 1, end + 1))
            .collect();
        Self {
            did: dht.did,
            successors: dht.successors().list(),
            predecessor: dht.predecessor,
            finger_table,
        }
    }
}

impl Network {
    /// Snapshot of every node.
    pub fn inspect(&self) -> NetworkInspect {
        NetworkInspect::inspect(self)
    }
}

pub fn compress_iter<T>(iter: impl Iterator<Item = T>) -> Vec<(T, u64, u64)>
where T: PartialEq {
    let mut result = vec![];
    let mut start = 0u64;
    let mut count = 0u64;
    let mut prev: Option<T> = None;

    for (i, x) in iter.enumerate() {
        match prev {
            Some(p) if p == x => {
                count += 1;
            }
            _ => {
                if let Some(p) = prev {
                    result.push((p, start, start + count - 1));
                }
                start = i as u64;
                count = 1;
            }
        }
        prev = Some(x);
    }

    if let Some(p) = prev {
        result.push((p, start, start + count - 1));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_iter() {
        let v = vec!['a', 'a', 'f', 'a', 'b', 'b', 'c', 'c', 'c', 'd', 'e'];
        assert_eq!(
            vec![
                ('a', 0, 1),
                ('f', 2, 2),
                ('a', 3, 3),
                ('b', 4, 5),
                ('c', 6, 8),
                ('d', 9, 9),
                ('e', 10, 10),
            ],
            compress_iter(v.into_iter())
        );
    }

    #[test]
    fn test_inspect_finger_table_runs() {
        use crate::dht::IdSpace;

        let mut dht = PeerRing::new(Did::from(2u64), IdSpace::new(4), 3);
        dht.finger.set(1, Did::from(5u64));
        dht.finger.set(2, Did::from(5u64));
        dht.finger.set(3, Did::from(9u64));
        let inspect = DHTInspect::inspect(&dht);
        assert_eq!(inspect.finger_table, vec![
            (Some(Did::from(5u64)), 1, 2),
            (Some(Did::from(9u64)), 3, 3),
            (None, 4, 4),
        ]);
    }
}
