//! Node construction: partitions wired pins into equipotential groups.

use std::collections::{HashMap, VecDeque};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::circuit::{Connection, PinRef};

/// A maximal set of pins joined transitively by wires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub pins: Vec<PinRef>,
}

impl Node {
    pub fn contains(&self, pin: &PinRef) -> bool {
        self.pins.contains(pin)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Incremental pin -> node index over a wire list
#[derive(Debug, Default)]
pub struct NodeBuilder {
    // A group keeps its id for life; a merged-away group is left empty.
    groups: Vec<VecDeque<PinRef>>,
    pin_to_group: HashMap<PinRef, usize>,
    // Node order: group ids by creation or last merge. Retired entries are None.
    order: Vec<Option<usize>>,
    order_of_group: Vec<usize>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, connection: &Connection) {
        let Connection(p1, p2) = connection;

        if p1 == p2 {
            trace!("Ignoring self-connection on {}", p1);
            return;
        }

        let group1 = self.pin_to_group.get(p1).copied();
        let group2 = self.pin_to_group.get(p2).copied();

        match (group1, group2) {
            (None, None) => {
                let group = self.groups.len();
                self.groups.push(VecDeque::from(vec![p1.clone(), p2.clone()]));
                self.pin_to_group.insert(p1.clone(), group);
                self.pin_to_group.insert(p2.clone(), group);
                self.order_of_group.push(self.order.len());
                self.order.push(Some(group));
            }
            (Some(group), None) => self.append(group, p2),
            (None, Some(group)) => self.append(group, p1),
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => self.merge(a, b),
        }
    }

    fn append(&mut self, group: usize, pin: &PinRef) {
        self.groups[group].push_back(pin.clone());
        self.pin_to_group.insert(pin.clone(), group);
    }

    /// Union two nodes, `a`'s pins first, and move the result after every
    /// existing node. Only the smaller side's pins are re-registered.
    fn merge(&mut self, a: usize, b: usize) {
        let (survivor, absorbed) = if self.groups[a].len() >= self.groups[b].len() {
            (a, b)
        } else {
            (b, a)
        };

        let pins = std::mem::take(&mut self.groups[absorbed]);
        for pin in &pins {
            self.pin_to_group.insert(pin.clone(), survivor);
        }
        if survivor == a {
            self.groups[a].extend(pins);
        } else {
            for pin in pins.into_iter().rev() {
                self.groups[b].push_front(pin);
            }
        }

        self.order[self.order_of_group[a]] = None;
        self.order[self.order_of_group[b]] = None;
        self.order_of_group[survivor] = self.order.len();
        self.order.push(Some(survivor));

        trace!(
            "Merged nodes {} and {} at position {} ({} pins)",
            a,
            b,
            self.order_of_group[survivor],
            self.groups[survivor].len()
        );
    }

    pub fn build(self) -> Vec<Node> {
        let NodeBuilder { mut groups, order, .. } = self;
        order
            .into_iter()
            .flatten()
            .map(|group| Node {
                pins: std::mem::take(&mut groups[group]).into(),
            })
            .collect()
    }
}

/// Partition every wired pin into nodes, in creation order
pub fn build_nodes(connections: &[Connection]) -> Vec<Node> {
    let mut builder = NodeBuilder::new();
    for connection in connections {
        builder.add_connection(connection);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pin(el: &str, index: usize) -> PinRef {
        PinRef::new(el, index)
    }

    fn wire(a: (&str, usize), b: (&str, usize)) -> Connection {
        Connection::new(pin(a.0, a.1), pin(b.0, b.1))
    }

    fn partition(nodes: &[Node]) -> BTreeSet<BTreeSet<PinRef>> {
        nodes
            .iter()
            .map(|node| node.pins.iter().cloned().collect())
            .collect()
    }

    #[test]
    fn test_empty_connection_list() {
        assert!(build_nodes(&[]).is_empty());
    }

    #[test]
    fn test_chain_merges_into_one_node() {
        let connections = vec![
            wire(("el1", 0), ("el2", 0)),
            wire(("el2", 0), ("el3", 0)),
            wire(("el3", 0), ("el4", 0)),
        ];

        let nodes = build_nodes(&connections);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].len(), 4);
    }

    #[test]
    fn test_merge_of_two_existing_nodes() {
        let connections = vec![
            wire(("el1", 0), ("el2", 0)),
            wire(("el3", 0), ("el4", 0)),
            wire(("el5", 0), ("el6", 0)),
            wire(("el2", 0), ("el3", 0)),
        ];

        let nodes = build_nodes(&connections);
        assert_eq!(nodes.len(), 2);
        // merged node goes last
        assert_eq!(nodes[0].pins, vec![pin("el5", 0), pin("el6", 0)]);
        assert_eq!(
            nodes[1].pins,
            vec![pin("el1", 0), pin("el2", 0), pin("el3", 0), pin("el4", 0)]
        );
    }

    #[test]
    fn test_merge_keeps_pin_order_whichever_side_is_larger() {
        // First node is the smaller one
        let connections = vec![
            wire(("el1", 0), ("el2", 0)),
            wire(("el3", 0), ("el4", 0)),
            wire(("el4", 0), ("el5", 0)),
            wire(("el5", 0), ("el6", 0)),
            wire(("el7", 0), ("el8", 0)),
            wire(("el2", 0), ("el3", 0)),
        ];
        let nodes = build_nodes(&connections);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].pins, vec![pin("el7", 0), pin("el8", 0)]);
        assert_eq!(
            nodes[1].pins,
            vec![
                pin("el1", 0),
                pin("el2", 0),
                pin("el3", 0),
                pin("el4", 0),
                pin("el5", 0),
                pin("el6", 0),
            ]
        );

        // Wire starts in the later, larger node
        let connections = vec![
            wire(("el1", 0), ("el2", 0)),
            wire(("el3", 0), ("el4", 0)),
            wire(("el4", 0), ("el5", 0)),
            wire(("el3", 0), ("el1", 0)),
            wire(("el5", 0), ("el6", 0)),
        ];
        let nodes = build_nodes(&connections);
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            nodes[0].pins,
            vec![pin("el3", 0), pin("el4", 0), pin("el5", 0), pin("el1", 0), pin("el2", 0), pin("el6", 0)]
        );
    }

    #[test]
    fn test_repeated_merges_into_growing_node() {
        // Each wire merges a fresh pair into the one growing node
        let mut connections = Vec::new();
        for i in 0..50 {
            let a = format!("el{}", 2 * i);
            let b = format!("el{}", 2 * i + 1);
            connections.push(wire((a.as_str(), 0), (b.as_str(), 0)));
            if i > 0 {
                connections.push(wire((a.as_str(), 0), ("el0", 0)));
            }
        }

        // Newest pair first
        let expected: Vec<PinRef> = (0..50)
            .rev()
            .flat_map(|i| [pin(&format!("el{}", 2 * i), 0), pin(&format!("el{}", 2 * i + 1), 0)])
            .collect();

        let nodes = build_nodes(&connections);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].pins, expected);
    }

    #[test]
    fn test_partition_is_order_independent() {
        let mut connections = vec![
            wire(("el1", 0), ("el2", 1)),
            wire(("el2", 2), ("el3", 0)),
            wire(("el4", 0), ("el2", 1)),
            wire(("el3", 0), ("el5", 0)),
            wire(("el6", 0), ("el7", 0)),
            wire(("el7", 0), ("el1", 0)),
        ];

        let forward = partition(&build_nodes(&connections));
        connections.reverse();
        let backward = partition(&build_nodes(&connections));
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_every_pin_in_at_most_one_node() {
        let connections = vec![
            wire(("el1", 0), ("el2", 0)),
            wire(("el2", 0), ("el1", 0)),
            wire(("el3", 1), ("el3", 2)),
            wire(("el3", 2), ("el2", 0)),
            wire(("el4", 0), ("el5", 0)),
        ];

        let nodes = build_nodes(&connections);
        let mut seen = BTreeSet::new();
        for node in &nodes {
            assert!(node.len() >= 2);
            for pin in &node.pins {
                assert!(seen.insert(pin.clone()), "{} appears twice", pin);
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_self_connection_creates_no_node() {
        let nodes = build_nodes(&[wire(("el1", 0), ("el1", 0))]);
        assert!(nodes.is_empty());
    }
}
