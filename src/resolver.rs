//! Power state resolution over the node partition.
//!
//! Each node starts at [`PowerState::Impedance`]. Devices touching a node are
//! evaluated pin by pin and may force a node to [`PowerState::Ground`] or
//! [`PowerState::Power`]. Forcing a node to the opposite level latches
//! [`PowerState::ShortCircuit`], which never reverts within a run.

use std::collections::HashMap;
use std::fmt;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::circuit::{signal_level, Element, ElementType, PinRef};
use crate::error::SimError;
use crate::nodes::Node;

/// Logic-level classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    Impedance,
    Ground,
    Power,
    ShortCircuit,
}

impl PowerState {
    /// Stable numeric code: IMPEDANCE=0, GROUND=1, POWER=2, SHORT_CIRCUIT=3
    pub fn code(&self) -> u8 {
        match self {
            PowerState::Impedance => 0,
            PowerState::Ground => 1,
            PowerState::Power => 2,
            PowerState::ShortCircuit => 3,
        }
    }

    /// Truth-table symbol
    pub fn symbol(&self) -> char {
        match self {
            PowerState::Impedance => 'Z',
            PowerState::Ground => '0',
            PowerState::Power => '1',
            PowerState::ShortCircuit => 'X',
        }
    }

    pub fn from_level(high: bool) -> Self {
        if high {
            PowerState::Power
        } else {
            PowerState::Ground
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerState::Impedance => "IMPEDANCE",
            PowerState::Ground => "GROUND",
            PowerState::Power => "POWER",
            PowerState::ShortCircuit => "SHORT_CIRCUIT",
        };
        f.write_str(name)
    }
}

/// How many relaxation passes a run makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Re-scan until a pass changes nothing
    FixedPoint,
    /// Exactly one pass over all nodes. Chains of transistors may not settle.
    SinglePass,
}

/// What a short circuit does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortCircuitPolicy {
    /// Latch the conflicting node and keep resolving the others
    IsolateNode,
    /// Latch the conflicting node and stop the whole run
    HaltAll,
}

/// Resolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub termination: Termination,
    pub short_circuit: ShortCircuitPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            termination: Termination::FixedPoint,
            short_circuit: ShortCircuitPolicy::IsolateNode,
        }
    }
}

impl ResolverConfig {
    /// Single pass, global halt on the first short circuit
    pub fn reference() -> Self {
        ResolverConfig {
            termination: Termination::SinglePass,
            short_circuit: ShortCircuitPolicy::HaltAll,
        }
    }
}

/// Outcome of one resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// One state per node, same order as the input nodes
    pub states: Vec<PowerState>,
    pub passes: usize,
    /// True when a short circuit stopped the run early
    pub halted: bool,
}

enum Drive {
    Unchanged,
    Changed,
    Short,
}

/// Applies device semantics to a node partition
pub struct StateResolver<'a> {
    config: ResolverConfig,
    nodes: &'a [Node],
    input_signals: &'a [bool],
    elements: HashMap<&'a str, &'a Element>,
    input_ordinals: HashMap<&'a str, usize>,
    pin_nodes: HashMap<&'a PinRef, usize>,
}

impl<'a> StateResolver<'a> {
    pub fn new(
        elements: &'a [Element],
        nodes: &'a [Node],
        input_signals: &'a [bool],
        config: ResolverConfig,
    ) -> Self {
        let input_ordinals = elements
            .iter()
            .filter(|el| el.element_type == ElementType::Input)
            .enumerate()
            .map(|(ordinal, el)| (el.id.as_str(), ordinal))
            .collect();

        let pin_nodes = nodes
            .iter()
            .enumerate()
            .flat_map(|(index, node)| node.pins.iter().map(move |pin| (pin, index)))
            .collect();

        StateResolver {
            config,
            nodes,
            input_signals,
            elements: elements.iter().map(|el| (el.id.as_str(), el)).collect(),
            input_ordinals,
            pin_nodes,
        }
    }

    pub fn resolve(&self) -> Result<Resolution, SimError> {
        let node_count = self.nodes.len();
        let mut states = vec![PowerState::Impedance; node_count];

        // Every node changes at most twice: Impedance -> level -> ShortCircuit
        let max_passes = match self.config.termination {
            Termination::SinglePass => 1,
            Termination::FixedPoint => 2 * node_count + 1,
        };

        let mut passes = 0;
        while passes < max_passes {
            passes += 1;
            let mut changed = false;

            for (index, node) in self.nodes.iter().enumerate() {
                for pin in &node.pins {
                    let element = self
                        .elements
                        .get(pin.el_id.as_str())
                        .ok_or_else(|| SimError::ElementNotFound(pin.el_id.clone()))?;

                    match self.evaluate(element, index, &mut states) {
                        Drive::Unchanged => {}
                        Drive::Changed => changed = true,
                        Drive::Short => {
                            if self.config.short_circuit == ShortCircuitPolicy::HaltAll {
                                warn!("Short circuit on node {}, halting resolution", index);
                                return Ok(Resolution {
                                    states,
                                    passes,
                                    halted: true,
                                });
                            }
                            changed = true;
                        }
                    }
                }
            }

            trace!("Pass {} finished, changed: {}", passes, changed);
            if !changed {
                break;
            }
        }

        debug!("Resolved {} nodes in {} passes", node_count, passes);

        Ok(Resolution {
            states,
            passes,
            halted: false,
        })
    }

    /// Evaluate one element while visiting the node at `node_index`
    fn evaluate(&self, element: &Element, node_index: usize, states: &mut [PowerState]) -> Drive {
        match element.element_type {
            ElementType::Input => {
                let high = self
                    .input_ordinals
                    .get(element.id.as_str())
                    .map_or(false, |&ordinal| signal_level(self.input_signals, ordinal));
                self.force(states, node_index, PowerState::from_level(high))
            }
            ElementType::Power => self.force(states, node_index, PowerState::Power),
            ElementType::Ground => self.force(states, node_index, PowerState::Ground),
            ElementType::Npn => {
                self.gate(element, states, PowerState::Ground, PowerState::Power, PowerState::Power)
            }
            ElementType::Pnp => {
                self.gate(element, states, PowerState::Power, PowerState::Ground, PowerState::Ground)
            }
            ElementType::Output | ElementType::Dot => Drive::Unchanged,
        }
    }

    /// Force pin 2's node to `output` when pins 0 and 1 read `first` and `second`
    fn gate(
        &self,
        element: &Element,
        states: &mut [PowerState],
        first: PowerState,
        second: PowerState,
        output: PowerState,
    ) -> Drive {
        let node_of = |pin_index: usize| self.pin_nodes.get(&element.pin(pin_index)).copied();

        match (node_of(0), node_of(1), node_of(2)) {
            (Some(a), Some(b), Some(out)) if states[a] == first && states[b] == second => {
                self.force(states, out, output)
            }
            _ => Drive::Unchanged,
        }
    }

    fn force(&self, states: &mut [PowerState], node_index: usize, state: PowerState) -> Drive {
        let current = states[node_index];

        match (current, state) {
            (PowerState::ShortCircuit, _) => Drive::Unchanged,
            (current, state) if current == state => Drive::Unchanged,
            (PowerState::Ground, PowerState::Power) | (PowerState::Power, PowerState::Ground) => {
                debug!(
                    "Short circuit between: {}",
                    self.nodes[node_index]
                        .pins
                        .iter()
                        .map(|pin| pin.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                states[node_index] = PowerState::ShortCircuit;
                Drive::Short
            }
            (_, state) => {
                states[node_index] = state;
                Drive::Changed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Connection;
    use crate::nodes::build_nodes;

    fn wire(a: (&str, usize), b: (&str, usize)) -> Connection {
        Connection::new(PinRef::new(a.0, a.1), PinRef::new(b.0, b.1))
    }

    fn resolve(
        elements: &[Element],
        connections: &[Connection],
        signals: &[bool],
        config: ResolverConfig,
    ) -> (Vec<Node>, Resolution) {
        let nodes = build_nodes(connections);
        let resolution = StateResolver::new(elements, &nodes, signals, config)
            .resolve()
            .unwrap();
        (nodes, resolution)
    }

    fn state_of(nodes: &[Node], resolution: &Resolution, pin: PinRef) -> Option<PowerState> {
        nodes
            .iter()
            .position(|node| node.contains(&pin))
            .map(|index| resolution.states[index])
    }

    /// Two NPNs in series, wired so the second only switches after the first
    /// one's output is driven, which happens on the second pass.
    fn npn_chain() -> (Vec<Element>, Vec<Connection>) {
        let elements = vec![
            Element::new("el1", ElementType::Power),
            Element::new("el2", ElementType::Ground),
            Element::new("el3", ElementType::Npn),
            Element::new("el4", ElementType::Npn),
            Element::new("el5", ElementType::Output),
        ];
        let connections = vec![
            wire(("el4", 2), ("el5", 0)),
            wire(("el3", 2), ("el4", 1)),
            wire(("el3", 0), ("el4", 0)),
            wire(("el2", 0), ("el3", 0)),
            wire(("el3", 1), ("el1", 0)),
        ];
        (elements, connections)
    }

    #[test]
    fn test_power_state_codes() {
        assert_eq!(PowerState::Impedance.code(), 0);
        assert_eq!(PowerState::Ground.code(), 1);
        assert_eq!(PowerState::Power.code(), 2);
        assert_eq!(PowerState::ShortCircuit.code(), 3);
        assert_eq!(serde_json::to_string(&PowerState::ShortCircuit).unwrap(), "\"SHORT_CIRCUIT\"");
    }

    #[test]
    fn test_fixed_point_settles_transistor_chain() {
        let (elements, connections) = npn_chain();
        let (nodes, resolution) = resolve(&elements, &connections, &[], ResolverConfig::default());

        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el5", 0)), Some(PowerState::Power));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el4", 1)), Some(PowerState::Power));
        assert_eq!(resolution.passes, 3);
        assert!(!resolution.halted);
    }

    #[test]
    fn test_single_pass_leaves_transistor_chain_unsettled() {
        let (elements, connections) = npn_chain();
        let config = ResolverConfig {
            termination: Termination::SinglePass,
            ..ResolverConfig::default()
        };
        let (nodes, resolution) = resolve(&elements, &connections, &[], config);

        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el3", 0)), Some(PowerState::Ground));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el3", 1)), Some(PowerState::Power));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el4", 1)), Some(PowerState::Impedance));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el5", 0)), Some(PowerState::Impedance));
        assert_eq!(resolution.passes, 1);
    }

    fn short_then_independent() -> (Vec<Element>, Vec<Connection>) {
        let elements = vec![
            Element::new("el1", ElementType::Power),
            Element::new("el2", ElementType::Ground),
            Element::new("el3", ElementType::Output),
            Element::new("el4", ElementType::Power),
            Element::new("el5", ElementType::Output),
        ];
        let connections = vec![
            wire(("el1", 0), ("el3", 0)),
            wire(("el2", 0), ("el3", 0)),
            wire(("el4", 0), ("el5", 0)),
        ];
        (elements, connections)
    }

    #[test]
    fn test_halt_all_stops_unrelated_nodes() {
        let (elements, connections) = short_then_independent();
        let (nodes, resolution) = resolve(&elements, &connections, &[], ResolverConfig::reference());

        assert!(resolution.halted);
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el3", 0)), Some(PowerState::ShortCircuit));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el5", 0)), Some(PowerState::Impedance));
    }

    #[test]
    fn test_isolate_node_keeps_resolving() {
        let (elements, connections) = short_then_independent();
        let (nodes, resolution) = resolve(&elements, &connections, &[], ResolverConfig::default());

        assert!(!resolution.halted);
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el3", 0)), Some(PowerState::ShortCircuit));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el5", 0)), Some(PowerState::Power));
    }

    #[test]
    fn test_short_circuit_node_does_not_gate() {
        // el3's base node is shorted, so its collector node stays undriven
        let elements = vec![
            Element::new("el1", ElementType::Power),
            Element::new("el2", ElementType::Ground),
            Element::new("el3", ElementType::Npn),
            Element::new("el4", ElementType::Output),
            Element::new("el5", ElementType::Power),
        ];
        let connections = vec![
            wire(("el1", 0), ("el3", 0)),
            wire(("el2", 0), ("el3", 0)),
            wire(("el5", 0), ("el3", 1)),
            wire(("el3", 2), ("el4", 0)),
        ];
        let (nodes, resolution) = resolve(&elements, &connections, &[], ResolverConfig::default());

        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el3", 0)), Some(PowerState::ShortCircuit));
        assert_eq!(state_of(&nodes, &resolution, PinRef::new("el4", 0)), Some(PowerState::Impedance));
    }

    #[test]
    fn test_unknown_element_fails_loudly() {
        let elements = vec![Element::new("el1", ElementType::Power)];
        let nodes = build_nodes(&[wire(("el1", 0), ("ghost", 0))]);
        let result = StateResolver::new(&elements, &nodes, &[], ResolverConfig::default()).resolve();

        assert_eq!(result, Err(SimError::ElementNotFound("ghost".to_string())));
    }
}
