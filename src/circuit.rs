use std::collections::{HashMap, HashSet};
use std::fmt;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

lazy_static! {
    static ref GENERATED_ID_PATTERN: Regex = Regex::new(r"^el(\d+)$").unwrap();
}

/// Canvas position of an element. Only the renderer cares about it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Types of placeable elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Pnp,
    Npn,
    Power,
    Ground,
    Input,
    Output,
    Dot,
}

impl ElementType {
    pub const ALL: [ElementType; 7] = [
        ElementType::Pnp,
        ElementType::Npn,
        ElementType::Power,
        ElementType::Ground,
        ElementType::Input,
        ElementType::Output,
        ElementType::Dot,
    ];

    /// Number of pin slots, fixed by the element footprint
    pub fn pin_count(&self) -> usize {
        match self {
            ElementType::Pnp | ElementType::Npn => 3,
            ElementType::Power
            | ElementType::Ground
            | ElementType::Input
            | ElementType::Output
            | ElementType::Dot => 1,
        }
    }

    /// Returns true if the resolver ever forces a state because of this element
    pub fn is_driver(&self) -> bool {
        !matches!(self, ElementType::Output | ElementType::Dot)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ElementType::Pnp => "pnp",
            ElementType::Npn => "npn",
            ElementType::Power => "power",
            ElementType::Ground => "ground",
            ElementType::Input => "input",
            ElementType::Output => "output",
            ElementType::Dot => "dot",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_lowercase();
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A placed component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(default)]
    pub pos: Position,
}

impl Element {
    pub fn new(id: impl Into<String>, element_type: ElementType) -> Self {
        Element {
            id: id.into(),
            element_type,
            pos: Position::default(),
        }
    }

    pub fn pin(&self, pin_index: usize) -> PinRef {
        PinRef::new(self.id.clone(), pin_index)
    }

    pub fn pins(&self) -> impl Iterator<Item = PinRef> + '_ {
        (0..self.element_type.pin_count()).map(move |i| self.pin(i))
    }
}

/// One terminal of one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRef {
    pub el_id: String,
    pub pin_index: usize,
}

impl PinRef {
    pub fn new(el_id: impl Into<String>, pin_index: usize) -> Self {
        PinRef {
            el_id: el_id.into(),
            pin_index,
        }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.el_id, self.pin_index)
    }
}

/// A wire: an unordered pair of pins shorted together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection(pub PinRef, pub PinRef);

impl Connection {
    pub fn new(a: PinRef, b: PinRef) -> Self {
        Connection(a, b)
    }

    pub fn touches(&self, el_id: &str) -> bool {
        self.0.el_id == el_id || self.1.el_id == el_id
    }

    /// Same wire regardless of endpoint order
    pub fn same_wire(&self, other: &Connection) -> bool {
        (self.0 == other.0 && self.1 == other.1) || (self.0 == other.1 && self.1 == other.0)
    }
}

/// Display options the editor stores alongside a schematic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchematicOptions {
    pub is_input_vector: bool,
    pub is_output_vector: bool,
}

/// Immutable snapshot of everything the engine consumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schematic {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pos: Position,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub input_signals: Vec<bool>,
    #[serde(default)]
    pub options: SchematicOptions,
}

impl Schematic {
    pub fn new(title: impl Into<String>) -> Self {
        Schematic {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn get_element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.id == id)
    }

    pub fn elements_of_type(&self, element_type: ElementType) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|el| el.element_type == element_type)
            .collect()
    }

    pub fn input_elements(&self) -> Vec<&Element> {
        self.elements_of_type(ElementType::Input)
    }

    pub fn output_elements(&self) -> Vec<&Element> {
        self.elements_of_type(ElementType::Output)
    }

    /// Ordinal of an INPUT element among all INPUT elements
    pub fn input_ordinal(&self, id: &str) -> Option<usize> {
        self.input_elements().iter().position(|el| el.id == id)
    }

    /// Next id in the `el{n}` sequence the editor uses
    pub fn next_element_id(&self) -> String {
        let highest = self
            .elements
            .iter()
            .filter_map(|el| GENERATED_ID_PATTERN.captures(&el.id))
            .filter_map(|caps| caps[1].parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        format!("el{}", highest + 1)
    }

    /// Check ids and wire endpoints
    pub fn validate(&self) -> Result<(), SimError> {
        validate_references(&self.elements, &self.connections)
    }

    /// Elements with at least one unwired pin
    pub fn floating_pins(&self) -> Vec<String> {
        let used: HashSet<&PinRef> = self
            .connections
            .iter()
            .flat_map(|c| [&c.0, &c.1])
            .collect();

        self.elements
            .iter()
            .filter(|el| el.pins().any(|pin| !used.contains(&pin)))
            .map(|el| format!("Floating pins on {} {}", el.element_type, el.id))
            .collect()
    }

    /// Print schematic summary
    pub fn print_summary(&self) {
        if !self.title.is_empty() {
            println!("Schematic: {}", self.title);
        }
        println!("Elements: {}", self.elements.len());
        println!("Connections: {}", self.connections.len());

        let mut type_counts: HashMap<ElementType, usize> = HashMap::new();
        for element in &self.elements {
            *type_counts.entry(element.element_type).or_insert(0) += 1;
        }

        for element_type in ElementType::ALL {
            if let Some(count) = type_counts.get(&element_type) {
                println!("  {}: {}", element_type, count);
            }
        }
    }
}

/// Level of the input with the given ordinal; entries past the end read as low
pub fn signal_level(signals: &[bool], ordinal: usize) -> bool {
    signals.get(ordinal).copied().unwrap_or(false)
}

/// Fail fast on duplicate ids and on wires pointing at missing elements or pins
pub fn validate_references(elements: &[Element], connections: &[Connection]) -> Result<(), SimError> {
    let mut pin_counts: HashMap<&str, usize> = HashMap::with_capacity(elements.len());

    for element in elements {
        if pin_counts
            .insert(element.id.as_str(), element.element_type.pin_count())
            .is_some()
        {
            return Err(SimError::DuplicateElement(element.id.clone()));
        }
    }

    for pin in connections.iter().flat_map(|c| [&c.0, &c.1]) {
        let pin_count = *pin_counts
            .get(pin.el_id.as_str())
            .ok_or_else(|| SimError::ElementNotFound(pin.el_id.clone()))?;

        if pin.pin_index >= pin_count {
            return Err(SimError::PinOutOfRange {
                el_id: pin.el_id.clone(),
                pin_index: pin.pin_index,
                pin_count,
            });
        }
    }

    Ok(())
}
