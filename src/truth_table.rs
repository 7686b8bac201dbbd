//! Truth-table enumeration over every combination of input signals.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::circuit::{validate_references, ElementType, Schematic, SchematicOptions};
use crate::error::SimError;
use crate::nodes::build_nodes;
use crate::resolver::{PowerState, ResolverConfig, StateResolver};

const INPUT_LITERALS: &str = "ABCDEFGHIJ";
const OUTPUT_LITERALS: &str = "YZXWVUTSRQ";

/// Column label for the `ordinal`-th INPUT or OUTPUT element out of `count`
pub fn signal_label(element_type: ElementType, ordinal: usize, count: usize, is_vector: bool) -> String {
    let literals = if element_type == ElementType::Input {
        INPUT_LITERALS
    } else {
        OUTPUT_LITERALS
    };

    if !is_vector && count <= literals.len() {
        if let Some(literal) = literals.chars().nth(ordinal) {
            return literal.to_string();
        }
    }

    if element_type == ElementType::Input {
        format!("I{}", ordinal)
    } else {
        format!("Y{}", ordinal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthRow {
    /// Input levels by INPUT ordinal
    pub inputs: Vec<bool>,
    /// Output states by OUTPUT ordinal
    pub outputs: Vec<PowerState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthTable {
    pub input_labels: Vec<String>,
    pub output_labels: Vec<String>,
    pub rows: Vec<TruthRow>,
    pub options: SchematicOptions,
}

impl TruthTable {
    /// Enumerate all `2^n` input rows of a schematic with `n` INPUT elements
    pub fn build(
        schematic: &Schematic,
        config: ResolverConfig,
        options: &SchematicOptions,
        max_inputs: usize,
    ) -> Result<Self, SimError> {
        validate_references(&schematic.elements, &schematic.connections)?;

        let inputs = schematic.input_elements();
        let outputs = schematic.output_elements();
        let input_count = inputs.len();

        // One row per bit pattern, so the count must fit in a shift of usize
        let max_inputs = max_inputs.min(usize::BITS as usize - 1);
        if input_count > max_inputs {
            return Err(SimError::TooManyInputs {
                count: input_count,
                max: max_inputs,
            });
        }

        // The node partition does not depend on the signals
        let nodes = build_nodes(&schematic.connections);
        let output_nodes: Vec<Option<usize>> = outputs
            .iter()
            .map(|el| nodes.iter().position(|node| node.contains(&el.pin(0))))
            .collect();

        let row_count = 1usize << input_count;
        let mut rows = Vec::with_capacity(row_count);
        for row in 0..row_count {
            let signals = row_signals(row, input_count, options.is_input_vector);

            let resolution = StateResolver::new(&schematic.elements, &nodes, &signals, config).resolve()?;

            let states = output_nodes
                .iter()
                .map(|node| node.map_or(PowerState::Impedance, |index| resolution.states[index]))
                .collect();

            rows.push(TruthRow {
                inputs: signals,
                outputs: states,
            });
        }

        debug!("Truth table built: {} inputs, {} outputs, {} rows", input_count, outputs.len(), rows.len());

        Ok(TruthTable {
            input_labels: (0..input_count)
                .map(|k| signal_label(ElementType::Input, k, input_count, options.is_input_vector))
                .collect(),
            output_labels: (0..outputs.len())
                .map(|k| signal_label(ElementType::Output, k, outputs.len(), options.is_output_vector))
                .collect(),
            rows,
            options: options.clone(),
        })
    }

    /// Column headers in display order. Vector mode puts the highest ordinal first.
    pub fn header(&self) -> Vec<String> {
        let mut header = display_order(&self.input_labels, self.options.is_input_vector);
        header.extend(display_order(&self.output_labels, self.options.is_output_vector));
        header
    }

    pub fn row_cells(&self, row: &TruthRow) -> Vec<String> {
        let inputs: Vec<String> = row
            .inputs
            .iter()
            .map(|&high| (if high { "1" } else { "0" }).to_string())
            .collect();
        let outputs: Vec<String> = row.outputs.iter().map(|state| state.symbol().to_string()).collect();

        let mut cells = display_order(&inputs, self.options.is_input_vector);
        cells.extend(display_order(&outputs, self.options.is_output_vector));
        cells
    }

    pub fn print(&self) {
        println!("{}", self.header().join(" "));
        for row in &self.rows {
            println!("{}", self.row_cells(row).join(" "));
        }
    }
}

/// Input levels by ordinal for row `row`. The displayed columns always count
/// up in binary: ordinal 0 is the most significant bit, or in vector mode
/// (where columns are reversed) the least significant one.
fn row_signals(row: usize, input_count: usize, is_vector: bool) -> Vec<bool> {
    (0..input_count)
        .map(|k| {
            let shift = if is_vector { k } else { input_count - 1 - k };
            (row >> shift) & 1 == 1
        })
        .collect()
}

fn display_order(values: &[String], reversed: bool) -> Vec<String> {
    if reversed {
        values.iter().rev().cloned().collect()
    } else {
        values.to_vec()
    }
}
