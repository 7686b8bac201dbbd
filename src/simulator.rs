use anyhow::{anyhow, Context, Result};
use colored::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::circuit::{validate_references, Connection, Element, PinRef, Schematic, SchematicOptions};
use crate::cli::OutputFormat;
use crate::error::SimError;
use crate::nodes::build_nodes;
use crate::parser::SchematicParser;
use crate::resolver::{PowerState, ResolverConfig, StateResolver};
use crate::truth_table::TruthTable;

/// One resolved node: its state and every pin it joins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub state: PowerState,
    pub pins: Vec<PinRef>,
}

/// Node states for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub nodes: Vec<NodeState>,
    pub passes: usize,
    pub halted: bool,
}

impl SimulationResult {
    /// State of the node holding `pin`, None when the pin is unwired
    pub fn state_of(&self, pin: &PinRef) -> Option<PowerState> {
        self.nodes
            .iter()
            .find(|node| node.pins.contains(pin))
            .map(|node| node.state)
    }

    pub fn short_circuits(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes
            .iter()
            .filter(|node| node.state == PowerState::ShortCircuit)
    }
}

/// Resolve every node of a snapshot with the default resolver policies.
///
/// Pure: the same inputs always produce the same node list, so callers can
/// memoize on the inputs.
pub fn compute_simulation(
    elements: &[Element],
    connections: &[Connection],
    input_signals: &[bool],
) -> Result<Vec<NodeState>, SimError> {
    compute_simulation_with(elements, connections, input_signals, ResolverConfig::default())
}

pub fn compute_simulation_with(
    elements: &[Element],
    connections: &[Connection],
    input_signals: &[bool],
    config: ResolverConfig,
) -> Result<Vec<NodeState>, SimError> {
    simulate(elements, connections, input_signals, config).map(|result| result.nodes)
}

/// Like [`compute_simulation_with`], also reporting pass count and halting
pub fn simulate(
    elements: &[Element],
    connections: &[Connection],
    input_signals: &[bool],
    config: ResolverConfig,
) -> Result<SimulationResult, SimError> {
    validate_references(elements, connections)?;

    let nodes = build_nodes(connections);
    let resolution = StateResolver::new(elements, &nodes, input_signals, config).resolve()?;

    let nodes = nodes
        .into_iter()
        .zip(resolution.states)
        .map(|(node, state)| NodeState {
            state,
            pins: node.pins,
        })
        .collect();

    Ok(SimulationResult {
        nodes,
        passes: resolution.passes,
        halted: resolution.halted,
    })
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub resolver: ResolverConfig,
    pub max_truth_table_inputs: usize,
    /// Overrides the label options saved with the schematic
    pub options: Option<SchematicOptions>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            resolver: ResolverConfig::default(),
            max_truth_table_inputs: 12,
            options: None,
        }
    }
}

/// Loads a schematic, runs the engine over it and reports the results
pub struct Simulator {
    schematic: Option<Schematic>,
    results: Option<SimulationResult>,
    truth_table: Option<TruthTable>,
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a new simulator with default configuration
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a new simulator with custom configuration
    pub fn with_config(config: SimulatorConfig) -> Self {
        Simulator {
            schematic: None,
            results: None,
            truth_table: None,
            config,
        }
    }

    /// Load a schematic from a saved JSON file or a text netlist
    pub fn load_schematic(&mut self, filename: &str) -> Result<()> {
        info!("Loading schematic from: {}", filename);

        let parser = SchematicParser::new();
        let schematic = parser.parse_file(filename)?;

        self.load_schematic_from_parsed(schematic)
    }

    pub fn load_schematic_from_parsed(&mut self, schematic: Schematic) -> Result<()> {
        schematic
            .validate()
            .with_context(|| format!("Invalid schematic '{}'", schematic.title))?;

        for warning in schematic.floating_pins() {
            warn!("{}", warning);
        }

        info!(
            "Loaded schematic with {} elements and {} connections",
            schematic.elements.len(),
            schematic.connections.len()
        );

        self.schematic = Some(schematic);
        self.results = None;
        self.truth_table = None;
        Ok(())
    }

    pub fn schematic(&self) -> Option<&Schematic> {
        self.schematic.as_ref()
    }

    /// Replace the input signal vector of the loaded schematic
    pub fn set_input_signals(&mut self, signals: Vec<bool>) -> Result<()> {
        let schematic = self
            .schematic
            .as_mut()
            .ok_or_else(|| anyhow!("No schematic loaded"))?;

        let inputs = schematic.input_elements().len();
        if signals.len() != inputs {
            warn!(
                "{} input signals given for {} inputs, missing ones read as low",
                signals.len(),
                inputs
            );
        }

        schematic.input_signals = signals;
        Ok(())
    }

    /// Resolve node states for the loaded schematic
    pub fn run(&mut self) -> Result<()> {
        let schematic = self
            .schematic
            .as_ref()
            .ok_or_else(|| anyhow!("No schematic loaded"))?;

        info!("Running simulation with {:?}", self.config.resolver);
        let start_time = std::time::Instant::now();

        let result = simulate(
            &schematic.elements,
            &schematic.connections,
            &schematic.input_signals,
            self.config.resolver,
        )?;

        for node in result.short_circuits() {
            warn!("Short circuit between: {}", join_pins(&node.pins));
        }

        info!(
            "Resolved {} nodes in {} passes ({}us)",
            result.nodes.len(),
            result.passes,
            start_time.elapsed().as_micros()
        );

        self.results = Some(result);
        Ok(())
    }

    /// Enumerate every input combination of the loaded schematic
    pub fn run_truth_table(&mut self) -> Result<()> {
        let schematic = self
            .schematic
            .as_ref()
            .ok_or_else(|| anyhow!("No schematic loaded"))?;

        let options = self
            .config
            .options
            .clone()
            .unwrap_or_else(|| schematic.options.clone());

        let table = TruthTable::build(
            schematic,
            self.config.resolver,
            &options,
            self.config.max_truth_table_inputs,
        )?;

        info!("Truth table completed with {} rows", table.rows.len());
        self.truth_table = Some(table);
        Ok(())
    }

    /// Get simulation results
    pub fn get_results(&self) -> Option<&SimulationResult> {
        self.results.as_ref()
    }

    pub fn get_truth_table(&self) -> Option<&TruthTable> {
        self.truth_table.as_ref()
    }

    /// Export the truth table if one was built, the node states otherwise
    pub fn export_results(&self, filename: &str, format: OutputFormat) -> Result<()> {
        if let Some(table) = &self.truth_table {
            return match format {
                OutputFormat::Csv => self.export_truth_table_csv(table, filename),
                OutputFormat::Json => self.export_json(table, filename),
            };
        }

        let results = self
            .results
            .as_ref()
            .ok_or_else(|| anyhow!("No simulation results available"))?;

        match format {
            OutputFormat::Csv => self.export_csv(results, filename),
            OutputFormat::Json => self.export_json(results, filename),
        }
    }

    /// Export node states to CSV format
    fn export_csv(&self, results: &SimulationResult, filename: &str) -> Result<()> {
        use csv::Writer;
        use std::fs::File;

        let file = File::create(filename).with_context(|| format!("Cannot create '{}'", filename))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(["node", "state", "code", "pins"])?;
        for (index, node) in results.nodes.iter().enumerate() {
            writer.write_record([
                index.to_string(),
                node.state.to_string(),
                node.state.code().to_string(),
                join_pins(&node.pins),
            ])?;
        }

        writer.flush()?;
        info!("Results exported to CSV: {}", filename);
        Ok(())
    }

    fn export_truth_table_csv(&self, table: &TruthTable, filename: &str) -> Result<()> {
        use csv::Writer;
        use std::fs::File;

        let file = File::create(filename).with_context(|| format!("Cannot create '{}'", filename))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(table.header())?;
        for row in &table.rows {
            writer.write_record(table.row_cells(row))?;
        }

        writer.flush()?;
        info!("Truth table exported to CSV: {}", filename);
        Ok(())
    }

    fn export_json<T: Serialize>(&self, value: &T, filename: &str) -> Result<()> {
        use std::fs::File;

        let file = File::create(filename).with_context(|| format!("Cannot create '{}'", filename))?;
        serde_json::to_writer_pretty(file, value)?;

        info!("Results exported to JSON: {}", filename);
        Ok(())
    }

    /// Print simulation summary
    pub fn print_summary(&self) {
        if let Some(schematic) = &self.schematic {
            schematic.print_summary();
        }

        if let Some(results) = &self.results {
            println!("\n=== Simulation Summary ===");
            println!("Resolver: {:?}", self.config.resolver);
            println!("Passes: {}", results.passes);
            if results.halted {
                println!("{}", "Resolution halted on a short circuit".red().bold());
            }

            println!("\nNodes:");
            for (index, node) in results.nodes.iter().enumerate() {
                let state = match node.state {
                    PowerState::Impedance => node.state.to_string().dimmed(),
                    PowerState::Ground => node.state.to_string().blue(),
                    PowerState::Power => node.state.to_string().green(),
                    PowerState::ShortCircuit => node.state.to_string().red().bold(),
                };
                println!("  #{:<3} {:<13} {}", index, state, join_pins(&node.pins));
            }
            debug!("{} short circuits", results.short_circuits().count());
        } else {
            println!("No simulation results available");
        }

        if let Some(table) = &self.truth_table {
            println!("\n=== Truth Table ===");
            table.print();
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

fn join_pins(pins: &[PinRef]) -> String {
    pins.iter()
        .map(|pin| pin.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
