pub mod circuit;
pub mod cli;
pub mod edit;
pub mod error;
pub mod nodes;
pub mod parser;
pub mod resolver;
pub mod simulator;
pub mod truth_table;

// Re-export commonly used types
pub use circuit::{Connection, Element, ElementType, PinRef, Schematic};
pub use edit::EditCommand;
pub use error::SimError;
pub use nodes::{build_nodes, Node};
pub use parser::SchematicParser;
pub use resolver::{PowerState, ResolverConfig, ShortCircuitPolicy, Termination};
pub use simulator::{compute_simulation, compute_simulation_with, NodeState, SimulationResult, Simulator};
pub use truth_table::TruthTable;

// Error types
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
