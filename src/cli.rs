use clap::ArgMatches;
use anyhow::{anyhow, Result};

use crate::circuit::SchematicOptions;
use crate::resolver::{ResolverConfig, ShortCircuitPolicy, Termination};

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub input_file: String,
    pub output_file: Option<String>,
    pub output_format: OutputFormat,
    pub verbose_level: u8,
    pub signals: Option<Vec<bool>>,
    pub resolver: ResolverConfig,
    pub truth_table: bool,
    pub options: Option<SchematicOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let input_file = matches
            .get_one::<String>("input")
            .ok_or_else(|| anyhow!("Input file is required"))?
            .clone();

        let output_file = matches.get_one::<String>("output").cloned();

        let verbose_level = matches.get_count("verbose");

        let output_format = match matches.get_one::<String>("format").map(String::as_str) {
            Some("csv") | None => OutputFormat::Csv,
            Some("json") => OutputFormat::Json,
            Some(other) => return Err(anyhow!("Invalid output format: {}", other)),
        };

        let signals = matches
            .get_one::<String>("signals")
            .map(|value| parse_signals(value))
            .transpose()?;

        let reference = matches.get_flag("reference");
        let resolver = ResolverConfig {
            termination: if reference || matches.get_flag("single-pass") {
                Termination::SinglePass
            } else {
                Termination::FixedPoint
            },
            short_circuit: if reference || matches.get_flag("halt-on-short") {
                ShortCircuitPolicy::HaltAll
            } else {
                ShortCircuitPolicy::IsolateNode
            },
        };

        let input_vector = matches.get_flag("input-vector");
        let output_vector = matches.get_flag("output-vector");
        let options = (input_vector || output_vector).then(|| SchematicOptions {
            is_input_vector: input_vector,
            is_output_vector: output_vector,
        });

        Ok(CliArgs {
            input_file,
            output_file,
            output_format,
            verbose_level,
            signals,
            resolver,
            truth_table: matches.get_flag("truth-table"),
            options,
        })
    }
}

/// Default log filter for a `-v` count
pub fn log_level(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Parse an input signal vector: "1,0,1", "1 0 1", "101" or "true,false"
pub fn parse_signals(value: &str) -> Result<Vec<bool>> {
    let value = value.trim().to_lowercase();

    if value.is_empty() {
        return Ok(Vec::new());
    }

    let tokens: Vec<&str> = if value.contains(|c: char| c == ',' || c.is_whitespace()) {
        value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .collect()
    } else if value.chars().all(|c| c == '0' || c == '1') {
        return Ok(value.chars().map(|c| c == '1').collect());
    } else {
        vec![value.as_str()]
    };

    tokens
        .into_iter()
        .map(|token| match token {
            "1" | "true" | "high" | "h" => Ok(true),
            "0" | "false" | "low" | "l" => Ok(false),
            _ => Err(anyhow!("Invalid input signal '{}'", token)),
        })
        .collect()
}
