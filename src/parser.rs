use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map, map_opt, map_res, opt, value},
    multi::many0,
    number::complete::double,
    sequence::{preceded, separated_pair, terminated},
    IResult,
};
use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};

use crate::circuit::{Connection, Element, ElementType, PinRef, Position, Schematic};

/// Reads schematics saved by the editor (JSON) or written by hand as a
/// text netlist:
///
/// ```text
/// Inverter
/// * comment
/// el1 power 0 0
/// el2 input
/// el3 pnp 100 0
/// el4 output
/// wire el1:0 el3:0
/// wire el2:0 el3:1
/// wire el3:2 el4:0
/// .signals 1
/// .end
/// ```
pub struct SchematicParser;

impl Default for SchematicParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum NetlistLine {
    Element(Element),
    Wire(Connection),
    Signals(Vec<bool>),
    End,
}

impl SchematicParser {
    pub fn new() -> Self {
        SchematicParser
    }

    /// Parse by extension: `.json` as an editor save, anything else as a netlist
    pub fn parse_file(&self, filename: &str) -> Result<Schematic> {
        let content = fs::read_to_string(filename)
            .map_err(|e| anyhow!("Failed to read file '{}': {}", filename, e))?;

        let is_json = Path::new(filename)
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        let mut schematic = if is_json {
            self.parse_json(&content)?
        } else {
            self.parse_netlist(&content)?
        };

        if schematic.title.is_empty() {
            if let Some(stem) = Path::new(filename).file_stem() {
                schematic.title = stem.to_string_lossy().into_owned();
            }
        }

        Ok(schematic)
    }

    pub fn parse_json(&self, content: &str) -> Result<Schematic> {
        serde_json::from_str(content).context("Malformed schematic JSON")
    }

    pub fn parse_netlist(&self, content: &str) -> Result<Schematic> {
        let mut schematic = Schematic::default();

        for (line_num, line) in self.preprocess_lines(content) {
            // Title is the first line that is not a directive
            if schematic.title.is_empty() && !line.starts_with('.') {
                schematic.title = line;
                continue;
            }

            let (_, parsed) = all_consuming(parse_netlist_line)(line.as_str())
                .map_err(|e| anyhow!("Line {}: cannot parse '{}': {}", line_num, line, e))?;

            match parsed {
                NetlistLine::Element(element) => schematic.elements.push(element),
                NetlistLine::Wire(connection) => schematic.connections.push(connection),
                NetlistLine::Signals(signals) => schematic.input_signals = signals,
                NetlistLine::End => break,
            }
        }

        Ok(schematic)
    }

    /// Trimmed, non-empty, non-comment lines with their 1-based line numbers.
    /// A line starting with `+` continues the previous one.
    fn preprocess_lines(&self, content: &str) -> Vec<(usize, String)> {
        let mut processed_lines: Vec<(usize, String)> = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('*') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('+') {
                if let Some((_, current)) = processed_lines.last_mut() {
                    current.push(' ');
                    current.push_str(rest.trim());
                    continue;
                }
            }

            processed_lines.push((index + 1, line.to_string()));
        }

        processed_lines
    }
}

fn parse_netlist_line(input: &str) -> IResult<&str, NetlistLine> {
    terminated(
        alt((
            value(NetlistLine::End, tag_no_case(".end")),
            map(parse_signals, NetlistLine::Signals),
            map(parse_wire, NetlistLine::Wire),
            map(parse_element, NetlistLine::Element),
        )),
        space0,
    )(input)
}

fn parse_element_id(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
        |s: &str| s.to_string(),
    )(input)
}

fn parse_element_type(input: &str) -> IResult<&str, ElementType> {
    map_opt(take_while1(|c: char| c.is_alphabetic()), ElementType::from_tag)(input)
}

fn parse_pin_ref(input: &str) -> IResult<&str, PinRef> {
    map(
        separated_pair(parse_element_id, char(':'), map_res(digit1, str::parse::<usize>)),
        |(el_id, pin_index)| PinRef { el_id, pin_index },
    )(input)
}

fn parse_element(input: &str) -> IResult<&str, Element> {
    let (input, id) = parse_element_id(input)?;
    let (input, _) = space1(input)?;
    let (input, element_type) = parse_element_type(input)?;
    let (input, pos) = opt(preceded(space1, separated_pair(double, space1, double)))(input)?;

    let pos = pos.map_or_else(Position::default, |(x, y)| Position { x, y });

    Ok((input, Element { id, element_type, pos }))
}

fn parse_wire(input: &str) -> IResult<&str, Connection> {
    let (input, _) = tag_no_case("wire")(input)?;
    let (input, (a, b)) = preceded(space1, separated_pair(parse_pin_ref, space1, parse_pin_ref))(input)?;

    Ok((input, Connection::new(a, b)))
}

fn parse_signals(input: &str) -> IResult<&str, Vec<bool>> {
    let (input, _) = tag_no_case(".signals")(input)?;
    many0(preceded(
        space1,
        alt((value(true, char('1')), value(false, char('0')))),
    ))(input)
}
