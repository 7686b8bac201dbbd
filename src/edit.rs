//! Editing commands. Each command produces a new [`Schematic`] snapshot and
//! leaves the original untouched; re-running the engine is up to the caller.

use log::debug;

use crate::circuit::{validate_references, Connection, Element, ElementType, PinRef, Position, Schematic};
use crate::error::SimError;

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Place a new element with the next generated id
    AddElement { element_type: ElementType, pos: Position },
    /// Delete an element together with its wires and input signal
    RemoveElement(String),
    Connect(PinRef, PinRef),
    /// Delete the wire at this index of the connection list
    Disconnect(usize),
    SetInputSignal { ordinal: usize, value: bool },
    ToggleInput(usize),
    SetInputSignals(Vec<bool>),
}

impl Schematic {
    pub fn apply(&self, command: EditCommand) -> Result<Schematic, SimError> {
        let mut next = self.clone();
        debug!("Applying {:?}", command);

        match command {
            EditCommand::AddElement { element_type, pos } => {
                let id = next.next_element_id();
                if element_type == ElementType::Input {
                    let inputs = next.input_elements().len();
                    next.input_signals.resize(inputs, false);
                    next.input_signals.push(false);
                }
                next.elements.push(Element {
                    id,
                    element_type,
                    pos,
                });
            }
            EditCommand::RemoveElement(id) => {
                let element_type = next
                    .get_element(&id)
                    .map(|el| el.element_type)
                    .ok_or_else(|| SimError::ElementNotFound(id.clone()))?;

                if element_type == ElementType::Input {
                    if let Some(ordinal) = next.input_ordinal(&id) {
                        if ordinal < next.input_signals.len() {
                            next.input_signals.remove(ordinal);
                        }
                    }
                }

                next.connections.retain(|c| !c.touches(&id));
                next.elements.retain(|el| el.id != id);
            }
            EditCommand::Connect(a, b) => {
                let connection = Connection::new(a, b);
                validate_references(&next.elements, std::slice::from_ref(&connection))?;

                let redundant = connection.0 == connection.1
                    || next.connections.iter().any(|c| c.same_wire(&connection));
                if !redundant {
                    next.connections.push(connection);
                }
            }
            EditCommand::Disconnect(index) => {
                if index >= next.connections.len() {
                    return Err(SimError::ConnectionNotFound(index));
                }
                next.connections.remove(index);
            }
            EditCommand::SetInputSignal { ordinal, value } => {
                *next.input_signal_mut(ordinal)? = value;
            }
            EditCommand::ToggleInput(ordinal) => {
                let signal = next.input_signal_mut(ordinal)?;
                *signal = !*signal;
            }
            EditCommand::SetInputSignals(signals) => {
                next.input_signals = signals;
            }
        }

        Ok(next)
    }

    pub fn apply_all<I>(&self, commands: I) -> Result<Schematic, SimError>
    where
        I: IntoIterator<Item = EditCommand>,
    {
        commands
            .into_iter()
            .try_fold(self.clone(), |schematic, command| schematic.apply(command))
    }

    fn input_signal_mut(&mut self, ordinal: usize) -> Result<&mut bool, SimError> {
        let inputs = self.input_elements().len();
        if ordinal >= inputs {
            return Err(SimError::InputNotFound(ordinal));
        }
        if self.input_signals.len() < inputs {
            self.input_signals.resize(inputs, false);
        }
        Ok(&mut self.input_signals[ordinal])
    }
}
