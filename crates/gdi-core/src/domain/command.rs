//! Command - operation と sub-command
//!
//! ワイヤ上では 1 つの `u32` に詰め込まれますが（下位 8 bit が operation、
//! それより上が sub-command のビット集合）、ドメインでは別々の型で扱います。
//! 結合するのはシリアライズ境界（`Command::encode` / `Command::decode`）だけです。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

const OPERATION_MASK: u32 = 0xff;

/// The operation a task performs on its target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Add,
    Delete,
    Modify,
    Trigger,
    PermCheck,
    Copy,
    Replace,
}

impl Operation {
    fn code(self) -> u32 {
        match self {
            Operation::Get => 0,
            Operation::Add => 1,
            Operation::Delete => 2,
            Operation::Modify => 3,
            Operation::Trigger => 4,
            Operation::PermCheck => 5,
            Operation::Copy => 7,
            Operation::Replace => 8,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Operation::Get),
            1 => Some(Operation::Add),
            2 => Some(Operation::Delete),
            3 => Some(Operation::Modify),
            4 => Some(Operation::Trigger),
            5 => Some(Operation::PermCheck),
            7 => Some(Operation::Copy),
            8 => Some(Operation::Replace),
            _ => None,
        }
    }

    /// Display name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Add => "ADD",
            Operation::Delete => "DEL",
            Operation::Modify => "MOD",
            Operation::Copy => "COPY",
            Operation::Trigger => "TRIGGER",
            Operation::PermCheck => "PERMCHECK",
            Operation::Replace => "REPLACE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-command bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubCommand(u32);

impl SubCommand {
    pub const NONE: Self = Self(0);
    /// Return the object as stored by the master (ADD only).
    pub const RETURN_NEW_VERSION: Self = Self(1 << 8);
    pub const CHANGE: Self = Self(1 << 9);
    pub const APPEND: Self = Self(1 << 10);
    pub const REMOVE: Self = Self(1 << 11);
    pub const SET_ALL: Self = Self(1 << 12);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SubCommand {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SubCommand {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Error returned when a wire value does not name a known operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation code {code} in command {raw:#x}")]
pub struct UnknownOperation {
    pub code: u32,
    pub raw: u32,
}

/// Operation + sub-command flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub struct Command {
    operation: Operation,
    sub_command: SubCommand,
}

impl Command {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            sub_command: SubCommand::NONE,
        }
    }

    pub fn with(mut self, sub_command: SubCommand) -> Self {
        self.sub_command |= sub_command;
        self
    }

    pub fn get() -> Self {
        Self::new(Operation::Get)
    }

    pub fn add() -> Self {
        Self::new(Operation::Add)
    }

    pub fn delete() -> Self {
        Self::new(Operation::Delete)
    }

    pub fn modify() -> Self {
        Self::new(Operation::Modify)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn sub_command(&self) -> SubCommand {
        self.sub_command
    }

    /// Does the master hand back objects for this command?
    ///
    /// GET and PERMCHECK always do; ADD only when asked for the new version.
    pub fn returns_objects(&self) -> bool {
        match self.operation {
            Operation::Get | Operation::PermCheck => true,
            Operation::Add => self.sub_command == SubCommand::RETURN_NEW_VERSION,
            _ => false,
        }
    }

    pub fn encode(&self) -> u32 {
        self.operation.code() | self.sub_command.bits()
    }

    pub fn decode(raw: u32) -> Result<Self, UnknownOperation> {
        let code = raw & OPERATION_MASK;
        let operation = Operation::from_code(code).ok_or(UnknownOperation { code, raw })?;
        Ok(Self {
            operation,
            sub_command: SubCommand(raw & !OPERATION_MASK),
        })
    }
}

impl From<Command> for u32 {
    fn from(command: Command) -> u32 {
        command.encode()
    }
}

impl TryFrom<u32> for Command {
    type Error = UnknownOperation;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Command::decode(raw)
    }
}

/// Display name of the operation encoded in a raw command word.
///
/// Unknown operation codes are shown as `???`.
pub fn operation_name(raw: u32) -> &'static str {
    Operation::from_code(raw & OPERATION_MASK)
        .map(Operation::name)
        .unwrap_or("???")
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_command.is_empty() {
            write!(f, "{}", self.operation)
        } else {
            write!(f, "{}+{:#x}", self.operation, self.sub_command.bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::get(Operation::Get, "GET")]
    #[case::add(Operation::Add, "ADD")]
    #[case::delete(Operation::Delete, "DEL")]
    #[case::modify(Operation::Modify, "MOD")]
    #[case::copy(Operation::Copy, "COPY")]
    #[case::trigger(Operation::Trigger, "TRIGGER")]
    #[case::permcheck(Operation::PermCheck, "PERMCHECK")]
    #[case::replace(Operation::Replace, "REPLACE")]
    fn operation_names(#[case] operation: Operation, #[case] expected: &str) {
        let raw = Command::new(operation).with(SubCommand::SET_ALL).encode();
        assert_eq!(operation_name(raw), expected);
    }

    #[test]
    fn unknown_operation_is_question_marks() {
        assert_eq!(operation_name(6), "???");
        assert_eq!(operation_name(0x42), "???");
        assert!(Command::decode(6).is_err());
    }

    #[test]
    fn sub_command_survives_the_wire_word() {
        let command = Command::add().with(SubCommand::RETURN_NEW_VERSION);
        let decoded = Command::decode(command.encode()).unwrap();
        assert_eq!(decoded, command);
        assert!(decoded.sub_command().contains(SubCommand::RETURN_NEW_VERSION));
    }

    #[rstest]
    #[case::get(Command::get(), true)]
    #[case::permcheck(Command::new(Operation::PermCheck), true)]
    #[case::plain_add(Command::add(), false)]
    #[case::add_new_version(Command::add().with(SubCommand::RETURN_NEW_VERSION), true)]
    #[case::add_new_version_and_more(
        Command::add().with(SubCommand::RETURN_NEW_VERSION | SubCommand::SET_ALL),
        false
    )]
    #[case::delete(Command::delete(), false)]
    fn returns_objects(#[case] command: Command, #[case] expected: bool) {
        assert_eq!(command.returns_objects(), expected);
    }
}
