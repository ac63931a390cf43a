//! The board's net table.
//!
//! Codes read from the board are never reassigned. New nets get the next code
//! above the highest one in use, so assignment is monotonic for the life of
//! the document.

use std::collections::{BTreeMap, HashMap};

use crate::BoardError;
use crate::model::{Net, NetCode};

#[derive(Debug, Clone, Default)]
pub struct NetTable {
    nets: Vec<Net>,
    by_name: HashMap<String, NetCode>,
    /// Nets before this index were read from the board.
    declared: usize,
}

impl NetTable {
    /// Record a net read from the board.
    pub(crate) fn declare(&mut self, code: NetCode, name: &str) -> Result<(), BoardError> {
        if let Some(&existing) = self.by_name.get(name) {
            if existing == code {
                return Ok(());
            }
            return Err(BoardError::NetCodeConflict {
                name: name.to_string(),
                first: existing,
                second: code,
            });
        }
        if let Some(other) = self.nets.iter().find(|net| net.code == code) {
            return Err(BoardError::NetCodeReused {
                code,
                first: other.name.clone(),
                second: name.to_string(),
            });
        }

        self.push(code, name);
        self.declared = self.nets.len();
        Ok(())
    }

    /// Look up a net by name, creating it with the next free code if needed.
    /// Returns the code and whether the net was created.
    pub fn get_or_create(&mut self, name: &str) -> (NetCode, bool) {
        if let Some(&code) = self.by_name.get(name) {
            return (code, false);
        }

        let code = if name.is_empty() {
            NetCode::UNCONNECTED
        } else {
            self.next_code()
        };
        log::debug!("Creating net {code} '{name}'");
        self.push(code, name);
        (code, true)
    }

    fn push(&mut self, code: NetCode, name: &str) {
        self.by_name.insert(name.to_string(), code);
        self.nets.push(Net {
            code,
            name: name.to_string(),
        });
    }

    /// Next unused code. Code 0 stays reserved for "no net".
    pub fn next_code(&self) -> NetCode {
        let max = self.nets.iter().map(|net| net.code.0).max().unwrap_or(0);
        NetCode(max + 1)
    }

    pub fn code_of(&self, name: &str) -> Option<NetCode> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, code: NetCode) -> Option<&str> {
        self.nets
            .iter()
            .find(|net| net.code == code)
            .map(|net| net.name.as_str())
    }

    pub fn contains(&self, code: NetCode) -> bool {
        self.nets.iter().any(|net| net.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Nets created since the board was loaded, in creation order.
    pub fn created(&self) -> &[Net] {
        &self.nets[self.declared..]
    }

    pub fn name_to_code(&self) -> BTreeMap<String, NetCode> {
        self.nets
            .iter()
            .map(|net| (net.name.clone(), net.code))
            .collect()
    }
}
