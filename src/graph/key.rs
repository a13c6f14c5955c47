//! Identity of a node in a pipeline graph.
//!
//! A node is addressed by `(step, operation, slot)`. Step 0 holds the overall
//! inputs and the last step holds the overall outputs; both have no operation.
//! Interior steps hold the parameter and return slots of one operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot name of an operation's return value.
pub const RETURN_SLOT: &str = "return";

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub step: usize,
    pub operation: Option<String>,
    pub slot: String,
}

impl NodeKey {
    pub fn new(step: usize, operation: Option<&str>, slot: impl Into<String>) -> Self {
        Self {
            step,
            operation: operation.map(str::to_string),
            slot: slot.into(),
        }
    }

    /// An overall pipeline input.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(0, None, name)
    }

    /// An overall pipeline output at `last_step`.
    pub fn output(last_step: usize, name: impl Into<String>) -> Self {
        Self::new(last_step, None, name)
    }

    /// A parameter slot of the operation at `step`.
    pub fn parameter(step: usize, operation: &str, name: impl Into<String>) -> Self {
        Self::new(step, Some(operation), name)
    }

    /// The whole return value of the operation at `step`.
    pub fn ret(step: usize, operation: &str) -> Self {
        Self::new(step, Some(operation), RETURN_SLOT)
    }

    /// One field of a composite return (`return.<field>`).
    pub fn ret_field(step: usize, operation: &str, field: &str) -> Self {
        Self::new(step, Some(operation), format!("{}.{}", RETURN_SLOT, field))
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        super::util::is_return_slot(&self.slot)
    }

    /// The dotted field path after `return.`, if this is a return sub-slot.
    pub fn return_field(&self) -> Option<&str> {
        self.slot
            .strip_prefix(RETURN_SLOT)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|field| !field.is_empty())
    }

    /// Overall input or output.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.operation.is_none()
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey{}", self)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Some(operation) => write!(f, "({}, {}, {})", self.step, operation, self.slot),
            None => write!(f, "({}, None, {})", self.step, self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_slots() {
        assert!(NodeKey::ret(1, "smooth").is_return());
        let field = NodeKey::ret_field(1, "split", "mesh");
        assert!(field.is_return());
        assert_eq!(field.return_field(), Some("mesh"));
        assert!(!NodeKey::parameter(1, "smooth", "returned").is_return());
        assert_eq!(NodeKey::parameter(1, "smooth", "return.").return_field(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeKey::parameter(1, "double", "x").to_string(), "(1, double, x)");
        assert_eq!(NodeKey::input("n").to_string(), "(0, None, n)");
    }

    #[test]
    fn test_ordering_groups_by_step() {
        let mut keys = vec![
            NodeKey::output(2, "out"),
            NodeKey::parameter(1, "double", "x"),
            NodeKey::input("n"),
        ];
        keys.sort();
        assert_eq!(keys[0].step, 0);
        assert_eq!(keys[2].step, 2);
    }
}
