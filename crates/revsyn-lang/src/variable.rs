//! Variable declarations and accesses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LangError, LangResult};
use crate::expression::Expression;
use crate::module::Module;
use crate::number::{LoopVariables, Number};

/// Index of a variable declaration within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    /// Position of the declaration in its module.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Storage class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Input parameter; its output value is garbage.
    In,
    /// Output parameter; starts as constant 0.
    Out,
    /// Input/output parameter.
    Inout,
    /// State signal.
    State,
    /// Local wire; starts as constant 0 and its output is garbage.
    Wire,
}

impl VariableType {
    /// Whether lines of this type start with the constant value 0.
    pub fn is_constant(self) -> bool {
        matches!(self, VariableType::Out | VariableType::Wire)
    }

    /// Whether the output value of lines of this type is discarded.
    pub fn is_garbage(self) -> bool {
        matches!(self, VariableType::In | VariableType::Wire)
    }
}

/// A declared bit-vector or array of bit-vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    /// Declared name.
    pub name: String,
    /// Storage class.
    pub var_type: VariableType,
    /// Array dimensions, outermost first. Empty for scalars.
    pub dimensions: Vec<u32>,
    /// Width of each element.
    pub bitwidth: u32,
}

impl Variable {
    /// Create a scalar variable.
    pub fn new(name: impl Into<String>, var_type: VariableType, bitwidth: u32) -> Self {
        Self {
            name: name.into(),
            var_type,
            dimensions: vec![],
            bitwidth,
        }
    }

    /// Set the array dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Vec<u32>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Number of array elements (1 for scalars).
    pub fn num_elements(&self) -> u32 {
        self.dimensions.iter().product()
    }

    /// Number of circuit lines the variable occupies.
    pub fn num_lines(&self) -> u32 {
        self.bitwidth * self.num_elements()
    }
}

/// A read or write of a variable, optionally indexed and bit-sliced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableAccess {
    /// The accessed declaration.
    pub var: VarId,
    /// Bit range `first:second`; descending when `first > second`.
    pub range: Option<(Number, Number)>,
    /// One index per leading dimension.
    pub indexes: Vec<Expression>,
}

impl VariableAccess {
    /// Access a whole variable.
    pub fn new(var: VarId) -> Self {
        Self {
            var,
            range: None,
            indexes: vec![],
        }
    }

    /// Add an array index.
    #[must_use]
    pub fn with_index(mut self, index: Expression) -> Self {
        self.indexes.push(index);
        self
    }

    /// Restrict the access to bits `first` through `second`.
    #[must_use]
    pub fn with_range(mut self, first: Number, second: Number) -> Self {
        self.range = Some((first, second));
        self
    }

    /// Restrict the access to a single bit.
    #[must_use]
    pub fn with_bit(self, bit: Number) -> Self {
        self.with_range(bit.clone(), bit)
    }

    /// Width of the accessed bits.
    pub fn bitwidth(&self, module: &Module, loop_variables: &LoopVariables) -> LangResult<u32> {
        match &self.range {
            Some((first, second)) => {
                let first = first.evaluate(loop_variables)?;
                let second = second.evaluate(loop_variables)?;
                Ok(u32::try_from(first.abs_diff(second) + 1).unwrap_or(u32::MAX))
            }
            None => Ok(self.variable(module)?.bitwidth),
        }
    }

    /// Resolve the declaration in `module`.
    pub fn variable<'m>(&self, module: &'m Module) -> LangResult<&'m Variable> {
        module
            .variable(self.var)
            .ok_or_else(|| LangError::UnknownVariable(self.var, module.name.clone()))
    }
}
