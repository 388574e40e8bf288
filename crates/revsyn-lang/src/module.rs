//! Modules and programs.

use serde::{Deserialize, Serialize};

use crate::error::LangResult;
use crate::statement::{Statement, reverse_statements};
use crate::variable::{VarId, Variable};

/// A module: parameters, local variables and a statement body.
///
/// All declarations live in one list so that a [`VarId`] stays valid no
/// matter in which order parameters and locals are added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Every declaration, parameters and locals alike.
    pub variables: Vec<Variable>,
    /// Declarations that are parameters, in signature order.
    pub parameters: Vec<VarId>,
    /// Module body.
    pub statements: Vec<Statement>,
}

impl Module {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare a parameter.
    pub fn add_parameter(&mut self, variable: Variable) -> VarId {
        let id = self.declare(variable);
        self.parameters.push(id);
        id
    }

    /// Declare a local variable.
    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.declare(variable)
    }

    fn declare(&mut self, variable: Variable) -> VarId {
        let id = VarId(u32::try_from(self.variables.len()).unwrap_or(u32::MAX));
        self.variables.push(variable);
        id
    }

    /// Append a statement to the body.
    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Get a declaration.
    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Find a declaration by name.
    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(VarId)
    }

    /// Check whether `id` is a parameter.
    pub fn is_parameter(&self, id: VarId) -> bool {
        self.parameters.contains(&id)
    }

    /// Iterate over local declarations.
    pub fn locals(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VarId(u32::try_from(i).unwrap_or(u32::MAX)), v))
            .filter(|(id, _)| !self.is_parameter(*id))
    }

    /// The body run by `uncall`: statements in reverse order, each inverted.
    pub fn reversed_statements(&self) -> Vec<Statement> {
        reverse_statements(&self.statements)
    }
}

/// A program: a list of modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Modules in declaration order.
    pub modules: Vec<Module>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module.
    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }

    /// Find a module by name.
    pub fn find_module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Select the entry module: `name` if given, else `main`, else the first module.
    pub fn main_module(&self, name: Option<&str>) -> Option<&Module> {
        match name {
            Some(name) => self.find_module(name),
            None => self
                .find_module("main")
                .or_else(|| self.modules.first()),
        }
    }

    /// Load a program from its JSON form.
    pub fn from_json(json: &str) -> LangResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the program to JSON.
    pub fn to_json(&self) -> LangResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableType;

    #[test]
    fn test_declarations_keep_ids() {
        let mut module = Module::new("m");
        let t = module.add_variable(Variable::new("t", VariableType::Wire, 2));
        let a = module.add_parameter(Variable::new("a", VariableType::In, 2));

        assert_eq!(t, VarId(0));
        assert_eq!(a, VarId(1));
        assert_eq!(module.parameters, vec![a]);
        assert_eq!(module.find_variable("a"), Some(a));
        assert_eq!(module.locals().map(|(id, _)| id).collect::<Vec<_>>(), vec![t]);
    }

    #[test]
    fn test_main_module_selection() {
        let mut program = Program::new();
        program.add_module(Module::new("first"));
        assert_eq!(program.main_module(None).unwrap().name, "first");

        program.add_module(Module::new("main"));
        assert_eq!(program.main_module(None).unwrap().name, "main");
        assert_eq!(program.main_module(Some("first")).unwrap().name, "first");
        assert!(program.main_module(Some("missing")).is_none());
        assert!(Program::new().main_module(None).is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut module = Module::new("main");
        module.add_parameter(Variable::new("a", VariableType::Inout, 4));
        let mut program = Program::new();
        program.add_module(module);

        let json = program.to_json().unwrap();
        assert!(json.contains("\"inout\""));
        assert_eq!(Program::from_json(&json).unwrap(), program);
    }
}
