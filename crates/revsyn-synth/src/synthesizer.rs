//! Statement and expression synthesis.
//!
//! The [`Synthesizer`] walks a module body and emits gates into a
//! [`ControlStack`]. Every expression leaves behind an [`Operand`]: the lines
//! holding its value plus the scratch needed to undo it. Releasing an operand
//! replays its gates in reverse, which returns every scratch line to the
//! constant pool holding its original value.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::{debug, instrument, warn};

use revsyn_ir::{Circuit, Gate, LineId};
use revsyn_lang::{
    AssignOp, BinaryOp, CallStatement, Expression, ForStatement, IfStatement, LangError,
    LoopVariables, Module, Program, ShiftOp, Statement, UnaryOp, UnaryStatementOp, VarId,
    Variable, VariableAccess, VariableType,
};

use crate::analysis::ProgramAnalysis;
use crate::arith;
use crate::assemble::assemble;
use crate::cct::{ControlStack, Tape};
use crate::error::{SynthError, SynthResult};
use crate::pool::{ConstantLinePool, ScratchMark, constant_output};
use crate::settings::{IfRealization, SynthesisSettings};

/// Widest index expression a dynamic array access may use.
pub const MAX_SELECTOR_WIDTH: usize = 16;

/// Scratch state an evaluation leaves behind.
#[derive(Debug, Default)]
struct Scratch {
    /// Ledger position before the evaluation allocated anything.
    mark: Option<ScratchMark>,
    /// Gates computing into the allocated lines.
    tape: Tape,
    /// Operands the computation read from.
    children: Vec<Scratch>,
}

/// Lines holding the value of an evaluated expression.
#[derive(Debug)]
pub struct Operand {
    lines: Vec<LineId>,
    scratch: Scratch,
}

impl Operand {
    fn direct(lines: Vec<LineId>) -> Self {
        Self {
            lines,
            scratch: Scratch::default(),
        }
    }

    /// Value lines, least significant first.
    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    /// Whether the operand is a plain view of variable lines.
    pub fn is_direct(&self) -> bool {
        self.scratch.mark.is_none() && self.scratch.children.is_empty()
    }
}

/// Lines a statement may modify in place.
struct Target {
    lines: Vec<LineId>,
    /// Swap network moving a dynamically selected element into helper lines.
    network: Option<(Tape, ScratchMark)>,
    /// Set while the dynamic indexes select an element; controls every
    /// write into the helper lines.
    in_range: Option<LineId>,
    selectors: Scratch,
}

enum Index {
    Constant(u64),
    Dynamic(Expression),
}

/// Where the bits of an access live.
struct Layout {
    name: String,
    base: LineId,
    bitwidth: u64,
    dimensions: Vec<u64>,
    bits: Vec<u64>,
    indexes: Vec<Index>,
    size: u64,
}

impl Layout {
    fn is_static(&self) -> bool {
        self.indexes.iter().all(|i| matches!(i, Index::Constant(_)))
    }

    fn stride(&self, dimension: usize) -> u64 {
        self.dimensions.iter().skip(dimension + 1).product()
    }

    fn element_lines(&self, element: u64) -> Vec<LineId> {
        self.bits
            .iter()
            .map(|bit| offset(self.base, element * self.bitwidth + bit))
            .collect()
    }

    fn static_lines(&self) -> Vec<LineId> {
        let element = self
            .indexes
            .iter()
            .enumerate()
            .map(|(d, index)| match index {
                Index::Constant(value) => value * self.stride(d),
                Index::Dynamic(_) => 0,
            })
            .sum();
        self.element_lines(element)
    }

    /// Whether some dynamic index can take a value past its dimension.
    fn may_miss(&self, selectors: &[Option<Vec<LineId>>]) -> bool {
        selectors
            .iter()
            .zip(&self.dimensions)
            .any(|(selector, &size)| {
                selector
                    .as_ref()
                    .is_some_and(|lines| (1_u64 << lines.len()) > size)
            })
    }

    fn block(&self) -> impl Iterator<Item = LineId> + '_ {
        (0..self.size).map(|i| offset(self.base, i))
    }
}

fn offset(base: LineId, offset: u64) -> LineId {
    LineId(base.0.saturating_add(u32::try_from(offset).unwrap_or(u32::MAX)))
}

#[derive(Debug, Clone, Copy)]
enum AccessMode {
    Copy,
    /// Swap, toggling `in_range` whenever an element is selected.
    Swap { in_range: Option<LineId> },
}

/// Variables visible in the module being synthesized.
struct Frame<'p> {
    module: &'p Module,
    bases: FxHashMap<VarId, LineId>,
}

/// Synthesizes statements of one program into one circuit.
pub struct Synthesizer<'c, 'p> {
    circuit: &'c mut Circuit,
    program: &'p Program,
    analysis: &'p ProgramAnalysis,
    settings: &'p SynthesisSettings,
    cct: ControlStack,
    pool: ConstantLinePool,
    frames: Vec<Frame<'p>>,
    /// Variable lines redirected to duplicates by duplication-style ifs.
    dup_layers: Vec<FxHashMap<LineId, LineId>>,
    loop_variables: LoopVariables,
    depth: usize,
    warned_duplication: bool,
}

impl<'c, 'p> Synthesizer<'c, 'p> {
    /// Create a synthesizer appending to `circuit`.
    pub fn new(
        circuit: &'c mut Circuit,
        program: &'p Program,
        analysis: &'p ProgramAnalysis,
        settings: &'p SynthesisSettings,
    ) -> Self {
        Self {
            circuit,
            program,
            analysis,
            settings,
            cct: ControlStack::new(),
            pool: ConstantLinePool::new(),
            frames: vec![],
            dup_layers: vec![],
            loop_variables: LoopVariables::default(),
            depth: 0,
            warned_duplication: false,
        }
    }

    /// Start counting calls from `depth`, for modules synthesized on behalf
    /// of a caller.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Declare the lines of `module` and synthesize its body.
    #[instrument(skip(self, module), fields(module = %module.name))]
    pub fn on_module(&mut self, module: &'p Module) -> SynthResult<()> {
        self.declare_module(module);
        debug!(lines = self.circuit.num_lines(), "declared module variables");
        self.statements(&module.statements)
    }

    /// Declare circuit lines and buses for every variable of `module`,
    /// parameters first, and make it the current scope.
    pub fn declare_module(&mut self, module: &'p Module) {
        let mut bases = FxHashMap::default();
        for &id in &module.parameters {
            if let Some(variable) = module.variable(id) {
                bases.insert(id, self.declare(variable, true));
            }
        }
        for (id, variable) in module.locals() {
            bases.insert(id, self.declare(variable, true));
        }
        self.frames.push(Frame { module, bases });
    }

    fn declare(&mut self, variable: &Variable, buses: bool) -> LineId {
        let constant = variable.var_type.is_constant().then_some(false);
        let garbage = variable.var_type.is_garbage();
        let mut lines = Vec::with_capacity(variable.num_lines() as usize);
        for element in 0..variable.num_elements() {
            let array = array_suffix(&variable.dimensions, element);
            for bit in 0..variable.bitwidth {
                let name = self.settings.line_name(&variable.name, &array, bit);
                lines.push(self.circuit.add_line(name.clone(), name, constant, garbage));
            }
        }
        let base = lines
            .first()
            .copied()
            .unwrap_or_else(|| LineId::from(self.circuit.num_lines()));

        if buses {
            let name = variable.name.clone();
            match variable.var_type {
                VariableType::In => self.circuit.inputbuses_mut().add(name, lines),
                VariableType::Out => self.circuit.outputbuses_mut().add(name, lines),
                VariableType::Inout => {
                    self.circuit.inputbuses_mut().add(name.clone(), lines.clone());
                    self.circuit.outputbuses_mut().add(name, lines);
                }
                VariableType::State => self.circuit.statesignals_mut().add(name, lines),
                VariableType::Wire => {}
            }
        }
        base
    }

    fn module(&self) -> SynthResult<&'p Module> {
        self.frames
            .last()
            .map(|frame| frame.module)
            .ok_or(SynthError::NoModules)
    }

    fn base(&self, var: VarId) -> SynthResult<LineId> {
        let frame = self.frames.last().ok_or(SynthError::NoModules)?;
        frame
            .bases
            .get(&var)
            .copied()
            .ok_or_else(|| LangError::UnknownVariable(var, frame.module.name.clone()).into())
    }

    /// Line currently standing in for `line`.
    fn resolve(&self, line: LineId) -> LineId {
        self.dup_layers
            .iter()
            .fold(line, |line, layer| layer.get(&line).copied().unwrap_or(line))
    }

    fn resolve_all(&self, lines: impl IntoIterator<Item = LineId>) -> Vec<LineId> {
        lines.into_iter().map(|line| self.resolve(line)).collect()
    }

    fn allocate(&mut self, width: usize, value: u64) -> SynthResult<Vec<LineId>> {
        self.pool.allocate(self.circuit, &mut self.cct, width, value)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statements(&mut self, statements: &'p [Statement]) -> SynthResult<()> {
        for statement in statements {
            self.on_statement(statement)?;
        }
        Ok(())
    }

    /// Synthesize one statement.
    ///
    /// On success every scratch line the statement allocated has been
    /// released or kept as garbage. On failure lines still on the ledger are
    /// abandoned as garbage.
    pub fn on_statement(&mut self, statement: &'p Statement) -> SynthResult<()> {
        debug!(kind = statement.kind(), "synthesizing statement");
        let mark = self.pool.mark();
        let result = match statement {
            Statement::Swap { lhs, rhs } => self.swap(lhs, rhs),
            Statement::Unary { op, var } => self.unary(*op, var),
            Statement::Assign { lhs, op, rhs } => self.assign(lhs, *op, rhs),
            Statement::If(stmt) => self.conditional(statement, stmt),
            Statement::For(stmt) => self.for_loop(stmt),
            Statement::Call(call) => self.call(call, false),
            Statement::Uncall(call) => self.call(call, true),
            Statement::Skip => Ok(()),
        };
        match &result {
            Ok(()) => debug_assert_eq!(self.pool.mark(), mark, "statement leaked scratch lines"),
            Err(_) => self.pool.keep_to(mark),
        }
        result
    }

    fn assign(&mut self, lhs: &VariableAccess, op: AssignOp, rhs: &Expression) -> SynthResult<()> {
        let module = self.module()?;
        if reads_variable(rhs, lhs.var) {
            return Err(SynthError::UnsupportedConstruct(format!(
                "'{}' occurs on both sides of an assignment",
                lhs.variable(module)?.name
            )));
        }
        let rhs = rhs.fold_constants(module, &self.loop_variables)?;
        let width = self.layout(lhs)?.bits.len();
        let rhs_width = self.width(&rhs, Some(width))?;
        if width != rhs_width {
            return Err(SynthError::BitwidthMismatch {
                context: op.symbol().to_string(),
                lhs: width,
                rhs: rhs_width,
            });
        }

        let value = self.expression(&rhs, Some(width))?;
        let target = self.write_access(lhs)?;
        match op {
            AssignOp::Add => arith::increase(&mut self.cct, &target.lines, &value.lines),
            AssignOp::Subtract => arith::decrease(&mut self.cct, &target.lines, &value.lines),
            AssignOp::Exor => arith::bitwise_cnot(&mut self.cct, &target.lines, &value.lines),
        }
        self.release_target(target)?;
        self.off_expression(value)
    }

    fn unary(&mut self, op: UnaryStatementOp, var: &VariableAccess) -> SynthResult<()> {
        let target = self.write_access(var)?;
        match op {
            UnaryStatementOp::Invert => arith::bitwise_negation(&mut self.cct, &target.lines),
            UnaryStatementOp::Increment => arith::increment(&mut self.cct, &target.lines),
            UnaryStatementOp::Decrement => arith::decrement(&mut self.cct, &target.lines),
        }
        self.release_target(target)
    }

    fn swap(&mut self, lhs: &VariableAccess, rhs: &VariableAccess) -> SynthResult<()> {
        let left = self.layout(lhs)?;
        let right = self.layout(rhs)?;
        if left.bits.len() != right.bits.len() {
            return Err(SynthError::BitwidthMismatch {
                context: "<=>".to_string(),
                lhs: left.bits.len(),
                rhs: right.bits.len(),
            });
        }
        let crossed = lhs.indexes.iter().any(|index| reads_variable(index, rhs.var))
            || rhs.indexes.iter().any(|index| reads_variable(index, lhs.var));
        if crossed {
            return Err(SynthError::UnsupportedConstruct(format!(
                "swap of '{}' and '{}' indexed by each other",
                left.name, right.name
            )));
        }
        if lhs.var == rhs.var {
            if !left.is_static() || !right.is_static() {
                return Err(SynthError::UnsupportedConstruct(format!(
                    "swap between dynamically indexed elements of '{}'",
                    left.name
                )));
            }
            let (a, b) = (left.static_lines(), right.static_lines());
            if a == b {
                return Ok(());
            }
            if a.iter().any(|line| b.contains(line)) {
                return Err(SynthError::UnsupportedConstruct(format!(
                    "swap of overlapping bits of '{}'",
                    left.name
                )));
            }
        }

        let a = self.write_access(lhs)?;
        let b = self.write_access(rhs)?;
        arith::swap(&mut self.cct, &a.lines, &b.lines);
        self.release_target(b)?;
        self.release_target(a)
    }

    fn conditional(&mut self, statement: &'p Statement, stmt: &'p IfStatement) -> SynthResult<()> {
        let module = self.module()?;
        let condition = stmt.condition.fold_constants(module, &self.loop_variables)?;
        if let Some(value) = condition.constant_value() {
            debug!(value, "constant if condition");
            let branch = if value != 0 {
                &stmt.then_statements
            } else {
                &stmt.else_statements
            };
            return self.statements(branch);
        }
        let fi_condition = stmt.fi_condition.fold_constants(module, &self.loop_variables)?;
        self.width(&condition, None)?;
        self.width(&fi_condition, None)?;

        let guard = self.pool.allocate_line(self.circuit, &mut self.cct, false)?;
        self.guard_into(guard, &condition)?;

        match self.settings.if_realization {
            IfRealization::Controlled => {
                self.cct.push(guard);
                self.statements(&stmt.then_statements)?;
                self.cct.pop(guard);
                self.cct.not(guard);
                self.cct.push(guard);
                self.statements(&stmt.else_statements)?;
                self.cct.pop(guard);
                self.cct.not(guard);
            }
            IfRealization::Duplication => {
                if self.settings.garbage_free && !self.warned_duplication {
                    warn!("duplication-style if statements leave garbage lines");
                    self.warned_duplication = true;
                }
                self.duplicated(statement, stmt, guard)?;
            }
        }

        if self.settings.garbage_free {
            self.guard_into(guard, &fi_condition)?;
            self.pool.release(self.circuit, &mut self.cct, guard)
        } else {
            self.pool.keep_top();
            Ok(())
        }
    }

    /// Run the then-branch on duplicates of every written variable, the
    /// else-branch on the originals, and swap the duplicates in under the
    /// guard.
    fn duplicated(
        &mut self,
        statement: &'p Statement,
        stmt: &'p IfStatement,
        guard: LineId,
    ) -> SynthResult<()> {
        let written = match self.analysis.changing_variables(statement) {
            Some(written) => written.clone(),
            None => statement.written_variables(self.program),
        };
        let mark = self.pool.mark();
        let mut layer = FxHashMap::default();
        for var in written {
            let module = self.module()?;
            let size = module
                .variable(var)
                .ok_or_else(|| LangError::UnknownVariable(var, module.name.clone()))?
                .num_lines();
            let base = self.base(var)?;
            let originals = self.resolve_all((0..u64::from(size)).map(|i| offset(base, i)));
            let copies = self.allocate(originals.len(), 0)?;
            arith::bitwise_cnot(&mut self.cct, &copies, &originals);
            layer.extend(originals.into_iter().zip(copies));
        }
        debug!(lines = layer.len(), "duplicated written variables");

        self.dup_layers.push(layer);
        let then = self.statements(&stmt.then_statements);
        let layer = self.dup_layers.pop().unwrap_or_default();
        then?;
        self.statements(&stmt.else_statements)?;

        self.cct.push(guard);
        for (&original, &copy) in &layer {
            self.cct.fredkin(original, copy);
        }
        self.cct.pop(guard);
        self.pool.keep_to(mark);
        Ok(())
    }

    /// XOR the truth of `condition` into `guard`.
    fn guard_into(&mut self, guard: LineId, condition: &Expression) -> SynthResult<()> {
        if let Some(value) = condition.constant_value() {
            if value != 0 {
                self.cct.not(guard);
            }
            return Ok(());
        }
        let value = self.expression(condition, None)?;
        let Some(&bit) = value.lines.first() else {
            return Err(SynthError::UnsupportedConstruct(
                "empty if condition".to_string(),
            ));
        };
        self.cct.cnot(bit, guard);
        self.off_expression(value)
    }

    fn for_loop(&mut self, stmt: &'p ForStatement) -> SynthResult<()> {
        let from = match &stmt.from {
            Some(from) => from.evaluate(&self.loop_variables)?,
            None => 1,
        };
        let to = stmt.to.evaluate(&self.loop_variables)?;
        let step = match &stmt.step {
            Some(step) => step.evaluate(&self.loop_variables)?,
            None => 1,
        };
        if step == 0 {
            return Err(SynthError::InvalidLoopStep);
        }
        let descending = stmt.descending || (stmt.from.is_some() && to < from);
        let mut values = loop_values(from, to, step, descending);
        debug!(from, to, step, descending, "unrolling loop");

        loop {
            let next = if stmt.reverse_order {
                values.next_back()
            } else {
                values.next()
            };
            let Some(value) = next else {
                break;
            };
            let previous = stmt
                .loop_variable
                .as_ref()
                .and_then(|name| self.loop_variables.insert(name.clone(), value));
            let result = self.statements(&stmt.statements);
            if let Some(name) = &stmt.loop_variable {
                match previous {
                    Some(previous) => {
                        self.loop_variables.insert(name.clone(), previous);
                    }
                    None => {
                        self.loop_variables.remove(name);
                    }
                }
            }
            result?;
        }
        Ok(())
    }

    fn call(&mut self, call: &'p CallStatement, reverse: bool) -> SynthResult<()> {
        let callee = self
            .program
            .find_module(&call.target)
            .ok_or_else(|| SynthError::UnknownModule(call.target.clone()))?;
        if self.depth + self.frames.len() > self.settings.max_call_depth {
            return Err(SynthError::RecursionLimit {
                limit: self.settings.max_call_depth,
            });
        }
        let arguments = self.bind_arguments(call, callee)?;

        if self.settings.modules_hierarchy && !reverse {
            return self.embed(callee, &arguments);
        }

        let mut bases: FxHashMap<VarId, LineId> =
            callee.parameters.iter().copied().zip(arguments).collect();
        for (id, variable) in callee.locals() {
            bases.insert(id, self.declare(variable, false));
        }
        let body = if reverse {
            self.analysis
                .reversed_body(&callee.name)
                .ok_or_else(|| SynthError::UnknownModule(callee.name.clone()))?
        } else {
            callee.statements.as_slice()
        };
        debug!(module = %callee.name, reverse, "inlining module");

        self.frames.push(Frame {
            module: callee,
            bases,
        });
        let result = self.statements(body);
        self.frames.pop();
        result
    }

    /// Base lines of the caller variables bound to each callee parameter.
    fn bind_arguments(&self, call: &CallStatement, callee: &Module) -> SynthResult<Vec<LineId>> {
        if call.arguments.len() != callee.parameters.len() {
            return Err(SynthError::ArgumentCountMismatch {
                module: callee.name.clone(),
                expected: callee.parameters.len(),
                got: call.arguments.len(),
            });
        }
        let module = self.module()?;
        let mut seen = BTreeSet::new();
        let mut bases = Vec::with_capacity(call.arguments.len());
        for (&argument, &parameter) in call.arguments.iter().zip(&callee.parameters) {
            let actual = module
                .variable(argument)
                .ok_or_else(|| LangError::UnknownVariable(argument, module.name.clone()))?;
            let formal = callee
                .variable(parameter)
                .ok_or_else(|| LangError::UnknownVariable(parameter, callee.name.clone()))?;
            if !seen.insert(argument) {
                return Err(SynthError::UnsupportedConstruct(format!(
                    "'{}' is passed to '{}' more than once",
                    actual.name, callee.name
                )));
            }
            if actual.bitwidth != formal.bitwidth || actual.dimensions != formal.dimensions {
                return Err(SynthError::BitwidthMismatch {
                    context: format!("argument '{}' of '{}'", formal.name, callee.name),
                    lhs: actual.num_lines() as usize,
                    rhs: formal.num_lines() as usize,
                });
            }
            bases.push(self.base(argument)?);
        }
        Ok(bases)
    }

    /// Emit `callee` as a single module gate, synthesizing it on first use.
    fn embed(&mut self, callee: &'p Module, arguments: &[LineId]) -> SynthResult<()> {
        if !self.circuit.has_module(&callee.name) {
            debug!(module = %callee.name, "synthesizing embedded module");
            let mut circuit = Circuit::new(callee.name.clone());
            let depth = self.depth + self.frames.len();
            let mut inner = Synthesizer::new(&mut circuit, self.program, self.analysis, self.settings)
                .with_depth(depth);
            inner.on_module(callee)?;
            inner.finish()?;
            self.circuit.add_module(callee.name.clone(), circuit);
        }

        let mut targets = vec![];
        for (&parameter, &base) in callee.parameters.iter().zip(arguments) {
            let size = callee.variable(parameter).map_or(0, Variable::num_lines);
            targets.extend(self.resolve_all((0..u64::from(size)).map(|i| offset(base, i))));
        }
        let extra: Vec<(Option<bool>, String)> = self
            .circuit
            .module(&callee.name)
            .ok_or_else(|| SynthError::UnknownModule(callee.name.clone()))?
            .lines()
            .get(targets.len()..)
            .unwrap_or_default()
            .iter()
            .map(|line| (line.constant, line.output.clone()))
            .collect();

        let mut pooled = Vec::with_capacity(extra.len());
        for (constant, _) in &extra {
            let line = self
                .pool
                .allocate_line(self.circuit, &mut self.cct, constant.unwrap_or(false))?;
            pooled.push(line);
        }
        targets.extend_from_slice(&pooled);
        self.cct.emit(Gate::module(callee.name.clone(), [], targets));

        // The module restores its own constant lines; everything else it
        // leaves behind stays garbage.
        for ((constant, output), &line) in extra.iter().zip(&pooled).rev() {
            match constant {
                Some(value) if output == constant_output(*value) => {
                    self.pool.release(self.circuit, &mut self.cct, line)?;
                }
                _ => {
                    self.pool.keep_top();
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Evaluate `expr` into lines.
    ///
    /// The result must be handed back to [`off_expression`](Self::off_expression)
    /// in reverse order of evaluation.
    pub fn on_expression(&mut self, expr: &Expression) -> SynthResult<Operand> {
        let module = self.module()?;
        let folded = expr.fold_constants(module, &self.loop_variables)?;
        self.width(&folded, None)?;
        self.expression(&folded, None)
    }

    /// Undo an evaluation and release its scratch lines.
    pub fn off_expression(&mut self, operand: Operand) -> SynthResult<()> {
        self.release_scratch(operand.scratch)
    }

    fn release_scratch(&mut self, scratch: Scratch) -> SynthResult<()> {
        if let Some(mark) = scratch.mark {
            if self.settings.garbage_free || scratch.tape.is_empty() {
                self.cct.replay_reversed(&scratch.tape);
                self.pool.release_to(self.circuit, &mut self.cct, mark)?;
            } else {
                self.pool.keep_to(mark);
            }
        }
        for child in scratch.children.into_iter().rev() {
            self.release_scratch(child)?;
        }
        Ok(())
    }

    /// Width of a folded expression. Numeric literals take the width of the
    /// other operand, or `hint` when there is none.
    fn width(&self, expr: &Expression, hint: Option<usize>) -> SynthResult<usize> {
        match expr {
            Expression::Numeric { bitwidth, .. } => Ok(hint.unwrap_or(*bitwidth as usize)),
            Expression::Variable(access) => Ok(self.layout(access)?.bits.len()),
            Expression::Binary { lhs, op, rhs } => {
                let (lhs_width, rhs_width) = self.operand_widths(lhs, *op, rhs, hint)?;
                if !matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
                    && lhs_width != rhs_width
                {
                    return Err(SynthError::BitwidthMismatch {
                        context: op.symbol().to_string(),
                        lhs: lhs_width,
                        rhs: rhs_width,
                    });
                }
                Ok(if op.is_boolean() { 1 } else { lhs_width })
            }
            Expression::Shift { lhs, .. } => self.width(lhs, hint),
            Expression::Unary {
                op: UnaryOp::LogicalNot,
                expr,
            } => {
                self.width(expr, None)?;
                Ok(1)
            }
            Expression::Unary {
                op: UnaryOp::BitwiseNot,
                expr,
            } => self.width(expr, hint),
        }
    }

    /// Widths of both operands, each subexpression visited once.
    fn operand_widths(
        &self,
        lhs: &Expression,
        op: BinaryOp,
        rhs: &Expression,
        hint: Option<usize>,
    ) -> SynthResult<(usize, usize)> {
        let hint = if op.is_boolean() { None } else { hint };
        Ok(match (lhs.constant_value(), rhs.constant_value()) {
            (Some(_), None) => {
                let width = self.width(rhs, hint)?;
                (self.width(lhs, Some(width))?, width)
            }
            (None, Some(_)) => {
                let width = self.width(lhs, hint)?;
                (width, self.width(rhs, Some(width))?)
            }
            _ => (self.width(lhs, hint)?, self.width(rhs, hint)?),
        })
    }

    /// Hints for evaluating both operands: a literal takes the width of the
    /// other side.
    fn operand_hints(
        &self,
        lhs: &Expression,
        op: BinaryOp,
        rhs: &Expression,
        hint: Option<usize>,
    ) -> SynthResult<(Option<usize>, Option<usize>)> {
        let hint = if op.is_boolean() { None } else { hint };
        Ok(match (lhs.constant_value(), rhs.constant_value()) {
            (Some(_), None) => {
                let width = self.width(rhs, hint)?;
                (Some(width), hint)
            }
            (None, Some(_)) => {
                let width = self.width(lhs, hint)?;
                (hint, Some(width))
            }
            _ => (hint, hint),
        })
    }

    fn expression(&mut self, expr: &Expression, hint: Option<usize>) -> SynthResult<Operand> {
        match expr {
            Expression::Numeric { value, bitwidth } => {
                let value = value.evaluate(&self.loop_variables)?;
                let mark = self.pool.mark();
                let lines = self.allocate(hint.unwrap_or(*bitwidth as usize), value)?;
                Ok(Operand {
                    lines,
                    scratch: Scratch {
                        mark: Some(mark),
                        ..Scratch::default()
                    },
                })
            }
            Expression::Variable(access) => self.read_access(access),
            Expression::Binary { lhs, op, rhs } => self.binary(lhs, *op, rhs, hint),
            Expression::Shift { lhs, op, amount } => {
                let amount = usize::try_from(amount.evaluate(&self.loop_variables)?)
                    .unwrap_or(usize::MAX);
                let value = self.expression(lhs, hint)?;
                let mark = self.pool.mark();
                let result = self.allocate(value.lines.len(), 0)?;
                self.cct.begin_tape();
                match op {
                    ShiftOp::Left => arith::left_shift(&mut self.cct, &result, &value.lines, amount),
                    ShiftOp::Right => {
                        arith::right_shift(&mut self.cct, &result, &value.lines, amount);
                    }
                }
                Ok(self.computed(result, mark, vec![value]))
            }
            Expression::Unary { op, expr } => {
                let inner_hint = match op {
                    UnaryOp::BitwiseNot => hint,
                    UnaryOp::LogicalNot => None,
                };
                let value = self.expression(expr, inner_hint)?;
                let mark = self.pool.mark();
                let result = match op {
                    UnaryOp::BitwiseNot => {
                        let result = self.allocate(value.lines.len(), 0)?;
                        self.cct.begin_tape();
                        arith::bitwise_cnot(&mut self.cct, &result, &value.lines);
                        arith::bitwise_negation(&mut self.cct, &result);
                        result
                    }
                    UnaryOp::LogicalNot => {
                        let result = self.allocate(1, 0)?;
                        self.cct.begin_tape();
                        arith::logical_not(&mut self.cct, result[0], &value.lines);
                        result
                    }
                };
                Ok(self.computed(result, mark, vec![value]))
            }
        }
    }

    /// Close the tape opened for a computation into `lines`.
    fn computed(&mut self, lines: Vec<LineId>, mark: ScratchMark, operands: Vec<Operand>) -> Operand {
        let tape = self.cct.end_tape();
        Operand {
            lines,
            scratch: Scratch {
                mark: Some(mark),
                tape,
                children: operands.into_iter().map(|o| o.scratch).collect(),
            },
        }
    }

    fn binary(
        &mut self,
        lhs: &Expression,
        op: BinaryOp,
        rhs: &Expression,
        hint: Option<usize>,
    ) -> SynthResult<Operand> {
        let (lhs_hint, rhs_hint) = self.operand_hints(lhs, op, rhs, hint)?;
        let left = self.expression(lhs, lhs_hint)?;
        let right = self.expression(rhs, rhs_hint)?;
        let right = self.detach(right, &left.lines.iter().copied().collect())?;
        let (Some(&l0), Some(&r0)) = (left.lines.first(), right.lines.first()) else {
            return Err(SynthError::UnsupportedConstruct(format!(
                "empty operand of '{}'",
                op.symbol()
            )));
        };

        let n = left.lines.len();
        let mark = self.pool.mark();
        let result = self.allocate(if op.is_boolean() { 1 } else { n }, 0)?;
        let extra = match op {
            BinaryOp::Modulo | BinaryOp::FracDivide => self.allocate(n, 0)?,
            _ => vec![],
        };

        self.cct.begin_tape();
        let (s, l, r, d) = (&mut self.cct, left.lines.as_slice(), right.lines.as_slice(), result.as_slice());
        match op {
            BinaryOp::Add => {
                arith::bitwise_cnot(s, d, l);
                arith::increase(s, d, r);
            }
            BinaryOp::Subtract => {
                arith::bitwise_cnot(s, d, l);
                arith::decrease(s, d, r);
            }
            BinaryOp::Exor => {
                arith::bitwise_cnot(s, d, l);
                arith::bitwise_cnot(s, d, r);
            }
            BinaryOp::Multiply => arith::multiplication(s, d, l, r),
            BinaryOp::Divide => arith::division(s, d, l, r),
            BinaryOp::Modulo => {
                arith::bitwise_cnot(s, d, l);
                arith::modulo(s, &extra, d, r);
            }
            BinaryOp::FracDivide => {
                let full = [extra.as_slice(), d].concat();
                arith::multiplication_full(s, &full, l, r);
            }
            BinaryOp::LogicalAnd => arith::conjunction(s, d[0], l0, r0),
            BinaryOp::LogicalOr => arith::disjunction(s, d[0], l0, r0),
            BinaryOp::BitwiseAnd => arith::bitwise_and(s, d, l, r),
            BinaryOp::BitwiseOr => arith::bitwise_or(s, d, l, r),
            BinaryOp::LessThan => arith::less_than(s, d[0], l, r),
            BinaryOp::GreaterThan => arith::greater_than(s, d[0], l, r),
            BinaryOp::Equals => arith::equals(s, d[0], l, r),
            BinaryOp::NotEquals => arith::not_equals(s, d[0], l, r),
            BinaryOp::LessEquals => arith::less_equals(s, d[0], l, r),
            BinaryOp::GreaterEquals => arith::greater_equals(s, d[0], l, r),
        }
        Ok(self.computed(result, mark, vec![left, right]))
    }

    /// Copy `operand` into fresh lines when it shares a line with `avoid`.
    fn detach(&mut self, operand: Operand, avoid: &BTreeSet<LineId>) -> SynthResult<Operand> {
        if !operand.lines.iter().any(|line| avoid.contains(line)) {
            return Ok(operand);
        }
        let mark = self.pool.mark();
        let copy = self.allocate(operand.lines.len(), 0)?;
        self.cct.begin_tape();
        arith::bitwise_cnot(&mut self.cct, &copy, &operand.lines);
        Ok(self.computed(copy, mark, vec![operand]))
    }

    // =========================================================================
    // Variable access
    // =========================================================================

    fn layout(&self, access: &VariableAccess) -> SynthResult<Layout> {
        let module = self.module()?;
        let variable = access.variable(module)?;
        let base = self.base(access.var)?;
        let dimensions: Vec<u64> = variable.dimensions.iter().map(|&d| u64::from(d)).collect();
        if access.indexes.len() != dimensions.len() {
            return Err(SynthError::UnsupportedConstruct(if dimensions.is_empty() {
                format!("index on scalar variable '{}'", variable.name)
            } else {
                format!(
                    "'{}' has {} dimensions but is accessed with {} indexes",
                    variable.name,
                    dimensions.len(),
                    access.indexes.len()
                )
            }));
        }

        let mut indexes = Vec::with_capacity(dimensions.len());
        for (index, &size) in access.indexes.iter().zip(&dimensions) {
            let folded = index.fold_constants(module, &self.loop_variables)?;
            match folded.constant_value() {
                Some(value) if value >= size => {
                    return Err(SynthError::IndexOutOfRange {
                        variable: variable.name.clone(),
                        index: value,
                        size,
                    });
                }
                Some(value) => indexes.push(Index::Constant(value)),
                None => {
                    let width = self.width(&folded, None)?;
                    if width == 0 || width > MAX_SELECTOR_WIDTH {
                        return Err(SynthError::UnsupportedConstruct(format!(
                            "{width}-bit index into '{}'",
                            variable.name
                        )));
                    }
                    indexes.push(Index::Dynamic(folded));
                }
            }
        }

        let bitwidth = u64::from(variable.bitwidth);
        let bits = match &access.range {
            Some((first, second)) => {
                let first = first.evaluate(&self.loop_variables)?;
                let second = second.evaluate(&self.loop_variables)?;
                if let Some(&bit) = [first, second].iter().find(|&&bit| bit >= bitwidth) {
                    return Err(SynthError::IndexOutOfRange {
                        variable: variable.name.clone(),
                        index: bit,
                        size: bitwidth,
                    });
                }
                if first <= second {
                    (first..=second).collect()
                } else {
                    (second..=first).rev().collect()
                }
            }
            None => (0..bitwidth).collect(),
        };

        Ok(Layout {
            name: variable.name.clone(),
            base,
            bitwidth,
            dimensions,
            bits,
            indexes,
            size: u64::from(variable.num_lines()),
        })
    }

    fn read_access(&mut self, access: &VariableAccess) -> SynthResult<Operand> {
        let layout = self.layout(access)?;
        if layout.is_static() {
            return Ok(Operand::direct(self.resolve_all(layout.static_lines())));
        }
        let (selectors, scratch) = self.selectors(&layout)?;
        let mark = self.pool.mark();
        let result = self.allocate(layout.bits.len(), 0)?;
        self.cct.begin_tape();
        self.network(&layout, &selectors, 0, 0, AccessMode::Copy, &result);
        let tape = self.cct.end_tape();
        Ok(Operand {
            lines: result,
            scratch: Scratch {
                mark: Some(mark),
                tape,
                children: vec![scratch],
            },
        })
    }

    fn write_access(&mut self, access: &VariableAccess) -> SynthResult<Target> {
        let layout = self.layout(access)?;
        if access.indexes.iter().any(|index| reads_variable(index, access.var)) {
            return Err(SynthError::UnsupportedConstruct(format!(
                "'{}' is modified at an index computed from itself",
                layout.name
            )));
        }
        if layout.is_static() {
            return Ok(Target {
                lines: self.resolve_all(layout.static_lines()),
                network: None,
                in_range: None,
                selectors: Scratch::default(),
            });
        }
        let (selectors, scratch) = self.selectors(&layout)?;
        let mark = self.pool.mark();
        let helper = self.allocate(layout.bits.len(), 0)?;
        // An index past the dimension leaves the helper unconnected; writes
        // into it are then suppressed so it still returns to 0.
        let in_range = if layout.may_miss(&selectors) {
            Some(self.pool.allocate_line(self.circuit, &mut self.cct, false)?)
        } else {
            None
        };
        self.cct.begin_tape();
        self.network(&layout, &selectors, 0, 0, AccessMode::Swap { in_range }, &helper);
        let tape = self.cct.end_tape();
        if let Some(flag) = in_range {
            self.cct.push(flag);
        }
        Ok(Target {
            lines: helper,
            network: Some((tape, mark)),
            in_range,
            selectors: scratch,
        })
    }

    fn release_target(&mut self, target: Target) -> SynthResult<()> {
        if let Some(flag) = target.in_range {
            self.cct.pop(flag);
        }
        if let Some((tape, mark)) = target.network {
            self.cct.replay_reversed(&tape);
            self.pool.release_to(self.circuit, &mut self.cct, mark)?;
        }
        self.release_scratch(target.selectors)
    }

    /// Evaluate the dynamic indexes of `layout` into selector lines that do
    /// not overlap the accessed variable.
    fn selectors(&mut self, layout: &Layout) -> SynthResult<(Vec<Option<Vec<LineId>>>, Scratch)> {
        let block: BTreeSet<LineId> = self.resolve_all(layout.block()).into_iter().collect();
        let mut selectors = Vec::with_capacity(layout.indexes.len());
        let mut children = vec![];
        for index in &layout.indexes {
            match index {
                Index::Constant(_) => selectors.push(None),
                Index::Dynamic(expr) => {
                    let operand = self.expression(expr, None)?;
                    let operand = self.detach(operand, &block)?;
                    selectors.push(Some(operand.lines.clone()));
                    children.push(operand.scratch);
                }
            }
        }
        Ok((
            selectors,
            Scratch {
                children,
                ..Scratch::default()
            },
        ))
    }

    /// Visit every element a dynamic access may select and connect it to
    /// `lines` under the selector pattern naming it.
    ///
    /// Selector values are walked in Gray-code order starting from all ones,
    /// so moving to the next element flips a single selector bit and every
    /// selector bit ends up back at its original value.
    fn network(
        &mut self,
        layout: &Layout,
        selectors: &[Option<Vec<LineId>>],
        dimension: usize,
        element: u64,
        mode: AccessMode,
        lines: &[LineId],
    ) {
        let Some(selector) = selectors.get(dimension) else {
            let element_lines = self.resolve_all(layout.element_lines(element));
            for (&line, &element_line) in lines.iter().zip(&element_lines) {
                match mode {
                    AccessMode::Copy => self.cct.cnot(element_line, line),
                    AccessMode::Swap { .. } => self.cct.fredkin(element_line, line),
                }
            }
            if let AccessMode::Swap {
                in_range: Some(flag),
            } = mode
            {
                self.cct.not(flag);
            }
            return;
        };
        let stride = layout.stride(dimension);
        let size = layout.dimensions[dimension];
        let Some(selector) = selector else {
            let Index::Constant(value) = layout.indexes[dimension] else {
                return;
            };
            self.network(layout, selectors, dimension + 1, element + value * stride, mode, lines);
            return;
        };

        let width = selector.len();
        let count = 1_u64 << width;
        let mut current = count - 1;
        for i in 1..=count {
            if current < size {
                for &line in selector {
                    self.cct.push(line);
                }
                self.network(layout, selectors, dimension + 1, element + current * stride, mode, lines);
                for &line in selector.iter().rev() {
                    self.cct.pop(line);
                }
            }
            let flip = if i < count {
                i.trailing_zeros() as usize
            } else {
                width - 1
            };
            self.cct.not(selector[flip]);
            current ^= 1 << flip;
        }
    }
}

impl Synthesizer<'_, '_> {
    /// The constant-line pool.
    pub fn pool(&self) -> &ConstantLinePool {
        &self.pool
    }

    /// The control stack recording emitted gates.
    pub fn control_stack(&self) -> &ControlStack {
        &self.cct
    }

    /// Assemble the recorded gates into the circuit.
    pub fn finish(self) -> SynthResult<()> {
        assemble(&self.cct, self.circuit, self.settings.efficient_controls)
    }
}

/// `[i][j]` suffix of array element `element`.
fn array_suffix(dimensions: &[u32], element: u32) -> String {
    let mut rest = element;
    let mut indexes = Vec::with_capacity(dimensions.len());
    for &size in dimensions.iter().rev() {
        let size = size.max(1);
        indexes.push(rest % size);
        rest /= size;
    }
    indexes.iter().rev().map(|i| format!("[{i}]")).collect()
}

/// Whether `expr` reads `var`, including inside array indexes.
fn reads_variable(expr: &Expression, var: VarId) -> bool {
    match expr {
        Expression::Numeric { .. } => false,
        Expression::Variable(access) => {
            access.var == var || access.indexes.iter().any(|index| reads_variable(index, var))
        }
        Expression::Binary { lhs, rhs, .. } => reads_variable(lhs, var) || reads_variable(rhs, var),
        Expression::Shift { lhs, .. } => reads_variable(lhs, var),
        Expression::Unary { expr, .. } => reads_variable(expr, var),
    }
}

/// Iteration values of a loop, inclusive of both ends. `step` is non-zero.
fn loop_values(
    from: u64,
    to: u64,
    step: u64,
    descending: bool,
) -> impl DoubleEndedIterator<Item = u64> {
    let span = if descending {
        from.checked_sub(to)
    } else {
        to.checked_sub(from)
    };
    span.map(|span| span / step)
        .into_iter()
        .flat_map(move |last| {
            (0..=last).map(move |i| {
                if descending {
                    from - i * step
                } else {
                    from + i * step
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use revsyn_lang::Number;

    #[test]
    fn test_array_suffix() {
        assert_eq!(array_suffix(&[], 0), "");
        assert_eq!(array_suffix(&[4], 3), "[3]");
        assert_eq!(array_suffix(&[2, 3], 4), "[1][1]");
    }

    fn values(from: u64, to: u64, step: u64, descending: bool) -> Vec<u64> {
        loop_values(from, to, step, descending).collect()
    }

    #[test]
    fn test_loop_values() {
        assert_eq!(values(1, 3, 1, false), vec![1, 2, 3]);
        assert_eq!(values(3, 1, 1, true), vec![3, 2, 1]);
        assert_eq!(values(0, 7, 3, false), vec![0, 3, 6]);
        assert_eq!(values(2, 0, 5, true), vec![2]);
        assert!(values(1, 0, 1, false).is_empty());
        assert_eq!(values(u64::MAX - 1, u64::MAX, 1, false).len(), 2);
        assert_eq!(
            loop_values(0, 7, 3, false).rev().collect::<Vec<_>>(),
            vec![6, 3, 0]
        );
    }

    #[test]
    fn test_huge_loop_is_lazy() {
        let mut values = loop_values(0, u64::MAX, 1, false);
        assert_eq!(values.next(), Some(0));
        assert_eq!(values.next(), Some(1));
        assert_eq!(values.next_back(), Some(u64::MAX));
        assert_eq!(loop_values(u64::MAX, 0, 2, true).next_back(), Some(1));
    }

    #[test]
    fn test_reads_variable() {
        let a = VarId(0);
        let b = VarId(1);
        let indexed = Expression::access(VariableAccess::new(b).with_index(Expression::var(a)));
        assert!(reads_variable(&indexed, a));
        assert!(reads_variable(
            &Expression::binary(Expression::var(b), BinaryOp::Add, Expression::var(a)),
            a
        ));
        assert!(!reads_variable(&Expression::numeric(1, 2), a));
        assert!(!reads_variable(
            &Expression::shift(Expression::var(b), ShiftOp::Left, Number::from(1)),
            a
        ));
    }

    fn setup() -> (Program, ProgramAnalysis, SynthesisSettings) {
        let mut main = Module::new("main");
        main.add_parameter(Variable::new("a", VariableType::Inout, 2));
        main.add_parameter(Variable::new("b", VariableType::In, 2).with_dimensions(vec![3]));
        main.add_variable(Variable::new("t", VariableType::Wire, 1));
        let mut program = Program::new();
        program.add_module(main);
        let analysis = ProgramAnalysis::new(&program);
        (program, analysis, SynthesisSettings::default())
    }

    #[test]
    fn test_declare_module() {
        let (program, analysis, settings) = setup();
        let mut circuit = Circuit::new("main");
        let mut synth = Synthesizer::new(&mut circuit, &program, &analysis, &settings);
        synth.declare_module(&program.modules[0]);
        drop(synth);

        assert_eq!(circuit.num_lines(), 9);
        assert_eq!(circuit.lines()[0].input, "a.0");
        assert_eq!(circuit.lines()[5].input, "b[1].1");
        assert_eq!(circuit.lines()[8].constant, Some(false));
        assert!(circuit.lines()[8].garbage);
        assert!(!circuit.lines()[0].garbage);
        assert!(circuit.inputbuses().get("a").is_some());
        assert!(circuit.outputbuses().get("a").is_some());
        assert!(circuit.outputbuses().get("b").is_none());
    }

    #[test]
    fn test_guard_released_through_ledger_check() {
        let (program, analysis, settings) = setup();
        // if t then ++a fi t
        let statement = Statement::if_then_else(
            Expression::var(VarId(2)),
            vec![Statement::unary(
                UnaryStatementOp::Increment,
                VariableAccess::new(VarId(0)),
            )],
            vec![],
            Expression::var(VarId(2)),
        );
        let mut circuit = Circuit::new("main");
        let mut synth = Synthesizer::new(&mut circuit, &program, &analysis, &settings);
        synth.declare_module(&program.modules[0]);

        let held = synth
            .pool
            .allocate_line(synth.circuit, &mut synth.cct, true)
            .unwrap();
        synth.on_statement(&statement).unwrap();
        assert_eq!(synth.pool.ledger_depth(), 1);
        assert_eq!(synth.pool.free_lines(false).len(), 1);
        assert_eq!(synth.pool.out_of_order_releases(), 0);

        synth
            .pool
            .release(synth.circuit, &mut synth.cct, held)
            .unwrap();
        assert_eq!(synth.pool.out_of_order_releases(), 0);
        assert_eq!(synth.pool.free_lines(true), &[held]);
    }

    #[test]
    fn test_layout_errors() {
        let (program, analysis, settings) = setup();
        let mut circuit = Circuit::new("main");
        let mut synth = Synthesizer::new(&mut circuit, &program, &analysis, &settings);
        synth.declare_module(&program.modules[0]);

        let scalar_index = VariableAccess::new(VarId(0)).with_index(Expression::numeric(0, 1));
        assert!(matches!(
            synth.layout(&scalar_index),
            Err(SynthError::UnsupportedConstruct(_))
        ));
        let partial = VariableAccess::new(VarId(1));
        assert!(matches!(
            synth.layout(&partial),
            Err(SynthError::UnsupportedConstruct(_))
        ));
        let out_of_range = VariableAccess::new(VarId(1)).with_index(Expression::numeric(3, 2));
        assert!(matches!(
            synth.layout(&out_of_range),
            Err(SynthError::IndexOutOfRange { index: 3, size: 3, .. })
        ));
        let bit = VariableAccess::new(VarId(0)).with_bit(Number::from(2));
        assert!(matches!(
            synth.layout(&bit),
            Err(SynthError::IndexOutOfRange { index: 2, size: 2, .. })
        ));

        let slice = VariableAccess::new(VarId(1))
            .with_index(Expression::numeric(2, 2))
            .with_range(Number::from(1), Number::from(0));
        let layout = synth.layout(&slice).unwrap();
        assert_eq!(layout.static_lines(), vec![LineId(7), LineId(6)]);
    }
}
