//! RevLib `.real` realization reader and writer.

use std::collections::HashMap;
use std::io::{Read, Write};

use logos::Logos;

use crate::circuit::Circuit;
use crate::error::{IrError, IrResult};
use crate::gate::Gate;
use crate::line::LineId;

/// Settings for [`write_realization`].
#[derive(Debug, Clone)]
pub struct RealizationSettings {
    /// Format version written to `.version`; omitted when empty.
    pub version: String,
    /// Comment header; omitted when empty.
    pub header: String,
}

impl Default for RealizationSettings {
    fn default() -> Self {
        Self {
            version: "2.0".into(),
            header: format!(
                "This file has been generated using revsyn {}",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Write a circuit in RevLib realization format.
pub fn write_realization(
    circuit: &Circuit,
    out: &mut impl Write,
    settings: &RealizationSettings,
) -> IrResult<()> {
    if !settings.header.is_empty() {
        writeln!(out, "# {}", settings.header.replace('\n', "\n# "))?;
    }
    if !settings.version.is_empty() {
        writeln!(out, ".version {}", settings.version)?;
    }

    writeln!(out, ".numvars {}", circuit.num_lines())?;
    let variables: Vec<String> = circuit.lines().iter().map(|l| l.id.to_string()).collect();
    writeln!(out, ".variables {}", variables.join(" "))?;

    write!(out, ".inputs")?;
    for name in circuit.inputs() {
        write!(out, " {}", quoted(name))?;
    }
    writeln!(out)?;
    write!(out, ".outputs")?;
    for name in circuit.outputs() {
        write!(out, " {}", quoted(name))?;
    }
    writeln!(out)?;

    let constants: String = circuit
        .constants()
        .iter()
        .map(|c| match c {
            Some(true) => '1',
            Some(false) => '0',
            None => '-',
        })
        .collect();
    let garbage: String = circuit
        .garbage()
        .iter()
        .map(|&g| if g { '1' } else { '-' })
        .collect();
    writeln!(out, ".constants {constants}")?;
    writeln!(out, ".garbage {garbage}")?;

    for (name, lines) in circuit.inputbuses().iter() {
        writeln!(out, ".inputbus {name} {}", join_lines(lines))?;
    }
    for (name, lines) in circuit.outputbuses().iter() {
        writeln!(out, ".outputbus {name} {}", join_lines(lines))?;
    }
    for (name, lines) in circuit.statesignals().iter() {
        writeln!(out, ".state {name} {}", join_lines(lines))?;
    }

    let nested = RealizationSettings {
        version: String::new(),
        header: String::new(),
    };
    for (name, module) in circuit.modules() {
        writeln!(out, ".module {name}")?;
        write_realization(module, out, &nested)?;
    }

    writeln!(out, ".begin")?;
    for gate in circuit.gates() {
        writeln!(out, "{gate}")?;
    }
    writeln!(out, ".end")?;
    Ok(())
}

/// Render a circuit to a `.real` string with default settings.
pub fn to_realization_string(circuit: &Circuit) -> IrResult<String> {
    let mut buffer = Vec::new();
    write_realization(circuit, &mut buffer, &RealizationSettings::default())?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn quoted(name: &str) -> String {
    if name.contains(' ') {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

fn join_lines(lines: &[LineId]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Reader
// =============================================================================

/// Tokens of the realization format.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
enum Token {
    #[token("\n")]
    Newline,

    #[regex(r"\.[A-Za-z]+", |lex| lex.slice()[1..].to_string())]
    Directive(String),

    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Quoted(String),

    #[regex(r##"[^ \t\r\n"#.][^ \t\r\n"#]*"##, |lex| lex.slice().to_string())]
    Word(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Newline => "\n",
            Token::Directive(s) | Token::Quoted(s) | Token::Word(s) => s,
        }
    }
}

/// The tokens of one non-empty input line.
struct Row {
    line: usize,
    tokens: Vec<Token>,
}

impl Row {
    fn error(&self, message: impl Into<String>) -> IrError {
        IrError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn arguments(&self) -> Vec<String> {
        self.tokens
            .iter()
            .skip(1)
            .map(|t| t.text().to_string())
            .collect()
    }

    fn single(&self) -> IrResult<String> {
        match self.arguments().as_slice() {
            [value] => Ok(value.clone()),
            _ => Err(self.error(format!(
                "'{}' takes exactly one argument",
                self.tokens.first().map_or("", Token::text)
            ))),
        }
    }
}

fn rows(source: &str) -> IrResult<Vec<Row>> {
    let mut lexer = Token::lexer(source);
    let mut rows = vec![];
    let mut tokens = vec![];
    let mut line = 1;
    while let Some(token) = lexer.next() {
        match token {
            Ok(Token::Newline) => {
                if !tokens.is_empty() {
                    rows.push(Row {
                        line,
                        tokens: std::mem::take(&mut tokens),
                    });
                }
                line += 1;
            }
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(IrError::Parse {
                    line,
                    message: format!("invalid token '{}'", lexer.slice()),
                });
            }
        }
    }
    if !tokens.is_empty() {
        rows.push(Row { line, tokens });
    }
    Ok(rows)
}

/// Header declarations collected before `.begin`.
#[derive(Default)]
struct Header {
    numvars: Option<usize>,
    variables: Vec<String>,
    inputs: Option<Vec<String>>,
    outputs: Option<Vec<String>>,
    constants: Option<Vec<Option<bool>>>,
    garbage: Option<Vec<bool>>,
    buses: Vec<(String, String, Vec<String>)>,
    modules: Vec<(String, Circuit)>,
}

struct Reader {
    rows: std::vec::IntoIter<Row>,
    line: usize,
}

impl Reader {
    fn next_row(&mut self, expected: &str) -> IrResult<Row> {
        let row = self.rows.next().ok_or_else(|| IrError::Parse {
            line: self.line,
            message: format!("unexpected end of input, expected {expected}"),
        })?;
        self.line = row.line;
        Ok(row)
    }

    /// Parse declarations up to `.begin`, then the gate list up to `.end`.
    fn circuit(&mut self, name: String) -> IrResult<Circuit> {
        let mut header = Header::default();
        loop {
            let row = self.next_row("'.begin'")?;
            let Some(Token::Directive(directive)) = row.tokens.first() else {
                return Err(row.error("expected a directive before '.begin'"));
            };
            match directive.as_str() {
                "version" => {}
                "numvars" => {
                    let value = row.single()?;
                    let count = value
                        .parse()
                        .map_err(|_| row.error(format!("invalid line count '{value}'")))?;
                    header.numvars = Some(count);
                }
                "variables" => header.variables = row.arguments(),
                "inputs" => header.inputs = Some(row.arguments()),
                "outputs" => header.outputs = Some(row.arguments()),
                "constants" => {
                    let constants = row
                        .single()?
                        .chars()
                        .map(|c| match c {
                            '0' => Ok(Some(false)),
                            '1' => Ok(Some(true)),
                            '-' => Ok(None),
                            other => Err(row.error(format!("invalid constant '{other}'"))),
                        })
                        .collect::<IrResult<_>>()?;
                    header.constants = Some(constants);
                }
                "garbage" => {
                    let garbage = row
                        .single()?
                        .chars()
                        .map(|c| match c {
                            '1' => Ok(true),
                            '-' | '0' => Ok(false),
                            other => Err(row.error(format!("invalid garbage flag '{other}'"))),
                        })
                        .collect::<IrResult<_>>()?;
                    header.garbage = Some(garbage);
                }
                "inputbus" | "outputbus" | "state" => {
                    let mut arguments = row.arguments().into_iter();
                    let bus = arguments
                        .next()
                        .ok_or_else(|| row.error(format!("'.{directive}' needs a name")))?;
                    header.buses.push((directive.clone(), bus, arguments.collect()));
                }
                "module" => {
                    let module = row.single()?;
                    let circuit = self.circuit(module.clone())?;
                    header.modules.push((module, circuit));
                }
                "begin" => return self.body(name, header, &row),
                other => return Err(row.error(format!("unsupported directive '.{other}'"))),
            }
        }
    }

    fn body(&mut self, name: String, header: Header, begin: &Row) -> IrResult<Circuit> {
        let count = header.numvars.unwrap_or(header.variables.len());
        if header.variables.len() != count {
            return Err(begin.error(format!(
                "{} variables declared for {count} lines",
                header.variables.len()
            )));
        }
        let check = |what: &str, len: Option<usize>| match len {
            Some(len) if len != count => Err(begin.error(format!(
                "{len} {what} declared for {count} lines"
            ))),
            _ => Ok(()),
        };
        check("inputs", header.inputs.as_ref().map(Vec::len))?;
        check("outputs", header.outputs.as_ref().map(Vec::len))?;
        check("constants", header.constants.as_ref().map(Vec::len))?;
        check("garbage flags", header.garbage.as_ref().map(Vec::len))?;

        let mut circuit = Circuit::new(name);
        let mut index = HashMap::with_capacity(count);
        for (i, variable) in header.variables.iter().enumerate() {
            let input = header.inputs.as_ref().map_or(variable, |names| &names[i]);
            let output = header.outputs.as_ref().map_or(variable, |names| &names[i]);
            let constant = header.constants.as_ref().and_then(|c| c[i]);
            let garbage = header.garbage.as_ref().is_some_and(|g| g[i]);
            let id = circuit.add_line(input.clone(), output.clone(), constant, garbage);
            if index.insert(variable.clone(), id).is_some() {
                return Err(begin.error(format!("variable '{variable}' declared twice")));
            }
        }
        let lookup = |row: &Row, names: &[String]| {
            names
                .iter()
                .map(|name| {
                    index
                        .get(name)
                        .copied()
                        .ok_or_else(|| row.error(format!("unknown variable '{name}'")))
                })
                .collect::<IrResult<Vec<_>>>()
        };

        for (module, body) in header.modules {
            circuit.add_module(module, body);
        }
        for (kind, bus, names) in &header.buses {
            let lines = lookup(begin, names)?;
            match kind.as_str() {
                "inputbus" => circuit.inputbuses_mut().add(bus.clone(), lines),
                "outputbus" => circuit.outputbuses_mut().add(bus.clone(), lines),
                _ => circuit.statesignals_mut().add(bus.clone(), lines),
            }
        }

        loop {
            let row = self.next_row("'.end'")?;
            match row.tokens.first() {
                Some(Token::Directive(directive)) if directive == "end" => return Ok(circuit),
                Some(Token::Word(gate)) => {
                    let lines = lookup(&row, &row.arguments())?;
                    let gate = parse_gate(&row, &circuit, gate, lines)?;
                    circuit.append_gate(gate)?;
                }
                _ => return Err(row.error("expected a gate or '.end'")),
            }
        }
    }
}

fn parse_gate(row: &Row, circuit: &Circuit, name: &str, lines: Vec<LineId>) -> IrResult<Gate> {
    if let Some(module) = circuit.module(name) {
        let width = module.num_lines();
        let Some(split) = lines.len().checked_sub(width) else {
            return Err(row.error(format!(
                "module '{name}' needs {width} lines, got {}",
                lines.len()
            )));
        };
        let (controls, targets) = lines.split_at(split);
        return Ok(Gate::module(name, controls.iter().copied(), targets.to_vec()));
    }

    let arity = |prefix: char| {
        name.strip_prefix(prefix)
            .and_then(|n| n.parse::<usize>().ok())
    };
    let mismatch = |n: usize| {
        row.error(format!("gate '{name}' expects {n} lines, got {}", lines.len()))
    };
    if let Some(n) = arity('t') {
        let Some((&target, controls)) = lines.split_last() else {
            return Err(mismatch(n));
        };
        if n != lines.len() {
            return Err(mismatch(n));
        }
        return Ok(Gate::toffoli(controls.iter().copied(), target));
    }
    if let Some(n) = arity('f') {
        match lines.as_slice() {
            [controls @ .., a, b] if n == lines.len() => {
                return Ok(Gate::fredkin(controls.iter().copied(), *a, *b));
            }
            _ => return Err(mismatch(n)),
        }
    }
    Err(row.error(format!("unknown gate '{name}'")))
}

/// Parse a circuit in RevLib realization format.
///
/// Supports the declarations written by [`write_realization`]: line
/// declarations, constants, garbage flags, buses and nested modules, with
/// Toffoli (`t{n}`), Fredkin (`f{n}`) and module gates.
pub fn parse_realization(name: impl Into<String>, source: &str) -> IrResult<Circuit> {
    let mut reader = Reader {
        rows: rows(source)?.into_iter(),
        line: 1,
    };
    let circuit = reader.circuit(name.into())?;
    if let Some(row) = reader.rows.next() {
        return Err(row.error("unexpected content after '.end'"));
    }
    Ok(circuit)
}

/// Read a circuit in RevLib realization format.
pub fn read_realization(name: impl Into<String>, input: &mut impl Read) -> IrResult<Circuit> {
    let mut source = String::new();
    input.read_to_string(&mut source)?;
    parse_realization(name, &source)
}
