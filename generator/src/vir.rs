//! Verilog IR.
//!
//! A deliberately small subset of Verilog-2001: enough for the modules the
//! emitter produces. Expressions are opaque text supplied by operator kinds.

use std::fmt;

const INDENT: usize = 4;

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `[w-1:0] ` for vectors, nothing for single bits.
fn range(width: u32) -> String {
    if width > 1 {
        format!("[{}:0] ", width - 1)
    } else {
        String::new()
    }
}

/// Module.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Module {
    /// Module name.
    pub name: String,

    /// Port declarations.
    pub port_decls: Vec<PortDeclaration>,

    /// Module items.
    pub module_items: Vec<ModuleItem>,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} (", self.name)?;
        writeln!(f, "{}", indent(&join(&self.port_decls, ",\n"), INDENT))?;
        writeln!(f, ");")?;
        for item in &self.module_items {
            writeln!(f)?;
            writeln!(f, "{}", item)?;
        }
        writeln!(f)?;
        writeln!(f, "endmodule")
    }
}

/// Module item.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ModuleItem {
    /// Declarations.
    Declarations(Vec<Declaration>),

    /// Continuous assignments.
    ContinuousAssigns(Vec<ContinuousAssign>),

    /// Module instantiation.
    ModuleInstantiation(ModuleInstantiation),

    /// Always construct: event control and body.
    AlwaysConstruct(String, Vec<Statement>),

    /// Items preceded by a one-line comment.
    Commented(String, Vec<ModuleItem>),
}

impl fmt::Display for ModuleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleItem::Declarations(decls) => write!(f, "{}", join(decls, "\n")),
            ModuleItem::ContinuousAssigns(conts) => write!(f, "{}", join(conts, "\n")),
            ModuleItem::ModuleInstantiation(inst) => write!(f, "{}", inst),
            ModuleItem::AlwaysConstruct(event, stmts) => write!(
                f,
                "{} begin\n{}\nend",
                event,
                indent(&join(stmts, "\n"), INDENT)
            ),
            ModuleItem::Commented(comment, items) => {
                write!(f, "// {}\n{}", comment, join(items, "\n"))
            }
        }
    }
}

/// Port declaration: width in bits and identifier.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PortDeclaration {
    /// Input declaration.
    Input(u32, String),

    /// Output declaration.
    Output(u32, String),
}

impl fmt::Display for PortDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(width, ident) => write!(f, "input wire {}{}", range(*width), ident),
            Self::Output(width, ident) => write!(f, "output wire {}{}", range(*width), ident),
        }
    }
}

/// Declaration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Declaration {
    /// Net declaration.
    Net(u32, String),

    /// Reg declaration.
    Reg(u32, String),
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Net(width, ident) => write!(f, "wire {}{};", range(*width), ident),
            Self::Reg(width, ident) => write!(f, "reg {}{};", range(*width), ident),
        }
    }
}

/// Continuous assign.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ContinuousAssign(pub String, pub String);

impl fmt::Display for ContinuousAssign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assign {} = {};", self.0, self.1)
    }
}

/// Module instantiation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ModuleInstantiation {
    /// Module name.
    pub module_name: String,

    /// Inst name.
    pub inst_name: String,

    /// Port connections; `None` leaves the port open.
    pub port_connections: Vec<(String, Option<String>)>,
}

impl fmt::Display for ModuleInstantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conns = self
            .port_connections
            .iter()
            .map(|(port, expr)| format!("    .{}({})", port, expr.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join(",\n");
        write!(f, "{} {} (\n{}\n);", self.module_name, self.inst_name, conns)
    }
}

/// Statement.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Statement {
    /// Nonblocking assignment.
    NonblockingAssignment(String, String),

    /// Conditional statement.
    Conditional(String, Vec<Statement>, Vec<Statement>),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonblockingAssignment(lvalue, expr) => write!(f, "{} <= {};", lvalue, expr),
            Self::Conditional(cond, then_stmt, else_stmt) if else_stmt.is_empty() => write!(
                f,
                "if ({}) begin\n{}\nend",
                cond,
                indent(&join(then_stmt, "\n"), INDENT)
            ),
            Self::Conditional(cond, then_stmt, else_stmt) => write!(
                f,
                "if ({}) begin\n{}\nend else begin\n{}\nend",
                cond,
                indent(&join(then_stmt, "\n"), INDENT),
                indent(&join(else_stmt, "\n"), INDENT)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_ports_have_no_range() {
        assert_eq!(
            PortDeclaration::Input(1, "clk".to_string()).to_string(),
            "input wire clk"
        );
        assert_eq!(
            PortDeclaration::Output(34, "R".to_string()).to_string(),
            "output wire [33:0] R"
        );
    }

    #[test]
    fn open_ports_render_empty() {
        let inst = ModuleInstantiation {
            module_name: "Sub".to_string(),
            inst_name: "u0".to_string(),
            port_connections: vec![
                ("X".to_string(), Some("a".to_string())),
                ("R".to_string(), None),
            ],
        };
        assert_eq!(inst.to_string(), "Sub u0 (\n    .X(a),\n    .R()\n);");
    }

    #[test]
    fn reset_branch_nests() {
        let stmt = Statement::Conditional(
            "rst".to_string(),
            vec![Statement::NonblockingAssignment(
                "a_d1".to_string(),
                "8'b0".to_string(),
            )],
            vec![Statement::NonblockingAssignment(
                "a_d1".to_string(),
                "a".to_string(),
            )],
        );
        let item = ModuleItem::AlwaysConstruct("always @(posedge clk)".to_string(), vec![stmt]);
        assert_eq!(
            item.to_string(),
            "always @(posedge clk) begin\n    if (rst) begin\n        a_d1 <= 8'b0;\n    end else begin\n        a_d1 <= a;\n    end\nend"
        );
    }
}
