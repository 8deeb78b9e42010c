// emit.rs — Verilog projection of finalized operators and batch emission
//
// `Emittable` turns a finalized operator's `Schedule` into a `vir::Module`:
// ports (clk/rst first when sequential), one declaration per internal signal
// including every delay stage, assignments and instances grouped per cycle,
// and register updates grouped by reset flavor. Batch emission walks the
// context leaves-first and fingerprints each module with SHA-256 for the
// manifest.
//
// Preconditions: operators are finalized (checked).
// Postconditions: output is deterministic for a given context.
// Failure modes: UnfinalizedSubOperator for an open operator.
// Side effects: none (callers write the files).

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::context::GenerationContext;
use crate::diag::{GenResult, ScheduleError};
use crate::finalize::{AssignSource, RegisterLoad};
use crate::instance::{Actual, Instance};
use crate::operator::Operator;
use crate::signal::{RegisterMode, SignalRole};
use crate::vir::{
    ContinuousAssign, Declaration, Module, ModuleInstantiation, ModuleItem, PortDeclaration,
    Statement,
};

/// Textual projection of a finalized operator.
pub trait Emittable {
    fn module_name(&self) -> &str;

    fn to_module(&self) -> GenResult<Module>;

    fn to_verilog(&self) -> GenResult<String> {
        Ok(self.to_module()?.to_string())
    }
}

impl Emittable for Operator {
    fn module_name(&self) -> &str {
        self.name()
    }

    fn to_module(&self) -> GenResult<Module> {
        let Some(schedule) = self.schedule() else {
            return Err(self.error(
                "to_module()",
                ScheduleError::UnfinalizedSubOperator {
                    name: self.name().to_string(),
                },
            ));
        };
        let signals = self.signals();
        let ident = |id| signals.get(id).name.clone();

        let mut port_decls = Vec::new();
        if schedule.sequential {
            port_decls.push(PortDeclaration::Input(1, "clk".to_string()));
            port_decls.push(PortDeclaration::Input(1, "rst".to_string()));
        }
        for &id in self.inputs() {
            let sig = signals.get(id);
            port_decls.push(PortDeclaration::Input(sig.width.bits(), sig.name.clone()));
        }
        for out in self.outputs() {
            let sig = signals.get(out.signal);
            port_decls.push(PortDeclaration::Output(sig.width.bits(), sig.name.clone()));
        }

        let mut module_items = Vec::new();
        let decls: Vec<Declaration> = signals
            .iter()
            .filter(|s| s.role == SignalRole::Internal)
            .map(|s| {
                if s.is_stage() {
                    Declaration::Reg(s.width.bits(), s.name.clone())
                } else {
                    Declaration::Net(s.width.bits(), s.name.clone())
                }
            })
            .collect();
        if !decls.is_empty() {
            module_items.push(ModuleItem::Declarations(decls));
        }

        for slice in &schedule.cycles {
            let mut items = Vec::new();
            let assigns: Vec<ContinuousAssign> = slice
                .assigns
                .iter()
                .map(|a| {
                    let rhs = match &a.source {
                        AssignSource::Expr(expr) => expr.clone(),
                        AssignSource::Signal(id) => ident(*id),
                    };
                    ContinuousAssign(ident(a.target), rhs)
                })
                .collect();
            if !assigns.is_empty() {
                items.push(ModuleItem::ContinuousAssigns(assigns));
            }
            for id in &slice.instances {
                let inst = &self.instances()[id.index()];
                items.push(ModuleItem::ModuleInstantiation(instantiation(inst, &ident)));
            }
            if !items.is_empty() {
                module_items.push(ModuleItem::Commented(
                    format!("cycle {}", slice.cycle),
                    items,
                ));
            }
        }

        let mut by_mode: BTreeMap<RegisterMode, Vec<&RegisterLoad>> = BTreeMap::new();
        for load in schedule.registers() {
            by_mode.entry(load.mode).or_default().push(load);
        }
        for (mode, loads) in by_mode {
            let update: Vec<Statement> = loads
                .iter()
                .map(|l| Statement::NonblockingAssignment(ident(l.target), ident(l.source)))
                .collect();
            let reset: Vec<Statement> = loads
                .iter()
                .map(|l| {
                    let width = signals.get(l.target).width.bits();
                    Statement::NonblockingAssignment(ident(l.target), format!("{}'b0", width))
                })
                .collect();
            let item = match mode {
                RegisterMode::Combinational | RegisterMode::Registered => {
                    ModuleItem::AlwaysConstruct("always @(posedge clk)".to_string(), update)
                }
                RegisterMode::RegisteredAsyncReset => ModuleItem::AlwaysConstruct(
                    "always @(posedge clk or posedge rst)".to_string(),
                    vec![Statement::Conditional("rst".to_string(), reset, update)],
                ),
                RegisterMode::RegisteredSyncReset => ModuleItem::AlwaysConstruct(
                    "always @(posedge clk)".to_string(),
                    vec![Statement::Conditional("rst".to_string(), reset, update)],
                ),
            };
            module_items.push(item);
        }

        Ok(Module {
            name: self.name().to_string(),
            port_decls,
            module_items,
        })
    }
}

fn instantiation(
    inst: &Instance,
    ident: &dyn Fn(crate::id::SignalId) -> String,
) -> ModuleInstantiation {
    let mut port_connections = Vec::new();
    if inst.interface.sequential {
        port_connections.push(("clk".to_string(), Some("clk".to_string())));
        port_connections.push(("rst".to_string(), Some("rst".to_string())));
    }
    for (formal, actual) in &inst.inputs {
        let expr = match actual {
            Actual::Signal(id) => ident(*id),
            Actual::Constant(value) => value.clone(),
        };
        port_connections.push((formal.clone(), Some(expr)));
    }
    for (formal, signal) in &inst.outputs {
        port_connections.push((formal.clone(), signal.map(ident)));
    }
    ModuleInstantiation {
        module_name: inst.interface.name.clone(),
        inst_name: inst.name.clone(),
        port_connections,
    }
}

// ── Batch emission ──────────────────────────────────────────────────────────

/// One emitted module with its fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedModule {
    pub name: String,
    pub file_name: String,
    pub text: String,
    pub sha256: String,
    pub depth: u32,
    pub registers: usize,
    pub sequential: bool,
}

/// Emit every committed operator, sub-operators first.
pub fn emit_all(ctx: &GenerationContext) -> GenResult<Vec<EmittedModule>> {
    let mut modules = Vec::new();
    for handle in ctx.emission_order() {
        let Some(op) = ctx.operator(handle) else {
            continue;
        };
        let text = op.to_verilog()?;
        let (depth, registers, sequential) = match op.schedule() {
            Some(s) => (s.depth, s.register_count, s.sequential),
            None => (0, 0, false),
        };
        modules.push(EmittedModule {
            name: op.name().to_string(),
            file_name: format!("{}.v", op.name()),
            sha256: sha256_hex(&text),
            text,
            depth,
            registers,
            sequential,
        });
    }
    Ok(modules)
}

pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut s = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub file: String,
    pub depth: u32,
    pub registers: usize,
    pub sequential: bool,
    pub sha256: String,
}

/// Machine-readable summary of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub manifest_schema_version: u32,
    pub generator_version: &'static str,
    pub frequency_mhz: f64,
    pub pipelined: bool,
    pub modules: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(ctx: &GenerationContext, modules: &[EmittedModule]) -> Self {
        Self {
            manifest_schema_version: 1,
            generator_version: env!("CARGO_PKG_VERSION"),
            frequency_mhz: ctx.config().frequency_mhz,
            pipelined: ctx.config().pipelined,
            modules: modules
                .iter()
                .map(|m| ManifestEntry {
                    name: m.name.clone(),
                    file: m.file_name.clone(),
                    depth: m.depth,
                    registers: m.registers,
                    sequential: m.sequential,
                    sha256: m.sha256.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
