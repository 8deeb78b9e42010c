// context.rs — Generation context: configuration, target and operator arena
//
// One `GenerationContext` exists per generation run. It owns the
// configuration, the shared timing target and the append-only arena of
// operators in creation order. Operators are built outside the arena and
// committed once finalized, so a parent under construction can read the
// interfaces of committed sub-operators while it mutates itself.
//
// Preconditions: the configuration was validated.
// Postconditions: every committed operator is finalized; handles never move.
// Failure modes: DuplicateOperator on name reuse, UnfinalizedSubOperator when
//                committing or instantiating an operator that is not finalized.
// Side effects: debug logging when an existing operator is reused.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;

use crate::config::GenerationConfig;
use crate::diag::{GenResult, GenerationError, ScheduleError};
use crate::id::{next_index, OperatorHandle};
use crate::instance::Interface;
use crate::operator::Operator;
use crate::target::{GenericTarget, Target};

/// An operator kind: describes its dataflow against the engine API.
///
/// `build` receives a fresh, open operator and the context, so it can
/// generate and instantiate sub-operators before describing its own
/// dataflow. The context finalizes and commits the operator afterwards.
pub trait Schedulable {
    /// Module name; identical names denote identical operators.
    fn name(&self) -> String;

    fn build(&self, op: &mut Operator, ctx: &mut GenerationContext) -> GenResult<()>;
}

struct Slot {
    name: String,
    /// `None` while the operator is under construction.
    operator: Option<Operator>,
}

pub struct GenerationContext {
    config: GenerationConfig,
    target: Rc<dyn Target>,
    slots: Vec<Slot>,
    by_name: HashMap<String, OperatorHandle>,
}

impl GenerationContext {
    pub fn new(config: GenerationConfig) -> Self {
        let target = Rc::new(GenericTarget::from_config(&config));
        Self::with_target(config, target)
    }

    pub fn with_target(config: GenerationConfig, target: Rc<dyn Target>) -> Self {
        Self {
            config,
            target,
            slots: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    /// Reserve a name and hand out a fresh operator for it.
    pub fn create_operator(&mut self, name: &str) -> GenResult<Operator> {
        if self.by_name.contains_key(name) {
            return Err(GenerationError::new(
                name,
                format!("create_operator({:?})", name),
                ScheduleError::DuplicateOperator {
                    name: name.to_string(),
                },
            ));
        }
        let handle = next_index("operator", self.slots.len())
            .map(OperatorHandle)
            .map_err(|kind| {
                GenerationError::new(name, format!("create_operator({:?})", name), kind)
            })?;
        self.slots.push(Slot {
            name: name.to_string(),
            operator: None,
        });
        self.by_name.insert(name.to_string(), handle);
        Ok(Operator::new(handle, name.to_string(), Rc::clone(&self.target)))
    }

    /// Store a finalized operator in its reserved slot.
    pub fn commit(&mut self, op: Operator) -> GenResult<OperatorHandle> {
        if !op.is_finalized() {
            return Err(op.error(
                "commit()",
                ScheduleError::UnfinalizedSubOperator {
                    name: op.name().to_string(),
                },
            ));
        }
        let handle = op.handle();
        match self.slots.get_mut(handle.index()) {
            Some(slot) if slot.operator.is_none() && slot.name == op.name() => {
                slot.operator = Some(op);
                Ok(handle)
            }
            _ => Err(op.error(
                "commit()",
                ScheduleError::DuplicateOperator {
                    name: op.name().to_string(),
                },
            )),
        }
    }

    /// Build, finalize and commit an operator kind, or return the committed
    /// operator of the same name.
    pub fn generate(&mut self, kind: &dyn Schedulable) -> GenResult<OperatorHandle> {
        let name = kind.name();
        if let Some(handle) = self.lookup(&name) {
            if self.operator(handle).is_some() {
                debug!("reusing operator {}", name);
                return Ok(handle);
            }
        }
        let mut op = self.create_operator(&name)?;
        kind.build(&mut op, self)?;
        op.finalize()?;
        self.commit(op)
    }

    pub fn lookup(&self, name: &str) -> Option<OperatorHandle> {
        self.by_name.get(name).copied()
    }

    /// A committed operator.
    pub fn operator(&self, handle: OperatorHandle) -> Option<&Operator> {
        self.slots.get(handle.index())?.operator.as_ref()
    }

    /// Interface of a committed operator, as seen by a parent.
    pub fn interface(&self, handle: OperatorHandle) -> Result<Interface, ScheduleError> {
        let slot = self
            .slots
            .get(handle.index())
            .ok_or_else(|| ScheduleError::UnfinalizedSubOperator {
                name: handle.to_string(),
            })?;
        slot.operator
            .as_ref()
            .and_then(Operator::interface)
            .ok_or_else(|| ScheduleError::UnfinalizedSubOperator {
                name: slot.name.clone(),
            })
    }

    /// Committed operators in creation order.
    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.slots.iter().filter_map(|s| s.operator.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Committed operators ordered so that every sub-operator precedes the
    /// operators instantiating it.
    pub fn emission_order(&self) -> Vec<OperatorHandle> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for op in self.operators() {
            self.visit(op.handle(), &mut visited, &mut order);
        }
        order
    }

    fn visit(
        &self,
        handle: OperatorHandle,
        visited: &mut HashSet<OperatorHandle>,
        order: &mut Vec<OperatorHandle>,
    ) {
        if !visited.insert(handle) {
            return;
        }
        let Some(op) = self.operator(handle) else {
            return;
        };
        for inst in op.instances() {
            self.visit(inst.sub, visited, order);
        }
        order.push(handle);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
