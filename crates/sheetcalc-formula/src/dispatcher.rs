//! Graph evaluation
//!
//! [`Dispatcher::dispatch`] computes requested nodes from supplied inputs.
//! Only the nodes the outputs need are evaluated, once each, in dependency
//! order (ties broken by node id). Circular references are found on the
//! way: supplied inputs cut the graph, so a cell that is given a value no
//! longer closes the cycles running through it. What remains circular is
//! iterated or resolved to `#CIRCULAR!` as [`CycleSettings`] say.
//! [`Dispatcher::compile`] extracts the needed part of the graph into a
//! reusable [`CompiledFunction`].

use crate::ast::BinaryOperator;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{CallContext, FunctionRegistry};
use crate::graph::{Graph, NodeId, Operation};
use crate::value::{self, Area, Range, Value};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use sheetcalc_core::{CellError, CellValue};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// How circular references are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleSettings {
    /// Iterate at all; otherwise every member resolves to `#CIRCULAR!`
    pub enabled: bool,
    /// Maximum number of sweeps
    pub max_iterations: usize,
    /// Largest numeric change between sweeps still counted as converged
    pub max_change: f64,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

/// How a circular reference resolved during one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Key of the cycle's first member
    pub key: String,
    /// Whether the iteration settled within the tolerance
    pub converged: bool,
    /// Sweeps performed
    pub iterations: usize,
}

/// Result of a dispatch
#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Values of the requested outputs, in request order
    pub outputs: Vec<Value>,
    /// Every value computed along the way
    pub values: AHashMap<NodeId, Value>,
    /// Circular references evaluated
    pub cycles: Vec<CycleReport>,
}

/// One unit of an evaluation plan
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Node(NodeId),
    /// Members of a circular reference, sorted by id
    Cycle(Vec<NodeId>),
}

/// Evaluates nodes of a graph
pub struct Dispatcher<'a> {
    graph: &'a Graph,
    registry: Arc<FunctionRegistry>,
    cycles: CycleSettings,
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher resolving circular references to `#CIRCULAR!`
    pub fn new(graph: &'a Graph, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            graph,
            registry,
            cycles: CycleSettings::default(),
        }
    }

    /// Evaluate circular references with `settings`
    pub fn with_cycles(mut self, settings: CycleSettings) -> Self {
        self.cycles = settings;
        self
    }

    /// Evaluation order of the nodes `outputs` need
    ///
    /// Nodes in `inputs` are not looked through. Strongly connected nodes
    /// left after that form one [`Step::Cycle`]. Fails on an unsupplied
    /// placeholder.
    fn plan(&self, inputs: &AHashMap<NodeId, Value>, outputs: &[NodeId]) -> FormulaResult<Vec<Step>> {
        let given: AHashSet<NodeId> = inputs.keys().copied().collect();
        let stops: Vec<NodeId> = given.iter().copied().collect();
        let needed = self.graph.ancestors(&stops, outputs)?;
        for id in needed.iter().filter(|id| !given.contains(*id)) {
            let node = self.graph.get(*id)?;
            if node.operation == Operation::Input {
                return Err(FormulaError::MissingInput(node.key.clone()));
            }
        }

        let mut components = self.graph.components(&needed, &given);
        let mut owner: AHashMap<NodeId, usize> = AHashMap::with_capacity(needed.len());
        for (c, members) in components.iter().enumerate() {
            owner.extend(members.iter().map(|id| (*id, c)));
        }

        // Kahn's algorithm over the components, smallest member id first
        let mut pending = vec![0usize; components.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
        for (c, members) in components.iter().enumerate() {
            let mut upstream = AHashSet::new();
            for id in members.iter().filter(|id| !given.contains(*id)) {
                for dep in &self.graph.get(*id)?.dependencies {
                    let d = owner
                        .get(dep)
                        .copied()
                        .ok_or_else(|| FormulaError::UnknownNode(format!("#{}", dep)))?;
                    if d != c {
                        upstream.insert(d);
                    }
                }
            }
            pending[c] = upstream.len();
            for d in upstream {
                dependents[d].push(c);
            }
        }

        let mut ready: BinaryHeap<Reverse<(NodeId, usize)>> = components
            .iter()
            .enumerate()
            .filter(|(c, _)| pending[*c] == 0)
            .map(|(c, members)| Reverse((members[0], c)))
            .collect();
        let mut order = Vec::with_capacity(components.len());
        while let Some(Reverse((_, c))) = ready.pop() {
            for next in &dependents[c] {
                pending[*next] -= 1;
                if pending[*next] == 0 {
                    ready.push(Reverse((components[*next][0], *next)));
                }
            }
            order.push(c);
        }

        Ok(order
            .into_iter()
            .map(|c| {
                let members = std::mem::take(&mut components[c]);
                let circular = members.len() > 1
                    || (!given.contains(&members[0]) && self.graph.depends_on_itself(members[0]));
                if circular {
                    Step::Cycle(members)
                } else {
                    Step::Node(members[0])
                }
            })
            .collect())
    }

    /// Compute `outputs` from the values of `inputs`
    pub fn dispatch(
        &self,
        inputs: &AHashMap<NodeId, Value>,
        outputs: &[NodeId],
    ) -> FormulaResult<Solution> {
        let plan = self.plan(inputs, outputs)?;
        let mut solution = Solution::default();

        for step in plan {
            match step {
                Step::Node(id) => {
                    let value = match inputs.get(&id) {
                        Some(v) => v.clone(),
                        None => self.evaluate(id, &solution.values)?,
                    };
                    solution.values.insert(id, value);
                }
                Step::Cycle(members) => {
                    let report = self.iterate(&members, &mut solution.values)?;
                    solution.cycles.push(report);
                }
            }
        }

        solution.outputs = outputs.iter().map(|id| solution.values[id].clone()).collect();
        Ok(solution)
    }

    fn evaluate(&self, id: NodeId, values: &AHashMap<NodeId, Value>) -> FormulaResult<Value> {
        let node = self.graph.get(id)?;
        let args = node
            .dependencies
            .iter()
            .map(|d| {
                values
                    .get(d)
                    .ok_or_else(|| FormulaError::UnknownNode(format!("#{} not evaluated", d)))
            })
            .collect::<FormulaResult<Vec<&Value>>>()?;
        log::trace!("evaluating {}", node.key);
        apply(&node.operation, &args, &self.registry)
    }

    /// Fixed-point iteration of a circular reference
    ///
    /// Members start out `Empty` and are recomputed in id order, each sweep
    /// using the freshest values (Gauss-Seidel). The cycle settles when no
    /// numeric member moves by more than `max_change` and no other member
    /// changes. Disabled or unsettled cycles turn every member into
    /// `#CIRCULAR!`.
    fn iterate(
        &self,
        members: &[NodeId],
        values: &mut AHashMap<NodeId, Value>,
    ) -> FormulaResult<CycleReport> {
        let settings = self.cycles;
        let key = self.graph.get(members[0])?.key.clone();
        for id in members {
            values.insert(*id, Value::Range(Range::default()));
        }

        let mut converged = false;
        let mut iterations = 0;
        if settings.enabled {
            while iterations < settings.max_iterations && !converged {
                iterations += 1;
                converged = true;
                for id in members {
                    let next = self.evaluate(*id, values)?;
                    if !settled(&values[id], &next, settings.max_change) {
                        converged = false;
                    }
                    values.insert(*id, next);
                }
            }
        }

        if converged {
            log::debug!("{} converged after {} iterations", key, iterations);
        } else {
            log::warn!("{} did not converge ({} iterations)", key, iterations);
            for id in members {
                values.insert(*id, Value::error(CellError::Circular));
            }
        }
        Ok(CycleReport {
            key,
            converged,
            iterations,
        })
    }

    /// Extract a function from `inputs` to `outputs`
    ///
    /// Inputs that were cell outputs remember the cell's shape; arguments
    /// are fitted onto it when the function is called. Circular references
    /// left between inputs and outputs are evaluated with this
    /// dispatcher's [`CycleSettings`].
    pub fn compile(&self, inputs: &[NodeId], outputs: &[NodeId]) -> FormulaResult<CompiledFunction> {
        let (graph, new_inputs, new_outputs) = self.graph.subgraph(inputs, outputs)?;
        let input_shapes = inputs
            .iter()
            .map(|id| {
                self.graph.get(*id).map(|node| match &node.operation {
                    Operation::Output { reference, .. } => Some((reference.rows(), reference.cols())),
                    Operation::Constant(range) => Some(range.shape()),
                    _ => None,
                })
            })
            .collect::<FormulaResult<Vec<_>>>()?;

        let supplied: AHashMap<NodeId, Value> = new_inputs
            .iter()
            .map(|id| (*id, Value::Range(Range::default())))
            .collect();
        Dispatcher::new(&graph, Arc::clone(&self.registry)).plan(&supplied, &new_outputs)?;

        Ok(CompiledFunction {
            graph,
            inputs: new_inputs,
            outputs: new_outputs,
            input_shapes,
            registry: Arc::clone(&self.registry),
            cycles: self.cycles,
        })
    }
}

/// Apply an operation to the values of its dependencies
pub(crate) fn apply(
    operation: &Operation,
    args: &[&Value],
    registry: &FunctionRegistry,
) -> FormulaResult<Value> {
    match operation {
        Operation::Input => Err(FormulaError::Evaluation("input evaluated as an operation".into())),
        Operation::Constant(range) => Ok(Value::Range(range.clone())),
        Operation::Reference(reference) => Ok(match first(args) {
            Value::Range(range) => Value::Areas(vec![Area::new(reference.clone(), range.clone())]),
            areas => areas.clone(),
        }),
        Operation::Operator(BinaryOperator::Union) => Ok(value::union(args)),
        Operation::Operator(op) => match args {
            [left, right] => value::binary_op(*op, left, right),
            _ => Err(FormulaError::Evaluation(format!(
                "operator {} expects 2 operands, got {}",
                op.symbol(),
                args.len()
            ))),
        },
        Operation::Unary(op) => Ok(value::unary_op(*op, first(args))),
        Operation::Function { name, cell, .. } => {
            let Some(def) = registry.get(name) else {
                log::warn!("function {} is not registered", name);
                return Ok(Value::error(CellError::Name));
            };
            let owned: Vec<Value> = args.iter().map(|v| (*v).clone()).collect();
            (def.implementation)(&owned, &CallContext::new(cell.clone()))
        }
        Operation::Name { .. } => Ok(match args.first() {
            Some(v) => (*v).clone(),
            None => Value::error(CellError::Ref),
        }),
        Operation::Output { reference, formula } => {
            let (rows, cols) = (reference.rows(), reference.cols());
            let range = match first(args) {
                Value::Areas(areas) if areas.len() == 1 => {
                    let area = &areas[0];
                    area.values.slice(0, 0, area.rows().min(rows), area.cols().min(cols))
                }
                other => other.to_range(),
            };
            let range = range.project(rows, cols);
            Ok(Value::Range(if *formula { range.fill_empty() } else { range }))
        }
        Operation::Assemble {
            rows,
            cols,
            offsets,
            ..
        } => {
            let mut grid = Range::filled(*rows, *cols, CellValue::Empty);
            for (value, (row, col)) in args.iter().zip(offsets) {
                grid.paste(*row, *col, &value.to_range());
            }
            Ok(Value::Range(grid))
        }
    }
}

static MISSING: Value = Value::Areas(Vec::new());

fn first<'v>(args: &[&'v Value]) -> &'v Value {
    args.first().copied().unwrap_or(&MISSING)
}

fn settled(previous: &Value, next: &Value, max_change: f64) -> bool {
    let (a, b) = (previous.to_range(), next.to_range());
    if a.shape() != b.shape() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| match (x, y) {
        (CellValue::Number(x), CellValue::Number(y)) => (x - y).abs() <= max_change,
        (x, y) => x == y,
    })
}

/// A function extracted from a graph
///
/// Owns its part of the graph, so it can be called any number of times and
/// moved across threads independently of the model it came from.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    graph: Graph,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    input_shapes: Vec<Option<(usize, usize)>>,
    registry: Arc<FunctionRegistry>,
    cycles: CycleSettings,
}

impl CompiledFunction {
    /// Keys of the inputs, in argument order
    pub fn inputs(&self) -> Vec<&str> {
        self.keys(&self.inputs)
    }

    /// Keys of the outputs, in result order
    pub fn outputs(&self) -> Vec<&str> {
        self.keys(&self.outputs)
    }

    fn keys(&self, ids: &[NodeId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|id| self.graph.node(*id))
            .map(|n| n.key.as_str())
            .collect()
    }

    /// The extracted graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Check if a call may return different results for the same arguments
    pub fn is_volatile(&self) -> bool {
        self.graph.nodes().any(|(_, node)| node.operation.is_volatile())
    }

    /// Use another function registry
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Evaluate the outputs for one value per input
    pub fn call(&self, args: &[Range]) -> FormulaResult<Vec<Range>> {
        if args.len() != self.inputs.len() {
            return Err(FormulaError::ArgumentCount {
                function: "compiled function".into(),
                expected: self.inputs.len().to_string(),
                actual: args.len(),
            });
        }

        let inputs: AHashMap<NodeId, Value> = self
            .inputs
            .iter()
            .zip(args)
            .zip(&self.input_shapes)
            .map(|((id, arg), shape)| {
                let fitted = match shape {
                    Some((rows, cols)) => arg.project(*rows, *cols),
                    None => arg.clone(),
                };
                (*id, Value::Range(fitted))
            })
            .collect();

        let solution = Dispatcher::new(&self.graph, Arc::clone(&self.registry))
            .with_cycles(self.cycles)
            .dispatch(&inputs, &self.outputs)?;
        Ok(solution.outputs.into_iter().map(Value::into_range).collect())
    }
}
