//! Computation graph
//!
//! Nodes are keyed by unique strings and addressed by dense [`NodeId`]s.
//! A node's operation is applied to the values of its dependencies, in
//! order. Keys that are referenced before anything defines them are held by
//! [`Operation::Input`] placeholders, which a later definition replaces in
//! place.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::value::Range;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use sheetcalc_core::Reference;

/// Index of a node in its graph
pub type NodeId = usize;

/// What a node computes from its dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Value supplied by the caller
    Input,
    /// Fixed value
    Constant(Range),
    /// Tag the dependency's values with the cells they come from
    Reference(Reference),
    /// Binary operator; `Union` takes any number of operands
    Operator(BinaryOperator),
    /// Unary operator
    Unary(UnaryOperator),
    /// Function call, arguments in dependency order
    Function {
        name: String,
        volatile: bool,
        cell: Option<Reference>,
    },
    /// Defined name; pass-through of its definition once linked, `#REF!`
    /// before
    Name { book: Option<String>, name: String },
    /// Fit the dependency onto the cells of `reference`
    Output { reference: Reference, formula: bool },
    /// Grid of cell outputs covering `reference`; dependency `i` is pasted
    /// at offset `offsets[i]` from the top-left cell
    Assemble {
        reference: Reference,
        rows: usize,
        cols: usize,
        offsets: Vec<(i64, i64)>,
    },
}

impl Operation {
    /// Check if the operation must be recomputed on every evaluation
    pub fn is_volatile(&self) -> bool {
        match self {
            Operation::Function { volatile, .. } => *volatile,
            _ => false,
        }
    }
}

/// A graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: String,
    pub operation: Operation,
    pub dependencies: Vec<NodeId>,
}

/// A computation graph; circular references are allowed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct Graph {
    nodes: Vec<Node>,
    index: AHashMap<String, NodeId>,
}

impl From<Vec<Node>> for Graph {
    fn from(nodes: Vec<Node>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(id, node)| (node.key.clone(), id))
            .collect();
        Self { nodes, index }
    }
}

impl From<Graph> for Vec<Node> {
    fn from(graph: Graph) -> Self {
        graph.nodes
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id of the node with `key`
    pub fn id(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Node by id, as an error when missing
    pub fn get(&self, id: NodeId) -> FormulaResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| FormulaError::UnknownNode(format!("#{}", id)))
    }

    /// All nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    /// Ids of the nodes still waiting for a definition
    pub fn placeholders(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.operation == Operation::Input)
            .map(|(id, _)| id)
            .collect()
    }

    /// Add a node, or define a placeholder that holds the key
    pub fn add_node(
        &mut self,
        key: impl Into<String>,
        operation: Operation,
        dependencies: Vec<NodeId>,
    ) -> FormulaResult<NodeId> {
        let key = key.into();
        self.check_dependencies(&dependencies)?;
        if let Some(id) = self.id(&key) {
            if self.nodes[id].operation != Operation::Input {
                return Err(FormulaError::DuplicateNode(key));
            }
            log::trace!("defining placeholder {}", key);
            self.nodes[id].operation = operation;
            self.nodes[id].dependencies = dependencies;
            return Ok(id);
        }

        let id = self.nodes.len();
        self.index.insert(key.clone(), id);
        self.nodes.push(Node {
            key,
            operation,
            dependencies,
        });
        Ok(id)
    }

    /// Id of `key`, creating an input placeholder if it is unknown
    pub fn ensure_input(&mut self, key: &str) -> NodeId {
        if let Some(id) = self.id(key) {
            return id;
        }
        let id = self.nodes.len();
        self.index.insert(key.to_string(), id);
        self.nodes.push(Node {
            key: key.to_string(),
            operation: Operation::Input,
            dependencies: Vec::new(),
        });
        id
    }

    /// Replace what a node computes
    pub fn set_operation(
        &mut self,
        id: NodeId,
        operation: Operation,
        dependencies: Vec<NodeId>,
    ) -> FormulaResult<()> {
        self.get(id)?;
        self.check_dependencies(&dependencies)?;
        let node = &mut self.nodes[id];
        node.operation = operation;
        node.dependencies = dependencies;
        Ok(())
    }

    fn check_dependencies(&self, dependencies: &[NodeId]) -> FormulaResult<()> {
        match dependencies.iter().find(|d| **d >= self.nodes.len()) {
            Some(d) => Err(FormulaError::UnknownNode(format!("#{}", d))),
            None => Ok(()),
        }
    }

    /// Nodes needed to compute `outputs`, not looking past `inputs`
    pub fn ancestors(&self, inputs: &[NodeId], outputs: &[NodeId]) -> FormulaResult<Vec<NodeId>> {
        let stop: AHashSet<NodeId> = inputs.iter().copied().collect();
        let mut seen = AHashSet::new();
        let mut stack: Vec<NodeId> = outputs.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.get(id)?;
            if !stop.contains(&id) {
                stack.extend(node.dependencies.iter().copied());
            }
        }
        let mut out: Vec<NodeId> = seen.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Extract the part of the graph between `inputs` and `outputs`
    ///
    /// Inputs become [`Operation::Input`] nodes. Returns the new graph with
    /// the translated input and output ids.
    pub fn subgraph(
        &self,
        inputs: &[NodeId],
        outputs: &[NodeId],
    ) -> FormulaResult<(Graph, Vec<NodeId>, Vec<NodeId>)> {
        let keep = self.ancestors(inputs, outputs)?;
        let remap: AHashMap<NodeId, NodeId> =
            keep.iter().enumerate().map(|(new, old)| (*old, new)).collect();
        let is_input: AHashSet<NodeId> = inputs.iter().copied().collect();

        let mut graph = Graph::new();
        for old in &keep {
            let node = &self.nodes[*old];
            let (operation, dependencies) = if is_input.contains(old) {
                (Operation::Input, Vec::new())
            } else {
                let deps = node.dependencies.iter().map(|d| remap[d]).collect();
                (node.operation.clone(), deps)
            };
            graph.nodes.push(Node {
                key: node.key.clone(),
                operation,
                dependencies,
            });
            graph.index.insert(node.key.clone(), graph.nodes.len() - 1);
        }

        let translate = |ids: &[NodeId]| -> FormulaResult<Vec<NodeId>> {
            ids.iter()
                .map(|id| {
                    remap.get(id).copied().ok_or_else(|| {
                        FormulaError::UnknownNode(format!("#{} is not needed by any output", id))
                    })
                })
                .collect()
        };
        let inputs = translate(inputs)?;
        let outputs = translate(outputs)?;
        Ok((graph, inputs, outputs))
    }

    /// Strongly connected components that form cycles
    ///
    /// A component counts when it has several nodes or a node depends on
    /// itself. Components come in dependency order, members sorted by id.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let all: Vec<NodeId> = (0..self.nodes.len()).collect();
        self.components(&all, &AHashSet::new())
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.depends_on_itself(scc[0]))
            .collect()
    }

    /// Strongly connected components of `nodes`, ignoring what `cut` nodes
    /// depend on
    ///
    /// `nodes` must hold every dependency of its nodes outside `cut`, as
    /// [`ancestors`](Self::ancestors) returns them. Components come in
    /// dependency order, members sorted by id.
    pub fn components(&self, nodes: &[NodeId], cut: &AHashSet<NodeId>) -> Vec<Vec<NodeId>> {
        let mut sccs = self.tarjan_scc(nodes, cut);
        for scc in &mut sccs {
            scc.sort_unstable();
        }
        sccs
    }

    pub(crate) fn depends_on_itself(&self, id: NodeId) -> bool {
        self.nodes[id].dependencies.contains(&id)
    }

    fn edges(&self, id: NodeId, cut: &AHashSet<NodeId>) -> &[NodeId] {
        if cut.contains(&id) {
            &[]
        } else {
            &self.nodes[id].dependencies
        }
    }

    /// Tarjan's algorithm with an explicit stack
    fn tarjan_scc(&self, roots: &[NodeId], cut: &AHashSet<NodeId>) -> Vec<Vec<NodeId>> {
        const UNVISITED: usize = usize::MAX;
        let n = self.nodes.len();
        let mut indices = vec![UNVISITED; n];
        let mut lowlinks = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut sccs = Vec::new();
        let mut counter = 0;

        for &root in roots {
            if indices[root] != UNVISITED {
                continue;
            }
            // (vertex, next dependency to look at)
            let mut work = vec![(root, 0usize)];
            while let Some(&mut (vertex, ref mut next)) = work.last_mut() {
                if *next == 0 && indices[vertex] == UNVISITED {
                    indices[vertex] = counter;
                    lowlinks[vertex] = counter;
                    counter += 1;
                    stack.push(vertex);
                    on_stack[vertex] = true;
                }

                if let Some(&dep) = self.edges(vertex, cut).get(*next) {
                    *next += 1;
                    if indices[dep] == UNVISITED {
                        work.push((dep, 0));
                    } else if on_stack[dep] {
                        lowlinks[vertex] = lowlinks[vertex].min(indices[dep]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlinks[parent] = lowlinks[parent].min(lowlinks[vertex]);
                }
                if lowlinks[vertex] == indices[vertex] {
                    let mut scc = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        scc.push(w);
                        if w == vertex {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
        sccs
    }
}
