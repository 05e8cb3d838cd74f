// Operator graph: tensors by id, operators ordered by their data dependencies

use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::{LayerDesc, Network, Tensor};
use crate::arch::smiv::{run_layer, Device, ResultLoc};
use crate::config::AcceleratorConfig;
use crate::error::{Result, SmivError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub usize);

impl fmt::Display for TensorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%{}", self.0)
  }
}

/// Owns every tensor a graph reads or writes.
#[derive(Debug, Default)]
pub struct Workspace {
  tensors: Vec<Option<Tensor>>,
}

impl Workspace {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a tensor under a fresh id.
  pub fn add(&mut self, tensor: Tensor) -> TensorId {
    self.tensors.push(Some(tensor));
    TensorId(self.tensors.len() - 1)
  }

  /// Allocate an id for a tensor some operator will produce later.
  pub fn reserve(&mut self) -> TensorId {
    self.tensors.push(None);
    TensorId(self.tensors.len() - 1)
  }

  pub fn contains(&self, id: TensorId) -> bool {
    matches!(self.tensors.get(id.0), Some(Some(_)))
  }

  pub fn get(&self, id: TensorId) -> Result<&Tensor> {
    self.tensors.get(id.0).and_then(Option::as_ref).ok_or(SmivError::UnknownTensor(id.0))
  }

  pub fn put(&mut self, id: TensorId, tensor: Tensor) -> Result<()> {
    let slot = self.tensors.get_mut(id.0).ok_or(SmivError::UnknownTensor(id.0))?;
    *slot = Some(tensor);
    Ok(())
  }
}

/// Borrowed execution resources handed to each operator.
pub struct ExecContext<'a> {
  pub device: &'a mut dyn Device,
  pub accel: &'a AcceleratorConfig,
}

pub trait Operator {
  fn name(&self) -> &str;
  fn inputs(&self) -> &[TensorId];
  fn output(&self) -> TensorId;
  /// Read the inputs from `workspace` and store the output under `self.output()`.
  fn run(&self, ctx: &mut ExecContext<'_>, workspace: &mut Workspace) -> Result<()>;
}

/// A network layer as a graph operator: inputs are `[activations, weights?]`.
pub struct LayerOp {
  desc: LayerDesc,
  num_images: usize,
  inputs: Vec<TensorId>,
  output: TensorId,
}

impl LayerOp {
  pub fn new(desc: LayerDesc, num_images: usize, input: TensorId, weights: Option<TensorId>, output: TensorId) -> Self {
    let mut inputs = vec![input];
    inputs.extend(weights);
    Self {
      desc,
      num_images,
      inputs,
      output,
    }
  }

  pub fn desc(&self) -> &LayerDesc {
    &self.desc
  }
}

impl Operator for LayerOp {
  fn name(&self) -> &str {
    &self.desc.name
  }

  fn inputs(&self) -> &[TensorId] {
    &self.inputs
  }

  fn output(&self) -> TensorId {
    self.output
  }

  fn run(&self, ctx: &mut ExecContext<'_>, workspace: &mut Workspace) -> Result<()> {
    let desc = &self.desc;
    let n = self.num_images;
    let len = n * desc.max_footprint();
    let input = workspace.get(self.inputs[0])?;
    if input.dims != desc.inputs || input.batch != n {
      return Err(SmivError::ShapeMismatch {
        layer: desc.name.clone(),
        reason: format!("operand {} is {} x {:?}", self.inputs[0], input.batch, input.dims),
      });
    }

    let mut activations = vec![0.0; len];
    let mut result = vec![0.0; len];
    activations[..input.data().len()].copy_from_slice(input.data());
    let weights = match self.inputs.get(1) {
      Some(&id) => workspace.get(id)?.data(),
      None => &[],
    };

    let loc = run_layer(ctx.device, ctx.accel, &mut activations, weights, desc, n, &mut result)?;
    let out = match loc {
      ResultLoc::Activations => activations,
      ResultLoc::Result => result,
    };
    let tensor = Tensor::from_padded(desc.name.clone(), desc.outputs, n, out)?;
    workspace.put(self.output, tensor)
  }
}

/// Operators plus the producer/consumer edges implied by their tensor ids.
#[derive(Default)]
pub struct OperatorGraph {
  ops: Vec<Box<dyn Operator>>,
}

impl OperatorGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the operator's index, which is also its tie-break rank.
  pub fn add_operator(&mut self, op: Box<dyn Operator>) -> usize {
    self.ops.push(op);
    self.ops.len() - 1
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  pub fn operator(&self, idx: usize) -> Option<&dyn Operator> {
    self.ops.get(idx).map(|op| op.as_ref())
  }

  /// Kahn's algorithm; among ready operators the earliest added runs first.
  pub fn topological_order(&self) -> Result<Vec<usize>> {
    let mut producer = HashMap::new();
    for (idx, op) in self.ops.iter().enumerate() {
      if let Some(prev) = producer.insert(op.output(), idx) {
        return Err(SmivError::InvalidGraph(format!(
          "tensor {} produced by both {} and {}",
          op.output(),
          self.ops[prev].name(),
          op.name()
        )));
      }
    }

    let mut indegree = vec![0usize; self.ops.len()];
    let mut children = vec![Vec::new(); self.ops.len()];
    for (idx, op) in self.ops.iter().enumerate() {
      for input in op.inputs() {
        if let Some(&parent) = producer.get(input) {
          children[parent].push(idx);
          indegree[idx] += 1;
        }
      }
    }

    let mut ready: BTreeSet<usize> = (0..self.ops.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(self.ops.len());
    while let Some(idx) = ready.pop_first() {
      order.push(idx);
      for &child in &children[idx] {
        indegree[child] -= 1;
        if indegree[child] == 0 {
          ready.insert(child);
        }
      }
    }

    if order.len() < self.ops.len() {
      return Err(SmivError::GraphCycle {
        remaining: self.ops.len() - order.len(),
      });
    }
    Ok(order)
  }

  /// Run every operator once in dependency order; returns the id of the
  /// last operator's output.
  pub fn run_network(&self, ctx: &mut ExecContext<'_>, workspace: &mut Workspace) -> Result<TensorId> {
    let order = self.topological_order()?;
    let mut output = None;
    for idx in order {
      let op = &self.ops[idx];
      if let Some(&missing) = op.inputs().iter().find(|&&id| !workspace.contains(id)) {
        return Err(SmivError::UnknownTensor(missing.0));
      }
      info!("[graph] run {} -> {}", op.name(), op.output());
      op.run(ctx, workspace)?;
      if !workspace.contains(op.output()) {
        return Err(SmivError::InvalidGraph(format!("{} did not produce {}", op.name(), op.output())));
      }
      output = Some(op.output());
    }
    output.ok_or_else(|| SmivError::InvalidGraph("graph has no operators".to_string()))
  }
}

impl Network {
  /// Lower the layer list into a chain graph over `input`.
  ///
  /// Returns the graph and a workspace holding the input and every weight
  /// tensor; layer outputs are reserved for the operators to fill.
  pub fn to_graph(&self, input: Tensor) -> Result<(OperatorGraph, Workspace)> {
    let mut graph = OperatorGraph::new();
    let mut workspace = Workspace::new();
    let mut current = workspace.add(input);
    for (idx, desc) in self.layers().iter().enumerate() {
      let weights = self.weights(idx).map(|w| workspace.add(w.clone()));
      let output = workspace.reserve();
      graph.add_operator(Box::new(LayerOp::new(desc.clone(), self.num_images(), current, weights, output)));
      current = output;
    }
    debug!("[{}] lowered to {} operators", self.name, graph.len());
    Ok((graph, workspace))
  }
}
