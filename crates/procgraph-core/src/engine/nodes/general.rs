use crate::core::expression::{ExpressionValue, ExpressionVariable};
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::value::Minimum;
use crate::engine::keywords::{NodeValueKeyword, ParametersKeyword};
use crate::engine::node::{ANY_CONTEXT, BranchSpec, NodeContext, NodeType, ProcedureNode};
use std::rc::Rc;
use tracing::{debug, info};

/// Defines named scalars visible to every later node in scope.
#[derive(Debug)]
pub struct ParametersNode {
    parameters: ParametersKeyword,
}

impl Default for ParametersNode {
    fn default() -> Self {
        Self {
            parameters: ParametersKeyword::new("Parameter", "Named parameter for use in expressions"),
        }
    }
}

impl ParametersNode {
    pub fn parameters_keyword(&self) -> &ParametersKeyword {
        &self.parameters
    }

    pub fn parameters_keyword_mut(&mut self) -> &mut ParametersKeyword {
        &mut self.parameters
    }
}

impl ProcedureNode for ParametersNode {
    fn node_type(&self) -> NodeType {
        NodeType::Parameters
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        ANY_CONTEXT
    }

    fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
        self.parameters.get().to_vec()
    }

    fn execute(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        for p in self.parameters.get() {
            debug!(parameter = %p.name(), value = %p.value(), "Parameter in effect.");
        }
        Ok(())
    }

    crate::node_keywords!(parameters);
}

/// Runs its branch a fixed number of times.
///
/// The current pass is exposed to the branch as `<Name>.iteration`, counting from 1.
#[derive(Debug)]
pub struct RepeatNode {
    count: NodeValueKeyword,
    iteration: Rc<ExpressionVariable>,
    target: i64,
    pass: i64,
    completed: u64,
}

impl Default for RepeatNode {
    fn default() -> Self {
        Self {
            count: NodeValueKeyword::new("Count", "Number of times to run the branch", 1_i64)
                .with_minimum(Minimum::Inclusive(0.0)),
            iteration: ExpressionVariable::new("Repeat.iteration", ExpressionValue::Integer(0)),
            target: 0,
            pass: 0,
            completed: 0,
        }
    }
}

impl RepeatNode {
    /// Branch passes run during the last run, across all outer passes.
    pub fn completed_passes(&self) -> u64 {
        self.completed
    }
}

impl ProcedureNode for RepeatNode {
    fn node_type(&self) -> NodeType {
        NodeType::Repeat
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        ANY_CONTEXT
    }

    fn branch(&self) -> Option<BranchSpec> {
        Some(BranchSpec {
            keyword: "ForEach",
            context: NodeContext::Inherit,
        })
    }

    fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
        vec![Rc::clone(&self.iteration)]
    }

    fn set_name(&mut self, name: &str) {
        self.iteration.set_name(&format!("{}.iteration", name));
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        self.completed = 0;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let target = self.count.get().as_integer();
        if target < 0 {
            return Err(NodeError::InvalidValue {
                keyword: "Count",
                message: format!("evaluates to {}, which is negative", target),
            });
        }
        info!("[Repeat] Branch will run {} time(s).", target);
        self.target = target;
        self.pass = 0;
        Ok(())
    }

    fn next_branch_pass(&mut self, _ctx: &mut ProcedureContext) -> Result<bool, NodeError> {
        if self.pass >= self.target {
            return Ok(false);
        }
        self.pass += 1;
        self.completed += 1;
        self.iteration.set_value(self.pass);
        Ok(true)
    }

    crate::node_keywords!(count);
}
