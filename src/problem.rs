//! A builder that accumulates variables and constraints directly into a
//! [`Dag`] and produces the boxed, immutable [`Model`] the solver runs
//! against, in place of a textual model grammar. Follows the
//! builder-with-`.gloss()`-errors pattern also used for building solver
//! inputs elsewhere in this crate family.

use std::collections::HashMap;
use std::rc::Rc;

use derive_more::{Display, Error};
use problemo::common::IntoCommonProblem;
use problemo::{Problem, ProblemResult};

use crate::dag::Dag;
use crate::domain::{Domain, Scope, Tolerance, Variable, VariableKind};
use crate::interval::Interval;
use crate::region::DomainBox;
use crate::term::{Constraint, Term};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ModelError {
    #[display("variable `{name}` declared with an empty domain")]
    EmptyDomain { name: String },
}

/// Accumulates variables and constraints, then compiles them into a
/// [`Model`]. Mirrors the three declaration sections of the textual format
/// (`Constants`/`Variables`/`Constraints`) without parsing text.
pub struct ProblemBuilder {
    names: HashMap<String, Variable>,
    initial: Vec<(Variable, Domain)>,
    dag: Dag,
    constraints: Vec<usize>,
}

impl ProblemBuilder {
    pub fn new() -> ProblemBuilder {
        ProblemBuilder { names: HashMap::new(), initial: Vec::new(), dag: Dag::new(), constraints: Vec::new() }
    }

    fn declare(
        &mut self,
        name: &str,
        kind: VariableKind,
        lo: f64,
        hi: f64,
        tolerance: Tolerance,
    ) -> Result<Variable, Problem> {
        if self.names.contains_key(name) {
            return Err(format!("duplicate variable name `{name}`").gloss());
        }
        let domain = Interval::try_new(lo, hi).via(ModelError::EmptyDomain { name: name.to_string() })?;
        let var = Variable::new(name, kind, tolerance);
        self.names.insert(name.to_string(), var.clone());
        self.initial.push((var.clone(), Domain::Interval(domain)));
        Ok(var)
    }

    pub fn add_variable(&mut self, name: &str, lo: f64, hi: f64) -> Result<Variable, Problem> {
        self.declare(name, VariableKind::Real, lo, hi, Tolerance::default())
    }

    pub fn add_variable_with_tolerance(
        &mut self,
        name: &str,
        lo: f64,
        hi: f64,
        tolerance: Tolerance,
    ) -> Result<Variable, Problem> {
        self.declare(name, VariableKind::Real, lo, hi, tolerance)
    }

    pub fn add_integer_variable(&mut self, name: &str, lo: i64, hi: i64) -> Result<Variable, Problem> {
        self.declare(name, VariableKind::Integer, lo as f64, hi as f64, Tolerance::default())
    }

    pub fn add_binary_variable(&mut self, name: &str) -> Result<Variable, Problem> {
        self.declare(name, VariableKind::Integer, 0.0, 1.0, Tolerance::default())
    }

    /// Inserts a constraint built via the `Term` algebra's `.eq`/`.le`/
    /// `.ge`/`.in_range` helpers.
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        let idx = self.dag.insert(&constraint.term, constraint.image);
        self.constraints.push(idx);
        idx
    }

    pub fn build(self) -> Result<Model, Problem> {
        if self.initial.is_empty() {
            return Err("model has no variables".gloss());
        }
        let dag = Rc::new(self.dag);
        let scope = dag.scope().clone();
        let mut domains = vec![Domain::Interval(Interval::UNIVERSE); scope.len()];
        for (var, domain) in &self.initial {
            if let Some(slot) = scope.slot_of(var) {
                domains[slot] = domain.clone();
            }
        }
        let initial_box = DomainBox::new(scope, domains);

        let equations: Vec<usize> = self
            .constraints
            .iter()
            .copied()
            .filter(|&idx| {
                let image = dag.function(idx).image;
                image.lo() == image.hi()
            })
            .collect();

        Ok(Model { dag, initial_box, constraints: self.constraints, equations })
    }
}

/// A compiled model: an immutable DAG of constraint functions together
/// with the initial box and the subset of constraints that are equations
/// (used by the prover's square-subsystem certification).
pub struct Model {
    dag: Rc<Dag>,
    initial_box: DomainBox,
    constraints: Vec<usize>,
    equations: Vec<usize>,
}

impl Model {
    pub fn dag(&self) -> &Rc<Dag> {
        &self.dag
    }

    pub fn initial_box(&self) -> &DomainBox {
        &self.initial_box
    }

    pub fn constraints(&self) -> &[usize] {
        &self.constraints
    }

    pub fn equations(&self) -> &[usize] {
        &self.equations
    }

    pub fn scope(&self) -> &Scope {
        self.dag.scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_duplicate_variable_names() {
        let mut builder = ProblemBuilder::new();
        builder.add_variable("x", 0.0, 1.0).unwrap();
        let err = builder.add_variable("x", 0.0, 1.0);
        assert!(err.is_err());
    }

    #[test]
    fn builder_rejects_empty_domain() {
        let mut builder = ProblemBuilder::new();
        let err = builder.add_variable("x", 2.0, 1.0);
        assert!(err.is_err());
    }

    #[test]
    fn builder_rejects_empty_model() {
        let builder = ProblemBuilder::new();
        assert!(builder.build().is_err());
    }

    #[test]
    fn builder_compiles_a_simple_system() {
        let mut builder = ProblemBuilder::new();
        let x = builder.add_variable("x", -10.0, 10.0).unwrap();
        let y = builder.add_variable("y", -10.0, 10.0).unwrap();
        let tx = Term::var(x.clone());
        let ty = Term::var(y.clone());
        builder.add_constraint((&tx - &ty).eq(0.0));
        builder.add_constraint((tx.sqr() + &ty).le(5.0));
        let model = builder.build().unwrap();
        assert_eq!(model.scope().len(), 2);
        assert_eq!(model.constraints().len(), 2);
        assert_eq!(model.equations().len(), 1);
    }
}
