//! Solver-independent linear program.
//!
//! Variables and constraints are addressed by typed handles. Constraints can
//! be registered in a [`ConstraintGroup`] and the whole group dropped in one
//! call, which is how the dispatch model swaps its nodal-balance rows between
//! loss iterations without touching anything else.

use super::LpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(usize);

impl ConstraintId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a set of constraints that are removed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintGroup(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// Sparse affine expression `Σ cᵢ·xᵢ + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression under a full assignment indexed by `VarId`.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values.get(var.0).copied().unwrap_or(f64::NAN))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::new().with_term(var, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

impl Variable {
    /// Both bounds equal and finite.
    pub fn is_fixed(&self) -> bool {
        self.lower.is_finite() && self.lower == self.upper
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
    pub group: Option<ConstraintGroup>,
}

#[derive(Debug, Clone)]
struct GroupSlot {
    label: String,
    members: Vec<ConstraintId>,
    live: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    variables: Vec<Variable>,
    // Removed constraints leave a `None` so ids stay stable.
    constraints: Vec<Option<Constraint>>,
    groups: Vec<GroupSlot>,
    objective: LinearExpr,
    sense: Sense,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> Result<VarId, LpError> {
        let name = name.into();
        check_bounds(&name, lower, upper)?;
        let id = VarId(self.variables.len());
        self.variables.push(Variable { name, lower, upper });
        Ok(id)
    }

    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: f64) -> Result<(), LpError> {
        let slot = self
            .variables
            .get_mut(var.0)
            .ok_or(LpError::UnknownVariable(var.0))?;
        check_bounds(&slot.name, lower, upper)?;
        slot.lower = lower;
        slot.upper = upper;
        Ok(())
    }

    pub fn fix(&mut self, var: VarId, value: f64) -> Result<(), LpError> {
        self.set_bounds(var, value, value)
    }

    pub fn var(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(var.0)
    }

    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables.iter().enumerate().map(|(i, v)| (VarId(i), v))
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) -> Result<ConstraintId, LpError> {
        self.push_constraint(name.into(), expr, relation, rhs, None)
    }

    pub fn add_group(&mut self, label: impl Into<String>) -> ConstraintGroup {
        let id = ConstraintGroup(self.groups.len());
        self.groups.push(GroupSlot {
            label: label.into(),
            members: Vec::new(),
            live: true,
        });
        id
    }

    pub fn add_to_group(
        &mut self,
        group: ConstraintGroup,
        name: impl Into<String>,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) -> Result<ConstraintId, LpError> {
        match self.groups.get(group.0) {
            Some(slot) if slot.live => {}
            _ => return Err(LpError::UnknownGroup(group.0)),
        }
        let id = self.push_constraint(name.into(), expr, relation, rhs, Some(group))?;
        self.groups[group.0].members.push(id);
        Ok(id)
    }

    /// Drop every constraint in `group`. Returns how many were removed.
    pub fn remove_group(&mut self, group: ConstraintGroup) -> Result<usize, LpError> {
        let slot = match self.groups.get_mut(group.0) {
            Some(slot) if slot.live => slot,
            _ => return Err(LpError::UnknownGroup(group.0)),
        };
        slot.live = false;
        let members = std::mem::take(&mut slot.members);
        for id in &members {
            self.constraints[id.0] = None;
        }
        Ok(members.len())
    }

    pub fn group_label(&self, group: ConstraintGroup) -> Option<&str> {
        self.groups.get(group.0).map(|g| g.label.as_str())
    }

    pub fn group_members(&self, group: ConstraintGroup) -> &[ConstraintId] {
        self.groups
            .get(group.0)
            .map(|g| g.members.as_slice())
            .unwrap_or(&[])
    }

    /// Constraint by id; `None` once its group has been removed.
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    /// Live constraints in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ConstraintId(i), c)))
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.iter().filter(|c| c.is_some()).count()
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: Sense) -> Result<(), LpError> {
        self.check_expr("objective", &expr)?;
        self.objective = expr;
        self.sense = sense;
        Ok(())
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    fn push_constraint(
        &mut self,
        name: String,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
        group: Option<ConstraintGroup>,
    ) -> Result<ConstraintId, LpError> {
        self.check_expr(&name, &expr)?;
        if !rhs.is_finite() {
            return Err(LpError::InvalidCoefficient { name });
        }
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Some(Constraint {
            name,
            expr,
            relation,
            rhs,
            group,
        }));
        Ok(id)
    }

    fn check_expr(&self, name: &str, expr: &LinearExpr) -> Result<(), LpError> {
        for (var, coef) in expr.terms() {
            if var.0 >= self.variables.len() {
                return Err(LpError::UnknownVariable(var.0));
            }
            if !coef.is_finite() {
                return Err(LpError::InvalidCoefficient {
                    name: name.to_string(),
                });
            }
        }
        if !expr.constant_term().is_finite() {
            return Err(LpError::InvalidCoefficient {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn check_bounds(name: &str, lower: f64, upper: f64) -> Result<(), LpError> {
    if lower.is_nan() || upper.is_nan() || lower > upper {
        return Err(LpError::InvalidBounds {
            name: name.to_string(),
            lower,
            upper,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_removal_keeps_other_ids() {
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x", 0.0, 10.0).unwrap();
        let fixed = lp
            .add_constraint("cap", LinearExpr::from(x), Relation::Le, 5.0)
            .unwrap();

        let group = lp.add_group("balance");
        let a = lp
            .add_to_group(group, "b1", LinearExpr::from(x), Relation::Eq, 1.0)
            .unwrap();
        assert_eq!(lp.num_constraints(), 2);

        assert_eq!(lp.remove_group(group).unwrap(), 1);
        assert!(lp.constraint(a).is_none());
        assert!(lp.constraint(fixed).is_some());
        assert_eq!(lp.num_constraints(), 1);

        // a removed group cannot be reused
        assert!(lp.remove_group(group).is_err());
        assert!(lp
            .add_to_group(group, "b2", LinearExpr::from(x), Relation::Eq, 1.0)
            .is_err());
    }

    #[test]
    fn test_unknown_variable_is_rejected() {
        let mut lp = LinearProgram::new();
        let mut other = LinearProgram::new();
        other.add_var("a", 0.0, 1.0).unwrap();
        let stray = other.add_var("b", 0.0, 1.0).unwrap();
        lp.add_var("x", 0.0, 1.0).unwrap();
        let err = lp
            .add_constraint("c", LinearExpr::from(stray), Relation::Le, 1.0)
            .unwrap_err();
        assert!(matches!(err, LpError::UnknownVariable(1)));
    }

    #[test]
    fn test_invalid_bounds_and_coefficients() {
        let mut lp = LinearProgram::new();
        assert!(lp.add_var("bad", 1.0, 0.0).is_err());
        assert!(lp.add_var("nan", f64::NAN, 0.0).is_err());

        let x = lp.add_var("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        let expr = LinearExpr::new().with_term(x, f64::INFINITY);
        assert!(lp.add_constraint("c", expr, Relation::Eq, 0.0).is_err());
        assert!(lp
            .add_constraint("d", LinearExpr::from(x), Relation::Eq, f64::NAN)
            .is_err());
    }

    #[test]
    fn test_expression_evaluation() {
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x", 0.0, 1.0).unwrap();
        let y = lp.add_var("y", 0.0, 1.0).unwrap();
        let mut expr = LinearExpr::constant(1.0).with_term(x, 2.0).with_term(y, -1.0);
        expr.add_term(y, 0.0);
        assert_eq!(expr.terms().len(), 2);
        assert_eq!(expr.evaluate(&[3.0, 4.0]), 3.0);
    }

    #[test]
    fn test_fix_sets_both_bounds() {
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x", -1.0, 1.0).unwrap();
        lp.fix(x, 0.25).unwrap();
        assert!(lp.var(x).unwrap().is_fixed());
    }
}
