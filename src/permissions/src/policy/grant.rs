//! Conditional grants

use crate::permission::Permission;
use crate::predicate::{Predicate, PredicateError};
use crate::types::Subject;
use std::sync::Arc;

/// Grants a permission to subjects satisfying a predicate
#[derive(Debug, Clone)]
pub struct GrantRule {
    predicate: Arc<dyn Predicate>,
    granted_permission: Arc<Permission>,
}

impl GrantRule {
    /// Pair a predicate with the permission it grants
    pub fn new(predicate: Arc<dyn Predicate>, granted_permission: Arc<Permission>) -> Self {
        Self {
            predicate,
            granted_permission,
        }
    }

    /// Condition the subject has to satisfy
    pub fn predicate(&self) -> &Arc<dyn Predicate> {
        &self.predicate
    }

    /// Permission granted when the predicate holds
    pub fn granted_permission(&self) -> &Permission {
        &self.granted_permission
    }

    /// `Ok(true)` if the predicate holds for `subject` and the granted
    /// permission implies `requested`
    ///
    /// The predicate is evaluated first; its errors are returned even when
    /// the permission would not have matched.
    pub fn grants(
        &self,
        subject: &Subject,
        requested: &Permission,
    ) -> Result<bool, PredicateError> {
        if !self.predicate.evaluate(subject)? {
            return Ok(false);
        }
        Ok(self.granted_permission.implies(requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{ConstantPredicate, FnPredicate};

    fn perm(s: &str) -> Arc<Permission> {
        Arc::new(Permission::parse(s).unwrap())
    }

    #[test]
    fn test_grant_requires_predicate_and_permission() {
        let subject = Subject::new("alice");
        let grant = GrantRule::new(Arc::new(ConstantPredicate(true)), perm("report:read"));

        assert_eq!(grant.grants(&subject, &perm("report:read:q3")), Ok(true));
        assert_eq!(grant.grants(&subject, &perm("report:write")), Ok(false));

        let closed = GrantRule::new(Arc::new(ConstantPredicate(false)), perm("report"));
        assert_eq!(closed.grants(&subject, &perm("report:read")), Ok(false));
    }

    #[test]
    fn test_predicate_error_propagates() {
        let failing = FnPredicate::new("boom", |_: &Subject| {
            Err(PredicateError::Evaluation("boom".to_string()))
        });
        let grant = GrantRule::new(Arc::new(failing), perm("unrelated"));

        assert_eq!(
            grant.grants(&Subject::new("alice"), &perm("report:read")),
            Err(PredicateError::Evaluation("boom".to_string()))
        );
    }
}
