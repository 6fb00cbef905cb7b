//! CEL-backed predicates with compiled program caching

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::convert::to_cel;
use super::{Predicate, PredicateCompiler, PredicateError};
use crate::types::Subject;

/// Default bound on cached compiled programs
pub const DEFAULT_MAX_PROGRAMS: usize = 1_000;

/// Compiles CEL expressions into predicates
///
/// Compiled programs are cached by expression text, so reloading a policy
/// with unchanged grants does not recompile them. The cache holds at most
/// `max_programs` entries; when full, the least recently used tenth is
/// dropped. Policies keep their own `Arc<Program>`, so eviction never
/// affects a loaded policy.
///
/// Expressions see the subject as `subject` and as the alias `user`:
///
/// ```text
/// subject.name == 'alice'
/// 'admin' in user.roles
/// subject.authenticated && subject.attributes.department == 'finance'
/// ```
pub struct CelCompiler {
    /// Compiled program cache (thread-safe)
    program_cache: DashMap<String, CachedProgram>,
    max_programs: usize,
    epoch: Instant,
}

struct CachedProgram {
    program: Arc<Program>,
    last_used: AtomicU64,
}

impl CelCompiler {
    /// Create a new compiler caching up to [`DEFAULT_MAX_PROGRAMS`] programs
    pub fn new() -> Self {
        Self::with_max_programs(DEFAULT_MAX_PROGRAMS)
    }

    /// Create a compiler caching up to `max_programs` programs (0 disables caching)
    pub fn with_max_programs(max_programs: usize) -> Self {
        Self {
            program_cache: DashMap::new(),
            max_programs,
            epoch: Instant::now(),
        }
    }

    /// Compile an expression, reusing a cached program when available
    pub fn compile_program(&self, expression: &str) -> Result<Arc<Program>, PredicateError> {
        let now = self.now_ms();
        if let Some(cached) = self.program_cache.get(expression) {
            cached.last_used.store(now, Ordering::Relaxed);
            return Ok(Arc::clone(&cached.program));
        }

        let program = Program::compile(expression)
            .map(Arc::new)
            .map_err(|e| PredicateError::Compilation(format!("{:?}", e)))?;

        if self.max_programs == 0 {
            return Ok(program);
        }
        if self.program_cache.len() >= self.max_programs {
            self.evict_least_recently_used();
        }
        self.program_cache.insert(
            expression.to_string(),
            CachedProgram {
                program: Arc::clone(&program),
                last_used: AtomicU64::new(now),
            },
        );

        Ok(program)
    }

    /// Number of cached programs
    pub fn cached_programs(&self) -> usize {
        self.program_cache.len()
    }

    /// Maximum number of cached programs
    pub fn max_programs(&self) -> usize {
        self.max_programs
    }

    /// Clear the compiled program cache
    pub fn clear_cache(&self) {
        self.program_cache.clear();
    }

    fn evict_least_recently_used(&self) {
        let to_remove = (self.max_programs / 10).max(1);
        let mut stamps: Vec<(String, u64)> = self
            .program_cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_used.load(Ordering::Relaxed)))
            .collect();
        stamps.sort_by_key(|(_, stamp)| *stamp);

        for (expression, _) in stamps.into_iter().take(to_remove) {
            self.program_cache.remove(&expression);
        }

        debug!(evicted = to_remove, "CEL program cache full, evicted programs");
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for CelCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateCompiler for CelCompiler {
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, PredicateError> {
        let program = self.compile_program(expression)?;
        Ok(Arc::new(CelPredicate {
            source: expression.to_string(),
            program,
        }))
    }
}

/// Compiled CEL expression
pub struct CelPredicate {
    source: String,
    program: Arc<Program>,
}

impl CelPredicate {
    /// Build the variable bound to `subject` and `user`
    fn subject_value(subject: &Subject) -> Value {
        let mut roles: Vec<&String> = subject.roles.iter().collect();
        roles.sort();

        json!({
            "name": subject.name,
            "authenticated": subject.authenticated,
            "roles": roles,
            "attributes": subject.attributes,
        })
    }

    /// Convert CEL result to boolean
    fn to_bool(value: &CelValue) -> Result<bool, PredicateError> {
        match value {
            CelValue::Bool(b) => Ok(*b),
            _ => Err(PredicateError::NonBooleanResult),
        }
    }
}

impl Predicate for CelPredicate {
    fn evaluate(&self, subject: &Subject) -> Result<bool, PredicateError> {
        let mut cel_context = Context::default();

        let subject_value = to_cel(&Self::subject_value(subject));
        cel_context.add_variable_from_value("subject", subject_value.clone());
        cel_context.add_variable_from_value("user", subject_value);

        let result = self
            .program
            .execute(&cel_context)
            .map_err(|e| PredicateError::Evaluation(format!("{:?}", e)))?;

        Self::to_bool(&result)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_subject() -> Subject {
        Subject::new("alice")
            .authenticated()
            .with_roles(["admin", "editor"])
            .with_attribute("department", "engineering")
            .with_attribute("level", 5)
    }

    fn eval(expr: &str, subject: &Subject) -> Result<bool, PredicateError> {
        CelCompiler::new().compile(expr)?.evaluate(subject)
    }

    #[test]
    fn test_simple_expression() {
        let subject = test_subject();
        assert_eq!(eval("true", &subject), Ok(true));
        assert_eq!(eval("false", &subject), Ok(false));
    }

    #[test]
    fn test_subject_fields() {
        let subject = test_subject();

        assert_eq!(eval("subject.name == 'alice'", &subject), Ok(true));
        assert_eq!(eval("user.name == 'alice'", &subject), Ok(true));
        assert_eq!(eval("subject.authenticated", &subject), Ok(true));
        assert_eq!(eval("'admin' in subject.roles", &subject), Ok(true));
        assert_eq!(eval("'viewer' in subject.roles", &subject), Ok(false));
    }

    #[test]
    fn test_subject_attributes() {
        let subject = test_subject();

        assert_eq!(
            eval("subject.attributes.department == 'engineering'", &subject),
            Ok(true)
        );
        assert_eq!(eval("subject.attributes.level >= 3", &subject), Ok(true));
        assert_eq!(
            eval(
                "subject.authenticated && subject.attributes.department == 'finance'",
                &subject
            ),
            Ok(false)
        );
    }

    #[test]
    fn test_program_caching() {
        let compiler = CelCompiler::new();

        compiler.compile("true").unwrap();
        compiler.compile("true").unwrap();
        assert_eq!(compiler.cached_programs(), 1);

        compiler.compile("false").unwrap();
        assert_eq!(compiler.cached_programs(), 2);

        compiler.clear_cache();
        assert_eq!(compiler.cached_programs(), 0);
    }

    #[test]
    fn test_program_cache_is_bounded() {
        let compiler = CelCompiler::with_max_programs(10);

        for i in 0..100 {
            compiler.compile(&format!("subject.name == 'user{}'", i)).unwrap();
        }
        assert!(compiler.cached_programs() <= 10);

        let subject = Subject::new("user99");
        let predicate = compiler.compile("subject.name == 'user99'").unwrap();
        assert_eq!(predicate.evaluate(&subject), Ok(true));
    }

    #[test]
    fn test_evicted_program_keeps_working() {
        let compiler = CelCompiler::with_max_programs(1);
        let first = compiler.compile("subject.authenticated").unwrap();

        compiler.compile("true").unwrap();
        assert_eq!(compiler.cached_programs(), 1);
        assert_eq!(first.evaluate(&Subject::new("a").authenticated()), Ok(true));
    }

    #[test]
    fn test_zero_max_programs_disables_cache() {
        let compiler = CelCompiler::with_max_programs(0);
        compiler.compile("true").unwrap();
        assert_eq!(compiler.cached_programs(), 0);
    }

    #[test]
    fn test_compilation_error() {
        let result = CelCompiler::new().compile("invalid syntax @#$");
        assert!(matches!(result, Err(PredicateError::Compilation(_))));
    }

    #[test]
    fn test_non_boolean_result() {
        let subject = test_subject();
        assert_eq!(eval("'hello'", &subject), Err(PredicateError::NonBooleanResult));
    }

    #[test]
    fn test_evaluation_error_on_missing_attribute() {
        let subject = Subject::new("bob");
        let result = eval("subject.attributes.department == 'engineering'", &subject);
        assert!(matches!(result, Err(PredicateError::Evaluation(_))));
    }

    #[test]
    fn test_predicate_keeps_source() {
        let predicate = CelCompiler::new().compile("subject.name == 'bob'").unwrap();
        assert_eq!(predicate.source(), "subject.name == 'bob'");
    }
}
