//! Roles and the role implication graph
//!
//! Roles of one policy live in an arena (`Vec<Role>`) and refer to the roles
//! they imply by [`RoleId`]. The implication graph may contain cycles; every
//! walk over it keeps a visited set.

use crate::permission::Permission;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a role inside its policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(pub(crate) usize);

impl RoleId {
    /// Position in the policy's role list
    pub fn index(self) -> usize {
        self.0
    }
}

/// Named bundle of permissions plus the roles it implies
///
/// Only produced by [`PolicyBuilder`](super::PolicyBuilder); immutable once
/// the policy is built.
#[derive(Debug, Clone)]
pub struct Role {
    name: String,
    permissions: Vec<Arc<Permission>>,
    implied_roles: Vec<RoleId>,
}

impl Role {
    pub(crate) fn new(name: String, permissions: Vec<Arc<Permission>>) -> Self {
        Self {
            name,
            permissions,
            implied_roles: Vec::new(),
        }
    }

    pub(crate) fn add_implied_role(&mut self, id: RoleId) {
        if !self.implied_roles.contains(&id) {
            self.implied_roles.push(id);
        }
    }

    /// Role name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permissions granted directly by this role
    pub fn permissions(&self) -> &[Arc<Permission>] {
        &self.permissions
    }

    /// Roles implied by this role
    pub fn implied_roles(&self) -> &[RoleId] {
        &self.implied_roles
    }

    /// Does one of this role's own permissions imply `requested`?
    pub fn grants_directly(&self, requested: &Permission) -> bool {
        self.permissions.iter().any(|held| held.implies(requested))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Role declaration collected before a policy is built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBuilder {
    pub(crate) name: String,
    pub(crate) permissions: Vec<String>,
    pub(crate) implied_roles: Vec<String>,
}

impl RoleBuilder {
    /// Start a role declaration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
            implied_roles: Vec::new(),
        }
    }

    /// Grant a permission string
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Grant several permission strings
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Imply another role of the same policy by name
    pub fn implies_role(mut self, role: impl Into<String>) -> Self {
        self.implied_roles.push(role.into());
        self
    }

    /// Imply several roles by name
    pub fn implies_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implied_roles.extend(roles.into_iter().map(Into::into));
        self
    }
}

/// Does the role `start`, or any role it implies transitively, imply `requested`?
///
/// Depth-first over the arena; each role is inspected at most once, so
/// cyclic graphs terminate.
pub(crate) fn implies(roles: &[Role], start: RoleId, requested: &Permission) -> bool {
    let mut visited = vec![false; roles.len()];
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        let Some(role) = roles.get(id.0) else {
            continue;
        };
        if visited[id.0] {
            continue;
        }
        visited[id.0] = true;

        if role.grants_directly(requested) {
            return true;
        }

        stack.extend(
            role.implied_roles
                .iter()
                .copied()
                .filter(|implied| !visited[implied.0]),
        );
    }

    false
}

/// Find one cycle in the implication graph, as a path of role names
///
/// Uses depth-first search with three states:
/// - White (0): Unvisited
/// - Gray (1): Currently on the DFS stack
/// - Black (2): Fully visited
///
/// A gray role reached again closes a cycle. The walk keeps its own stack of
/// `(role, next implied role)` frames, so chain length is bounded by memory
/// rather than the thread stack.
pub(crate) fn find_cycle(roles: &[Role]) -> Option<Vec<String>> {
    let mut state = vec![0u8; roles.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..roles.len() {
        if state[start] != 0 {
            continue;
        }
        state[start] = 1;
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(implied) = roles[node].implied_roles.get(next) else {
                state[node] = 2;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match state[implied.0] {
                1 => {
                    let cycle_start = stack
                        .iter()
                        .position(|(n, _)| *n == implied.0)
                        .unwrap_or(0);
                    let cycle = stack[cycle_start..]
                        .iter()
                        .map(|(n, _)| *n)
                        .chain(std::iter::once(implied.0))
                        .map(|n| roles[n].name.clone())
                        .collect();
                    return Some(cycle);
                }
                0 => {
                    state[implied.0] = 1;
                    stack.push((implied.0, 0));
                }
                _ => {}
            }
        }
    }

    None
}

/// Name → id lookup for an arena
pub(crate) fn index_by_name(roles: &[Role]) -> HashMap<String, RoleId> {
    roles
        .iter()
        .enumerate()
        .map(|(idx, role)| (role.name.clone(), RoleId(idx)))
        .collect()
}
