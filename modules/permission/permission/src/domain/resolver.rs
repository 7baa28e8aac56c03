//! Scope resolution.
//!
//! A grant is effective for `(identity, resource, scope)` when:
//! - it is held by the identity or by a group the identity belongs to,
//!   transitively up to `max_membership_depth` hops;
//! - it sits on the resource or on one of its ancestors, up to
//!   `max_hierarchy_depth` levels;
//! - its role, translated down the hierarchy through role mappings where
//!   needed, carries `scope` on the resource itself.
//!
//! Translation works on `(role, position)` states where position 0 is the
//! target resource and higher positions are its ancestors. A role at position
//! `p > 0` applies to `path[p]` only when its resource type matches; each
//! mapping from it yields the mapped role at every lower position whose type
//! matches the mapped role's type. Positions only decrease, so the search ends.

use std::collections::{HashMap, HashSet};

use permission_sdk::{IdentityRole, Resource, Role, RoleMapping};
use uuid::Uuid;

use crate::domain::repos::{Repositories, RepositoryError};

pub const DEFAULT_MAX_MEMBERSHIP_DEPTH: usize = 10;
pub const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 32;

/// Bounds on both graph walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    pub max_membership_depth: usize,
    pub max_hierarchy_depth: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_membership_depth: DEFAULT_MAX_MEMBERSHIP_DEPTH,
            max_hierarchy_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionQuery<'a> {
    pub identity_id: Uuid,
    pub resource_id: &'a str,
    pub scope: &'a str,
}

impl<'a> PermissionQuery<'a> {
    #[must_use]
    pub fn new(identity_id: Uuid, resource_id: &'a str, scope: &'a str) -> Self {
        Self {
            identity_id,
            resource_id,
            scope,
        }
    }
}

/// Effective grants for `query`, in repository order.
///
/// An unknown resource has no grants. A broken parent chain or a grant that
/// references a missing role is an error: the answer would be indeterminate.
///
/// # Errors
///
/// Propagates repository failures and reports [`RepositoryError::MalformedHierarchy`]
/// or [`RepositoryError::DanglingRole`] on inconsistent data.
pub async fn find_permissions<R>(
    repos: &R,
    query: &PermissionQuery<'_>,
    limits: &TraversalLimits,
) -> Result<Vec<IdentityRole>, RepositoryError>
where
    R: Repositories + ?Sized,
{
    let Some(target) = repos.resources().load(query.resource_id).await? else {
        tracing::debug!(resource_id = query.resource_id, "unknown resource");
        return Ok(Vec::new());
    };

    let path = ancestry(repos, target, limits.max_hierarchy_depth).await?;
    let principals = principals(repos, query.identity_id, limits.max_membership_depth).await?;
    let resource_ids: Vec<String> = path.iter().map(|r| r.id.clone()).collect();

    let grants = repos
        .identity_roles()
        .find_for_principals(&principals, &resource_ids)
        .await?;

    let mut translator = Translator::new(repos, &path);
    let mut effective = Vec::new();
    for grant in grants {
        let Some(position) = path.iter().position(|r| r.id == grant.resource_id) else {
            continue;
        };
        if translator
            .carries_scope(grant.role_id, position, query.scope)
            .await?
        {
            effective.push(grant);
        }
    }

    tracing::trace!(
        identity_id = %query.identity_id,
        resource_id = query.resource_id,
        scope = query.scope,
        principals = principals.len(),
        depth = path.len(),
        effective = effective.len(),
        "resolved permissions"
    );
    Ok(effective)
}

/// `[target, parent, grandparent, ...]`, at most `max_depth` ancestors.
async fn ancestry<R>(
    repos: &R,
    target: Resource,
    max_depth: usize,
) -> Result<Vec<Resource>, RepositoryError>
where
    R: Repositories + ?Sized,
{
    let mut seen = HashSet::from([target.id.clone()]);
    let mut path = vec![target];

    while let Some((child_id, parent_id)) = path
        .last()
        .and_then(|r| r.parent_id.clone().map(|p| (r.id.clone(), p)))
    {
        if path.len() > max_depth {
            tracing::debug!(
                resource_id = %path[0].id,
                max_depth,
                "hierarchy depth bound reached"
            );
            break;
        }
        if !seen.insert(parent_id.clone()) {
            return Err(RepositoryError::malformed_hierarchy(
                child_id,
                format!("parent chain loops back to '{parent_id}'"),
            ));
        }
        let parent = repos.resources().load(&parent_id).await?.ok_or_else(|| {
            RepositoryError::malformed_hierarchy(
                child_id,
                format!("parent '{parent_id}' does not exist"),
            )
        })?;
        path.push(parent);
    }

    Ok(path)
}

/// The identity followed by every group reachable within `max_depth` hops.
/// Groups already seen are not expanded again.
async fn principals<R>(
    repos: &R,
    identity_id: Uuid,
    max_depth: usize,
) -> Result<Vec<Uuid>, RepositoryError>
where
    R: Repositories + ?Sized,
{
    let mut principals = vec![identity_id];
    let mut seen = HashSet::from([identity_id]);
    let mut frontier = vec![identity_id];

    for _ in 0..max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for member_id in frontier {
            for group_id in repos.memberships().find_group_ids(member_id).await? {
                if seen.insert(group_id) {
                    principals.push(group_id);
                    next.push(group_id);
                }
            }
        }
        frontier = next;
    }

    if !frontier.is_empty() {
        tracing::debug!(%identity_id, max_depth, "membership depth bound reached");
    }
    Ok(principals)
}

/// Role translation along one ancestry path, with per-query lookup caches.
struct Translator<'a, R: ?Sized> {
    repos: &'a R,
    path: &'a [Resource],
    roles: HashMap<Uuid, Role>,
    mappings: HashMap<Uuid, Vec<RoleMapping>>,
}

impl<'a, R> Translator<'a, R>
where
    R: Repositories + ?Sized,
{
    fn new(repos: &'a R, path: &'a [Resource]) -> Self {
        Self {
            repos,
            path,
            roles: HashMap::new(),
            mappings: HashMap::new(),
        }
    }

    async fn role(&mut self, id: Uuid) -> Result<Role, RepositoryError> {
        if let Some(role) = self.roles.get(&id) {
            return Ok(role.clone());
        }
        let role = self
            .repos
            .roles()
            .load(id)
            .await?
            .ok_or(RepositoryError::DanglingRole(id))?;
        self.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn mappings_from(&mut self, role_id: Uuid) -> Result<Vec<RoleMapping>, RepositoryError> {
        if let Some(mappings) = self.mappings.get(&role_id) {
            return Ok(mappings.clone());
        }
        let mappings = self
            .repos
            .role_mappings()
            .find_by_source_role(role_id)
            .await?;
        self.mappings.insert(role_id, mappings.clone());
        Ok(mappings)
    }

    async fn carries_scope(
        &mut self,
        role_id: Uuid,
        position: usize,
        scope: &str,
    ) -> Result<bool, RepositoryError> {
        let path = self.path;
        let mut pending = vec![(role_id, position)];
        let mut visited = HashSet::from([(role_id, position)]);

        while let Some((current_id, at)) = pending.pop() {
            let role = self.role(current_id).await?;
            if at == 0 {
                if role.has_scope(scope) {
                    return Ok(true);
                }
                continue;
            }
            if role.resource_type != path[at].resource_type {
                continue;
            }
            for mapping in self.mappings_from(role.id).await? {
                let mapped = self.role(mapping.to_role_id).await?;
                for (below, resource) in path[..at].iter().enumerate() {
                    if resource.resource_type == mapped.resource_type
                        && visited.insert((mapped.id, below))
                    {
                        pending.push((mapped.id, below));
                    }
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
#[path = "tests_resolver.rs"]
mod tests;
