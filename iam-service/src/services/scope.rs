use uuid::Uuid;

use super::error::AuthError;
use super::repository::AccountRepository;

pub const ROLE_PREFIX: &str = "ROLE_";

/// `admin` becomes `ROLE_ADMIN`. Duplicates collapse.
pub fn role_scope<I, S>(role_names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scope: Vec<String> = role_names
        .into_iter()
        .map(|name| format!("{}{}", ROLE_PREFIX, name.as_ref().to_uppercase()))
        .collect();
    scope.sort();
    scope.dedup();
    scope
}

/// Scope granted to `user_id` by its role assignments in `realm_id`.
pub async fn resolve_scope(
    repository: &dyn AccountRepository,
    realm_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<String>, AuthError> {
    let names = repository
        .list_role_names(realm_id, user_id)
        .await
        .map_err(AuthError::Repository)?;

    Ok(role_scope(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefixes_and_uppercases() {
        let scope: HashSet<String> = role_scope(["admin", "support"]).into_iter().collect();
        let expected: HashSet<String> = ["ROLE_ADMIN", "ROLE_SUPPORT"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(scope, expected);
    }

    #[test]
    fn no_roles_means_empty_scope() {
        assert!(role_scope(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn names_differing_in_case_collapse() {
        assert_eq!(role_scope(["Admin", "admin"]), vec!["ROLE_ADMIN".to_string()]);
    }
}
