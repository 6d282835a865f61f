/// Path template expansion
use crate::error::{Error, Result};

/// Supplies identifier values for path template substitution
pub trait PathContext {
    /// The object's own identifier, rendered for a URL
    fn identifier(&self) -> String;

    /// Identifier of the owning object, for derived resources
    fn parent_identifier(&self) -> Option<String> {
        None
    }
}

/// Expand `template` against `model`, returning a path with a leading `/`
///
/// `{id}` always takes the model's own identifier; any other placeholder
/// takes the parent identifier. Substituted values are percent-encoded.
pub fn expand_path(template: &str, model: Option<&dyn PathContext>) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    if !template.starts_with('/') {
        out.push('/');
    }

    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| Error::MissingPathParam {
            param: after.to_string(),
            template: template.to_string(),
        })?;
        let param = &after[..close];

        let value = match (param, model) {
            ("id", Some(model)) => Some(model.identifier()),
            (_, Some(model)) => model.parent_identifier(),
            (_, None) => None,
        }
        .ok_or_else(|| Error::MissingPathParam {
            param: param.to_string(),
            template: template.to_string(),
        })?;

        out.push_str(&urlencoding::encode(&value));
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pool {
        id: u64,
        cluster_id: Option<u64>,
    }

    impl PathContext for Pool {
        fn identifier(&self) -> String {
            self.id.to_string()
        }

        fn parent_identifier(&self) -> Option<String> {
            self.cluster_id.map(|id| id.to_string())
        }
    }

    #[test]
    fn test_expand_own_and_parent() {
        let pool = Pool {
            id: 456,
            cluster_id: Some(123),
        };
        let path = expand_path("/lke/clusters/{cluster_id}/pools/{id}/recycle", Some(&pool)).unwrap();
        assert_eq!(path, "/lke/clusters/123/pools/456/recycle");
    }

    #[test]
    fn test_missing_parent_is_an_error() {
        let pool = Pool {
            id: 456,
            cluster_id: None,
        };
        let err = expand_path("/lke/clusters/{cluster_id}/pools/{id}", Some(&pool)).unwrap_err();
        assert!(matches!(err, Error::MissingPathParam { ref param, .. } if param == "cluster_id"));
    }

    #[test]
    fn test_plain_path_needs_no_model() {
        assert_eq!(expand_path("/profile", None).unwrap(), "/profile");
        assert_eq!(expand_path("profile/logins", None).unwrap(), "/profile/logins");
    }

    #[test]
    fn test_values_are_percent_encoded() {
        struct Slug;
        impl PathContext for Slug {
            fn identifier(&self) -> String {
                "a b/c".to_string()
            }
        }
        assert_eq!(
            expand_path("/regions/{id}", Some(&Slug)).unwrap(),
            "/regions/a%20b%2Fc"
        );
    }
}
