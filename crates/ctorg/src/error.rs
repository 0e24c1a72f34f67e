//! engine errors
use crate::client::ClientError;
use crate::resource::{Kind, ResourceRef};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),
    #[error("malformed tree below {root}: {reason}")]
    MalformedTree { root: String, reason: String },
    #[error(
        "{resource} has {} dependent(s) ({}), use force to delete them too",
        .dependents.len(),
        names(.dependents)
    )]
    BlockedByDependents {
        resource: ResourceRef,
        dependents: Vec<ResourceRef>,
    },
    #[error(transparent)]
    Remote(#[from] ClientError),
    #[error("{failed} of {attempted} deletions failed")]
    PartialFailure { failed: usize, attempted: usize },
    #[error("{kind} {name:?} is protected and cannot be deleted")]
    Protected { kind: Kind, name: String },
    #[error("insufficient privileges for role {0}")]
    InsufficientRole(String),
}

impl Error {
    pub fn not_found(kind: Kind, name: &str) -> Self {
        Error::NotFound(format!("{kind} {name:?}"))
    }
}

fn names(refs: &[ResourceRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocked_names_dependents() {
        let error = Error::BlockedByDependents {
            resource: ResourceRef::new(Kind::Integration, "vault", "u1"),
            dependents: vec![
                ResourceRef::new(Kind::Pull, "sync-1", "u2"),
                ResourceRef::new(Kind::Push, "push-1", "u3"),
            ],
        };

        assert_eq!(
            error.to_string(),
            "integration \"vault\" has 2 dependent(s) (pull \"sync-1\", push \"push-1\"), use force to delete them too"
        );
    }

    #[test]
    fn not_found_names_kind() {
        assert_eq!(
            Error::not_found(Kind::Environment, "staging").to_string(),
            "environment \"staging\" not found"
        );
    }
}
