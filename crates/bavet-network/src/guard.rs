//! Boundary around user-supplied closures.
//!
//! Predicates, key extractors, collectors and mappers are opaque to the
//! network. A panic inside one is caught here and turned into an error that
//! names the node and the tuple being processed.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bavet_core::{BavetError, Result};

use crate::fact::Fact;
use crate::tuple::describe_facts;

/// Runs `f`, reporting a panic as [`BavetError::UserCode`].
pub(crate) fn call<V: Fact, T>(site: &str, facts: &[Arc<V>], f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BavetError::UserCode {
        site: format!("{} on tuple {}", site, describe_facts(facts)),
        message: panic_message(payload.as_ref()),
    })
}

/// Runs `f` for a left/right candidate pair.
pub(crate) fn call_pair<V: Fact, T>(
    site: &str,
    left: &[Arc<V>],
    right: &[Arc<V>],
    f: impl FnOnce() -> T,
) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BavetError::UserCode {
        site: format!(
            "{} on tuples {} and {}",
            site,
            describe_facts(left),
            describe_facts(right)
        ),
        message: panic_message(payload.as_ref()),
    })
}

/// Runs `f` for a fact that is not in a tuple yet.
pub(crate) fn call_on_fact<V: Fact, T>(site: &str, fact: &V, f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BavetError::UserCode {
        site: format!("{} on fact {:?}", site, fact),
        message: panic_message(payload.as_ref()),
    })
}

/// Runs an impact computation, reporting a panic as [`BavetError::Impact`].
pub(crate) fn impact<V: Fact, T>(
    constraint: &str,
    facts: &[Arc<V>],
    f: impl FnOnce() -> T,
) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BavetError::Impact {
        constraint: constraint.to_string(),
        tuple: describe_facts(facts),
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_passes_through() {
        let facts = [Arc::new(3i64)];
        assert_eq!(call("filter", &facts, || 4).unwrap(), 4);
    }

    #[test]
    fn test_panic_names_site_and_tuple() {
        let facts = [Arc::new(3i64), Arc::new(5i64)];
        let err = call("join(equal)", &facts, || -> i64 { panic!("bad key") }).unwrap_err();
        match err {
            BavetError::UserCode { site, message } => {
                assert_eq!(site, "join(equal) on tuple [3, 5]");
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_formatted_panic_in_impact() {
        let facts = [Arc::new(1i64)];
        let err = impact("Overlap", &facts, || -> i64 { panic!("weight {}", 9) }).unwrap_err();
        assert!(matches!(
            err,
            BavetError::Impact { ref constraint, ref message, .. }
                if constraint == "Overlap" && message == "weight 9"
        ));
    }
}
