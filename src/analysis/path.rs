//! Shortest call-chain search over analysis results.
//!
//! The graph searched is the `calls` relation recorded in the cache, restricted to edges
//! whose callee can carry the exception of interest to its caller. Only `Complete`
//! entries are expanded, so a chain never runs through partial results of a pass still
//! in progress. The search is a depth-first walk with three prunings:
//!
//! - nodes already on the current chain are not re-entered (the graph has cycles)
//! - a node reached before at the same or a smaller depth is not expanded again
//! - a branch is abandoned once it cannot beat the best chain found so far

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::{
        cache::{AnalysisCache, MethodEntry},
        thrown::ThrownException,
    },
    metadata::identity::MethodId,
    Result,
};

/// Shortest chain `from -> ... -> to` through callees that are `to`, or that let an
/// exception thrown by `to` escape.
///
/// Returns `[from]` when both ends are the same method and an empty chain when `to` is
/// not reachable or `from` is not complete.
///
/// # Errors
///
/// Returns [`crate::Error::LockError`] if an entry's lock was poisoned.
pub fn shortest_path(cache: &AnalysisCache, from: MethodId, to: MethodId) -> Result<Vec<MethodId>> {
    search(cache, from, to, |entry| {
        entry.any_unhandled(|thrown| thrown.method == to)
    })
}

/// Shortest chain from `from` to the thrower of `thrown`, through callees letting that
/// exception escape.
///
/// # Errors
///
/// Returns [`crate::Error::LockError`] if an entry's lock was poisoned.
pub fn exception_path(
    cache: &AnalysisCache,
    from: MethodId,
    thrown: &ThrownException,
) -> Result<Vec<MethodId>> {
    search(cache, from, thrown.method, |entry| {
        entry.any_unhandled(|candidate| candidate == thrown)
    })
}

struct Frame {
    node: MethodId,
    callees: Vec<MethodId>,
    next: usize,
}

fn search<G>(cache: &AnalysisCache, from: MethodId, target: MethodId, carries: G) -> Result<Vec<MethodId>>
where
    G: Fn(&MethodEntry) -> Result<bool>,
{
    if from == target {
        return Ok(vec![from]);
    }
    let Some(root) = cache.get_method(from).filter(|entry| entry.is_complete()) else {
        return Ok(Vec::new());
    };

    let mut best: Vec<MethodId> = Vec::new();
    let mut best_depth: HashMap<MethodId, usize> = HashMap::from([(from, 0)]);
    let mut on_path: HashSet<MethodId> = HashSet::from([from]);
    let mut stack = vec![Frame {
        node: from,
        callees: root.called_methods()?,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(&callee) = frame.callees.get(frame.next) else {
            on_path.remove(&frame.node);
            stack.pop();
            continue;
        };
        frame.next += 1;

        // chain length if `callee` were the last node
        let depth = stack.len();
        if !best.is_empty() && depth + 1 >= best.len() {
            continue;
        }
        if on_path.contains(&callee) {
            continue;
        }
        if best_depth.get(&callee).is_some_and(|&seen| seen <= depth) {
            continue;
        }

        if callee == target {
            best = stack.iter().map(|f| f.node).collect();
            best.push(callee);
            continue;
        }

        let Some(entry) = cache.get_method(callee) else {
            continue;
        };
        if !entry.is_complete() || !carries(&entry)? {
            continue;
        }

        best_depth.insert(callee, depth);
        on_path.insert(callee);
        stack.push(Frame {
            node: callee,
            callees: entry.called_methods()?,
            next: 0,
        });
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            cache::AnalysisState,
            thrown::{ExceptionOrigin, Unhandled},
        },
        metadata::types::TypeRef,
        test::method_id,
    };

    fn io_error(thrower: MethodId) -> ThrownException {
        ThrownException::new(
            thrower,
            TypeRef::parse("mscorlib", "System.IO.IOException"),
            4,
            ExceptionOrigin::Thrown,
        )
    }

    /// Builds a complete cache from `(caller, callees, escaping)` rows.
    fn graph(rows: &[(u32, &[u32], &[ThrownException])]) -> AnalysisCache {
        let cache = AnalysisCache::new();
        for (caller, callees, escaping) in rows {
            let entry = cache.method(method_id(*caller));
            for (offset, callee) in callees.iter().enumerate() {
                entry
                    .add_call(method_id(*callee), u32::try_from(offset).unwrap() * 5)
                    .unwrap();
            }
            for thrown in *escaping {
                entry
                    .add_unhandled(Unhandled::new(thrown.clone(), 0))
                    .unwrap();
            }
            entry.set_state(AnalysisState::Complete);
        }
        cache
    }

    #[test]
    fn test_linear_chain() {
        let thrown = io_error(method_id(3));
        let cache = graph(&[
            (1, &[2], &[thrown.clone()]),
            (2, &[3], &[thrown.clone()]),
            (3, &[], &[thrown.clone()]),
            (4, &[], &[]),
        ]);

        assert_eq!(
            shortest_path(&cache, method_id(1), method_id(3)).unwrap(),
            vec![method_id(1), method_id(2), method_id(3)]
        );
        assert!(shortest_path(&cache, method_id(1), method_id(4))
            .unwrap()
            .is_empty());
        assert_eq!(
            shortest_path(&cache, method_id(2), method_id(2)).unwrap(),
            vec![method_id(2)]
        );
    }

    #[test]
    fn test_prefers_shorter_chain() {
        let thrown = io_error(method_id(5));
        let cache = graph(&[
            (1, &[2, 4], &[thrown.clone()]),
            (2, &[3], &[thrown.clone()]),
            (3, &[5], &[thrown.clone()]),
            (4, &[5], &[thrown.clone()]),
            (5, &[], &[thrown.clone()]),
        ]);

        assert_eq!(
            shortest_path(&cache, method_id(1), method_id(5)).unwrap(),
            vec![method_id(1), method_id(4), method_id(5)]
        );
    }

    #[test]
    fn test_gate_skips_edges_without_exception() {
        let thrown = io_error(method_id(3));
        // 2 calls 3 but catches everything it throws
        let cache = graph(&[
            (1, &[2], &[]),
            (2, &[3], &[]),
            (3, &[], &[thrown]),
        ]);

        assert!(shortest_path(&cache, method_id(1), method_id(3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_incomplete_entries_are_not_searched() {
        let thrown = io_error(method_id(3));
        let cache = graph(&[
            (1, &[2], &[thrown.clone()]),
            (2, &[3], &[thrown.clone()]),
            (3, &[], &[thrown]),
        ]);
        let chain = vec![method_id(1), method_id(2), method_id(3)];
        assert_eq!(
            shortest_path(&cache, method_id(1), method_id(3)).unwrap(),
            chain
        );

        let middle = cache.method(method_id(2));
        middle.set_state(AnalysisState::Analysing);
        assert!(shortest_path(&cache, method_id(1), method_id(3))
            .unwrap()
            .is_empty());

        middle.set_state(AnalysisState::Complete);
        cache.method(method_id(1)).set_state(AnalysisState::NotStarted);
        assert!(shortest_path(&cache, method_id(1), method_id(3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cycles_terminate() {
        let thrown = io_error(method_id(3));
        let cache = graph(&[
            (1, &[2], &[thrown.clone()]),
            (2, &[1, 3], &[thrown.clone()]),
            (3, &[2], &[thrown.clone()]),
        ]);

        assert_eq!(
            shortest_path(&cache, method_id(1), method_id(3)).unwrap(),
            vec![method_id(1), method_id(2), method_id(3)]
        );
    }

    #[test]
    fn test_exception_path_matches_type() {
        let io = io_error(method_id(3));
        let other = ThrownException::new(
            method_id(3),
            TypeRef::parse("mscorlib", "System.ArgumentException"),
            9,
            ExceptionOrigin::Thrown,
        );
        let cache = graph(&[
            (1, &[2, 4], &[io.clone(), other.clone()]),
            (2, &[3], &[other.clone()]),
            (4, &[5], &[io.clone()]),
            (5, &[3], &[io.clone()]),
            (3, &[], &[io.clone(), other.clone()]),
        ]);

        assert_eq!(
            exception_path(&cache, method_id(1), &io).unwrap(),
            vec![method_id(1), method_id(4), method_id(5), method_id(3)]
        );
        assert_eq!(
            exception_path(&cache, method_id(1), &other).unwrap(),
            vec![method_id(1), method_id(2), method_id(3)]
        );
    }

    #[test]
    fn test_unknown_root() {
        let cache = AnalysisCache::new();
        assert!(shortest_path(&cache, method_id(1), method_id(2))
            .unwrap()
            .is_empty());
    }
}
