//! Ordered, short-circuiting resolver chain
//!
//! Stages are tried in insertion order; the first one returning `Some`
//! wins and the rest are skipped.

/// A single extraction strategy
pub type Stage<I, O> = Box<dyn Fn(&I) -> Option<O> + Send + Sync>;

/// Value produced by a chain, tagged with the stage that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<O> {
    pub stage: &'static str,
    pub value: O,
}

/// Ordered list of named stages
pub struct ResolverChain<I: ?Sized, O> {
    stages: Vec<(&'static str, Stage<I, O>)>,
}

impl<I: ?Sized, O> ResolverChain<I, O> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; earlier stages are more authoritative
    pub fn stage<F>(mut self, name: &'static str, extract: F) -> Self
    where
        F: Fn(&I) -> Option<O> + Send + Sync + 'static,
    {
        self.stages.push((name, Box::new(extract)));
        self
    }

    /// Run the stages in order and return the first hit
    pub fn resolve(&self, input: &I) -> Option<Resolved<O>> {
        self.stages.iter().find_map(|(name, extract)| {
            extract(input).map(|value| Resolved {
                stage: *name,
                value,
            })
        })
    }
}

impl<I: ?Sized, O> Default for ResolverChain<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn first_successful_stage_wins() {
        let chain: ResolverChain<i32, &str> = ResolverChain::new()
            .stage("negative", |n| (*n < 0).then_some("negative"))
            .stage("even", |n| (n % 2 == 0).then_some("even"))
            .stage("any", |_| Some("any"));

        assert_eq!(chain.resolve(&-2).unwrap().stage, "negative");
        assert_eq!(chain.resolve(&4).unwrap().value, "even");
        assert_eq!(chain.resolve(&3).unwrap().stage, "any");
    }

    #[test]
    fn later_stages_are_skipped_after_a_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let chain: ResolverChain<i32, i32> = ResolverChain::new()
            .stage("identity", |n| Some(*n))
            .stage("counted", move |n| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(*n)
            });

        chain.resolve(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_resolves_nothing() {
        let chain: ResolverChain<str, usize> = ResolverChain::default();
        assert!(chain.resolve("anything").is_none());
    }
}
