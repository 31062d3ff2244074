//! And iterator: intersection by primary iteration plus containment probes
//!
//! Pulls from the primary sub-iterator and accepts a result only if every
//! secondary `contains` it. Optional sub-iterators never gate acceptance;
//! they are probed so their tags become available when they match.
//!
//! The optimizer is responsible for making the smallest sub-iterator the
//! primary one, which minimizes the number of containment probes.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use tessera_db_core::Ref;

/// Intersection of ref streams.
pub struct And {
    primary: Box<dyn RefIterator>,
    secondary: Vec<Box<dyn RefIterator>>,
    optional: Vec<Box<dyn RefIterator>>,
    opt_matched: Vec<bool>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl And {
    /// Create from sub-iterators; the first becomes the primary.
    ///
    /// `sub` must be non-empty.
    pub fn new(mut sub: Vec<Box<dyn RefIterator>>) -> Self {
        assert!(!sub.is_empty(), "And requires at least one sub-iterator");
        let primary = sub.remove(0);
        Self {
            primary,
            secondary: sub,
            optional: Vec::new(),
            opt_matched: Vec::new(),
            result: None,
            err: None,
        }
    }

    /// Add a sub-iterator that contributes tags but does not gate results.
    pub fn add_optional(&mut self, it: Box<dyn RefIterator>) {
        self.optional.push(it);
        self.opt_matched.push(false);
    }

    fn sub_its_contain(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        for sub in &mut self.secondary {
            if !sub.contains(ctx, v) {
                if let Some(e) = sub.err() {
                    self.err = Some(e.clone());
                }
                return false;
            }
        }
        for (i, opt) in self.optional.iter_mut().enumerate() {
            self.opt_matched[i] = opt.contains(ctx, v);
        }
        true
    }
}

impl IteratorBase for And {
    fn name(&self) -> &'static str {
        "And"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.primary.tag_results(dst);
        for sub in &self.secondary {
            sub.tag_results(dst);
        }
        for (i, opt) in self.optional.iter().enumerate() {
            if self.opt_matched[i] {
                opt.tag_results(dst);
            }
        }
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.primary.reset();
        for sub in &mut self.secondary {
            sub.reset();
        }
        for opt in &mut self.optional {
            opt.reset();
        }
        self.opt_matched.iter_mut().for_each(|m| *m = false);
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let primary = self.primary.stats();
        let mut next_cost = primary.next_cost;
        let mut contains_cost = primary.contains_cost;
        let mut size = primary.size;
        let mut exact = primary.exact;
        for sub in &self.secondary {
            let st = sub.stats();
            next_cost += st.contains_cost;
            contains_cost += st.contains_cost;
            if st.size < size {
                size = st.size;
                exact = st.exact;
            }
        }
        Stats {
            size,
            exact,
            next_cost,
            contains_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        let mut out: Vec<&dyn IteratorBase> = vec![self.primary.as_ref()];
        out.extend(self.secondary.iter().map(|s| s.as_ref() as &dyn IteratorBase));
        out.extend(self.optional.iter().map(|s| s.as_ref() as &dyn IteratorBase));
        out
    }

    fn close(&mut self) {
        self.primary.close();
        for sub in &mut self.secondary {
            sub.close();
        }
        for opt in &mut self.optional {
            opt.close();
        }
    }
}

impl RefIterator for And {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = ctx.check() {
            self.err = Some(e);
            return false;
        }
        while self.primary.next(ctx) {
            let Some(curr) = self.primary.result() else {
                break;
            };
            if self.sub_its_contain(ctx, &curr) {
                self.result = Some(curr);
                return true;
            }
            if self.err.is_some() {
                return false;
            }
        }
        if let Some(e) = self.primary.err() {
            self.err = Some(e.clone());
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.primary.next_path(ctx) {
            return true;
        }
        if let Some(e) = self.primary.err() {
            self.err = Some(e.clone());
            return false;
        }
        for sub in &mut self.secondary {
            if sub.next_path(ctx) {
                return true;
            }
            if let Some(e) = sub.err() {
                self.err = Some(e.clone());
                return false;
            }
        }
        for (i, opt) in self.optional.iter_mut().enumerate() {
            if self.opt_matched[i] && opt.next_path(ctx) {
                return true;
            }
        }
        false
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.primary.contains(ctx, v) {
            if let Some(e) = self.primary.err() {
                self.err = Some(e.clone());
            }
            return false;
        }
        if self.sub_its_contain(ctx, v) {
            self.result = Some(v.clone());
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;
    use crate::iterator::save::Save;

    fn fixed(ids: &[u64]) -> Box<dyn RefIterator> {
        Box::new(Fixed::new(ids.iter().map(|&i| Ref::Node(i)).collect()))
    }

    fn drain(it: &mut dyn RefIterator) -> Vec<Ref> {
        let ctx = ExecutionContext::new();
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.push(it.result().unwrap());
        }
        out
    }

    #[test]
    fn intersects_in_primary_order() {
        let mut it = And::new(vec![fixed(&[1, 2, 3, 4]), fixed(&[2, 4, 5])]);
        assert_eq!(drain(&mut it), vec![Ref::Node(2), Ref::Node(4)]);
    }

    #[test]
    fn optional_does_not_gate() {
        let mut it = And::new(vec![fixed(&[1, 2])]);
        it.add_optional(fixed(&[2]));
        assert_eq!(drain(&mut it), vec![Ref::Node(1), Ref::Node(2)]);
    }

    #[test]
    fn optional_tags_only_on_match() {
        let ctx = ExecutionContext::new();
        let mut it = And::new(vec![fixed(&[1, 2])]);
        it.add_optional(Box::new(Save::new(fixed(&[2]), vec!["t".to_string()])));

        assert!(it.next(&ctx)); // 1: optional does not match
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert!(!tags.contains_key("t"));

        assert!(it.next(&ctx)); // 2: optional matches
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("t"), Some(&Ref::Node(2)));
    }

    #[test]
    fn contains_probes_all_subs() {
        let ctx = ExecutionContext::new();
        let mut it = And::new(vec![fixed(&[1, 2]), fixed(&[2])]);
        assert!(!it.contains(&ctx, &Ref::Node(1)));
        assert!(it.contains(&ctx, &Ref::Node(2)));
        assert_eq!(it.result(), Some(Ref::Node(2)));
    }

    #[test]
    fn cancellation_is_sticky() {
        let tracker = tessera_db_core::Tracker::cancellable();
        let ctx = ExecutionContext::with_tracker(tracker.clone());
        let mut it = And::new(vec![fixed(&[1, 2, 3])]);
        assert!(it.next(&ctx));
        tracker.cancel();
        assert!(!it.next(&ctx));
        assert!(matches!(it.err(), Some(QueryError::Track(_))));
    }
}
