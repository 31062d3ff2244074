//! Save iterator: attaches tags to results
//!
//! Forwards everything to its sub-iterator; on `tag_results` it additionally
//! binds each of its tags to the current result, and each fixed tag to its
//! constant ref. The only iterator implementing the `Tagger` capability.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use rustc_hash::FxHashMap;
use tessera_db_core::Ref;

/// Capability for iterators that accept tags after construction.
pub trait Tagger {
    fn add_tags(&mut self, tags: &[String]);
    fn add_fixed_tag(&mut self, tag: String, value: Ref);
    fn tags(&self) -> &[String];
    fn fixed_tags(&self) -> &FxHashMap<String, Ref>;
}

/// Attach `tag` to an iterator, merging into an existing tagger when the
/// iterator supports it.
pub fn tag(mut it: Box<dyn RefIterator>, tag: &str) -> Box<dyn RefIterator> {
    if let Some(t) = it.as_tagger() {
        t.add_tags(&[tag.to_string()]);
        return it;
    }
    Box::new(Save::new(it, vec![tag.to_string()]))
}

/// Tagging wrapper over a ref stream.
pub struct Save {
    it: Box<dyn RefIterator>,
    tags: Vec<String>,
    fixed_tags: FxHashMap<String, Ref>,
}

impl Save {
    pub fn new(it: Box<dyn RefIterator>, tags: Vec<String>) -> Self {
        Self {
            it,
            tags,
            fixed_tags: FxHashMap::default(),
        }
    }
}

impl Tagger for Save {
    fn add_tags(&mut self, tags: &[String]) {
        self.tags.extend_from_slice(tags);
    }

    fn add_fixed_tag(&mut self, tag: String, value: Ref) {
        self.fixed_tags.insert(tag, value);
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn fixed_tags(&self) -> &FxHashMap<String, Ref> {
        &self.fixed_tags
    }
}

impl IteratorBase for Save {
    fn name(&self) -> &'static str {
        "Save"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.it.tag_results(dst);
        if let Some(v) = self.it.result() {
            for tag in &self.tags {
                dst.insert(tag.clone(), v.clone());
            }
        }
        for (tag, value) in &self.fixed_tags {
            dst.insert(tag.clone(), value.clone());
        }
    }

    fn err(&self) -> Option<&QueryError> {
        self.it.err()
    }

    fn reset(&mut self) {
        self.it.reset();
    }

    fn stats(&self) -> Stats {
        self.it.stats()
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.it.as_ref()]
    }

    fn close(&mut self) {
        self.it.close();
    }
}

impl RefIterator for Save {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        self.it.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.it.result()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        self.it.next_path(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        self.it.contains(ctx, v)
    }

    fn as_tagger(&mut self) -> Option<&mut dyn Tagger> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    #[test]
    fn tags_bind_to_current_result() {
        let ctx = ExecutionContext::new();
        let sub = Fixed::new(vec![Ref::Node(1), Ref::Node(2)]);
        let mut it = Save::new(Box::new(sub), vec!["x".to_string()]);
        it.add_fixed_tag("k".to_string(), Ref::Node(9));

        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("x"), Some(&Ref::Node(1)));
        assert_eq!(tags.get("k"), Some(&Ref::Node(9)));

        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("x"), Some(&Ref::Node(2)));
    }

    #[test]
    fn tag_helper_merges_into_existing_save() {
        let ctx = ExecutionContext::new();
        let sub: Box<dyn RefIterator> = Box::new(Fixed::new(vec![Ref::Node(1)]));
        let saved = tag(Box::new(Save::new(sub, vec!["a".to_string()])), "b");
        let mut it = saved;
        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("a"), Some(&Ref::Node(1)));
        assert_eq!(tags.get("b"), Some(&Ref::Node(1)));
        // merged rather than nested
        assert_eq!(it.sub_iterators().len(), 1);
    }

    #[test]
    fn tags_apply_once_per_row_for_duplicates() {
        let ctx = ExecutionContext::new();
        let sub = Fixed::new(vec![Ref::Node(1)]);
        // duplicate tag names are tolerated on input
        let mut it = Save::new(Box::new(sub), vec!["x".to_string(), "x".to_string()]);
        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("x"), Some(&Ref::Node(1)));
    }
}
