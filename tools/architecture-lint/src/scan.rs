//! Reference extraction from one parsed source file.
//!
//! Paths are resolved against the file's own module path, so `super::` and
//! `self::` land on the module they actually name. Items gated on
//! `#[cfg(test)]`, `#[test]` functions, and whole `tests.rs` / `*_tests.rs`
//! files are marked as test code.

use std::collections::BTreeSet;

use camino::Utf8Path;
use syn::visit::Visit;

use crate::CRATE_NAME;
use crate::zone::Zone;

/// Where a path points once resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Target {
    /// A module of the linted crate, as segments from the crate root.
    Internal(Vec<String>),
    /// The root segment of a path into another crate.
    External(String),
}

/// A resolved reference and whether it occurs in test code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Reference {
    pub target: Target,
    pub in_test: bool,
}

/// Everything the rules need from one file.
#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub references: BTreeSet<Reference>,
    /// Traits with async methods declared outside test code.
    pub async_traits: BTreeSet<String>,
}

/// Scan `parsed`, the contents of `relative` under `src/`.
pub(crate) fn scan_file(relative: &Utf8Path, parsed: &syn::File) -> FileScan {
    let mut scanner = Scanner {
        module: module_path_of(relative),
        test_depth: usize::from(is_test_file(relative)),
        scan: FileScan::default(),
    };
    scanner.visit_file(parsed);
    scanner.scan
}

/// Module path of a file: `domain/sync_engine/mod.rs` is `domain::sync_engine`.
pub(crate) fn module_path_of(relative: &Utf8Path) -> Vec<String> {
    let mut segments: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|component| component.as_str().to_owned())
        .collect();
    if matches!(segments.as_slice(), [root] if root == "lib" || root == "main") {
        segments.clear();
    } else if segments.last().is_some_and(|last| last == "mod") {
        segments.pop();
    }
    segments
}

fn is_test_file(relative: &Utf8Path) -> bool {
    relative
        .file_stem()
        .is_some_and(|stem| stem == "tests" || stem.ends_with("_tests"))
}

struct Scanner {
    module: Vec<String>,
    test_depth: usize,
    scan: FileScan,
}

impl Scanner {
    fn in_test(&self) -> bool {
        self.test_depth > 0
    }

    fn record(&mut self, segments: &[String]) {
        let Some(target) = self.resolve(segments) else {
            return;
        };
        self.scan.references.insert(Reference {
            target,
            in_test: self.in_test(),
        });
    }

    fn resolve(&self, segments: &[String]) -> Option<Target> {
        let (first, rest) = segments.split_first()?;
        match first.as_str() {
            "crate" => Some(Target::Internal(rest.to_vec())),
            name if name == CRATE_NAME => Some(Target::Internal(rest.to_vec())),
            "self" => Some(Target::Internal(self.module.iter().chain(rest).cloned().collect())),
            "super" => {
                let climbs = segments.iter().take_while(|s| *s == "super").count();
                let kept = self.module.len().checked_sub(climbs)?;
                let base = self.module.get(..kept)?;
                let tail = segments.get(climbs..)?;
                Some(Target::Internal(base.iter().chain(tail).cloned().collect()))
            }
            // At the crate root, top-level modules are in scope unqualified.
            _ if self.module.is_empty() && Zone::of_module(segments).is_some() => {
                Some(Target::Internal(segments.to_vec()))
            }
            _ if rest.is_empty() => None,
            _ => Some(Target::External(first.clone())),
        }
    }

    fn record_use_tree(&mut self, tree: &syn::UseTree, prefix: &mut Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.record_use_tree(&path.tree, prefix);
                prefix.pop();
            }
            syn::UseTree::Name(syn::UseName { ident })
            | syn::UseTree::Rename(syn::UseRename { ident, .. }) => {
                prefix.push(ident.to_string());
                let segments = prefix.clone();
                prefix.pop();
                self.record_use_leaf(&segments);
            }
            syn::UseTree::Glob(_) => {
                let segments = prefix.clone();
                self.record_use_leaf(&segments);
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.record_use_tree(item, prefix);
                }
            }
        }
    }

    fn record_use_leaf(&mut self, segments: &[String]) {
        // `use serde;` names a crate even without further segments.
        match segments {
            [only] if !matches!(only.as_str(), "crate" | "self" | "super") => {
                self.scan.references.insert(Reference {
                    target: Target::External(only.clone()),
                    in_test: self.in_test(),
                });
            }
            _ => self.record(segments),
        }
    }

    fn with_gate(&mut self, attrs: &[syn::Attribute], visit: impl FnOnce(&mut Self)) {
        let gated = attrs.iter().any(is_test_gate);
        if gated {
            self.test_depth += 1;
        }
        visit(self);
        if gated {
            self.test_depth -= 1;
        }
    }
}

impl<'ast> Visit<'ast> for Scanner {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        let segments: Vec<String> = node
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        self.record(&segments);
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.with_gate(&node.attrs, |scanner| {
            scanner.record_use_tree(&node.tree, &mut Vec::new());
        });
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.with_gate(&node.attrs, |scanner| {
            if node.content.is_some() {
                scanner.module.push(node.ident.to_string());
                syn::visit::visit_item_mod(scanner, node);
                scanner.module.pop();
            }
        });
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.with_gate(&node.attrs, |scanner| syn::visit::visit_item_fn(scanner, node));
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        self.with_gate(&node.attrs, |scanner| syn::visit::visit_item_impl(scanner, node));
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        self.with_gate(&node.attrs, |scanner| {
            if !scanner.in_test() && declares_async_methods(node) {
                scanner.scan.async_traits.insert(node.ident.to_string());
            }
            syn::visit::visit_item_trait(scanner, node);
        });
    }
}

fn declares_async_methods(node: &syn::ItemTrait) -> bool {
    let marked = node.attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "async_trait")
    });
    marked
        || node.items.iter().any(|item| {
            matches!(item, syn::TraitItem::Fn(method) if method.sig.asyncness.is_some())
        })
}

/// `#[test]`, or a `#[cfg(..)]` whose predicate can hold only under test.
fn is_test_gate(attr: &syn::Attribute) -> bool {
    if attr.path().is_ident("test") {
        return true;
    }
    if !attr.path().is_ident("cfg") {
        return false;
    }
    let mut mentions_test = false;
    let parsed = attr.parse_nested_meta(|meta| cfg_mentions_test(&meta, &mut mentions_test));
    parsed.is_ok() && mentions_test
}

fn cfg_mentions_test(
    meta: &syn::meta::ParseNestedMeta<'_>,
    found: &mut bool,
) -> syn::Result<()> {
    if meta.path.is_ident("test") {
        *found = true;
    } else if meta.path.is_ident("not") {
        // `not(test)` is production code; consume it without recording.
        let mut negated = false;
        meta.parse_nested_meta(|inner| cfg_mentions_test(&inner, &mut negated))?;
    } else if meta.input.peek(syn::Token![=]) {
        let _value: syn::Lit = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| cfg_mentions_test(&inner, found))?;
    }
    Ok(())
}
