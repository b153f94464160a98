//! Overload selection planned at generation time.
//!
//! Variants are bucketed by their minimum argument count, largest first. Inside a bucket the
//! candidates are split at the first argument position where their runtime categories fall
//! into disjoint groups, recursively, until every leaf holds one candidate. If some group can
//! never be split, the overloads are ambiguous and generation fails.

use std::collections::BTreeMap;
use std::fmt;

use weft_ir::{Func, Session, TypeId, TypeKind};

use crate::error::{AbiError, AbiResult};
use crate::lowering::ResolvedVariant;

/// What a host value looks like at runtime. Ordered by dispatch weight, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Boolean,
    Unit,
    Number,
    String,
    Object,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Boolean,
        Category::Unit,
        Category::Number,
        Category::String,
        Category::Object,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Boolean => "boolean",
            Category::Unit => "undefined",
            Category::Number => "number",
            Category::String => "string",
            Category::Object => "object",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);
    pub const ALL: CategorySet = CategorySet(0b1_1111);

    pub fn contains(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn with(self, category: Category) -> CategorySet {
        CategorySet(self.0 | category.bit())
    }

    pub fn union(self, other: CategorySet) -> CategorySet {
        CategorySet(self.0 | other.0)
    }

    pub fn intersects(self, other: CategorySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members, heaviest first.
    pub fn iter(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().rev().filter(move |c| self.contains(*c))
    }

    fn weight(self) -> Option<Category> {
        self.iter().next()
    }
}

impl From<Category> for CategorySet {
    fn from(category: Category) -> Self {
        CategorySet(category.bit())
    }
}

/// The runtime categories a value of `ty` can take.
pub fn categories(session: &Session, ty: TypeId) -> CategorySet {
    let node = session.types.get(ty);
    let base: CategorySet = match &node.kind {
        TypeKind::Boolean | TypeKind::StrictBoolean => Category::Boolean.into(),
        TypeKind::F64 | TypeKind::Usize => Category::Number.into(),
        // By name or by value.
        TypeKind::NativeEnum(_) => CategorySet::from(Category::Number).with(Category::String),
        TypeKind::DomString
        | TypeKind::ByteString
        | TypeKind::UsvString
        | TypeKind::Utf8String
        | TypeKind::StringEnum(_) => Category::String.into(),
        TypeKind::Any => CategorySet::ALL,
        TypeKind::Undefined => Category::Unit.into(),
        TypeKind::Sequence(_) | TypeKind::Record(_) | TypeKind::Dictionary(_) | TypeKind::Ref(_) => {
            Category::Object.into()
        }
        TypeKind::OneOf(members) => members
            .iter()
            .fold(CategorySet::EMPTY, |set, member| set.union(categories(session, *member))),
        TypeKind::GlobalObject | TypeKind::VirtualMachine => CategorySet::EMPTY,
    };
    if node.flags.is_optional() || node.flags.nullable {
        base.with(Category::Unit)
    } else {
        base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchNode {
    /// Call the variant with this index.
    Call(usize),
    /// Inspect the argument at `position` and take the arm whose categories contain it.
    Branch { position: usize, arms: Vec<Arm> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arm {
    pub categories: CategorySet,
    pub node: DispatchNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub min_args: usize,
    pub node: DispatchNode,
}

/// Runtime selection between the variants of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    /// Largest `min_args` first.
    pub buckets: Vec<Bucket>,
}

impl DispatchPlan {
    /// The variant the generated selector picks for arguments of these categories.
    pub fn select(&self, args: &[Category]) -> Option<usize> {
        self.buckets
            .iter()
            .filter(|bucket| args.len() >= bucket.min_args)
            .find_map(|bucket| Self::walk(&bucket.node, args))
    }

    fn walk(node: &DispatchNode, args: &[Category]) -> Option<usize> {
        match node {
            DispatchNode::Call(index) => Some(*index),
            DispatchNode::Branch { position, arms } => {
                let category = args.get(*position).copied().unwrap_or(Category::Unit);
                arms.iter()
                    .find(|arm| arm.categories.contains(category))
                    .and_then(|arm| Self::walk(&arm.node, args))
            }
        }
    }
}

struct Candidate {
    index: usize,
    total: usize,
    positions: Vec<CategorySet>,
}

impl Candidate {
    fn at(&self, position: usize) -> CategorySet {
        self.positions
            .get(position)
            .copied()
            .unwrap_or(Category::Unit.into())
    }
}

/// Plans dispatch for `func`, whose variants were lowered into `resolved`.
pub fn plan(session: &Session, func: &Func, resolved: &[ResolvedVariant]) -> AbiResult<DispatchPlan> {
    let mut buckets: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
    for (index, (variant, lowered)) in func.variants.iter().zip(resolved).enumerate() {
        let positions: Vec<_> = variant
            .args
            .iter()
            .filter(|arg| !session.types.kind(arg.ty).is_virtual())
            .map(|arg| categories(session, arg.ty))
            .collect();
        buckets.entry(lowered.min_args).or_default().push(Candidate {
            index,
            total: positions.len(),
            positions,
        });
    }

    let mut plan = DispatchPlan { buckets: Vec::new() };
    for (min_args, mut candidates) in buckets.into_iter().rev() {
        candidates.sort_by(|a, b| b.total.cmp(&a.total).then(a.index.cmp(&b.index)));
        let refs: Vec<&Candidate> = candidates.iter().collect();
        let node = split(&refs).ok_or_else(|| ambiguous(session, func, &refs))?;
        plan.buckets.push(Bucket { min_args, node });
    }
    log::trace!("dispatch for {}: {} buckets", func.display_name(), plan.buckets.len());
    Ok(plan)
}

fn split(candidates: &[&Candidate]) -> Option<DispatchNode> {
    if let [only] = candidates {
        return Some(DispatchNode::Call(only.index));
    }
    let width = candidates.iter().map(|c| c.total).max().unwrap_or(0);
    for position in 0..width {
        let groups = partition(candidates, position);
        if groups.len() < 2 {
            continue;
        }
        let mut arms = Vec::with_capacity(groups.len());
        for group in &groups {
            let categories = group
                .iter()
                .fold(CategorySet::EMPTY, |set, c| set.union(c.at(position)));
            arms.push(Arm {
                categories,
                node: split(group)?,
            });
        }
        arms.sort_by(|a, b| b.categories.weight().cmp(&a.categories.weight()));
        return Some(DispatchNode::Branch { position, arms });
    }
    None
}

/// Connected components of the "categories overlap at `position`" relation, in candidate order.
fn partition<'c>(candidates: &[&'c Candidate], position: usize) -> Vec<Vec<&'c Candidate>> {
    let mut groups: Vec<(CategorySet, Vec<&'c Candidate>)> = Vec::new();
    for candidate in candidates {
        let mut set = candidate.at(position);
        let mut members = vec![*candidate];
        let mut index = 0;
        while index < groups.len() {
            if groups[index].0.intersects(set) {
                let (other_set, other_members) = groups.remove(index);
                set = set.union(other_set);
                members.extend(other_members);
                index = 0;
            } else {
                index += 1;
            }
        }
        groups.push((set, members));
    }
    let mut groups: Vec<Vec<&Candidate>> = groups
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| b.total.cmp(&a.total).then(a.index.cmp(&b.index)));
            members
        })
        .collect();
    groups.sort_by_key(|members| members.iter().map(|c| c.index).min());
    groups
}

fn ambiguous(session: &Session, func: &Func, candidates: &[&Candidate]) -> AbiError {
    let candidates = candidates
        .iter()
        .map(|candidate| {
            let args: Vec<_> = func.variants[candidate.index]
                .args
                .iter()
                .map(|arg| format!("{}: {}", arg.name, session.types.describe(arg.ty)))
                .collect();
            format!("  {}({})", func.display_name(), args.join(", "))
        })
        .collect();
    AbiError::Ambiguous {
        func: func.display_name().to_string(),
        candidates,
        origin: func.origin.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(categories: &[Category]) -> CategorySet {
        categories
            .iter()
            .fold(CategorySet::EMPTY, |set, c| set.with(*c))
    }

    fn candidate(index: usize, positions: &[CategorySet]) -> Candidate {
        Candidate {
            index,
            total: positions.len(),
            positions: positions.to_vec(),
        }
    }

    #[test]
    fn sets_iterate_heaviest_first() {
        let mixed = set(&[Category::Boolean, Category::String, Category::Unit]);
        let order: Vec<_> = mixed.iter().collect();
        assert_eq!(order, [Category::String, Category::Unit, Category::Boolean]);
        assert!(CategorySet::ALL.contains(Category::Object));
    }

    #[test]
    fn splits_at_first_disjoint_position() {
        let a = candidate(0, &[set(&[Category::Number]), set(&[Category::String])]);
        let b = candidate(1, &[set(&[Category::Number]), set(&[Category::Object])]);
        let node = split(&[&a, &b]).unwrap();
        let DispatchNode::Branch { position, arms } = node else {
            panic!("expected a branch");
        };
        assert_eq!(position, 1);
        assert_eq!(arms[0].node, DispatchNode::Call(1));
        assert_eq!(arms[1].node, DispatchNode::Call(0));
    }

    #[test]
    fn overlapping_groups_recurse() {
        let a = candidate(0, &[set(&[Category::String]), set(&[Category::Number])]);
        let b = candidate(1, &[set(&[Category::String]), set(&[Category::Boolean])]);
        let c = candidate(2, &[set(&[Category::Object]), set(&[Category::Number])]);
        let node = split(&[&a, &b, &c]).unwrap();
        let plan = DispatchPlan {
            buckets: vec![Bucket { min_args: 2, node }],
        };
        assert_eq!(plan.select(&[Category::String, Category::Boolean]), Some(1));
        assert_eq!(plan.select(&[Category::String, Category::Number]), Some(0));
        assert_eq!(plan.select(&[Category::Object, Category::Number]), Some(2));
        assert_eq!(plan.select(&[Category::Number, Category::Number]), None);
    }

    #[test]
    fn transitive_overlap_forms_one_group() {
        let a = candidate(0, &[set(&[Category::Number])]);
        let b = candidate(1, &[set(&[Category::Number, Category::String])]);
        let c = candidate(2, &[set(&[Category::String])]);
        assert_eq!(partition(&[&a, &b, &c], 0).len(), 1);
        assert!(split(&[&a, &b, &c]).is_none());
    }

    #[test]
    fn missing_positions_count_as_undefined() {
        let short = candidate(0, &[set(&[Category::Number])]);
        let long = candidate(1, &[set(&[Category::Number]), set(&[Category::String])]);
        let node = split(&[&long, &short]).unwrap();
        let plan = DispatchPlan {
            buckets: vec![Bucket { min_args: 1, node }],
        };
        assert_eq!(plan.select(&[Category::Number]), Some(0));
        assert_eq!(plan.select(&[Category::Number, Category::String]), Some(1));
    }
}
