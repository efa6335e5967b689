// ============================================================================
// Territory Hierarchy - ancestor resolution and target rollup
// ============================================================================
//
// OTER rows arrive unordered as (id, name, parent) triples. They are loaded
// into an arena (node vector + id index) with parent links resolved to
// indices, so walks never chase ids through the input again.
//
// Observed depth is Region > Zone > Sub-zone > Territory > Pocket; walks are
// capped at MAX_DEPTH levels and guarded by a visited set, so bad data in
// the ERP (self-parents, loops) cannot hang a request.
//
// ============================================================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

pub const MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Territory {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeAssignment {
    pub emp_id: i64,
    pub name: String,
    pub territory_id: i64,
}

/// One row of a target table: a territory's target and achievement for a period.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFact {
    pub territory_id: i64,
    pub employee_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub target: Decimal,
    pub achievement: Decimal,
}

/// One step of an ancestor chain. `name` is `None` for a parent id that
/// does not exist in OTER.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ChainLink {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFact {
    pub fact: TargetFact,
    /// Root first, ending with the fact's own territory.
    pub chain: Vec<ChainLink>,
    pub employee_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Group under the ancestor `n` levels below the root (1 = root level).
    Level(usize),
    /// One group per fact territory.
    Leaf,
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("leaf") {
            return Ok(GroupBy::Leaf);
        }
        match s.parse::<usize>() {
            Ok(level) if (1..=MAX_DEPTH).contains(&level) => Ok(GroupBy::Level(level)),
            _ => Err(format!("level must be 'leaf' or a number from 1 to {}", MAX_DEPTH)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupGroup {
    pub path: Vec<ChainLink>,
    pub territory_id: i64,
    pub name: Option<String>,
    pub target: Decimal,
    pub achievement: Decimal,
    pub employee_name: String,
    pub fact_count: usize,
}

/// Nested rollup, one node per territory that carries facts below it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupNode {
    pub territory_id: i64,
    pub name: Option<String>,
    pub target: Decimal,
    pub achievement: Decimal,
    pub employee_name: String,
    pub children: Vec<RollupNode>,
}

#[derive(Debug)]
struct Node {
    id: i64,
    name: String,
    parent_id: Option<i64>,
    parent: Option<usize>,
}

#[derive(Debug, Default)]
pub struct TerritoryTree {
    nodes: Vec<Node>,
    index: HashMap<i64, usize>,
    employees_by_territory: HashMap<i64, Vec<String>>,
    employee_names: HashMap<i64, String>,
}

/// Comma-joined, deduplicated, first-seen order.
fn join_names<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && seen.insert(name) {
            unique.push(name);
        }
    }
    unique.join(", ")
}

impl TerritoryTree {
    pub fn new(territories: Vec<Territory>) -> Self {
        let mut tree = TerritoryTree::default();

        for territory in territories {
            if tree.index.contains_key(&territory.id) {
                tracing::debug!("Duplicate territory id {} ignored", territory.id);
                continue;
            }
            tree.index.insert(territory.id, tree.nodes.len());
            tree.nodes.push(Node {
                id: territory.id,
                name: territory.name,
                parent_id: territory.parent_id,
                parent: None,
            });
        }

        for i in 0..tree.nodes.len() {
            let parent = tree.nodes[i]
                .parent_id
                .and_then(|pid| tree.index.get(&pid).copied());
            tree.nodes[i].parent = parent;
        }

        tree
    }

    pub fn with_employees(mut self, assignments: Vec<EmployeeAssignment>) -> Self {
        for assignment in assignments {
            self.employee_names
                .entry(assignment.emp_id)
                .or_insert_with(|| assignment.name.clone());
            self.employees_by_territory
                .entry(assignment.territory_id)
                .or_default()
                .push(assignment.name);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Territories never referenced as a parent.
    pub fn leaves(&self) -> Vec<Territory> {
        let parents: HashSet<i64> = self.nodes.iter().filter_map(|n| n.parent_id).collect();
        self.nodes
            .iter()
            .filter(|n| !parents.contains(&n.id))
            .map(|n| Territory {
                id: n.id,
                name: n.name.clone(),
                parent_id: n.parent_id,
            })
            .collect()
    }

    /// Root-first path ending at `id`, or `None` when `id` is unknown.
    pub fn ancestor_chain(&self, id: i64) -> Option<Vec<ChainLink>> {
        let start = *self.index.get(&id)?;

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start);

        while let Some(i) = current {
            if chain.len() >= MAX_DEPTH {
                break;
            }
            if !visited.insert(i) {
                tracing::warn!("⚠️  Territory cycle detected at id {} (starting from {})", self.nodes[i].id, id);
                break;
            }

            let node = &self.nodes[i];
            chain.push(ChainLink {
                id: node.id,
                name: Some(node.name.clone()),
            });

            current = match (node.parent, node.parent_id) {
                (Some(parent), _) => Some(parent),
                (None, Some(missing)) if missing != node.id => {
                    if chain.len() < MAX_DEPTH {
                        chain.push(ChainLink { id: missing, name: None });
                    }
                    None
                }
                _ => None,
            };
        }

        chain.reverse();
        Some(chain)
    }

    fn employee_names_for(&self, fact: &TargetFact) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(name) = fact.employee_id.and_then(|e| self.employee_names.get(&e)) {
            names.push(name.clone());
        }
        if let Some(assigned) = self.employees_by_territory.get(&fact.territory_id) {
            names.extend(assigned.iter().cloned());
        }
        names
    }

    /// Attach chains and employee names. Facts whose territory is unknown
    /// are dropped, mirroring an inner join against OTER.
    pub fn resolve_facts(&self, facts: &[TargetFact]) -> Vec<ResolvedFact> {
        let mut excluded = 0usize;
        let resolved: Vec<ResolvedFact> = facts
            .iter()
            .filter_map(|fact| match self.ancestor_chain(fact.territory_id) {
                Some(chain) => Some(ResolvedFact {
                    fact: fact.clone(),
                    chain,
                    employee_names: self.employee_names_for(fact),
                }),
                None => {
                    excluded += 1;
                    None
                }
            })
            .collect();

        if excluded > 0 {
            tracing::debug!("{} target facts excluded (unknown territory)", excluded);
        }
        resolved
    }

    pub fn rollup(&self, facts: &[TargetFact], group_by: GroupBy) -> Vec<RollupGroup> {
        struct Acc {
            path: Vec<ChainLink>,
            target: Decimal,
            achievement: Decimal,
            names: Vec<String>,
            count: usize,
        }

        // Keyed by (names, ids) along the path so output order is stable
        let mut groups: BTreeMap<(Vec<Option<String>>, Vec<i64>), Acc> = BTreeMap::new();

        for resolved in self.resolve_facts(facts) {
            let depth = match group_by {
                GroupBy::Leaf => resolved.chain.len(),
                GroupBy::Level(n) => n.max(1).min(resolved.chain.len()),
            };
            let path: Vec<ChainLink> = resolved.chain[..depth].to_vec();
            let key = (
                path.iter().map(|l| l.name.clone()).collect(),
                path.iter().map(|l| l.id).collect(),
            );

            let acc = groups.entry(key).or_insert_with(|| Acc {
                path,
                target: Decimal::ZERO,
                achievement: Decimal::ZERO,
                names: Vec::new(),
                count: 0,
            });
            acc.target += resolved.fact.target;
            acc.achievement += resolved.fact.achievement;
            acc.names.extend(resolved.employee_names);
            acc.count += 1;
        }

        groups
            .into_values()
            .filter_map(|acc| {
                let last = acc.path.last()?.clone();
                Some(RollupGroup {
                    territory_id: last.id,
                    name: last.name,
                    target: acc.target,
                    achievement: acc.achievement,
                    employee_name: join_names(&acc.names),
                    fact_count: acc.count,
                    path: acc.path,
                })
            })
            .collect()
    }

    /// Nested rollup along full chains, children ordered by name then id.
    pub fn rollup_tree(&self, facts: &[TargetFact]) -> Vec<RollupNode> {
        #[derive(Default)]
        struct Branch {
            name: Option<String>,
            target: Decimal,
            achievement: Decimal,
            names: Vec<String>,
            children: BTreeMap<(Option<String>, i64), Branch>,
        }

        fn finish(branches: BTreeMap<(Option<String>, i64), Branch>) -> Vec<RollupNode> {
            branches
                .into_iter()
                .map(|((_, id), branch)| RollupNode {
                    territory_id: id,
                    name: branch.name,
                    target: branch.target,
                    achievement: branch.achievement,
                    employee_name: join_names(&branch.names),
                    children: finish(branch.children),
                })
                .collect()
        }

        let mut roots: BTreeMap<(Option<String>, i64), Branch> = BTreeMap::new();

        for resolved in self.resolve_facts(facts) {
            let mut level = &mut roots;
            let last = resolved.chain.len().saturating_sub(1);
            for (depth, link) in resolved.chain.iter().enumerate() {
                let branch = level.entry((link.name.clone(), link.id)).or_insert_with(|| Branch {
                    name: link.name.clone(),
                    ..Default::default()
                });
                branch.target += resolved.fact.target;
                branch.achievement += resolved.fact.achievement;
                if depth == last {
                    branch.names.extend(resolved.employee_names.iter().cloned());
                }
                level = &mut branch.children;
            }
        }

        finish(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(id: i64, name: &str, parent: Option<i64>) -> Territory {
        Territory {
            id,
            name: name.to_string(),
            parent_id: parent,
        }
    }

    fn fact(territory_id: i64, target: Decimal, achievement: Decimal) -> TargetFact {
        TargetFact {
            territory_id,
            employee_id: None,
            from_date: None,
            to_date: None,
            target,
            achievement,
        }
    }

    /// Punjab > South > Multan > {Multan City, Vehari}; Sindh > Karachi
    fn sample_tree() -> TerritoryTree {
        TerritoryTree::new(vec![
            t(4, "Multan City", Some(3)),
            t(1, "Punjab", None),
            t(3, "Multan", Some(2)),
            t(2, "South Punjab", Some(1)),
            t(5, "Vehari", Some(3)),
            t(10, "Sindh", None),
            t(11, "Karachi", Some(10)),
        ])
    }

    fn names(chain: &[ChainLink]) -> Vec<Option<&str>> {
        chain.iter().map(|l| l.name.as_deref()).collect()
    }

    #[test]
    fn test_ancestor_chain_root_first() {
        let tree = sample_tree();
        let chain = tree.ancestor_chain(4).unwrap();
        assert_eq!(
            names(&chain),
            vec![Some("Punjab"), Some("South Punjab"), Some("Multan"), Some("Multan City")]
        );
        assert_eq!(tree.ancestor_chain(1).unwrap().len(), 1);
        assert!(tree.ancestor_chain(999).is_none());
    }

    #[test]
    fn test_missing_parent_contributes_null() {
        let tree = TerritoryTree::new(vec![t(7, "Orphan", Some(42))]);
        let chain = tree.ancestor_chain(7).unwrap();
        assert_eq!(chain, vec![
            ChainLink { id: 42, name: None },
            ChainLink { id: 7, name: Some("Orphan".to_string()) },
        ]);
    }

    #[test]
    fn test_cycle_terminates() {
        let tree = TerritoryTree::new(vec![t(1, "A", Some(2)), t(2, "B", Some(1)), t(3, "Self", Some(3))]);
        assert_eq!(tree.ancestor_chain(1).unwrap().len(), 2);
        assert_eq!(tree.ancestor_chain(3).unwrap().len(), 1);
    }

    #[test]
    fn test_depth_is_capped() {
        let territories: Vec<Territory> = (1..=8)
            .map(|i| t(i, &format!("L{}", i), if i == 1 { None } else { Some(i - 1) }))
            .collect();
        let tree = TerritoryTree::new(territories);
        let chain = tree.ancestor_chain(8).unwrap();
        assert_eq!(chain.len(), MAX_DEPTH);
        assert_eq!(chain.last().unwrap().id, 8);
    }

    #[test]
    fn test_leaves() {
        let mut leaves: Vec<i64> = sample_tree().leaves().iter().map(|t| t.id).collect();
        leaves.sort_unstable();
        assert_eq!(leaves, vec![4, 5, 11]);
    }

    #[test]
    fn test_unknown_territory_facts_excluded() {
        let tree = sample_tree();
        let facts = vec![fact(4, dec!(100), dec!(40)), fact(999, dec!(1000), dec!(1000))];

        assert_eq!(tree.resolve_facts(&facts).len(), 1);

        let groups = tree.rollup(&facts, GroupBy::Level(1));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].target, dec!(100));
    }

    #[test]
    fn test_rollup_by_level() {
        let tree = sample_tree();
        let facts = vec![
            fact(4, dec!(100.50), dec!(40)),
            fact(5, dec!(200), dec!(60.25)),
            fact(11, dec!(300), dec!(0)),
        ];

        let regions = tree.rollup(&facts, GroupBy::Level(1));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].name.as_deref(), Some("Punjab"));
        assert_eq!(regions[0].target, dec!(300.50));
        assert_eq!(regions[0].achievement, dec!(100.25));
        assert_eq!(regions[0].fact_count, 2);
        assert_eq!(regions[1].name.as_deref(), Some("Sindh"));

        // Karachi's chain is only two deep; level 3 keeps its deepest link
        let level3 = tree.rollup(&facts, GroupBy::Level(3));
        let karachi = level3.iter().find(|g| g.territory_id == 11).unwrap();
        assert_eq!(names(&karachi.path), vec![Some("Sindh"), Some("Karachi")]);
        let multan = level3.iter().find(|g| g.territory_id == 3).unwrap();
        assert_eq!(multan.target, dec!(300.50));
    }

    #[test]
    fn test_leaf_rollup_and_employee_names() {
        let tree = sample_tree().with_employees(vec![
            EmployeeAssignment { emp_id: 1, name: "Ali Raza".to_string(), territory_id: 4 },
            EmployeeAssignment { emp_id: 2, name: "Sara Khan".to_string(), territory_id: 4 },
            EmployeeAssignment { emp_id: 1, name: "Ali Raza".to_string(), territory_id: 5 },
        ]);
        let mut with_emp = fact(4, dec!(10), dec!(5));
        with_emp.employee_id = Some(2);
        let facts = vec![with_emp, fact(4, dec!(10), dec!(5)), fact(11, dec!(1), dec!(1))];

        let leaves = tree.rollup(&facts, GroupBy::Leaf);
        let multan_city = leaves.iter().find(|g| g.territory_id == 4).unwrap();
        assert_eq!(multan_city.employee_name, "Sara Khan, Ali Raza");
        assert_eq!(multan_city.target, dec!(20));

        let karachi = leaves.iter().find(|g| g.territory_id == 11).unwrap();
        assert_eq!(karachi.employee_name, "");
    }

    #[test]
    fn test_rollup_tree_nests_regions() {
        let tree = sample_tree();
        let facts = vec![fact(4, dec!(1), dec!(1)), fact(5, dec!(2), dec!(2)), fact(11, dec!(3), dec!(3))];

        let roots = tree.rollup_tree(&facts);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name.as_deref(), Some("Punjab"));
        assert_eq!(roots[0].target, dec!(3));
        let multan = &roots[0].children[0].children[0];
        assert_eq!(multan.children.len(), 2);
        assert_eq!(multan.children[0].name.as_deref(), Some("Multan City"));
    }

    #[test]
    fn test_group_by_parsing() {
        assert_eq!("leaf".parse::<GroupBy>(), Ok(GroupBy::Leaf));
        assert_eq!(" 2 ".parse::<GroupBy>(), Ok(GroupBy::Level(2)));
        assert!("0".parse::<GroupBy>().is_err());
        assert!("region".parse::<GroupBy>().is_err());
    }
}
