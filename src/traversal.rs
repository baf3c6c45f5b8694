//! Iterative tree traversals over index-addressed arenas
//!
//! Both the cluster hierarchy and the treemap shadow tree store their
//! children as index lists. These helpers walk such trees without recursion
//! and return the visiting order, so callers can mutate the arena while
//! iterating the order.

/// Parent-before-children order (children visited in their stored order).
///
/// Use for top-down passes where a node's result feeds its children.
pub fn pre_order<'a, F>(root: usize, children: F) -> Vec<usize>
where
    F: Fn(usize) -> &'a [usize],
{
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(children(id).iter().rev().copied());
    }
    order
}

/// Children-before-parent order (children visited in their stored order).
///
/// Every descendant of a node appears before the node itself, so aggregate
/// computations can read finished child values.
pub fn post_order<'a, F>(root: usize, children: F) -> Vec<usize>
where
    F: Fn(usize) -> &'a [usize],
{
    let mut order = Vec::new();
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        stack.push((id, true));
        stack.extend(children(id).iter().rev().map(|&child| (child, false)));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 -> [1, 2], 1 -> [3, 4], 2 -> [5]
    fn sample_tree() -> Vec<Vec<usize>> {
        vec![vec![1, 2], vec![3, 4], vec![5], vec![], vec![], vec![]]
    }

    #[test]
    fn pre_order_visits_parent_first() {
        let tree = sample_tree();
        let order = pre_order(0, |id| tree[id].as_slice());
        assert_eq!(order, vec![0, 1, 3, 4, 2, 5]);
    }

    #[test]
    fn post_order_visits_children_first() {
        let tree = sample_tree();
        let order = post_order(0, |id| tree[id].as_slice());
        assert_eq!(order, vec![3, 4, 1, 5, 2, 0]);
    }

    #[test]
    fn post_order_places_every_descendant_before_ancestor() {
        let tree = sample_tree();
        let order = post_order(0, |id| tree[id].as_slice());
        let position = |id: usize| order.iter().position(|&x| x == id).unwrap();
        for (parent, children) in tree.iter().enumerate() {
            for &child in children {
                assert!(position(child) < position(parent));
            }
        }
    }

    #[test]
    fn single_node_tree() {
        let tree: Vec<Vec<usize>> = vec![vec![]];
        assert_eq!(pre_order(0, |id| tree[id].as_slice()), vec![0]);
        assert_eq!(post_order(0, |id| tree[id].as_slice()), vec![0]);
    }
}
