//! Single-element list relocation used by drag-and-drop reordering.

use crate::models::Task;

/// A validated move of the element at `from` to index `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub from: usize,
    pub to: usize,
}

impl Relocation {
    /// `None` when either index is outside a list of `len` elements.
    pub fn new(from: usize, to: usize, len: usize) -> Option<Self> {
        (from < len && to < len).then_some(Self { from, to })
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Move one element; every other element keeps its relative order.
    pub fn apply<T>(&self, items: &mut [T]) {
        if self.from < self.to {
            items[self.from..=self.to].rotate_left(1);
        } else if self.from > self.to {
            items[self.to..=self.from].rotate_right(1);
        }
    }
}

/// Renumber tasks so that `position == index + 1`, returning the
/// `(id, position)` pairs to send to the backend.
pub fn assign_positions(tasks: &mut [Task]) -> Vec<(i64, i64)> {
    tasks
        .iter_mut()
        .enumerate()
        .map(|(index, task)| {
            task.position = index as i64 + 1;
            (task.id, task.position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_towards_front() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        Relocation::new(2, 0, items.len()).unwrap().apply(&mut items);
        assert_eq!(items, vec!['c', 'a', 'b', 'd']);
    }

    #[test]
    fn test_move_towards_back() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        Relocation::new(0, 3, items.len()).unwrap().apply(&mut items);
        assert_eq!(items, vec!['b', 'c', 'd', 'a']);
    }

    #[test]
    fn test_adjacent_swap() {
        let mut items = vec!['a', 'b', 'c'];
        Relocation::new(1, 2, items.len()).unwrap().apply(&mut items);
        assert_eq!(items, vec!['a', 'c', 'b']);
    }

    #[test]
    fn test_noop_leaves_order() {
        let mut items = vec!['a', 'b', 'c'];
        let relocation = Relocation::new(1, 1, items.len()).unwrap();
        assert!(relocation.is_noop());
        relocation.apply(&mut items);
        assert_eq!(items, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        assert_eq!(Relocation::new(3, 0, 3), None);
        assert_eq!(Relocation::new(0, 3, 3), None);
        assert_eq!(Relocation::new(0, 0, 0), None);
    }

    #[test]
    fn test_every_relocation_matches_remove_then_insert() {
        let original: Vec<u32> = (0..6).collect();
        for from in 0..original.len() {
            for to in 0..original.len() {
                let mut expected = original.clone();
                let moved = expected.remove(from);
                expected.insert(to, moved);

                let mut actual = original.clone();
                Relocation::new(from, to, actual.len()).unwrap().apply(&mut actual);
                assert_eq!(actual, expected, "moving {} -> {}", from, to);
            }
        }
    }
}
