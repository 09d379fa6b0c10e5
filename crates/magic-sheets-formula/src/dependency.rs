//! Dependency tracking for formula calculation

use ahash::{AHashMap, AHashSet};
use magic_sheets_core::CellAddress;

/// Dependency graph for formula cells
///
/// Tracks which cells depend on which other cells, enabling incremental
/// recalculation. Edges always point from a precedent (a cell that is read)
/// to a dependent (the formula cell reading it).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<CellAddress, AHashSet<CellAddress>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellAddress, dependent: CellAddress) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Forget what `cell` reads, keeping the cells that read `cell`
    ///
    /// Called whenever a cell's contents are replaced: its old formula's
    /// inputs no longer apply, but formulas referring to it still do.
    pub fn clear_precedents(&mut self, cell: CellAddress) {
        let Some(precedents) = self.precedents.remove(&cell) else {
            return;
        };

        for precedent in precedents {
            if let Some(deps) = self.dependents.get_mut(&precedent) {
                deps.remove(&cell);
                if deps.is_empty() {
                    self.dependents.remove(&precedent);
                }
            }
        }
    }

    /// Get cells that depend on the given cell
    pub fn get_dependents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells to recalculate after `changed` were edited, in evaluation order
    ///
    /// The changed cells come first and every cell appears after all of its
    /// precedents that are part of the result. Back edges of a cycle are
    /// skipped, so cycle members still appear exactly once.
    pub fn get_recalc_order(&self, changed: &[CellAddress]) -> Vec<CellAddress> {
        let mut post_order = Vec::new();
        let mut visited = AHashSet::new();

        for &root in changed {
            if visited.contains(&root) {
                continue;
            }

            let mut in_stack = AHashSet::new();
            let mut stack: Vec<(CellAddress, Vec<CellAddress>)> = Vec::new();

            in_stack.insert(root);
            stack.push((root, self.get_dependents(root).collect()));

            while let Some((cell, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => {
                        if visited.contains(&next) || in_stack.contains(&next) {
                            continue;
                        }
                        in_stack.insert(next);
                        let children = self.get_dependents(next).collect();
                        stack.push((next, children));
                    }
                    None => {
                        let done = *cell;
                        stack.pop();
                        in_stack.remove(&done);
                        visited.insert(done);
                        post_order.push(done);
                    }
                }
            }
        }

        post_order.reverse();
        post_order
    }

    /// Members of `cells` that sit on a dependency cycle
    ///
    /// Runs Tarjan's strongly connected components over the edges between
    /// `cells`, once per call. `cells` is expected to be closed under
    /// dependents, as [`get_recalc_order`](Self::get_recalc_order) returns,
    /// so every cycle through one of them lies entirely inside the set.
    pub fn cycle_members(&self, cells: &[CellAddress]) -> AHashSet<CellAddress> {
        let scope: AHashSet<CellAddress> = cells.iter().copied().collect();
        let scoped = |cell: CellAddress| -> Vec<CellAddress> {
            self.get_dependents(cell)
                .filter(|next| scope.contains(next))
                .collect()
        };

        // discovery index and lowest reachable index per visited cell
        let mut index: AHashMap<CellAddress, (usize, usize)> = AHashMap::new();
        let mut on_stack = AHashSet::new();
        let mut component_stack: Vec<CellAddress> = Vec::new();
        let mut members = AHashSet::new();

        for &root in cells {
            if index.contains_key(&root) {
                continue;
            }

            let mut stack: Vec<(CellAddress, Vec<CellAddress>)> = Vec::new();
            let discovered = index.len();
            index.insert(root, (discovered, discovered));
            component_stack.push(root);
            on_stack.insert(root);
            stack.push((root, scoped(root)));

            while let Some((cell, pending)) = stack.last_mut() {
                let cell = *cell;
                match pending.pop() {
                    Some(next) => match index.get(&next).copied() {
                        None => {
                            let discovered = index.len();
                            index.insert(next, (discovered, discovered));
                            component_stack.push(next);
                            on_stack.insert(next);
                            stack.push((next, scoped(next)));
                        }
                        Some((next_index, _)) if on_stack.contains(&next) => {
                            if let Some(entry) = index.get_mut(&cell) {
                                entry.1 = entry.1.min(next_index);
                            }
                        }
                        Some(_) => {}
                    },
                    None => {
                        stack.pop();
                        let (cell_index, cell_low) = index[&cell];

                        if let Some((parent, _)) = stack.last() {
                            if let Some(entry) = index.get_mut(parent) {
                                entry.1 = entry.1.min(cell_low);
                            }
                        }

                        if cell_low == cell_index {
                            let mut component = Vec::new();
                            while let Some(member) = component_stack.pop() {
                                on_stack.remove(&member);
                                component.push(member);
                                if member == cell {
                                    break;
                                }
                            }

                            let reads_itself = self
                                .dependents
                                .get(&cell)
                                .is_some_and(|deps| deps.contains(&cell));
                            if component.len() > 1 || reads_itself {
                                members.extend(component);
                            }
                        }
                    }
                }
            }
        }

        members
    }

    /// Number of cells with at least one precedent
    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}
