use std::collections::BTreeSet;

/// Derived state of the "select all visible" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAllState {
    Unchecked,
    Indeterminate,
    Checked,
}

/// Task ids marked for a bulk action. Session-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the id is selected after the toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Adds every visible id, keeping selected ids that are currently hidden.
    pub fn select_all<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.ids.extend(visible.into_iter().map(str::to_string));
    }

    /// Removes exactly the visible ids.
    pub fn deselect_all<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in visible {
            self.ids.remove(id);
        }
    }

    pub fn set_all_visible<'a, I>(&mut self, visible: I, checked: bool)
    where
        I: IntoIterator<Item = &'a str>,
    {
        if checked {
            self.select_all(visible);
        } else {
            self.deselect_all(visible);
        }
    }

    pub fn select_all_state<'a, I>(&self, visible: I) -> SelectAllState
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut total = 0;
        let mut selected = 0;
        for id in visible {
            total += 1;
            if self.ids.contains(id) {
                selected += 1;
            }
        }

        if total > 0 && selected == total {
            SelectAllState::Checked
        } else if selected > 0 {
            SelectAllState::Indeterminate
        } else {
            SelectAllState::Unchecked
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.ids.retain(|id| keep(id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}
