use foundation::PolygonId;

/// Reference to at most one polygon by identity.
///
/// The store keeps it consistent: it is cleared when the referenced polygon
/// disappears and follows a pending id when that id is confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<PolygonId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&PolygonId> {
        self.current.as_ref()
    }

    pub fn is_selected(&self, id: &PolygonId) -> bool {
        self.current.as_ref() == Some(id)
    }

    /// Returns the previous selection.
    pub fn set(&mut self, id: Option<PolygonId>) -> Option<PolygonId> {
        std::mem::replace(&mut self.current, id)
    }

    pub fn clear(&mut self) -> Option<PolygonId> {
        self.current.take()
    }

    /// Clears only if `id` is the current selection. Returns `true` if cleared.
    pub fn clear_if(&mut self, id: &PolygonId) -> bool {
        if self.is_selected(id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Repoints a selection on `from` to `to`.
    pub fn rename(&mut self, from: &PolygonId, to: &PolygonId) {
        if self.is_selected(from) {
            self.current = Some(to.clone());
        }
    }
}
