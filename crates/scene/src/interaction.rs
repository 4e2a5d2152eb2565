//! Drawing and vertex-editing state machine.
//!
//! The machine never touches the store. Transitions that finish a shape return
//! an [`InteractionOutput`]; the caller turns it into a create or update.

use foundation::math::ScreenProjector;
use foundation::{LatLng, PolygonId, Ring, close_ring, open_vertices};

use crate::store::MIN_VERTICES;

/// Pixel radius around the first vertex that closes the ring.
pub const DEFAULT_CLOSE_TOLERANCE_PX: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawingSession {
    points: Vec<LatLng>,
    hover: Option<LatLng>,
}

impl DrawingSession {
    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn hover(&self) -> Option<LatLng> {
        self.hover
    }

    fn can_close(&self) -> bool {
        self.points.len() >= MIN_VERTICES
    }

    fn into_ring(self) -> Ring {
        let mut ring = self.points;
        close_ring(&mut ring);
        ring
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    id: PolygonId,
    /// Open ring; closed again on save.
    vertices: Vec<LatLng>,
}

impl EditSession {
    pub fn id(&self) -> &PolygonId {
        &self.id
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    fn into_output(self) -> InteractionOutput {
        let mut ring = self.vertices;
        close_ring(&mut ring);
        InteractionOutput::EditCommitted { id: self.id, ring }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    Drawing(DrawingSession),
    VertexEditing(EditSession),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutput {
    /// A new shape was completed; the ring is closed.
    RingClosed(Ring),
    /// Vertex editing finished; `ring` is closed.
    EditCommitted { id: PolygonId, ring: Ring },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionError {
    NotEditing,
    VertexOutOfRange { index: usize, len: usize },
    TooFewVertices,
}

impl std::fmt::Display for InteractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionError::NotEditing => write!(f, "no polygon is being edited"),
            InteractionError::VertexOutOfRange { index, len } => {
                write!(f, "vertex {index} out of range (ring has {len})")
            }
            InteractionError::TooFewVertices => {
                write!(f, "a polygon needs at least {MIN_VERTICES} vertices")
            }
        }
    }
}

impl std::error::Error for InteractionError {}

/// At most one mutating session (drawing or editing) is active at a time.
#[derive(Debug, Clone)]
pub struct InteractionMachine {
    state: InteractionState,
    close_tolerance_px: f64,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_CLOSE_TOLERANCE_PX)
    }
}

impl InteractionMachine {
    pub fn new(close_tolerance_px: f64) -> Self {
        Self {
            state: InteractionState::Idle,
            close_tolerance_px,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, InteractionState::Idle)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, InteractionState::Drawing(_))
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, InteractionState::VertexEditing(_))
    }

    pub fn editing_id(&self) -> Option<&PolygonId> {
        match &self.state {
            InteractionState::VertexEditing(s) => Some(&s.id),
            _ => None,
        }
    }

    /// Enter drawing mode with an empty session. An active vertex edit is
    /// saved, not discarded.
    pub fn start_drawing(&mut self) -> Option<InteractionOutput> {
        let committed = self.stop_and_save();
        if self.is_drawing() {
            tracing::debug!("restarting drawing session");
        }
        self.state = InteractionState::Drawing(DrawingSession::default());
        committed
    }

    /// Abandon the current drawing without producing a shape.
    pub fn stop_drawing(&mut self) -> bool {
        if self.is_drawing() {
            self.state = InteractionState::Idle;
            true
        } else {
            false
        }
    }

    pub fn click(
        &mut self,
        point: LatLng,
        projector: &dyn ScreenProjector,
    ) -> Option<InteractionOutput> {
        let tolerance = self.close_tolerance_px;
        let InteractionState::Drawing(session) = &mut self.state else {
            return None;
        };

        if session.can_close() {
            let first = session.points[0];
            if projector.screen_distance(first, point) < tolerance {
                return self.finish_drawing();
            }
        }
        session.points.push(point);
        None
    }

    pub fn double_click(&mut self) -> Option<InteractionOutput> {
        let closable = matches!(&self.state, InteractionState::Drawing(s) if s.can_close());
        if closable { self.finish_drawing() } else { None }
    }

    /// Hover feedback only; never part of the stored shape.
    pub fn pointer_move(&mut self, point: LatLng) {
        if let InteractionState::Drawing(session) = &mut self.state {
            session.hover = Some(point);
        }
    }

    pub fn pointer_out(&mut self) {
        if let InteractionState::Drawing(session) = &mut self.state {
            session.hover = None;
        }
    }

    /// Enter vertex editing for `id`. An active drawing is cancelled; an edit
    /// of another polygon is saved first.
    pub fn edit_shape(&mut self, id: PolygonId, ring: &[LatLng]) -> Option<InteractionOutput> {
        if self.stop_drawing() {
            tracing::debug!("drawing cancelled by shape edit");
        }
        let switching = self.editing_id().is_some_and(|current| current != &id);
        let committed = if switching { self.stop_and_save() } else { None };
        self.state = InteractionState::VertexEditing(EditSession {
            id,
            vertices: open_vertices(ring).to_vec(),
        });
        committed
    }

    pub fn move_vertex(&mut self, index: usize, to: LatLng) -> Result<(), InteractionError> {
        let session = self.edit_session_mut()?;
        let len = session.vertices.len();
        let v = session
            .vertices
            .get_mut(index)
            .ok_or(InteractionError::VertexOutOfRange { index, len })?;
        *v = to;
        Ok(())
    }

    /// Insert a vertex after `after`, i.e. on the edge `after -> after + 1`.
    pub fn insert_vertex(&mut self, after: usize, point: LatLng) -> Result<(), InteractionError> {
        let session = self.edit_session_mut()?;
        let len = session.vertices.len();
        if after >= len {
            return Err(InteractionError::VertexOutOfRange { index: after, len });
        }
        session.vertices.insert(after + 1, point);
        Ok(())
    }

    pub fn remove_vertex(&mut self, index: usize) -> Result<(), InteractionError> {
        let session = self.edit_session_mut()?;
        let len = session.vertices.len();
        if index >= len {
            return Err(InteractionError::VertexOutOfRange { index, len });
        }
        if len <= MIN_VERTICES {
            return Err(InteractionError::TooFewVertices);
        }
        session.vertices.remove(index);
        Ok(())
    }

    /// Leave vertex editing and emit the edited ring.
    pub fn stop_and_save(&mut self) -> Option<InteractionOutput> {
        match std::mem::take(&mut self.state) {
            InteractionState::VertexEditing(session) => Some(session.into_output()),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Leave vertex editing without emitting anything.
    pub fn cancel_edit(&mut self) -> bool {
        if self.is_editing() {
            self.state = InteractionState::Idle;
            true
        } else {
            false
        }
    }

    /// Points to render for the active session: the clicked points plus the
    /// hover point while drawing, the closed ring while editing.
    pub fn display_path(&self) -> Vec<LatLng> {
        match &self.state {
            InteractionState::Idle => Vec::new(),
            InteractionState::Drawing(s) => {
                let mut path = s.points.clone();
                path.extend(s.hover);
                path
            }
            InteractionState::VertexEditing(s) => {
                let mut path = s.vertices.clone();
                close_ring(&mut path);
                path
            }
        }
    }

    fn finish_drawing(&mut self) -> Option<InteractionOutput> {
        match std::mem::take(&mut self.state) {
            InteractionState::Drawing(session) => {
                let ring = session.into_ring();
                tracing::debug!(vertices = ring.len() - 1, "drawing closed");
                Some(InteractionOutput::RingClosed(ring))
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    fn edit_session_mut(&mut self) -> Result<&mut EditSession, InteractionError> {
        match &mut self.state {
            InteractionState::VertexEditing(s) => Ok(s),
            _ => Err(InteractionError::NotEditing),
        }
    }
}
