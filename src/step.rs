use crate::engine::Session;
use crate::model::EntityId;
use std::fmt;
use std::rc::Rc;

/// A build routine run once, later, in the context of its owner.
pub type Routine = Box<dyn FnOnce(&mut Session)>;

/// A reusable routine applied wherever a trait is used.
pub type TraitRoutine = Rc<dyn Fn(&mut Session)>;

/// A reusable response body taking the template's string parameters.
pub type TemplateRoutine = Rc<dyn Fn(&mut Session, &[String])>;

/// An entity paired with the routine that fills it in.
///
/// Steps are created at registration time and only run when the engine
/// drains its queue, so definitions may appear in any order.
pub struct BuildStep {
    owner: EntityId,
    routine: Routine,
}

impl fmt::Debug for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildStep")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl BuildStep {
    pub fn new(owner: EntityId, routine: Routine) -> Self {
        BuildStep { owner, routine }
    }

    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Runs the routine with `owner` as the current entity.
    ///
    /// Returns `false` if the routine recorded diagnostics.
    ///
    /// # Panics
    /// Panics if a step for the same owner already ran in this session; the
    /// engine never queues two steps for one entity.
    pub(crate) fn run(self, session: &mut Session) -> bool {
        assert!(
            session.completed.insert(self.owner),
            "build step for entity {} ran twice",
            self.owner
        );
        log::trace!("running build step for {}", session.doc.eval_name(self.owner));
        session.execute(self.owner, self.routine)
    }
}
