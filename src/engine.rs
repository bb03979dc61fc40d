use crate::config::EvalConfig;
use crate::error::{Diagnostic, Diagnostics, DslError, SourceLocation};
use crate::model::{
    ApiDef, AttributeDef, DataType, EntityId, EntityKind, MediaTypeDef, ResourceDef, UserTypeDef,
};
use crate::registry::{Collection, Document};
use crate::step::{BuildStep, Routine};
use crate::utils::{canonical_identifier, type_name_from_identifier};
use log::{debug, trace, warn};
use std::collections::{HashSet, VecDeque};
use std::panic::Location;

/// The top-level collections a definition can be registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TopLevel {
    Api,
    Type,
    MediaType,
    Resource,
}

impl TopLevel {
    fn label(self) -> &'static str {
        match self {
            TopLevel::Api => "API",
            TopLevel::Type => "type",
            TopLevel::MediaType => "media type",
            TopLevel::Resource => "resource",
        }
    }

    fn collection(self) -> Option<Collection> {
        match self {
            TopLevel::Api => None,
            TopLevel::Type => Some(Collection::Types),
            TopLevel::MediaType => Some(Collection::MediaTypes),
            TopLevel::Resource => Some(Collection::Resources),
        }
    }

    fn empty(self, name: &str) -> EntityKind {
        match self {
            TopLevel::Api => EntityKind::Api(ApiDef::default()),
            TopLevel::Type => EntityKind::UserType(UserTypeDef {
                attribute: AttributeDef::with_type(DataType::object()),
            }),
            TopLevel::MediaType => EntityKind::MediaType(MediaTypeDef {
                identifier: name.to_string(),
                type_name: type_name_from_identifier(name),
                attribute: AttributeDef::with_type(DataType::object()),
                ..MediaTypeDef::default()
            }),
            TopLevel::Resource => EntityKind::Resource(ResourceDef::default()),
        }
    }
}

/// One evaluation of a design.
///
/// A session owns the [`Document`] being built, the stack of entities whose
/// build routines are running, the queue of routines still to run and the
/// diagnostics recorded so far. Definitions are registered on a fresh session,
/// then [`Session::run`] drains the queue, finalizes and validates.
pub struct Session {
    pub(crate) doc: Document,
    pub(crate) config: EvalConfig,
    stack: Vec<EntityId>,
    queue: VecDeque<BuildStep>,
    pub(crate) completed: HashSet<EntityId>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) finalized: HashSet<EntityId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EvalConfig) -> Self {
        let mut session = Session {
            doc: Document::new(),
            config,
            stack: Vec::new(),
            queue: VecDeque::new(),
            completed: HashSet::new(),
            diagnostics: Diagnostics::new(),
            finalized: HashSet::new(),
        };
        session.reset();
        session
    }

    /// Discards everything from previous runs and reseeds the built-in definitions.
    pub fn reset(&mut self) {
        self.doc = if self.config.builtin_defaults {
            Document::with_builtins()
        } else {
            Document::new()
        };
        self.stack.clear();
        self.queue.clear();
        self.completed.clear();
        self.diagnostics.reset();
        self.finalized.clear();
    }

    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The entity whose build routine is running, if any.
    #[must_use]
    pub fn current(&self) -> Option<EntityId> {
        self.stack.last().copied()
    }

    #[must_use]
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Runs `routine` with `owner` as the current entity.
    ///
    /// Returns `true` when the routine recorded no diagnostics.
    pub fn execute(&mut self, owner: EntityId, routine: impl FnOnce(&mut Session)) -> bool {
        let before = self.diagnostics.error_count();
        self.stack.push(owner);
        routine(self);
        self.stack.pop();
        self.diagnostics.error_count() == before
    }

    pub(crate) fn enqueue(&mut self, owner: EntityId, routine: Routine) {
        self.queue.push_back(BuildStep::new(owner, routine));
    }

    /// Queues ahead of everything else, so API-wide definitions are built first.
    fn enqueue_first(&mut self, owner: EntityId, routine: Routine) {
        self.queue.push_front(BuildStep::new(owner, routine));
    }

    /// Drains the queue to a fixed point.
    ///
    /// Steps queued while generation `n` runs make up generation `n + 1`.
    /// Returns `true` when no diagnostics have been recorded.
    pub fn run_all(&mut self) -> bool {
        let mut generation = 0;
        while !self.queue.is_empty() {
            generation += 1;
            if generation > self.config.max_generations {
                warn!(
                    "giving up after {} generations with {} build steps pending",
                    self.config.max_generations,
                    self.queue.len()
                );
                self.queue.clear();
                self.diagnostics.record(Diagnostic::new(
                    DslError::TooManyGenerations {
                        generations: self.config.max_generations,
                    },
                    None,
                    SourceLocation::unknown(),
                ));
                break;
            }
            let batch: Vec<BuildStep> = self.queue.drain(..).collect();
            debug!("generation {generation}: {} build steps", batch.len());
            for step in batch {
                step.run(self);
            }
        }
        !self.diagnostics.has_errors()
    }

    /// Evaluates, finalizes and validates everything registered so far.
    ///
    /// Finalization only happens when evaluation succeeded.
    ///
    /// # Errors
    /// Returns every diagnostic recorded during the run when there is at least one.
    pub fn run(&mut self) -> Result<&Document, Diagnostics> {
        if !self.run_all() {
            debug!(
                "evaluation failed with {} diagnostics",
                self.diagnostics.error_count()
            );
            return Err(self.diagnostics.clone());
        }
        self.finalize_all();
        self.validate_all();
        if self.diagnostics.has_errors() {
            debug!(
                "design rejected with {} diagnostics",
                self.diagnostics.error_count()
            );
            return Err(self.diagnostics.clone());
        }
        Ok(&self.doc)
    }

    /// The location of the user code that called into the current builder.
    #[track_caller]
    pub(crate) fn here(&self) -> SourceLocation {
        SourceLocation::from_caller(Location::caller(), self.config.location_root.as_deref())
    }

    /// Records `error` at the caller's location in the current context.
    #[track_caller]
    pub fn record(&mut self, error: DslError) {
        let location = self.here();
        let context = self.current().map(|id| self.doc.eval_name(id));
        self.diagnostics
            .record(Diagnostic::new(error, context, location));
    }

    /// Records `error` against an entity's declaration site.
    pub(crate) fn record_at(&mut self, entity: EntityId, error: DslError) {
        let (location, context) = match self.doc.get(entity) {
            Some(e) => (e.location.clone(), Some(self.doc.eval_name(entity))),
            None => (SourceLocation::unknown(), None),
        };
        self.diagnostics
            .record(Diagnostic::new(error, context, location));
    }

    #[track_caller]
    pub(crate) fn incompatible(&mut self, dsl: &str) {
        self.record(DslError::IncompatibleUse {
            dsl: dsl.to_string(),
        });
    }

    /// Creates or completes a top-level definition and queues its routine.
    ///
    /// A name may be declared (no routine) any number of times and defined
    /// once; a second definition is reported and its routine dropped.
    #[track_caller]
    pub(crate) fn register_top_level(
        &mut self,
        dsl: &str,
        kind: TopLevel,
        name: &str,
        routine: Option<Routine>,
    ) -> Option<EntityId> {
        if self.current().is_some() {
            self.incompatible(dsl);
            return None;
        }
        let location = self.here();
        let existing = match kind.collection() {
            Some(collection) => self.doc.lookup(collection, name),
            None => self.doc.api,
        };
        let id = match existing {
            Some(id) if routine.is_some() && self.doc.defined.contains(&id) => {
                self.record(DslError::DefinedTwice {
                    kind: kind.label().to_string(),
                    name: name.to_string(),
                });
                return Some(id);
            }
            Some(id) => {
                if routine.is_some() {
                    self.doc[id].location = location;
                }
                id
            }
            None => {
                let id = self.doc.alloc(name, None, location, kind.empty(name));
                match kind {
                    TopLevel::Api => self.doc.api = Some(id),
                    TopLevel::Type => {
                        self.doc.types.insert(name.to_string(), id);
                    }
                    TopLevel::MediaType => {
                        self.doc.media_types.insert(canonical_identifier(name), id);
                    }
                    TopLevel::Resource => {
                        self.doc.resources.insert(name.to_string(), id);
                    }
                }
                id
            }
        };
        if let Some(routine) = routine {
            trace!("registered {}", self.doc.eval_name(id));
            self.doc.defined.insert(id);
            if kind == TopLevel::Api {
                self.enqueue_first(id, routine);
            } else {
                self.enqueue(id, routine);
            }
        }
        Some(id)
    }
}
