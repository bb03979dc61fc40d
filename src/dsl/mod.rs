//! The builder vocabulary.
//!
//! Every builder is a method on [`Session`] that looks at the entity whose
//! body is running and mutates it according to its kind. Calls made where a
//! builder does not apply are recorded as diagnostics, located at the user's
//! call site through `#[track_caller]`.

mod action;
mod api;
mod attribute;
mod media_type;
mod resource;
mod response;

pub use action::{connect, delete, get, head, options, patch, post, put, trace};

use crate::engine::Session;
use crate::error::{DslError, SourceLocation};
use crate::model::{AttributeDef, DataType, EntityId, EntityKind, EntityTag, Kind};

/// Kinds that carry an attribute and accept validation rules.
pub(crate) const ATTRIBUTE_LIKE: &[EntityTag] =
    &[EntityTag::UserType, EntityTag::MediaType, EntityTag::Attribute];

/// Kinds that accept descriptions and metadata.
pub(crate) const DOCUMENTED: &[EntityTag] = &[
    EntityTag::Api,
    EntityTag::Resource,
    EntityTag::Action,
    EntityTag::Response,
    EntityTag::UserType,
    EntityTag::MediaType,
    EntityTag::Attribute,
];

/// Attribute groups owned by APIs, resources, actions and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Params,
    Headers,
}

impl Slot {
    fn name(self) -> &'static str {
        match self {
            Slot::Params => "params",
            Slot::Headers => "headers",
        }
    }
}

impl Session {
    /// The current entity if its kind is in `accepted`; otherwise records an
    /// invalid use of `dsl`.
    #[track_caller]
    pub(crate) fn context_where(
        &mut self,
        dsl: &str,
        accepted: &[EntityTag],
    ) -> Option<(EntityId, EntityTag)> {
        if let Some(id) = self.current() {
            let tag = self.doc[id].tag();
            if accepted.contains(&tag) {
                return Some((id, tag));
            }
        }
        self.incompatible(dsl);
        None
    }

    /// Records an incompatible validation when `kind` is known and rejected.
    ///
    /// Rules on attributes whose kind is not known yet are accepted here and
    /// checked again by the validator.
    #[track_caller]
    pub(crate) fn check_kind(
        &mut self,
        dsl: &str,
        kind: Kind,
        accepts: fn(Kind) -> bool,
        expected: &str,
    ) -> bool {
        if !kind.is_known() || kind == Kind::Any || accepts(kind) {
            return true;
        }
        self.record(DslError::IncompatibleValidation {
            dsl: dsl.to_string(),
            expected: expected.to_string(),
            actual: kind.name().to_string(),
        });
        false
    }

    /// The params or headers attribute of `owner`, created on first use.
    pub(crate) fn slot(
        &mut self,
        owner: EntityId,
        slot: Slot,
        location: SourceLocation,
    ) -> Option<EntityId> {
        let existing = match (&self.doc[owner].kind, slot) {
            (EntityKind::Api(a), Slot::Params) => a.params,
            (EntityKind::Api(a), Slot::Headers) => a.headers,
            (EntityKind::Resource(r), Slot::Params) => r.params,
            (EntityKind::Resource(r), Slot::Headers) => r.headers,
            (EntityKind::Action(a), Slot::Params) => a.params,
            (EntityKind::Action(a), Slot::Headers) => a.headers,
            (EntityKind::Response(r), Slot::Headers) => r.headers,
            _ => return None,
        };
        if existing.is_some() {
            return existing;
        }
        let id = self.doc.alloc(
            slot.name(),
            Some(owner),
            location,
            EntityKind::Attribute(AttributeDef::with_type(DataType::object())),
        );
        let field = match (&mut self.doc[owner].kind, slot) {
            (EntityKind::Api(a), Slot::Params) => &mut a.params,
            (EntityKind::Api(a), Slot::Headers) => &mut a.headers,
            (EntityKind::Resource(r), Slot::Params) => &mut r.params,
            (EntityKind::Resource(r), Slot::Headers) => &mut r.headers,
            (EntityKind::Action(a), Slot::Params) => &mut a.params,
            (EntityKind::Action(a), Slot::Headers) => &mut a.headers,
            (EntityKind::Response(r), Slot::Headers) => &mut r.headers,
            _ => return None,
        };
        *field = Some(id);
        Some(id)
    }
}
