use crate::engine::Session;
use crate::error::SourceLocation;
use crate::model::{
    AttributeDef, DataType, Entity, EntityId, EntityKind, Kind, MediaTypeDef, Primitive,
    ResponseDef,
};
use crate::step::{TemplateRoutine, TraitRoutine};
use crate::utils::canonical_identifier;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

/// Identifier of the built-in media type used for error responses.
pub const ERROR_MEDIA_IDENTIFIER: &str = "application/vnd.api.error";

/// Built-in responses available by name to every API, resource and action.
pub const STANDARD_RESPONSES: &[(&str, u16)] = &[
    ("OK", 200),
    ("Created", 201),
    ("Accepted", 202),
    ("NoContent", 204),
    ("BadRequest", 400),
    ("Unauthorized", 401),
    ("Forbidden", 403),
    ("NotFound", 404),
    ("Conflict", 409),
    ("UnprocessableEntity", 422),
    ("InternalServerError", 500),
    ("ServiceUnavailable", 503),
];

/// The named top-level collections of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Types,
    /// Keyed by canonical identifier.
    MediaTypes,
    Resources,
}

/// The design model: an arena of entities plus the named top-level collections.
///
/// Entities refer to each other by [`EntityId`] only, so cyclic designs are
/// plain data. The document is owned by a [`Session`](crate::engine::Session)
/// and handed out read-only once a run succeeds.
#[derive(Default)]
pub struct Document {
    pub(crate) entities: Vec<Entity>,
    pub(crate) api: Option<EntityId>,
    pub(crate) types: IndexMap<String, EntityId>,
    /// Keyed by canonical identifier.
    pub(crate) media_types: IndexMap<String, EntityId>,
    pub(crate) resources: IndexMap<String, EntityId>,
    pub(crate) traits: IndexMap<String, TraitRoutine>,
    pub(crate) templates: IndexMap<String, TemplateRoutine>,
    /// Built-in templates, used when the design defines none of that name.
    pub(crate) default_templates: IndexMap<String, TemplateRoutine>,
    pub(crate) default_responses: IndexMap<String, EntityId>,
    /// Projected media types keyed by projected identifier.
    pub(crate) projections: IndexMap<String, EntityId>,
    pub(crate) error_media: Option<EntityId>,
    /// Top-level entities whose build routine has been registered.
    pub(crate) defined: HashSet<EntityId>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("entities", &self.entities.len())
            .field("api", &self.api)
            .field("types", &self.types)
            .field("media_types", &self.media_types)
            .field("resources", &self.resources)
            .field("traits", &self.traits.keys().collect::<Vec<_>>())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Index<EntityId> for Document {
    type Output = Entity;

    fn index(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }
}

impl IndexMut<EntityId> for Document {
    fn index_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A document seeded with the error media type and the standard responses.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut doc = Document::new();
        doc.seed_builtins();
        doc
    }

    fn seed_builtins(&mut self) {
        let location = SourceLocation::unknown();
        let error_media = self.alloc(
            "Error",
            None,
            location.clone(),
            EntityKind::MediaType(MediaTypeDef {
                identifier: ERROR_MEDIA_IDENTIFIER.to_string(),
                type_name: "Error".to_string(),
                attribute: AttributeDef {
                    description: Some("Error response media type".to_string()),
                    ..AttributeDef::with_type(DataType::object())
                },
                ..MediaTypeDef::default()
            }),
        );
        let fields = [
            ("id", "a unique identifier for this particular occurrence of the problem"),
            ("status", "the HTTP status code applicable to this problem"),
            ("code", "an application-specific error code"),
            ("detail", "a human-readable explanation specific to this occurrence"),
        ];
        let mut children = IndexMap::new();
        for (name, description) in fields {
            let child = self.alloc(
                name,
                Some(error_media),
                location.clone(),
                EntityKind::Attribute(AttributeDef {
                    description: Some(description.to_string()),
                    ..AttributeDef::with_type(Primitive::String.into())
                }),
            );
            children.insert(name.to_string(), child);
        }
        let meta = self.alloc(
            "meta",
            Some(error_media),
            location.clone(),
            EntityKind::Attribute(AttributeDef {
                description: Some("non-standard meta-information about the error".to_string()),
                ..AttributeDef::default()
            }),
        );
        let key = self.alloc(
            "key",
            Some(meta),
            location.clone(),
            EntityKind::Attribute(AttributeDef::with_type(Primitive::String.into())),
        );
        let elem = self.alloc(
            "elem",
            Some(meta),
            location.clone(),
            EntityKind::Attribute(AttributeDef::with_type(Primitive::Any.into())),
        );
        if let Some(attr) = self[meta].attribute_mut() {
            attr.ty = Some(DataType::Map { key, elem });
        }
        children.insert("meta".to_string(), meta);
        if let Some(attr) = self[error_media].attribute_mut() {
            attr.ty = Some(DataType::Object(children));
        }
        self.media_types
            .insert(canonical_identifier(ERROR_MEDIA_IDENTIFIER), error_media);
        self.defined.insert(error_media);
        self.error_media = Some(error_media);

        for (name, status) in STANDARD_RESPONSES {
            let response = self.alloc(
                *name,
                None,
                location.clone(),
                EntityKind::Response(ResponseDef {
                    status: Some(*status),
                    standard: true,
                    ..ResponseDef::default()
                }),
            );
            self.default_responses.insert((*name).to_string(), response);
        }

        let ok: TemplateRoutine = Rc::new(|s: &mut Session, params: &[String]| {
            s.status(200);
            if let Some(identifier) = params.first() {
                s.media(identifier.as_str(), None);
            }
        });
        self.default_templates.insert("OK".to_string(), ok);
    }

    pub(crate) fn alloc(
        &mut self,
        name: impl Into<String>,
        parent: Option<EntityId>,
        location: SourceLocation,
        kind: EntityKind,
    ) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            name: name.into(),
            parent,
            location,
            kind,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every entity identity, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> {
        (0..self.entities.len()).map(EntityId)
    }

    #[must_use]
    pub fn api(&self) -> Option<EntityId> {
        self.api
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.types.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn media_types(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.media_types.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.resources.iter().map(|(name, id)| (name.as_str(), *id))
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<EntityId> {
        self.resources.get(name).copied()
    }

    #[must_use]
    pub fn error_media(&self) -> Option<EntityId> {
        self.error_media
    }

    #[must_use]
    pub fn default_response(&self, name: &str) -> Option<EntityId> {
        self.default_responses.get(name).copied()
    }

    /// The response template `name`, preferring the design's own over the built-in ones.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<TemplateRoutine> {
        self.templates
            .get(name)
            .or_else(|| self.default_templates.get(name))
            .cloned()
    }

    /// Looks a name up in one collection, without fallbacks.
    #[must_use]
    pub fn lookup(&self, collection: Collection, name: &str) -> Option<EntityId> {
        match collection {
            Collection::Types => self.types.get(name),
            Collection::MediaTypes => self.media_types.get(&canonical_identifier(name)),
            Collection::Resources => self.resources.get(name),
        }
        .copied()
    }

    /// Looks a type up by name, falling back to media types by identifier.
    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<EntityId> {
        self.types
            .get(name)
            .copied()
            .or_else(|| self.lookup_media_type(name))
    }

    #[must_use]
    pub fn lookup_media_type(&self, identifier: &str) -> Option<EntityId> {
        let canonical = canonical_identifier(identifier);
        self.media_types
            .get(&canonical)
            .or_else(|| self.projections.get(&canonical))
            .copied()
    }

    /// The media type derived from `media_type` through `view`, once finalized.
    #[must_use]
    pub fn projection(&self, media_type: EntityId, view: &str) -> Option<EntityId> {
        self.get(media_type)?
            .as_media_type()?
            .projections
            .get(view)
            .copied()
    }

    /// The child attribute `name` of an entity whose type is an object.
    #[must_use]
    pub fn child(&self, id: EntityId, name: &str) -> Option<EntityId> {
        let ty = self.get(id)?.attribute()?.ty.as_ref()?;
        self.object_of(ty)?.get(name).copied()
    }

    #[must_use]
    pub fn is_media_type(&self, id: EntityId) -> bool {
        self.get(id).and_then(Entity::as_media_type).is_some()
    }

    /// The element media type of a collection media type.
    #[must_use]
    pub fn collection_element(&self, id: EntityId) -> Option<EntityId> {
        let media = self.get(id)?.as_media_type()?;
        let Some(DataType::Array(elem)) = &media.attribute.ty else {
            return None;
        };
        match self.get(*elem)?.attribute()?.ty.as_ref()? {
            DataType::User(target) if self.is_media_type(*target) => Some(*target),
            _ => None,
        }
    }

    /// The attributes views of a media type select from. Collections use
    /// the attributes of their element.
    #[must_use]
    pub fn media_attributes(&self, id: EntityId) -> Option<&IndexMap<String, EntityId>> {
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return None;
            }
            let ty = self.get(current)?.as_media_type()?.attribute.ty.as_ref()?;
            if let Some(attributes) = self.object_of(ty) {
                return Some(attributes);
            }
            current = self.collection_element(current)?;
        }
    }

    /// Human readable description of an entity used as diagnostic context,
    /// e.g. `attribute "b" of type "A"`.
    #[must_use]
    pub fn eval_name(&self, id: EntityId) -> String {
        let Some(entity) = self.get(id) else {
            return format!("unknown entity {id}");
        };
        let own = match &entity.kind {
            EntityKind::Api(_) => format!("API {:?}", entity.name),
            EntityKind::UserType(_) => format!("type {:?}", entity.name),
            EntityKind::MediaType(m) => format!("media type {:?}", m.identifier),
            EntityKind::Resource(_) => format!("resource {:?}", entity.name),
            EntityKind::Action(_) => format!("action {:?}", entity.name),
            EntityKind::Response(_) => format!("response {:?}", entity.name),
            EntityKind::Attribute(_) => format!("attribute {:?}", entity.name),
            EntityKind::View(_) => format!("view {:?}", entity.name),
        };
        match entity.parent {
            Some(parent) => format!("{own} of {}", self.eval_name(parent)),
            None => own,
        }
    }

    /// The kind of a type, following user types until something concrete shows up.
    #[must_use]
    pub fn kind_of(&self, ty: &DataType) -> Kind {
        let mut seen = HashSet::new();
        let mut current = ty;
        loop {
            match current {
                DataType::Primitive(p) => return Kind::from(*p),
                DataType::Object(_) => return Kind::Object,
                DataType::Array(_) => return Kind::Array,
                DataType::Map { .. } => return Kind::Map,
                DataType::Pending(_) => return Kind::Unknown,
                DataType::User(id) => {
                    if !seen.insert(*id) {
                        return Kind::Unknown;
                    }
                    match self.get(*id).and_then(Entity::attribute).and_then(|a| a.ty.as_ref()) {
                        Some(ty) => current = ty,
                        None => return Kind::Unknown,
                    }
                }
            }
        }
    }

    /// Kind of the attribute carried by entity `id`.
    #[must_use]
    pub fn attribute_kind(&self, id: EntityId) -> Kind {
        self.get(id)
            .and_then(Entity::attribute)
            .and_then(|a| a.ty.as_ref())
            .map_or(Kind::Unknown, |ty| self.kind_of(ty))
    }

    /// Child attributes of an object type, following user types.
    #[must_use]
    pub fn object_of<'a>(&'a self, ty: &'a DataType) -> Option<&'a IndexMap<String, EntityId>> {
        let mut seen = HashSet::new();
        let mut current = ty;
        loop {
            match current {
                DataType::Object(children) => return Some(children),
                DataType::User(id) => {
                    if !seen.insert(*id) {
                        return None;
                    }
                    current = self.get(*id)?.attribute()?.ty.as_ref()?;
                }
                _ => return None,
            }
        }
    }

    /// Deep copy of an entity and everything it owns under a new parent.
    ///
    /// Inline object members, array/map elements, response body types and
    /// response headers are copied; user types are shared by identity.
    pub(crate) fn dup_entity(&mut self, id: EntityId, parent: Option<EntityId>) -> EntityId {
        let mut entity = self[id].clone();
        entity.parent = parent;
        let new_id = EntityId(self.entities.len());
        self.entities.push(entity);

        let owned_type = self[new_id].attribute().and_then(|a| a.ty.clone());
        if let Some(ty) = owned_type {
            let copied = self.dup_type(&ty, new_id);
            if let Some(attr) = self[new_id].attribute_mut() {
                attr.ty = Some(copied);
            }
        }
        let body_type = self[new_id].as_response().and_then(|r| r.ty.clone());
        if let Some(ty) = body_type {
            let copied = self.dup_type(&ty, new_id);
            if let EntityKind::Response(response) = &mut self[new_id].kind {
                response.ty = Some(copied);
            }
        }
        let headers = self[new_id].as_response().and_then(|r| r.headers);
        if let Some(headers) = headers {
            let copied = self.dup_entity(headers, Some(new_id));
            if let EntityKind::Response(response) = &mut self[new_id].kind {
                response.headers = Some(copied);
            }
        }
        new_id
    }

    pub(crate) fn dup_type(&mut self, ty: &DataType, parent: EntityId) -> DataType {
        match ty {
            DataType::Object(children) => {
                let children = children.clone();
                let mut copied = IndexMap::with_capacity(children.len());
                for (name, child) in children {
                    copied.insert(name, self.dup_entity(child, Some(parent)));
                }
                DataType::Object(copied)
            }
            DataType::Array(elem) => DataType::Array(self.dup_entity(*elem, Some(parent))),
            DataType::Map { key, elem } => DataType::Map {
                key: self.dup_entity(*key, Some(parent)),
                elem: self.dup_entity(*elem, Some(parent)),
            },
            other => other.clone(),
        }
    }
}
