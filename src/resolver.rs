use crate::engine::Session;
use crate::error::DslError;
use crate::model::{AttributeDef, DataType, EntityId, EntityKind, EntityTag, MediaRef, Primitive};
use log::debug;
use std::fmt::{self, Display};

/// How a definition names the type of an attribute.
///
/// Identity references are exact by construction. Names are looked up right
/// away and, when the named type is not registered yet, kept pending until
/// finalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(Primitive),
    Entity(EntityId),
    Named(String),
    ArrayOf(Box<TypeRef>),
    MapOf(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    pub fn array_of(elem: impl Into<TypeRef>) -> Self {
        TypeRef::ArrayOf(Box::new(elem.into()))
    }

    pub fn map_of(key: impl Into<TypeRef>, elem: impl Into<TypeRef>) -> Self {
        TypeRef::MapOf(Box::new(key.into()), Box::new(elem.into()))
    }
}

impl From<Primitive> for TypeRef {
    fn from(primitive: Primitive) -> Self {
        TypeRef::Primitive(primitive)
    }
}

impl From<EntityId> for TypeRef {
    fn from(id: EntityId) -> Self {
        TypeRef::Entity(id)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => write!(f, "{p}"),
            TypeRef::Entity(id) => write!(f, "entity {id}"),
            TypeRef::Named(name) => write!(f, "{name:?}"),
            TypeRef::ArrayOf(elem) => write!(f, "array of {elem}"),
            TypeRef::MapOf(key, elem) => write!(f, "map of {key} to {elem}"),
        }
    }
}

fn pending_name(ty: Option<&DataType>) -> Option<String> {
    match ty {
        Some(DataType::Pending(name)) => Some(name.clone()),
        _ => None,
    }
}

impl Session {
    /// Turns a type reference into a data type owned by `owner`.
    ///
    /// Array and map references allocate their element attributes under
    /// `owner`. Returns `None` after recording a diagnostic when the
    /// reference does not denote a type of this session.
    #[track_caller]
    pub(crate) fn resolve_type_ref(
        &mut self,
        reference: TypeRef,
        owner: EntityId,
        dsl: &str,
    ) -> Option<DataType> {
        match reference {
            TypeRef::Primitive(p) => Some(DataType::Primitive(p)),
            TypeRef::Entity(id) => match self.doc.get(id).map(|e| e.tag()) {
                Some(EntityTag::UserType | EntityTag::MediaType) => Some(DataType::User(id)),
                _ => {
                    self.record(DslError::InvalidArgument {
                        dsl: dsl.to_string(),
                        expected: "type or media type".to_string(),
                        actual: format!("entity {id}"),
                    });
                    None
                }
            },
            TypeRef::Named(name) => Some(match self.doc.lookup_type(&name) {
                Some(id) => DataType::User(id),
                None => DataType::Pending(name),
            }),
            TypeRef::ArrayOf(elem) => {
                let elem_id = self.element(owner, "elem");
                let ty = self.resolve_type_ref(*elem, elem_id, dsl)?;
                self.set_type(elem_id, ty);
                Some(DataType::Array(elem_id))
            }
            TypeRef::MapOf(key, elem) => {
                let key_id = self.element(owner, "key");
                let key_ty = self.resolve_type_ref(*key, key_id, dsl)?;
                self.set_type(key_id, key_ty);
                let elem_id = self.element(owner, "elem");
                let elem_ty = self.resolve_type_ref(*elem, elem_id, dsl)?;
                self.set_type(elem_id, elem_ty);
                Some(DataType::Map {
                    key: key_id,
                    elem: elem_id,
                })
            }
        }
    }

    /// Resolves a media reference for resource and response media.
    #[track_caller]
    pub(crate) fn resolve_media_ref(&mut self, reference: TypeRef, dsl: &str) -> Option<MediaRef> {
        match reference {
            TypeRef::Entity(id) if self.doc.is_media_type(id) => Some(MediaRef::Entity(id)),
            TypeRef::Named(identifier) => Some(match self.doc.lookup_media_type(&identifier) {
                Some(id) => MediaRef::Entity(id),
                None => MediaRef::Identifier(identifier),
            }),
            other => {
                self.record(DslError::InvalidArgument {
                    dsl: dsl.to_string(),
                    expected: "media type or identifier".to_string(),
                    actual: other.to_string(),
                });
                None
            }
        }
    }

    #[track_caller]
    fn element(&mut self, owner: EntityId, name: &str) -> EntityId {
        let location = self.here();
        self.doc.alloc(
            name,
            Some(owner),
            location,
            EntityKind::Attribute(AttributeDef::default()),
        )
    }

    pub(crate) fn set_type(&mut self, id: EntityId, ty: DataType) {
        if let Some(attr) = self.doc[id].attribute_mut() {
            attr.ty = Some(ty);
        }
    }

    /// Resolves every by-name reference left pending after evaluation.
    ///
    /// Unknown attribute and response body types are reported and replaced
    /// by `any` so later passes see a concrete type; unknown references are
    /// reported and dropped.
    /// Media identifiers that name no media type are legal and kept as is.
    pub(crate) fn resolve_pending_all(&mut self) {
        let ids: Vec<EntityId> = self.doc.ids().collect();
        let mut resolved = 0usize;
        for id in ids {
            let (ty_name, reference_name) = match self.doc[id].attribute() {
                Some(attr) => (
                    pending_name(attr.ty.as_ref()),
                    pending_name(attr.reference.as_ref()),
                ),
                None => (None, None),
            };
            if let Some(name) = ty_name {
                let ty = match self.doc.lookup_type(&name) {
                    Some(target) => {
                        resolved += 1;
                        DataType::User(target)
                    }
                    None => {
                        self.record_at(id, DslError::UnknownType { name });
                        DataType::Primitive(Primitive::Any)
                    }
                };
                self.set_type(id, ty);
            }
            if let Some(name) = reference_name {
                let reference = match self.doc.lookup_type(&name) {
                    Some(target) => {
                        resolved += 1;
                        Some(DataType::User(target))
                    }
                    None => {
                        self.record_at(id, DslError::UnknownType { name });
                        None
                    }
                };
                if let Some(attr) = self.doc[id].attribute_mut() {
                    attr.reference = reference;
                }
            }

            let body_type = match &self.doc[id].kind {
                EntityKind::Response(r) => pending_name(r.ty.as_ref()),
                _ => None,
            };
            if let Some(name) = body_type {
                let ty = match self.doc.lookup_type(&name) {
                    Some(target) => {
                        resolved += 1;
                        DataType::User(target)
                    }
                    None => {
                        self.record_at(id, DslError::UnknownType { name });
                        DataType::Primitive(Primitive::Any)
                    }
                };
                if let EntityKind::Response(response) = &mut self.doc[id].kind {
                    response.ty = Some(ty);
                }
            }

            let media = match &self.doc[id].kind {
                EntityKind::Resource(r) => r.media.clone(),
                EntityKind::Response(r) => r.media.clone(),
                _ => None,
            };
            if let Some(MediaRef::Identifier(identifier)) = media {
                if let Some(target) = self.doc.lookup_media_type(&identifier) {
                    let media = Some(MediaRef::Entity(target));
                    match &mut self.doc[id].kind {
                        EntityKind::Resource(r) => r.media = media,
                        EntityKind::Response(r) => r.media = media,
                        _ => {}
                    }
                    resolved += 1;
                }
            }
        }
        debug!("resolved {resolved} pending references");
    }
}
