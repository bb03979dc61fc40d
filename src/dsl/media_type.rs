use crate::engine::Session;
use crate::error::DslError;
use crate::model::{
    AttributeDef, DataType, EntityId, EntityKind, EntityTag, LinkDef, MediaTypeDef, ViewDef,
};
use crate::registry::Collection;
use crate::resolver::TypeRef;
use crate::step::Routine;
use crate::utils::{collection_identifier, type_name_from_identifier};
use log::trace;

impl Session {
    /// Runs `body` to define the attributes of the current media type.
    #[track_caller]
    pub fn attributes(&mut self, body: impl FnOnce(&mut Session)) {
        if let Some((id, _)) = self.context_where("Attributes", &[EntityTag::MediaType]) {
            self.execute(id, body);
        }
    }

    /// On an attribute, selects the view used to render its media type.
    /// On a media type, defines a view with no members.
    #[track_caller]
    pub fn view(&mut self, name: &str) {
        self.define_view(name, None);
    }

    /// Defines a view of the current media type; `body` selects its members
    /// with [`Session::attribute`].
    #[track_caller]
    pub fn view_with(&mut self, name: &str, body: impl FnOnce(&mut Session) + 'static) {
        self.define_view(name, Some(Box::new(body)));
    }

    #[track_caller]
    fn define_view(&mut self, name: &str, body: Option<Routine>) {
        let Some((owner, tag)) =
            self.context_where("View", &[EntityTag::MediaType, EntityTag::Attribute])
        else {
            return;
        };
        if tag == EntityTag::Attribute {
            if body.is_some() {
                self.record(DslError::InvalidArgument {
                    dsl: "View".to_string(),
                    expected: "view name".to_string(),
                    actual: "func()".to_string(),
                });
                return;
            }
            if let Some(attr) = self.doc[owner].attribute_mut() {
                attr.view = Some(name.to_string());
            }
            return;
        }

        let exists = self.doc[owner]
            .as_media_type()
            .is_some_and(|m| m.views.contains_key(name));
        if exists {
            self.record(DslError::DefinedTwice {
                kind: "view".to_string(),
                name: name.to_string(),
            });
            return;
        }
        let location = self.here();
        let view = self.doc.alloc(
            name,
            Some(owner),
            location,
            EntityKind::View(ViewDef {
                attribute: AttributeDef::with_type(DataType::object()),
            }),
        );
        if let EntityKind::MediaType(media) = &mut self.doc[owner].kind {
            media.views.insert(name.to_string(), view);
        }
        if let Some(body) = body {
            self.execute(view, body);
        }
    }

    /// Runs `body`, whose [`Session::link`] calls declare the links of the
    /// current media type.
    #[track_caller]
    pub fn links(&mut self, body: impl FnOnce(&mut Session)) {
        if let Some((id, _)) = self.context_where("Links", &[EntityTag::MediaType]) {
            self.execute(id, body);
        }
    }

    /// Declares a link to the media type of attribute `name`, rendered with
    /// `view` or the configured link view (`"link"` unless changed).
    #[track_caller]
    pub fn link(&mut self, name: &str, view: Option<&str>) {
        let Some((id, _)) = self.context_where("Link", &[EntityTag::MediaType]) else {
            return;
        };
        let location = self.here();
        let view = view.map_or_else(|| self.config.link_view.clone(), str::to_string);
        let duplicate = match &mut self.doc[id].kind {
            EntityKind::MediaType(media) if media.links.contains_key(name) => true,
            EntityKind::MediaType(media) => {
                media.links.insert(name.to_string(), LinkDef { view, location });
                false
            }
            _ => false,
        };
        if duplicate {
            self.record(DslError::DefinedTwice {
                kind: "link".to_string(),
                name: name.to_string(),
            });
        }
    }

    #[track_caller]
    pub fn type_name(&mut self, name: &str) {
        if let Some((id, _)) = self.context_where("TypeName", &[EntityTag::MediaType]) {
            if let EntityKind::MediaType(media) = &mut self.doc[id].kind {
                media.type_name = name.to_string();
            }
        }
    }

    /// The media type of collections of `element`, created on first use.
    ///
    /// `element` is a media type or the identifier of a registered one. The
    /// collection's identifier is the element's with a `type=collection`
    /// parameter and its type is an array of the element. Its build step is
    /// queued behind everything registered so far, so the element's body has
    /// run when the collection takes its type name and views from it.
    #[track_caller]
    pub fn collection_of(&mut self, element: impl Into<TypeRef>) -> Option<EntityId> {
        self.define_collection(element.into(), None)
    }

    /// Like [`Session::collection_of`], with `body` run on the collection.
    /// The element's views are inherited only when `body` defines none.
    #[track_caller]
    pub fn collection_of_with(
        &mut self,
        element: impl Into<TypeRef>,
        body: impl FnOnce(&mut Session) + 'static,
    ) -> Option<EntityId> {
        self.define_collection(element.into(), Some(Box::new(body)))
    }

    #[track_caller]
    fn define_collection(&mut self, element: TypeRef, body: Option<Routine>) -> Option<EntityId> {
        let found = match &element {
            TypeRef::Entity(id) if self.doc.is_media_type(*id) => Some(*id),
            TypeRef::Named(identifier) => self.doc.lookup(Collection::MediaTypes, identifier),
            _ => None,
        };
        let Some(element) = found else {
            self.record(DslError::InvalidArgument {
                dsl: "CollectionOf".to_string(),
                expected: "media type or media type identifier".to_string(),
                actual: element.to_string(),
            });
            return None;
        };
        let identifier = collection_identifier(&self.doc[element].as_media_type()?.identifier);
        if let Some(existing) = self.doc.lookup(Collection::MediaTypes, &identifier) {
            return Some(existing);
        }

        let location = self.here();
        let collection = self.doc.alloc(
            identifier.clone(),
            None,
            location.clone(),
            EntityKind::MediaType(MediaTypeDef {
                identifier: identifier.clone(),
                type_name: type_name_from_identifier(&identifier),
                ..MediaTypeDef::default()
            }),
        );
        let elem = self.doc.alloc(
            "elem",
            Some(collection),
            location,
            EntityKind::Attribute(AttributeDef::with_type(DataType::User(element))),
        );
        self.set_type(collection, DataType::Array(elem));
        trace!("registered {}", self.doc.eval_name(collection));
        self.doc.media_types.insert(identifier, collection);
        self.doc.defined.insert(collection);
        self.enqueue(
            collection,
            Box::new(move |s: &mut Session| s.build_collection(collection, element, body)),
        );
        Some(collection)
    }

    fn build_collection(&mut self, collection: EntityId, element: EntityId, body: Option<Routine>) {
        let Some(source) = self.doc[element].as_media_type() else {
            return;
        };
        let type_name = format!("{}Collection", source.type_name);
        if let EntityKind::MediaType(media) = &mut self.doc[collection].kind {
            media.type_name = type_name;
        }
        if let Some(body) = body {
            body(self);
        }
        let views = self.doc[element]
            .as_media_type()
            .map(|m| m.views.clone())
            .unwrap_or_default();
        if let EntityKind::MediaType(media) = &mut self.doc[collection].kind {
            if media.views.is_empty() {
                media.views = views;
            }
        }
    }

    /// Views of a media type, in definition order.
    #[must_use]
    pub fn views_of(&self, media_type: EntityId) -> Vec<String> {
        self.doc
            .get(media_type)
            .and_then(|e| e.as_media_type())
            .map(|m| m.views.keys().cloned().collect())
            .unwrap_or_default()
    }
}
