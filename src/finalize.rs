use crate::dsl::Slot;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{
    AttributeDef, DataType, Entity, EntityId, EntityKind, EntityTag, MediaTypeDef, Primitive,
    Route, ViewDef,
};
use crate::utils::{clean_path, extract_wildcards, join_paths, title_case, with_view_param};
use indexmap::IndexMap;
use log::{debug, trace};
use std::collections::HashSet;

impl Session {
    /// Resolves pending names, then finalizes every entity of the document,
    /// including the ones finalization itself creates.
    pub fn finalize_all(&mut self) {
        self.resolve_pending_all();
        let mut index = 0;
        while index < self.doc.len() {
            self.finalize(EntityId(index));
            index += 1;
        }
        debug!(
            "finalized {} entities, {} projections",
            self.finalized.len(),
            self.doc.projections.len()
        );
    }

    /// Computes the derived state of one entity. Finalizing an entity a
    /// second time does nothing.
    pub fn finalize(&mut self, id: EntityId) {
        if self.doc.get(id).is_none() || !self.finalized.insert(id) {
            return;
        }
        match self.doc[id].tag() {
            EntityTag::UserType | EntityTag::Attribute => self.finalize_attribute(id),
            EntityTag::MediaType => {
                self.finalize_attribute(id);
                self.finalize_media_type(id);
            }
            EntityTag::Resource => self.finalize_resource(id),
            EntityTag::Action => self.finalize_action(id),
            EntityTag::Response => self.finalize_response(id),
            EntityTag::Api | EntityTag::View => {}
        }
    }

    fn finalize_attribute(&mut self, id: EntityId) {
        let parent = self.doc[id].parent;
        if parent.is_some_and(|p| self.doc[p].tag() == EntityTag::View) {
            return;
        }
        if self.doc[id].attribute().is_some_and(|a| a.ty.is_none()) {
            // The parent's reference may still provide the type.
            if let Some(parent) = parent {
                self.finalize(parent);
            }
            let parent_has_reference = parent
                .and_then(|p| self.doc[p].attribute())
                .is_some_and(|a| a.reference.is_some());
            let untyped = self.doc[id].attribute().is_some_and(|a| a.ty.is_none());
            if untyped && !parent_has_reference {
                self.set_type(id, DataType::Primitive(Primitive::String));
            }
        }
        self.inherit_from_reference(id);
        for child in self.owned_children(id) {
            self.finalize(child);
        }
    }

    /// Fills in what the children of `id` leave out from the like-named
    /// attributes of its reference type.
    fn inherit_from_reference(&mut self, id: EntityId) {
        let Some(attr) = self.doc[id].attribute() else {
            return;
        };
        let (Some(reference), Some(children)) = (attr.reference.clone(), attr.children().cloned())
        else {
            return;
        };
        let Some(bases) = self.doc.object_of(&reference).cloned() else {
            return;
        };
        for (name, child) in children {
            let Some(&base) = bases.get(&name) else {
                continue;
            };
            self.finalize(base);
            let Some(base_attr) = self.doc[base].attribute().cloned() else {
                continue;
            };
            let untyped = self.doc[child].attribute().is_some_and(|a| a.ty.is_none());
            if untyped {
                if let Some(ty) = &base_attr.ty {
                    let copied = self.doc.dup_type(ty, child);
                    self.set_type(child, copied);
                }
            }
            if let Some(attr) = self.doc[child].attribute_mut() {
                if attr.description.is_none() {
                    attr.description = base_attr.description;
                }
                if attr.default.is_none() {
                    attr.default = base_attr.default;
                }
                if attr.example.is_none() {
                    attr.example = base_attr.example;
                }
                attr.validation.inherit(&base_attr.validation);
            }
        }
    }

    fn owned_children(&self, id: EntityId) -> Vec<EntityId> {
        match self.doc[id].attribute().and_then(|a| a.ty.as_ref()) {
            Some(DataType::Object(children)) => children.values().copied().collect(),
            Some(DataType::Array(elem)) => vec![*elem],
            Some(DataType::Map { key, elem }) => vec![*key, *elem],
            _ => Vec::new(),
        }
    }

    fn finalize_media_type(&mut self, id: EntityId) {
        self.ensure_default_view(id);
        let Some(media) = self.doc[id].as_media_type() else {
            return;
        };
        if media.projected_from.is_some() {
            return;
        }
        let views: Vec<String> = media.views.keys().cloned().collect();
        for view in views {
            self.project(id, &view);
        }
    }

    /// Adds a default view listing every attribute when the media type has none.
    /// Collections share the default view of their element.
    fn ensure_default_view(&mut self, id: EntityId) {
        let default_view = self.config.default_view.clone();
        let Some(media) = self.doc[id].as_media_type() else {
            return;
        };
        if media.views.contains_key(&default_view) {
            return;
        }
        if let Some(element) = self.doc.collection_element(id) {
            self.ensure_default_view(element);
            let shared = self.doc[element]
                .as_media_type()
                .and_then(|m| m.views.get(&default_view).copied());
            if let (Some(view), EntityKind::MediaType(media)) = (shared, &mut self.doc[id].kind) {
                media.views.insert(default_view, view);
            }
            return;
        }
        let attributes: Vec<String> = media
            .attribute
            .ty
            .as_ref()
            .and_then(|ty| self.doc.object_of(ty))
            .map(|children| children.keys().cloned().collect())
            .unwrap_or_default();
        let location = self.doc[id].location.clone();
        let view = self.doc.alloc(
            default_view.clone(),
            Some(id),
            location.clone(),
            EntityKind::View(ViewDef::default()),
        );
        let mut members = IndexMap::with_capacity(attributes.len());
        for name in attributes {
            let member = self.doc.alloc(
                name.clone(),
                Some(view),
                location.clone(),
                EntityKind::Attribute(AttributeDef::default()),
            );
            members.insert(name, member);
        }
        self.set_type(view, DataType::Object(members));
        if let EntityKind::MediaType(media) = &mut self.doc[id].kind {
            media.views.insert(default_view, view);
        }
        trace!("added default view to {}", self.doc.eval_name(id));
    }

    /// The media type derived from `media_type` by keeping the attributes
    /// selected by `view`, created on first use.
    ///
    /// Projections are registered under their identifier (the original one
    /// with a `view` parameter) before nested attributes are projected, so
    /// media types that contain each other project in finite time.
    pub fn project(&mut self, media_type: EntityId, view: &str) -> Option<EntityId> {
        self.finalize(media_type);
        self.ensure_default_view(media_type);
        let source = self.doc.get(media_type)?.as_media_type()?.clone();
        let identifier = with_view_param(&source.identifier, view);
        if let Some(existing) = self.doc.projections.get(&identifier) {
            return Some(*existing);
        }
        let view_id = *source.views.get(view)?;

        let type_name = if view == self.config.default_view {
            source.type_name.clone()
        } else {
            format!("{}{}", source.type_name, title_case(view))
        };
        let entity = &self.doc[media_type];
        let (name, location) = (entity.name.clone(), entity.location.clone());
        let projected = self.doc.alloc(
            name,
            None,
            location,
            EntityKind::MediaType(MediaTypeDef {
                identifier: identifier.clone(),
                type_name,
                attribute: AttributeDef {
                    description: source.attribute.description.clone(),
                    metadata: source.attribute.metadata.clone(),
                    ..AttributeDef::with_type(DataType::object())
                },
                projected_from: Some(media_type),
                ..MediaTypeDef::default()
            }),
        );
        self.doc.projections.insert(identifier, projected);
        if let EntityKind::MediaType(media) = &mut self.doc[media_type].kind {
            media.projections.insert(view.to_string(), projected);
        }
        trace!("projecting {} through view {view:?}", self.doc.eval_name(media_type));

        // Collections project their element through the same view.
        if let Some(DataType::Array(elem)) = &source.attribute.ty {
            let copy = self.doc.dup_entity(*elem, Some(projected));
            self.project_nested(copy, "elem", Some(view.to_string()));
            self.set_type(projected, DataType::Array(copy));
            return Some(projected);
        }

        let members: Vec<(String, EntityId)> = self.doc[view_id]
            .attribute()
            .and_then(AttributeDef::children)
            .map(|members| members.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        let sources = source
            .attribute
            .ty
            .as_ref()
            .and_then(|ty| self.doc.object_of(ty))
            .cloned()
            .unwrap_or_default();
        let mut selected = IndexMap::with_capacity(members.len());
        for (name, member) in members {
            // Unknown members are reported by the validator.
            let Some(&attribute) = sources.get(&name) else {
                continue;
            };
            let copy = self.doc.dup_entity(attribute, Some(projected));
            let member_view = self.doc[member].attribute().and_then(|a| a.view.clone());
            self.project_nested(copy, &name, member_view);
            selected.insert(name, copy);
        }
        let mut validation = source.attribute.validation;
        validation.required.retain(|name| selected.contains_key(name));
        if let Some(attr) = self.doc[projected].attribute_mut() {
            attr.ty = Some(DataType::Object(selected));
            attr.validation = validation;
        }
        Some(projected)
    }

    /// Replaces a media type (or array of media type) attribute type by its
    /// projection through the view chosen for the field.
    fn project_nested(&mut self, attribute: EntityId, field: &str, member_view: Option<String>) {
        let Some(attr) = self.doc[attribute].attribute() else {
            return;
        };
        let view = member_view
            .or_else(|| attr.view.clone())
            .unwrap_or_else(|| self.config.default_view.clone());
        let (target, holder) = match &attr.ty {
            Some(DataType::User(id)) if self.doc.is_media_type(*id) => (*id, attribute),
            Some(DataType::Array(elem)) => match self.doc[*elem].attribute().and_then(|a| a.ty.as_ref()) {
                Some(DataType::User(id)) if self.doc.is_media_type(*id) => (*id, *elem),
                _ => return,
            },
            _ => return,
        };
        match self.project(target, &view) {
            Some(projected) => self.set_type(holder, DataType::User(projected)),
            None => self.record_at(
                attribute,
                DslError::validation(format!(
                    "view {view:?} on field {field:?} cannot be computed"
                )),
            ),
        }
    }

    fn finalize_resource(&mut self, id: EntityId) {
        let full_path = self.resource_full_path(id, &mut HashSet::new());
        let Some(resource) = self.doc[id].as_resource() else {
            return;
        };
        let responses: Vec<(String, EntityId)> = resource
            .responses
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        let errors: Vec<(String, EntityId)> = resource
            .errors
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        let actions: Vec<EntityId> = resource.actions.values().copied().collect();
        if let EntityKind::Resource(resource) = &mut self.doc[id].kind {
            resource.full_path = Some(full_path);
        }

        for action in actions {
            for (name, response) in &responses {
                let missing = self.doc[action]
                    .as_action()
                    .is_some_and(|a| !a.responses.contains_key(name));
                if missing {
                    let copy = self.doc.dup_entity(*response, Some(action));
                    if let EntityKind::Action(def) = &mut self.doc[action].kind {
                        def.responses.insert(name.clone(), copy);
                    }
                }
            }
            for (name, error) in &errors {
                let missing = self.doc[action]
                    .as_action()
                    .is_some_and(|a| !a.errors.contains_key(name));
                if missing {
                    let copy = self.doc.dup_entity(*error, Some(action));
                    if let EntityKind::Action(def) = &mut self.doc[action].kind {
                        def.errors.insert(name.clone(), copy);
                    }
                }
            }
        }
    }

    /// Full path of a resource: the path of its parent's canonical action (or
    /// the API base path) joined with its own base path. `visited` breaks
    /// parent cycles.
    pub(crate) fn resource_full_path(&self, id: EntityId, visited: &mut HashSet<EntityId>) -> String {
        let Some(resource) = self.doc.get(id).and_then(Entity::as_resource) else {
            return "/".to_string();
        };
        let base = resource.base_path.as_deref().unwrap_or_default();
        if base.starts_with("//") || !visited.insert(id) {
            return clean_path(base);
        }
        let prefix = match &resource.parent {
            Some(parent) => self
                .doc
                .resource(parent)
                .and_then(|parent| self.canonical_route_path(parent, visited))
                .unwrap_or_default(),
            None => self
                .doc
                .api()
                .and_then(|api| self.doc[api].as_api())
                .and_then(|api| api.base_path.clone())
                .unwrap_or_default(),
        };
        join_paths(&prefix, base)
    }

    fn canonical_route_path(&self, resource: EntityId, visited: &mut HashSet<EntityId>) -> Option<String> {
        let def = self.doc.get(resource)?.as_resource()?;
        let name = def
            .canonical_action
            .as_deref()
            .unwrap_or(&self.config.canonical_action);
        let action = def.actions.get(name)?;
        let route = self.doc[*action].as_action()?.routes.first()?;
        Some(self.route_full_path(resource, route, visited))
    }

    fn route_full_path(&self, resource: EntityId, route: &Route, visited: &mut HashSet<EntityId>) -> String {
        if route.is_absolute() {
            return clean_path(&route.path[1..]);
        }
        join_paths(&self.resource_full_path(resource, visited), &route.path)
    }

    fn finalize_action(&mut self, id: EntityId) {
        let Some(resource) = self.doc[id].parent else {
            return;
        };
        let Some(action) = self.doc[id].as_action() else {
            return;
        };
        let mut wildcards: Vec<String> = Vec::new();
        let mut routes = action.routes.clone();
        for route in &mut routes {
            let full_path = self.route_full_path(resource, route, &mut HashSet::new());
            route.wildcards = extract_wildcards(&full_path);
            route.full_path = Some(full_path);
            for wildcard in &route.wildcards {
                if !wildcards.contains(wildcard) {
                    wildcards.push(wildcard.clone());
                }
            }
        }
        if let EntityKind::Action(action) = &mut self.doc[id].kind {
            action.routes = routes;
        }

        let owners = [Some(id), Some(resource), self.doc.api()];
        for wildcard in wildcards {
            let declared = owners
                .iter()
                .flatten()
                .any(|owner| self.declares_param(*owner, &wildcard));
            if declared {
                continue;
            }
            let location = self.doc[id].location.clone();
            let Some(params) = self.slot(id, Slot::Params, location.clone()) else {
                continue;
            };
            let param = self.doc.alloc(
                wildcard.clone(),
                Some(params),
                location,
                EntityKind::Attribute(AttributeDef::with_type(Primitive::String.into())),
            );
            if let Some(DataType::Object(children)) =
                self.doc[params].attribute_mut().and_then(|a| a.ty.as_mut())
            {
                children.insert(wildcard, param);
            }
        }
    }

    fn declares_param(&self, owner: EntityId, name: &str) -> bool {
        let params = match &self.doc[owner].kind {
            EntityKind::Api(api) => api.params,
            EntityKind::Resource(resource) => resource.params,
            EntityKind::Action(action) => action.params,
            _ => None,
        };
        params.is_some_and(|params| self.doc.child(params, name).is_some())
    }

    fn finalize_response(&mut self, id: EntityId) {
        let resource = self.doc[id].parent.and_then(|parent| match self.doc[parent].tag() {
            EntityTag::Resource => Some(parent),
            EntityTag::Action => self.doc[parent].parent,
            _ => None,
        });
        let (media, view) = match resource.and_then(|r| self.doc[r].as_resource()) {
            Some(resource) => (resource.media.clone(), resource.default_view.clone()),
            None => (None, None),
        };
        if let EntityKind::Response(response) = &mut self.doc[id].kind {
            let status = *response.status.get_or_insert(200);
            if status == 200 && response.media.is_none() {
                response.media = media;
                if response.view.is_none() {
                    response.view = view;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::args;
    use crate::dsl::get;
    use crate::engine::Session;
    use crate::model::{DataType, Kind, Primitive};

    #[test]
    fn test_untyped_attributes_default_to_string() {
        let mut session = Session::new();
        let ty = session
            .user_type("T", |s| {
                s.attribute("name", args![]);
            })
            .unwrap();
        assert!(session.run_all());
        session.finalize_all();
        let name = session.document().child(ty, "name").unwrap();
        assert_eq!(session.document().attribute_kind(name), Kind::String);
    }

    #[test]
    fn test_default_view_lists_every_attribute() {
        let mut session = Session::new();
        let mt = session
            .media_type("application/vnd.plain", |s| {
                s.attributes(|s| {
                    s.attribute("a", args![Primitive::Integer]);
                    s.attribute("b", args![Primitive::Boolean]);
                });
            })
            .unwrap();
        assert!(session.run_all());
        session.finalize_all();
        let doc = session.document();
        let view = doc[mt].as_media_type().unwrap().views["default"];
        let members: Vec<&String> = doc[view].attribute().unwrap().children().unwrap().keys().collect();
        assert_eq!(members, vec!["a", "b"]);
        let projected = doc.projection(mt, "default").unwrap();
        assert_eq!(
            doc[projected].as_media_type().unwrap().identifier,
            "application/vnd.plain; view=default"
        );
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut session = Session::new();
        let a = session
            .resource("a", |s| {
                s.parent("b");
                s.action("show", |s| s.routing([get("/:aID")]));
            })
            .unwrap();
        session.resource("b", |s| {
            s.parent("a");
            s.action("show", |s| s.routing([get("/:bID")]));
        });
        assert!(session.run_all());
        session.finalize_all();
        let full_path = session.document()[a].as_resource().unwrap().full_path.clone();
        assert!(full_path.is_some());
    }

    #[test]
    fn test_wildcards_become_params() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.base_path("/bottles");
                s.params(|s| {
                    s.param("bottleID", args![Primitive::Integer]);
                });
                s.action("show", |s| s.routing([get("/:bottleID/vintage/:year")]));
            })
            .unwrap();
        assert!(session.run_all());
        session.finalize_all();
        let doc = session.document();
        let action = doc[resource].as_resource().unwrap().actions["show"];
        let def = doc[action].as_action().unwrap();
        assert_eq!(
            def.routes[0].full_path.as_deref(),
            Some("/bottles/:bottleID/vintage/:year")
        );
        let params = def.params.unwrap();
        assert!(doc.child(params, "bottleID").is_none());
        let year = doc.child(params, "year").unwrap();
        assert_eq!(
            doc[year].attribute().unwrap().ty,
            Some(DataType::Primitive(Primitive::String))
        );
    }
}
