use super::Slot;
use crate::args::Arg;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{
    ActionDef, AttributeDef, DataType, EntityId, EntityKind, EntityTag, Primitive,
};
use crate::resolver::TypeRef;

impl Session {
    /// Names the resource whose canonical action prefixes this resource's paths.
    #[track_caller]
    pub fn parent(&mut self, name: &str) {
        if let Some((id, _)) = self.context_where("Parent", &[EntityTag::Resource]) {
            if let EntityKind::Resource(resource) = &mut self.doc[id].kind {
                resource.parent = Some(name.to_string());
            }
        }
    }

    #[track_caller]
    pub fn canonical_action_name(&mut self, name: &str) {
        if let Some((id, _)) = self.context_where("CanonicalActionName", &[EntityTag::Resource]) {
            if let EntityKind::Resource(resource) = &mut self.doc[id].kind {
                resource.canonical_action = Some(name.to_string());
            }
        }
    }

    /// Declares an action of the current resource. Its body runs in a later
    /// generation, after every top-level definition has been built.
    #[track_caller]
    pub fn action(&mut self, name: &str, body: impl FnOnce(&mut Session) + 'static) -> Option<EntityId> {
        let (resource, _) = self.context_where("Action", &[EntityTag::Resource])?;
        let exists = self.doc[resource]
            .as_resource()
            .is_some_and(|r| r.actions.contains_key(name));
        if exists {
            self.record(DslError::DefinedTwice {
                kind: "action".to_string(),
                name: name.to_string(),
            });
            return None;
        }
        let location = self.here();
        let id = self.doc.alloc(
            name,
            Some(resource),
            location,
            EntityKind::Action(ActionDef::default()),
        );
        if let EntityKind::Resource(def) = &mut self.doc[resource].kind {
            def.actions.insert(name.to_string(), id);
        }
        self.enqueue(id, Box::new(body));
        Some(id)
    }

    /// Sets the default media of a resource or the body media of a response.
    ///
    /// The media is a media type, by identity or identifier; identifiers that
    /// name no media type (e.g. `text/plain`) are kept verbatim.
    #[track_caller]
    pub fn media(&mut self, media: impl Into<TypeRef>, view: Option<&str>) {
        let Some((id, _)) = self.context_where("Media", &[EntityTag::Resource, EntityTag::Response])
        else {
            return;
        };
        let Some(media) = self.resolve_media_ref(media.into(), "Media") else {
            return;
        };
        let view = view.map(str::to_string);
        match &mut self.doc[id].kind {
            EntityKind::Resource(resource) => {
                resource.media = Some(media);
                resource.default_view = view;
            }
            EntityKind::Response(response) => {
                response.media = Some(media);
                response.view = view;
                response.standard = false;
            }
            _ => {}
        }
    }

    /// Declares an error of a resource or action. Without a type the error
    /// uses the built-in error media type.
    #[track_caller]
    pub fn error(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        let (owner, _) = self.context_where("Error", &[EntityTag::Resource, EntityTag::Action])?;
        let parsed = self.parse_attribute_args("Error", args)?;
        let exists = match &self.doc[owner].kind {
            EntityKind::Resource(r) => r.errors.contains_key(name),
            EntityKind::Action(a) => a.errors.contains_key(name),
            _ => false,
        };
        if exists {
            self.record(DslError::DefinedTwice {
                kind: "error".to_string(),
                name: name.to_string(),
            });
            return None;
        }
        let location = self.here();
        let id = self.doc.alloc(
            name,
            Some(owner),
            location,
            EntityKind::Attribute(AttributeDef {
                description: parsed.description,
                ..AttributeDef::default()
            }),
        );
        let ty = match parsed.ty {
            Some(reference) => self.resolve_type_ref(reference, id, "Error"),
            None => Some(
                self.doc
                    .error_media()
                    .map_or(DataType::Primitive(Primitive::String), DataType::User),
            ),
        };
        self.set_type(id, ty.unwrap_or(DataType::Primitive(Primitive::Any)));
        match &mut self.doc[owner].kind {
            EntityKind::Resource(r) => {
                r.errors.insert(name.to_string(), id);
            }
            EntityKind::Action(a) => {
                a.errors.insert(name.to_string(), id);
            }
            _ => {}
        }
        if let Some(body) = parsed.body {
            self.execute(id, body);
        }
        Some(id)
    }

    /// Runs `body` to define parameters of the current API, resource or action.
    #[track_caller]
    pub fn params(&mut self, body: impl FnOnce(&mut Session)) {
        let Some((owner, _)) = self.context_where(
            "Params",
            &[EntityTag::Api, EntityTag::Resource, EntityTag::Action],
        ) else {
            return;
        };
        let location = self.here();
        if let Some(params) = self.slot(owner, Slot::Params, location) {
            self.execute(params, body);
        }
    }

    /// Runs `body` to define headers of the current API, resource, action or response.
    #[track_caller]
    pub fn headers(&mut self, body: impl FnOnce(&mut Session)) {
        let Some((owner, _)) = self.context_where(
            "Headers",
            &[
                EntityTag::Api,
                EntityTag::Resource,
                EntityTag::Action,
                EntityTag::Response,
            ],
        ) else {
            return;
        };
        let location = self.here();
        if let Some(headers) = self.slot(owner, Slot::Headers, location) {
            self.execute(headers, body);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::args;
    use crate::engine::Session;
    use crate::error::DslError;
    use crate::model::{DataType, MediaRef, Primitive};

    #[test]
    fn test_actions_run_in_a_later_generation() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.action("show", |s| s.description("Retrieve a bottle"));
                s.description("Bottles");
            })
            .unwrap();
        assert!(session.run_all());
        let doc = session.document();
        let action = doc[resource].as_resource().unwrap().actions["show"];
        assert_eq!(
            doc[action].as_action().unwrap().description.as_deref(),
            Some("Retrieve a bottle")
        );
    }

    #[test]
    fn test_resource_settings() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.parent("account");
                s.canonical_action_name("get");
                s.media("application/vnd.bottle", Some("tiny"));
                s.error("not_found", args![]);
                s.error("bad", args![Primitive::String, "bad request"]);
            })
            .unwrap();
        assert!(session.run_all());
        let doc = session.document();
        let def = doc[resource].as_resource().unwrap();
        assert_eq!(def.parent.as_deref(), Some("account"));
        assert_eq!(def.canonical_action.as_deref(), Some("get"));
        assert_eq!(
            def.media,
            Some(MediaRef::Identifier("application/vnd.bottle".to_string()))
        );
        assert_eq!(def.default_view.as_deref(), Some("tiny"));
        let not_found = def.errors["not_found"];
        assert_eq!(
            doc[not_found].attribute().unwrap().ty,
            doc.error_media().map(DataType::User)
        );
    }

    #[test]
    fn test_duplicate_action() {
        let mut session = Session::new();
        session.resource("bottle", |s| {
            s.action("show", |_| {});
            s.action("show", |_| {});
        });
        assert!(!session.run_all());
        assert_eq!(session.diagnostics().error_count(), 1);
        assert!(matches!(
            session.diagnostics().iter().next().map(|d| &d.error),
            Some(DslError::DefinedTwice { .. })
        ));
    }
}
