use super::DOCUMENTED;
use crate::engine::{Session, TopLevel};
use crate::error::DslError;
use crate::model::{EntityId, EntityKind, EntityTag};
use std::rc::Rc;

impl Session {
    /// Defines the API. Only one API may be defined per design.
    #[track_caller]
    pub fn api(&mut self, name: &str, body: impl FnOnce(&mut Session) + 'static) -> Option<EntityId> {
        self.register_top_level("API", TopLevel::Api, name, Some(Box::new(body)))
    }

    /// Defines a named object type.
    #[track_caller]
    pub fn user_type(&mut self, name: &str, body: impl FnOnce(&mut Session) + 'static) -> Option<EntityId> {
        self.register_top_level("Type", TopLevel::Type, name, Some(Box::new(body)))
    }

    /// Reserves the identity of a type so it can be referenced before
    /// [`Session::user_type`] defines it.
    #[track_caller]
    pub fn declare_type(&mut self, name: &str) -> Option<EntityId> {
        self.register_top_level("Type", TopLevel::Type, name, None)
    }

    /// Defines a media type. Identifiers are compared in canonical form.
    #[track_caller]
    pub fn media_type(
        &mut self,
        identifier: &str,
        body: impl FnOnce(&mut Session) + 'static,
    ) -> Option<EntityId> {
        self.register_top_level("MediaType", TopLevel::MediaType, identifier, Some(Box::new(body)))
    }

    #[track_caller]
    pub fn declare_media_type(&mut self, identifier: &str) -> Option<EntityId> {
        self.register_top_level("MediaType", TopLevel::MediaType, identifier, None)
    }

    #[track_caller]
    pub fn resource(&mut self, name: &str, body: impl FnOnce(&mut Session) + 'static) -> Option<EntityId> {
        self.register_top_level("Resource", TopLevel::Resource, name, Some(Box::new(body)))
    }

    /// Registers a reusable routine applied by [`Session::use_trait`].
    #[track_caller]
    pub fn define_trait(&mut self, name: &str, body: impl Fn(&mut Session) + 'static) {
        if self.current().is_some() {
            self.incompatible("Trait");
            return;
        }
        if self.doc.traits.contains_key(name) {
            self.record(DslError::DefinedTwice {
                kind: "trait".to_string(),
                name: name.to_string(),
            });
            return;
        }
        self.doc.traits.insert(name.to_string(), Rc::new(body));
    }

    /// Registers a response template instantiated by naming it with string
    /// parameters in [`Session::response`].
    #[track_caller]
    pub fn response_template(&mut self, name: &str, body: impl Fn(&mut Session, &[String]) + 'static) {
        if self.current().is_some() && self.context_where("ResponseTemplate", &[EntityTag::Api]).is_none() {
            return;
        }
        if self.doc.templates.contains_key(name) {
            self.record(DslError::DefinedTwice {
                kind: "response template".to_string(),
                name: name.to_string(),
            });
            return;
        }
        self.doc.templates.insert(name.to_string(), Rc::new(body));
    }

    /// Runs a trait's routine in the current context.
    #[track_caller]
    pub fn use_trait(&mut self, name: &str) {
        let Some(owner) = self.current() else {
            self.incompatible("UseTrait");
            return;
        };
        let Some(routine) = self.doc.traits.get(name).cloned() else {
            self.record(DslError::UnknownTrait {
                name: name.to_string(),
            });
            return;
        };
        match &mut self.doc[owner].kind {
            EntityKind::Api(a) => a.traits.push(name.to_string()),
            EntityKind::Resource(r) => r.traits.push(name.to_string()),
            EntityKind::Action(a) => a.traits.push(name.to_string()),
            _ => {}
        }
        routine(self);
    }

    #[track_caller]
    pub fn title(&mut self, title: &str) {
        if let Some((id, _)) = self.context_where("Title", &[EntityTag::Api]) {
            if let EntityKind::Api(api) = &mut self.doc[id].kind {
                api.title = Some(title.to_string());
            }
        }
    }

    #[track_caller]
    pub fn version(&mut self, version: &str) {
        if let Some((id, _)) = self.context_where("Version", &[EntityTag::Api]) {
            if let EntityKind::Api(api) = &mut self.doc[id].kind {
                api.version = Some(version.to_string());
            }
        }
    }

    /// Sets the path prefix of the API or of a resource. A path starting with
    /// `//` ignores the prefixes of enclosing definitions.
    #[track_caller]
    pub fn base_path(&mut self, path: &str) {
        let Some((id, _)) = self.context_where("BasePath", &[EntityTag::Api, EntityTag::Resource])
        else {
            return;
        };
        match &mut self.doc[id].kind {
            EntityKind::Api(api) => api.base_path = Some(path.to_string()),
            EntityKind::Resource(resource) => resource.base_path = Some(path.to_string()),
            _ => {}
        }
    }

    #[track_caller]
    pub fn description(&mut self, text: &str) {
        let Some((id, _)) = self.context_where("Description", DOCUMENTED) else {
            return;
        };
        let text = Some(text.to_string());
        match &mut self.doc[id].kind {
            EntityKind::Api(a) => a.description = text,
            EntityKind::Resource(r) => r.description = text,
            EntityKind::Action(a) => a.description = text,
            EntityKind::Response(r) => r.description = text,
            kind => {
                if let Some(attr) = kind.attribute_mut() {
                    attr.description = text;
                }
            }
        }
    }

    /// Appends values to a metadata key.
    #[track_caller]
    pub fn metadata(&mut self, key: &str, values: &[&str]) {
        let Some((id, _)) = self.context_where("Metadata", DOCUMENTED) else {
            return;
        };
        let metadata = match &mut self.doc[id].kind {
            EntityKind::Api(a) => &mut a.metadata,
            EntityKind::Resource(r) => &mut r.metadata,
            EntityKind::Action(a) => &mut a.metadata,
            EntityKind::Response(r) => &mut r.metadata,
            kind => match kind.attribute_mut() {
                Some(attr) => &mut attr.metadata,
                None => return,
            },
        };
        metadata
            .entry(key.to_string())
            .or_default()
            .extend(values.iter().map(|v| (*v).to_string()));
    }
}
