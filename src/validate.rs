//! Consistency checks over a finalized design.
//!
//! The validator walks the entity graph from the top-level definitions and
//! collects every problem it finds instead of stopping at the first one.
//! Each entity is visited once, so cyclic type graphs are fine.

use crate::config::EvalConfig;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{DataType, EntityId, EntityKind, EntityTag, Kind, MediaRef};
use crate::registry::Document;
use log::debug;
use std::collections::HashSet;

pub(crate) const EXPECT_STRING: &str = "a string";
pub(crate) const EXPECT_NUMBER: &str = "an integer or a number";
pub(crate) const EXPECT_LENGTH: &str = "a string, an array or a map";
pub(crate) const EXPECT_OBJECT: &str = "an object";

pub struct Validator<'a> {
    doc: &'a Document,
    config: &'a EvalConfig,
    visited: HashSet<EntityId>,
    errors: Vec<(EntityId, DslError)>,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(doc: &'a Document, config: &'a EvalConfig) -> Self {
        Validator {
            doc,
            config,
            visited: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Checks `id` and everything reachable from it that has not been checked yet.
    pub fn validate(&mut self, id: EntityId) {
        let doc = self.doc;
        let Some(entity) = doc.get(id) else {
            return;
        };
        if !self.visited.insert(id) {
            return;
        }
        match &entity.kind {
            EntityKind::UserType(_) | EntityKind::Attribute(_) => self.validate_attribute(id),
            EntityKind::MediaType(_) => {
                self.validate_attribute(id);
                self.validate_media_type(id);
            }
            EntityKind::Api(api) => {
                let owned = [api.params, api.headers];
                self.validate_all(owned.into_iter().flatten());
                self.validate_all(api.responses.values().copied());
            }
            EntityKind::Resource(_) => self.validate_resource(id),
            EntityKind::Action(_) => self.validate_action(id),
            EntityKind::Response(_) => self.validate_response(id),
            EntityKind::View(_) => {}
        }
    }

    /// The problems found so far, with the entity each one is about.
    #[must_use]
    pub fn into_errors(self) -> Vec<(EntityId, DslError)> {
        self.errors
    }

    fn validate_all(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        for id in ids {
            self.validate(id);
        }
    }

    fn error(&mut self, id: EntityId, message: impl Into<String>) {
        self.errors.push((id, DslError::validation(message)));
    }

    fn check_rule(
        &mut self,
        id: EntityId,
        dsl: &str,
        kind: Kind,
        accepts: fn(Kind) -> bool,
        expected: &str,
    ) -> bool {
        if !kind.is_known() || kind == Kind::Any || accepts(kind) {
            return true;
        }
        self.errors.push((
            id,
            DslError::IncompatibleValidation {
                dsl: dsl.to_string(),
                expected: expected.to_string(),
                actual: kind.name().to_string(),
            },
        ));
        false
    }

    fn validate_attribute(&mut self, id: EntityId) {
        let doc = self.doc;
        let entity = &doc[id];
        if entity.parent.is_some_and(|p| doc[p].tag() == EntityTag::View) {
            return;
        }
        let Some(attr) = entity.attribute() else {
            return;
        };
        let Some(ty) = &attr.ty else {
            self.error(id, "attribute has no type");
            return;
        };
        let kind = doc.kind_of(ty);
        let rules = &attr.validation;

        if rules.format.is_some() {
            self.check_rule(id, "Format", kind, Kind::is_string, EXPECT_STRING);
        }
        if rules.pattern.is_some() {
            self.check_rule(id, "Pattern", kind, Kind::is_string, EXPECT_STRING);
        }
        if rules.minimum.is_some() {
            self.check_rule(id, "Minimum", kind, Kind::is_numeric, EXPECT_NUMBER);
        }
        if rules.maximum.is_some() {
            self.check_rule(id, "Maximum", kind, Kind::is_numeric, EXPECT_NUMBER);
        }
        if rules.min_length.is_some() {
            self.check_rule(id, "MinLength", kind, Kind::has_length, EXPECT_LENGTH);
        }
        if rules.max_length.is_some() {
            self.check_rule(id, "MaxLength", kind, Kind::has_length, EXPECT_LENGTH);
        }
        if !rules.required.is_empty()
            && self.check_rule(id, "Required", kind, |k| k == Kind::Object, EXPECT_OBJECT)
        {
            let children = doc.object_of(ty);
            for name in &rules.required {
                if !children.is_some_and(|c| c.contains_key(name)) {
                    self.error(id, format!("required attribute {name:?} is not defined"));
                }
            }
        }

        if let Some(values) = &rules.values {
            for value in values.iter().filter(|v| !kind.accepts(v)) {
                self.error(
                    id,
                    format!("enum value {value} is incompatible with attribute of type {kind}"),
                );
            }
        }
        if let Some(default) = &attr.default {
            if !kind.accepts(default) {
                self.error(
                    id,
                    format!("default value {default} is incompatible with attribute of type {kind}"),
                );
            } else if rules.values.as_ref().is_some_and(|v| !v.contains(default)) {
                self.error(
                    id,
                    format!("default value {default} is not one of the accepted values"),
                );
            }
        }

        match ty {
            DataType::Object(children) => self.validate_all(children.values().copied()),
            DataType::Array(elem) => self.validate(*elem),
            DataType::Map { key, elem } => {
                self.validate(*key);
                self.validate(*elem);
            }
            DataType::User(target) => self.validate(*target),
            DataType::Primitive(_) | DataType::Pending(_) => {}
        }
    }

    fn validate_media_type(&mut self, id: EntityId) {
        let (doc, config) = (self.doc, self.config);
        let Some(media) = doc[id].as_media_type() else {
            return;
        };
        if !media.views.contains_key(&config.default_view) {
            self.error(
                id,
                format!("media type has no {:?} view", config.default_view),
            );
        }
        let attributes = doc.media_attributes(id);
        for &view in media.views.values() {
            let members = doc[view].attribute().and_then(|a| a.children());
            for name in members.into_iter().flat_map(|m| m.keys()) {
                if !attributes.is_some_and(|a| a.contains_key(name)) {
                    self.error(
                        view,
                        format!("view member {name:?} is not an attribute of the media type"),
                    );
                }
            }
        }
        for (name, link) in &media.links {
            let Some(&attribute) = attributes.and_then(|a| a.get(name)) else {
                self.error(id, format!("link {name:?} does not name an attribute"));
                continue;
            };
            let target = match doc[attribute].attribute().and_then(|a| a.ty.as_ref()) {
                Some(DataType::User(target)) if doc.is_media_type(*target) => *target,
                _ => {
                    self.error(
                        id,
                        format!("link {name:?} must name an attribute whose type is a media type"),
                    );
                    continue;
                }
            };
            let view = link.view.as_str();
            let has_view = doc[target]
                .as_media_type()
                .is_some_and(|m| m.views.contains_key(view));
            if !has_view {
                self.error(id, format!("link {name:?} uses unknown view {view:?}"));
            }
        }
    }

    fn validate_resource(&mut self, id: EntityId) {
        let (doc, config) = (self.doc, self.config);
        let Some(resource) = doc[id].as_resource() else {
            return;
        };
        if let Some(canonical) = &resource.canonical_action {
            if !resource.actions.contains_key(canonical) {
                self.error(id, format!("unknown canonical action {canonical:?}"));
            }
        }
        if let Some(parent) = &resource.parent {
            match doc.resource(parent).and_then(|p| doc[p].as_resource()) {
                None => self.error(id, format!("parent resource {parent:?} not found")),
                Some(parent_def) => {
                    let canonical = parent_def
                        .canonical_action
                        .as_deref()
                        .unwrap_or(&config.canonical_action);
                    if !parent_def.actions.contains_key(canonical) {
                        self.error(
                            id,
                            format!("parent resource {parent:?} has no canonical action"),
                        );
                    }
                    if parent_def.parent.as_deref() == Some(doc[id].name.as_str()) {
                        self.error(
                            id,
                            format!("parent resource {parent:?} is also a child of this resource"),
                        );
                    }
                }
            }
        }
        if let Some(MediaRef::Entity(media)) = &resource.media {
            if !doc.is_media_type(*media) {
                self.error(id, "default media is not a media type");
            }
        }

        let owned = [resource.params, resource.headers];
        self.validate_all(owned.into_iter().flatten());
        self.validate_all(resource.actions.values().copied());
        self.validate_all(resource.responses.values().copied());
        self.validate_all(resource.errors.values().copied());
    }

    fn validate_action(&mut self, id: EntityId) {
        let doc = self.doc;
        let Some(action) = doc[id].as_action() else {
            return;
        };
        if action.routes.is_empty() {
            self.error(id, "no route defined for action");
        }
        let mut statuses = HashSet::new();
        for &response in action.responses.values() {
            let status = doc[response]
                .as_response()
                .and_then(|r| r.status)
                .unwrap_or(200);
            if !statuses.insert(status) {
                self.error(id, format!("multiple responses with status {status}"));
            }
        }

        let owned = [action.params, action.payload, action.headers];
        self.validate_all(owned.into_iter().flatten());
        self.validate_all(action.responses.values().copied());
        self.validate_all(action.errors.values().copied());
    }

    fn validate_response(&mut self, id: EntityId) {
        let doc = self.doc;
        let Some(response) = doc[id].as_response() else {
            return;
        };
        if let Some(status) = response.status {
            if !(100..=599).contains(&status) {
                self.error(id, format!("invalid status code {status}"));
            }
        }
        if let Some(MediaRef::Entity(media)) = &response.media {
            match doc[*media].as_media_type() {
                None => self.error(id, "response media is not a media type"),
                Some(def) => {
                    if let Some(view) = &response.view {
                        if !def.views.contains_key(view) {
                            self.error(
                                id,
                                format!("unknown view {view:?} of media type {:?}", def.identifier),
                            );
                        }
                    }
                }
            }
        }
        match &response.ty {
            Some(DataType::Array(elem)) => self.validate(*elem),
            Some(DataType::Map { key, elem }) => {
                self.validate(*key);
                self.validate(*elem);
            }
            Some(DataType::User(target)) => self.validate(*target),
            _ => {}
        }
        if let Some(headers) = response.headers {
            self.validate(headers);
        }
    }
}

impl Session {
    /// Validates the finalized design and records every problem found.
    pub fn validate_all(&mut self) {
        let doc = &self.doc;
        let roots: Vec<EntityId> = doc
            .api()
            .into_iter()
            .chain(doc.types().map(|(_, id)| id))
            .chain(doc.media_types().map(|(_, id)| id))
            .chain(doc.resources().map(|(_, id)| id))
            .collect();
        let errors = {
            let mut validator = Validator::new(&self.doc, &self.config);
            for root in roots {
                validator.validate(root);
            }
            validator.into_errors()
        };
        debug!("validation found {} problems", errors.len());
        for (id, error) in errors {
            self.record_at(id, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::args::body;
    use crate::dsl::get;
    use crate::model::Primitive;

    fn problems(session: &mut Session) -> Vec<String> {
        assert!(session.run_all(), "{}", session.diagnostics().render());
        session.finalize_all();
        session.validate_all();
        session.diagnostics().iter().map(|d| d.error.to_string()).collect()
    }

    #[test]
    fn test_required_names_must_exist() {
        let mut session = Session::new();
        session.user_type("T", |s| {
            s.attribute("id", args![Primitive::Integer]);
            s.required(&["id", "name"]);
        });
        assert_eq!(
            problems(&mut session),
            vec!["required attribute \"name\" is not defined".to_string()]
        );
    }

    #[test]
    fn test_default_must_be_an_accepted_value() {
        let mut session = Session::new();
        session.user_type("T", |s| {
            s.attribute(
                "color",
                args![Primitive::String, body(|s| {
                    s.enum_values(["red", "white"]);
                    s.default_value("rose");
                })],
            );
        });
        assert_eq!(
            problems(&mut session),
            vec!["default value \"rose\" is not one of the accepted values".to_string()]
        );
    }

    #[test]
    fn test_inherited_type_rejects_rules() {
        let mut session = Session::new();
        session.user_type("Bottle", |s| {
            s.attribute("count", args![Primitive::Integer]);
        });
        session.user_type("Order", |s| {
            s.reference("Bottle");
            s.attribute("count", args![body(|s| s.min_length(1))]);
        });
        let problems = problems(&mut session);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("invalid MinLength validation"));
    }

    #[test]
    fn test_resource_checks() {
        let mut session = Session::new();
        session.resource("bottle", |s| {
            s.parent("account");
            s.canonical_action_name("get");
            s.action("list", |s| s.routing([get("")]));
            s.action("broken", |_| {});
        });
        assert_eq!(
            problems(&mut session),
            vec![
                "unknown canonical action \"get\"".to_string(),
                "parent resource \"account\" not found".to_string(),
                "no route defined for action".to_string(),
            ]
        );
    }

    #[test]
    fn test_cyclic_types_terminate() {
        let mut session = Session::new();
        session.user_type("Node", |s| {
            s.attribute("next", args!["Node"]);
            s.attribute("children", args![crate::resolver::TypeRef::array_of("Node")]);
        });
        assert!(problems(&mut session).is_empty());
    }
}
