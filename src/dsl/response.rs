use crate::args::Arg;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{EntityId, EntityKind, EntityTag, ResponseDef};

impl Session {
    /// Defines a response of the current API, resource or action.
    ///
    /// With string parameters the response is built from the response
    /// template of that name, falling back to the built-in templates (`OK`
    /// takes the media identifier). Otherwise the response starts as a copy
    /// of the API response or built-in standard response of the same name,
    /// if any. An optional leading type sets the body type and a trailing
    /// body refines the response. A response whose body records diagnostics
    /// is left out.
    #[track_caller]
    pub fn response(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        let (owner, tag) = self.context_where(
            "Response",
            &[EntityTag::Api, EntityTag::Resource, EntityTag::Action],
        )?;
        let parsed = self.parse_response_args("Response", args)?;
        let exists = match &self.doc[owner].kind {
            EntityKind::Api(a) => a.responses.contains_key(name),
            EntityKind::Resource(r) => r.responses.contains_key(name),
            EntityKind::Action(a) => a.responses.contains_key(name),
            _ => false,
        };
        if exists {
            self.record(DslError::DefinedTwice {
                kind: "response".to_string(),
                name: name.to_string(),
            });
            return None;
        }

        let location = self.here();
        let api_response = match tag {
            EntityTag::Api => None,
            _ => self
                .doc
                .api()
                .and_then(|api| self.doc[api].as_api())
                .and_then(|api| api.responses.get(name).copied()),
        };
        let id = if !parsed.params.is_empty() {
            let Some(template) = self.doc.template(name) else {
                self.record(DslError::UnknownTemplate {
                    name: name.to_string(),
                });
                return None;
            };
            let id = self.doc.alloc(
                name,
                Some(owner),
                location,
                EntityKind::Response(ResponseDef::default()),
            );
            let params = parsed.params;
            if !self.execute(id, move |s| template(s, params.as_slice())) {
                return None;
            }
            id
        } else if let Some(base) = api_response.or_else(|| self.doc.default_response(name)) {
            let id = self.doc.dup_entity(base, Some(owner));
            self.doc[id].location = location;
            id
        } else {
            self.doc.alloc(
                name,
                Some(owner),
                location,
                EntityKind::Response(ResponseDef::default()),
            )
        };

        if let Some(body) = parsed.body {
            if !self.execute(id, body) {
                return None;
            }
            self.mark_custom(id);
        }
        if let Some(ty) = parsed.ty {
            let ty = self.resolve_type_ref(ty, id, "Response")?;
            if let EntityKind::Response(response) = &mut self.doc[id].kind {
                response.ty = Some(ty);
            }
            self.mark_custom(id);
        }

        match &mut self.doc[owner].kind {
            EntityKind::Api(a) => {
                a.responses.insert(name.to_string(), id);
            }
            EntityKind::Resource(r) => {
                r.responses.insert(name.to_string(), id);
            }
            EntityKind::Action(a) => {
                a.responses.insert(name.to_string(), id);
            }
            _ => {}
        }
        Some(id)
    }

    fn mark_custom(&mut self, response: EntityId) {
        if let EntityKind::Response(def) = &mut self.doc[response].kind {
            def.standard = false;
        }
    }

    #[track_caller]
    pub fn status(&mut self, status: u16) {
        if let Some((id, _)) = self.context_where("Status", &[EntityTag::Response]) {
            if let EntityKind::Response(response) = &mut self.doc[id].kind {
                response.status = Some(status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::args;
    use crate::args::body;
    use crate::engine::Session;
    use crate::error::DslError;
    use crate::model::{DataType, MediaRef, Primitive};
    use crate::resolver::TypeRef;

    #[test]
    fn test_standard_response_is_copied() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.response("NotFound", args![]);
            })
            .unwrap();
        assert!(session.run_all());
        let doc = session.document();
        let response = doc[resource].as_resource().unwrap().responses["NotFound"];
        assert_ne!(Some(response), doc.default_response("NotFound"));
        let def = doc[response].as_response().unwrap();
        assert_eq!(def.status, Some(404));
        assert!(def.standard);
        assert_eq!(doc[response].parent, Some(resource));
    }

    #[test]
    fn test_templates_and_api_responses() {
        let mut session = Session::new();
        session.api("cellar", |s| {
            s.response_template("Created", |s, params| {
                s.status(201);
                s.media(params[0].as_str(), None);
            });
            s.response("Teapot", args![body(|s| s.status(418))]);
        });
        let resource = session
            .resource("bottle", |s| {
                s.response("Created", args!["text/plain"]);
                s.response("Teapot", args![]);
            })
            .unwrap();
        assert!(session.run_all());
        let doc = session.document();
        let def = doc[resource].as_resource().unwrap();
        let created = doc[def.responses["Created"]].as_response().unwrap();
        assert_eq!(created.status, Some(201));
        assert_eq!(created.media, Some(MediaRef::Identifier("text/plain".to_string())));
        let teapot = doc[def.responses["Teapot"]].as_response().unwrap();
        assert_eq!(teapot.status, Some(418));
        assert!(!teapot.standard);
    }

    #[test]
    fn test_unknown_template() {
        let mut session = Session::new();
        session.resource("bottle", |s| {
            s.response("Missing", args!["x"]);
        });
        assert!(!session.run_all());
        assert_eq!(
            session.diagnostics().iter().next().map(|d| d.error.clone()),
            Some(DslError::UnknownTemplate {
                name: "Missing".to_string()
            })
        );
    }

    #[test]
    fn test_ok_template_is_built_in() {
        let mut session = Session::new();
        let bottle = session.declare_media_type("application/vnd.bottle").unwrap();
        let resource = session
            .resource("bottle", |s| {
                s.action("list", |s| {
                    s.response("OK", args!["application/vnd.bottle"]);
                });
            })
            .unwrap();
        let overridden = session
            .resource("account", |s| {
                s.response("OK", args!["application/x", body(|s| s.media("application/y", None))]);
            })
            .unwrap();
        assert!(session.run_all());
        let doc = session.document();
        let action = doc[resource].as_resource().unwrap().actions["list"];
        let ok = doc[doc[action].as_action().unwrap().responses["OK"]]
            .as_response()
            .unwrap();
        assert_eq!(ok.status, Some(200));
        assert_eq!(ok.media, Some(MediaRef::Entity(bottle)));
        let ok = doc[doc[overridden].as_resource().unwrap().responses["OK"]]
            .as_response()
            .unwrap();
        assert_eq!(ok.media, Some(MediaRef::Identifier("application/y".to_string())));
    }

    #[test]
    fn test_leading_type_sets_body_type() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.response("Custom", args![TypeRef::map_of(Primitive::String, Primitive::Any)]);
                s.response("Listed", args![TypeRef::array_of("Bottle"), body(|s| s.status(206))]);
            })
            .unwrap();
        let bottle = session.declare_type("Bottle").unwrap();
        assert!(session.run_all());
        session.finalize_all();
        assert!(!session.diagnostics().has_errors());
        let doc = session.document();
        let responses = &doc[resource].as_resource().unwrap().responses;

        let custom = doc[responses["Custom"]].as_response().unwrap();
        assert!(!custom.standard);
        let Some(DataType::Map { key, elem }) = &custom.ty else {
            panic!("expected a map body type, got {:?}", custom.ty);
        };
        assert_eq!(doc[*key].attribute().unwrap().ty, Some(DataType::Primitive(Primitive::String)));
        assert_eq!(doc[*elem].attribute().unwrap().ty, Some(DataType::Primitive(Primitive::Any)));

        let listed = doc[responses["Listed"]].as_response().unwrap();
        assert_eq!(listed.status, Some(206));
        let Some(DataType::Array(elem)) = &listed.ty else {
            panic!("expected an array body type, got {:?}", listed.ty);
        };
        assert_eq!(doc[*elem].attribute().unwrap().ty, Some(DataType::User(bottle)));
    }

    #[test]
    fn test_response_with_failing_body_is_left_out() {
        let mut session = Session::new();
        let resource = session
            .resource("bottle", |s| {
                s.response("Broken", args![body(|s| s.links(|_| {}))]);
            })
            .unwrap();
        assert!(!session.run_all());
        assert_eq!(
            session.diagnostics().iter().next().map(|d| d.error.clone()),
            Some(DslError::IncompatibleUse {
                dsl: "Links".to_string()
            })
        );
        let doc = session.document();
        assert!(doc[resource].as_resource().unwrap().responses.is_empty());
    }
}
