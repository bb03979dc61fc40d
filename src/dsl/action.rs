use crate::args::Arg;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{AttributeDef, EntityId, EntityKind, EntityTag, Method, Route};

pub fn get(path: &str) -> Route {
    Route::new(Method::Get, path)
}

pub fn post(path: &str) -> Route {
    Route::new(Method::Post, path)
}

pub fn put(path: &str) -> Route {
    Route::new(Method::Put, path)
}

pub fn patch(path: &str) -> Route {
    Route::new(Method::Patch, path)
}

pub fn delete(path: &str) -> Route {
    Route::new(Method::Delete, path)
}

pub fn head(path: &str) -> Route {
    Route::new(Method::Head, path)
}

pub fn options(path: &str) -> Route {
    Route::new(Method::Options, path)
}

pub fn trace(path: &str) -> Route {
    Route::new(Method::Trace, path)
}

pub fn connect(path: &str) -> Route {
    Route::new(Method::Connect, path)
}

impl Session {
    /// Adds routes to the current action.
    #[track_caller]
    pub fn routing(&mut self, routes: impl IntoIterator<Item = Route>) {
        if let Some((id, _)) = self.context_where("Routing", &[EntityTag::Action]) {
            if let EntityKind::Action(action) = &mut self.doc[id].kind {
                action.routes.extend(routes);
            }
        }
    }

    /// Defines the request body of the current action.
    #[track_caller]
    pub fn payload(&mut self, args: Vec<Arg>) -> Option<EntityId> {
        let (action, _) = self.context_where("Payload", &[EntityTag::Action])?;
        let parsed = self.parse_attribute_args("Payload", args)?;
        let exists = self.doc[action]
            .as_action()
            .is_some_and(|a| a.payload.is_some());
        if exists {
            self.record(DslError::DefinedTwice {
                kind: "payload".to_string(),
                name: self.doc[action].name.clone(),
            });
            return None;
        }
        let location = self.here();
        let id = self.doc.alloc(
            "payload",
            Some(action),
            location,
            EntityKind::Attribute(AttributeDef {
                description: parsed.description,
                ..AttributeDef::default()
            }),
        );
        if let Some(reference) = parsed.ty {
            if let Some(ty) = self.resolve_type_ref(reference, id, "Payload") {
                self.set_type(id, ty);
            }
        }
        if let EntityKind::Action(def) = &mut self.doc[action].kind {
            def.payload = Some(id);
        }
        if let Some(body) = parsed.body {
            self.execute(id, body);
        }
        Some(id)
    }
}
