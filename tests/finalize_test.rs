use apidesign_core::model::{DataType, Entity, Kind, MediaRef};
use apidesign_core::prelude::*;
use apidesign_core::registry::Document;
use apidesign_core::Design;

fn design(define: impl FnOnce(&mut Session)) -> Design {
    match evaluate(define) {
        Ok(design) => design,
        Err(err) => panic!("{:?}", miette::Report::new(err)),
    }
}

fn children(doc: &Document, id: EntityId) -> Vec<String> {
    doc[id]
        .attribute()
        .and_then(|a| a.children())
        .map(|c| c.keys().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn test_projection_keeps_view_members_only() {
    let design = design(|s| {
        s.media_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", args![Primitive::Integer, body(|s| s.minimum(1))]);
                s.attribute("href", args![Primitive::String]);
                s.attribute("name", args![Primitive::String, body(|s| s.min_length(2))]);
                s.required(&["id", "name"]);
            });
            s.view_with("default", |s| {
                s.attribute("id", args![]);
                s.attribute("href", args![]);
            });
        });
    });
    let doc = design.document();
    let bottle = doc.lookup_media_type("application/vnd.bottle").unwrap();
    let projected = doc.projection(bottle, "default").unwrap();
    assert_eq!(
        doc.lookup_media_type("application/vnd.bottle; view=default"),
        Some(projected)
    );
    assert_eq!(children(doc, projected), vec!["id", "href"]);

    let id = doc.child(projected, "id").unwrap();
    assert_ne!(Some(id), doc.child(bottle, "id"));
    assert_eq!(doc.attribute_kind(id), Kind::Integer);
    assert_eq!(doc[id].attribute().unwrap().validation.minimum, Some(1.0));
    assert_eq!(
        doc[projected].attribute().unwrap().validation.required,
        vec!["id".to_string()]
    );
}

#[test]
fn test_nested_media_types_follow_view_overrides() {
    let design = design(|s| {
        s.media_type("application/vnd.account", |s| {
            s.attributes(|s| {
                s.attribute("id", args![Primitive::Integer]);
                s.attribute("name", args![Primitive::String]);
            });
            s.view_with("tiny", |s| {
                s.attribute("id", args![]);
            });
        });
        s.media_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", args![Primitive::Integer]);
                s.attribute("account", args!["application/vnd.account"]);
                s.attribute(
                    "owners",
                    args![TypeRef::array_of("application/vnd.account")],
                );
            });
            s.view_with("default", |s| {
                s.attribute("id", args![]);
                s.attribute("account", args![body(|s| s.view("tiny"))]);
                s.attribute("owners", args![]);
            });
        });
    });
    let doc = design.document();
    let bottle = doc.lookup_media_type("application/vnd.bottle").unwrap();
    let account = doc.lookup_media_type("application/vnd.account").unwrap();
    let projected = doc.projection(bottle, "default").unwrap();

    let nested = doc.child(projected, "account").unwrap();
    let tiny = doc.projection(account, "tiny").unwrap();
    assert_eq!(doc[nested].attribute().unwrap().ty, Some(DataType::User(tiny)));
    let tiny_def = doc[tiny].as_media_type().unwrap();
    assert_eq!(tiny_def.identifier, "application/vnd.account; view=tiny");
    assert_eq!(tiny_def.type_name, "AccountTiny");
    assert_eq!(children(doc, tiny), vec!["id"]);

    let owners = doc.child(projected, "owners").unwrap();
    let Some(DataType::Array(elem)) = doc[owners].attribute().unwrap().ty.clone() else {
        panic!("owners should stay an array");
    };
    let full = doc.projection(account, "default").unwrap();
    assert_eq!(doc[elem].attribute().unwrap().ty, Some(DataType::User(full)));
    assert_eq!(children(doc, full), vec!["id", "name"]);
}

#[test]
fn test_cyclic_media_types_project() {
    let design = design(|s| {
        s.media_type("application/vnd.a", |s| {
            s.attributes(|s| {
                s.attribute("b", args!["application/vnd.b"]);
            });
        });
        s.media_type("application/vnd.b", |s| {
            s.attributes(|s| {
                s.attribute("a", args!["application/vnd.a"]);
            });
        });
    });
    let doc = design.document();
    let a = doc.lookup_media_type("application/vnd.a").unwrap();
    let b = doc.lookup_media_type("application/vnd.b").unwrap();
    let pa = doc.projection(a, "default").unwrap();
    let pb = doc.projection(b, "default").unwrap();
    let ab = doc.child(pa, "b").unwrap();
    let ba = doc.child(pb, "a").unwrap();
    assert_eq!(doc[ab].attribute().unwrap().ty, Some(DataType::User(pb)));
    assert_eq!(doc[ba].attribute().unwrap().ty, Some(DataType::User(pa)));
}

#[test]
fn test_resource_responses_are_inherited_by_actions() {
    let design = design(|s| {
        s.resource("bottle", |s| {
            s.response("NotFound", args![]);
            s.error("invalid", args![]);
            s.action("show", |s| {
                s.routing([get("/:id")]);
                s.response("NotFound", args![body(|s| s.description("no such bottle"))]);
            });
            s.action("list", |s| s.routing([get("")]));
        });
    });
    let doc = design.document();
    let resource = doc.resource("bottle").unwrap();
    let def = doc[resource].as_resource().unwrap();
    let shared = def.responses["NotFound"];

    let show = doc[def.actions["show"]].as_action().unwrap();
    let own = doc[show.responses["NotFound"]].as_response().unwrap();
    assert_eq!(own.description.as_deref(), Some("no such bottle"));
    assert_eq!(own.status, Some(404));
    assert!(!own.standard);

    let list_id = def.actions["list"];
    let list = doc[list_id].as_action().unwrap();
    let copied = list.responses["NotFound"];
    assert_ne!(copied, shared);
    assert_ne!(copied, show.responses["NotFound"]);
    assert_eq!(doc[copied].parent, Some(list_id));
    assert_eq!(doc[copied].as_response().unwrap().status, Some(404));
    assert!(list.errors.contains_key("invalid"));
    assert_ne!(list.errors["invalid"], def.errors["invalid"]);
}

#[test]
fn test_paths_and_wildcards() {
    let design = design(|s| {
        s.api("cellar", |s| s.base_path("/api"));
        s.resource("account", |s| {
            s.base_path("/accounts");
            s.action("show", |s| s.routing([get("/:accountID")]));
        });
        s.resource("bottle", |s| {
            s.parent("account");
            s.base_path("/bottles");
            s.action("show", |s| s.routing([get("/:bottleID")]));
            s.action("rate", |s| s.routing([put("//ratings/:bottleID")]));
        });
        s.resource("health", |s| {
            s.base_path("//health");
            s.action("check", |s| s.routing([get("")]));
        });
    });
    let doc = design.document();
    let bottle = doc.resource("bottle").unwrap();
    let def = doc[bottle].as_resource().unwrap();
    assert_eq!(def.full_path.as_deref(), Some("/api/accounts/:accountID/bottles"));

    let show = doc[def.actions["show"]].as_action().unwrap();
    let route = &show.routes[0];
    assert_eq!(
        route.full_path.as_deref(),
        Some("/api/accounts/:accountID/bottles/:bottleID")
    );
    assert_eq!(route.wildcards, vec!["accountID".to_string(), "bottleID".to_string()]);
    let params = show.params.unwrap();
    for name in ["accountID", "bottleID"] {
        let param = doc.child(params, name).unwrap();
        assert_eq!(doc.attribute_kind(param), Kind::String);
    }

    let rate = doc[def.actions["rate"]].as_action().unwrap();
    assert_eq!(rate.routes[0].full_path.as_deref(), Some("/ratings/:bottleID"));

    let health = doc.resource("health").unwrap();
    assert_eq!(
        doc[health].as_resource().unwrap().full_path.as_deref(),
        Some("/health")
    );
}

#[test]
fn test_reference_fills_in_missing_definitions() {
    let design = design(|s| {
        s.user_type("Bottle", |s| {
            s.attribute(
                "name",
                args![Primitive::String, "Name of bottle", body(|s| s.min_length(2))],
            );
            s.attribute("vintage", args![Primitive::Integer, body(|s| s.minimum(1900))]);
        });
        s.user_type("BottlePayload", |s| {
            s.reference("Bottle");
            s.attribute("name", args![]);
            s.attribute("vintage", args![body(|s| s.maximum(2030))]);
            s.attribute("note", args![Primitive::String]);
        });
    });
    let doc = design.document();
    let payload = doc.lookup_type("BottlePayload").unwrap();
    let bottle = doc.lookup_type("Bottle").unwrap();

    let name = doc.child(payload, "name").unwrap();
    let attr = doc[name].attribute().unwrap();
    assert_eq!(attr.ty, Some(DataType::Primitive(Primitive::String)));
    assert_eq!(attr.description.as_deref(), Some("Name of bottle"));
    assert_eq!(attr.validation.min_length, Some(2));

    let vintage = doc.child(payload, "vintage").unwrap();
    let rules = &doc[vintage].attribute().unwrap().validation;
    assert_eq!(rules.minimum, Some(1900.0));
    assert_eq!(rules.maximum, Some(2030.0));
    assert_eq!(
        doc[doc.child(bottle, "vintage").unwrap()].attribute().unwrap().validation.maximum,
        None
    );
}

#[test]
fn test_success_responses_default_to_resource_media() {
    let design = design(|s| {
        s.media_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", args![Primitive::Integer]);
            });
            s.view_with("tiny", |s| {
                s.attribute("id", args![]);
            });
        });
        s.resource("bottle", |s| {
            s.media("application/vnd.bottle", Some("tiny"));
            s.action("show", |s| {
                s.routing([get("/:id")]);
                s.response("OK", args![]);
                s.response("Gone", args![body(|s| s.status(410))]);
            });
        });
    });
    let doc = design.document();
    let media = doc.lookup_media_type("application/vnd.bottle").unwrap();
    let resource = doc.resource("bottle").unwrap();
    let show = doc[doc[resource].as_resource().unwrap().actions["show"]]
        .as_action()
        .unwrap();
    let ok = doc[show.responses["OK"]].as_response().unwrap();
    assert_eq!(ok.status, Some(200));
    assert_eq!(ok.media, Some(MediaRef::Entity(media)));
    assert_eq!(ok.view.as_deref(), Some("tiny"));
    let gone = doc[show.responses["Gone"]].as_response().unwrap();
    assert_eq!(gone.media, None);
}

#[test]
fn test_finalize_is_idempotent() {
    let mut session = Session::new();
    session.media_type("application/vnd.bottle", |s| {
        s.attributes(|s| {
            s.attribute("id", args![Primitive::Integer]);
            s.attribute("name", args![]);
        });
    });
    session.resource("bottle", |s| {
        s.response("NotFound", args![]);
        s.action("show", |s| s.routing([get("/:id")]));
    });
    assert!(session.run_all());
    session.finalize_all();
    let snapshot = |doc: &Document| -> Vec<Entity> { doc.ids().map(|id| doc[id].clone()).collect() };
    let once = snapshot(session.document());

    session.finalize_all();
    let ids: Vec<EntityId> = session.document().ids().collect();
    for id in ids {
        session.finalize(id);
    }
    assert_eq!(snapshot(session.document()), once);
}

#[test]
fn test_collection_inherits_views_and_projects_its_element() {
    let design = design(|s| {
        s.media_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", args![Primitive::Integer]);
                s.attribute("name", args![Primitive::String]);
            });
            s.view_with("default", |s| {
                s.attribute("id", args![]);
                s.attribute("name", args![]);
            });
            s.view_with("tiny", |s| {
                s.attribute("id", args![]);
            });
        });
        s.resource("bottle", |s| {
            s.collection_of("application/vnd.bottle");
        });
    });
    let doc = design.document();
    let bottle = doc.lookup_media_type("application/vnd.bottle").unwrap();
    let collection = doc
        .lookup_media_type("application/vnd.bottle; type=collection")
        .unwrap();
    let views: Vec<&String> = doc[collection].as_media_type().unwrap().views.keys().collect();
    assert_eq!(views, vec!["default", "tiny"]);

    let projected = doc.projection(collection, "tiny").unwrap();
    assert_eq!(
        doc[projected].as_media_type().unwrap().identifier,
        "application/vnd.bottle; type=collection; view=tiny"
    );
    let Some(DataType::Array(elem)) = &doc[projected].attribute().unwrap().ty else {
        panic!("collection projection is not an array");
    };
    let tiny = doc.projection(bottle, "tiny").unwrap();
    assert_eq!(doc[*elem].attribute().unwrap().ty, Some(DataType::User(tiny)));
    assert_eq!(children(doc, tiny), vec!["id"]);
}
