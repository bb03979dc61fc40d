use apidesign_core::error::DslError;
use apidesign_core::model::DataType;
use apidesign_core::prelude::*;
use apidesign_core::registry::Document;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn run_ok(session: &mut Session) -> &Document {
    match session.run() {
        Ok(doc) => doc,
        Err(diagnostics) => panic!("{:?}", miette::Report::new(diagnostics)),
    }
}

fn define_a(session: &mut Session) {
    session.user_type("A", |s| {
        s.attribute("b", args!["B"]);
    });
}

fn define_b(session: &mut Session) {
    session.user_type("B", |s| {
        s.attribute("a", args!["A"]);
    });
}

#[test]
fn test_mutual_references_by_name_in_either_order() {
    let orders: [[fn(&mut Session); 2]; 2] = [[define_a, define_b], [define_b, define_a]];
    for order in orders {
        let mut session = Session::new();
        for define in order {
            define(&mut session);
        }
        let doc = run_ok(&mut session);
        let a = doc.lookup_type("A").unwrap();
        let b = doc.lookup_type("B").unwrap();
        let ab = doc.child(a, "b").unwrap();
        let ba = doc.child(b, "a").unwrap();
        assert_eq!(doc[ab].attribute().unwrap().ty, Some(DataType::User(b)));
        assert_eq!(doc[ba].attribute().unwrap().ty, Some(DataType::User(a)));
        assert!(!session.diagnostics().has_errors());
    }
}

#[test]
fn test_mutual_references_by_identity() {
    let mut session = Session::new();
    let a = session.declare_type("A").unwrap();
    let b = session.declare_type("B").unwrap();
    session.user_type("A", move |s| {
        s.attribute("b", args![b]);
    });
    session.user_type("B", move |s| {
        s.attribute("a", args![a]);
    });
    let doc = run_ok(&mut session);
    assert_eq!(doc.lookup_type("A"), Some(a));
    let ab = doc.child(a, "b").unwrap();
    let ba = doc.child(b, "a").unwrap();
    assert_eq!(doc[ab].attribute().unwrap().ty, Some(DataType::User(b)));
    assert_eq!(doc[ba].attribute().unwrap().ty, Some(DataType::User(a)));
}

#[test]
fn test_forward_name_matches_post_run_lookup() {
    let mut session = Session::new();
    session.user_type("Order", |s| {
        s.attribute("owner", args!["Owner"]);
        s.attribute("bottle", args!["application/vnd.bottle+json"]);
    });
    session.user_type("Owner", |s| {
        s.attribute("name", args![Primitive::String]);
    });
    session.media_type("application/vnd.bottle", |s| {
        s.attributes(|s| {
            s.attribute("id", args![Primitive::Integer]);
        });
    });
    let doc = run_ok(&mut session);
    let order = doc.lookup_type("Order").unwrap();
    let owner = doc.child(order, "owner").unwrap();
    let bottle = doc.child(order, "bottle").unwrap();
    assert_eq!(
        doc[owner].attribute().unwrap().ty,
        doc.lookup_type("Owner").map(DataType::User)
    );
    assert_eq!(
        doc[bottle].attribute().unwrap().ty,
        doc.lookup_media_type("application/vnd.bottle").map(DataType::User)
    );
}

#[test]
fn test_duplicate_definition_keeps_the_first() {
    let mut session = Session::new();
    let second_ran = Rc::new(Cell::new(false));
    let flag = second_ran.clone();
    session.user_type("X", |s| {
        s.attribute("first", args![Primitive::String]);
    });
    session.user_type("X", move |_| flag.set(true));
    assert!(session.run().is_err());
    assert!(!second_ran.get());
    let diagnostics: Vec<_> = session.diagnostics().iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].error,
        DslError::DefinedTwice {
            kind: "type".to_string(),
            name: "X".to_string()
        }
    );
    assert_eq!(diagnostics[0].message(), "type \"X\" is defined twice (top level)");
}

#[test]
fn test_nested_steps_run_after_top_level_definitions() {
    let mut session = Session::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let (resource_log, action_log, type_log) = (order.clone(), order.clone(), order.clone());
    session.resource("bottle", move |s| {
        resource_log.borrow_mut().push("resource");
        s.action("show", move |s| {
            action_log.borrow_mut().push("action");
            s.routing([get("/:id")]);
        });
    });
    session.user_type("Bottle", move |_| type_log.borrow_mut().push("type"));
    run_ok(&mut session);
    assert_eq!(*order.borrow(), vec!["resource", "type", "action"]);
}

#[test]
fn test_api_is_built_first() {
    let mut session = Session::new();
    session.resource("bottle", |s| {
        s.response("Teapot", args![]);
    });
    session.api("cellar", |s| {
        s.response("Teapot", args![body(|s| s.status(418))]);
    });
    let doc = run_ok(&mut session);
    let resource = doc.resource("bottle").unwrap();
    let teapot = doc[resource].as_resource().unwrap().responses["Teapot"];
    assert_eq!(doc[teapot].as_response().unwrap().status, Some(418));
}

#[test]
fn test_traits_apply_in_the_current_context() {
    let mut session = Session::new();
    session.define_trait("paginated", |s| {
        s.param("page", args![Primitive::Integer]);
    });
    session.resource("bottle", |s| {
        s.action("list", |s| {
            s.routing([get("")]);
            s.use_trait("paginated");
        });
    });
    let doc = run_ok(&mut session);
    let resource = doc.resource("bottle").unwrap();
    let list = doc[resource].as_resource().unwrap().actions["list"];
    let action = doc[list].as_action().unwrap();
    assert_eq!(action.traits, vec!["paginated".to_string()]);
    assert!(doc.child(action.params.unwrap(), "page").is_some());
}

#[test]
fn test_reset_makes_runs_independent() {
    let mut session = Session::new();
    session.user_type("A", |s| {
        s.attribute("b", args!["Missing"]);
    });
    assert!(session.run().is_err());

    session.reset();
    assert!(!session.diagnostics().has_errors());
    assert!(session.document().lookup_type("A").is_none());
    session.user_type("A", |s| {
        s.attribute("id", args![Primitive::Integer]);
    });
    let doc = run_ok(&mut session);
    let a = doc.lookup_type("A").unwrap();
    assert!(doc.child(a, "b").is_none());
    assert!(doc.child(a, "id").is_some());
}

#[test]
fn test_collection_is_built_after_its_element() {
    let mut session = Session::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let (element_log, resource_log, collection_log) = (order.clone(), order.clone(), order.clone());
    let collection = Rc::new(Cell::new(None));
    let found = collection.clone();
    session.resource("bottle", move |s| {
        resource_log.borrow_mut().push("resource");
        let id = s.collection_of_with("application/vnd.bottle", move |_| {
            collection_log.borrow_mut().push("collection");
        });
        assert_eq!(s.collection_of("application/vnd.bottle+json"), id);
        found.set(id);
    });
    session.media_type("application/vnd.bottle", move |s| {
        element_log.borrow_mut().push("element");
        s.type_name("BottleMedia");
        s.attributes(|s| {
            s.attribute("id", args![Primitive::Integer]);
        });
    });
    let doc = run_ok(&mut session);
    assert_eq!(*order.borrow(), vec!["resource", "element", "collection"]);

    let collection = collection.get().unwrap();
    assert_eq!(
        doc.lookup_media_type("application/vnd.bottle; type=collection"),
        Some(collection)
    );
    let media = doc[collection].as_media_type().unwrap();
    assert_eq!(media.type_name, "BottleMediaCollection");
    assert!(matches!(media.attribute.ty, Some(DataType::Array(_))));
}

#[test]
fn test_collection_of_unknown_media_type() {
    let mut session = Session::new();
    session.resource("bottle", |s| {
        assert_eq!(s.collection_of("application/vnd.missing"), None);
    });
    assert!(!session.run_all());
    let errors: Vec<_> = session.diagnostics().iter().map(|d| d.error.clone()).collect();
    assert_eq!(
        errors,
        vec![DslError::InvalidArgument {
            dsl: "CollectionOf".to_string(),
            expected: "media type or media type identifier".to_string(),
            actual: "\"application/vnd.missing\"".to_string(),
        }]
    );
}
