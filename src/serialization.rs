use crate::model::{
    AttributeDef, DataType, EntityId, EntityKind, MediaRef, Metadata, Route, Validation,
};
use crate::registry::Document;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Generator-facing snapshot of a finalized design.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(values) => Value::Array(values.iter().map(Value::from).collect()),
            serde_json::Value::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Object builder that leaves out absent and empty fields.
#[derive(Default)]
struct Fields(BTreeMap<String, Value>);

impl Fields {
    fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.0.insert(key.to_string(), value);
        self
    }

    fn text(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, Value::String(value.to_string()));
        }
        self
    }

    fn map(&mut self, key: &str, value: BTreeMap<String, Value>) -> &mut Self {
        if !value.is_empty() {
            self.set(key, Value::Object(value));
        }
        self
    }

    fn finish(&mut self) -> Value {
        Value::Object(std::mem::take(&mut self.0))
    }
}

fn strings<'a>(values: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(values.into_iter().cloned().map(Value::String).collect())
}

fn named(
    doc: &Document,
    entries: &IndexMap<String, EntityId>,
    render: fn(&Document, EntityId) -> Value,
) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(name, id)| (name.clone(), render(doc, *id)))
        .collect()
}

fn metadata_value(metadata: &Metadata) -> BTreeMap<String, Value> {
    metadata
        .iter()
        .map(|(key, values)| (key.clone(), strings(values)))
        .collect()
}

/// User types render by name and media types by identifier, which keeps
/// cyclic designs finite.
fn type_value(doc: &Document, ty: Option<&DataType>) -> Value {
    match ty {
        None => Value::Null,
        Some(DataType::Primitive(p)) => Value::String(p.name().to_string()),
        Some(DataType::Object(_)) => Value::String("object".to_string()),
        Some(DataType::Array(elem)) => Fields::default()
            .set("array_of", attribute_value(doc, *elem))
            .finish(),
        Some(DataType::Map { key, elem }) => Fields::default()
            .set("key", attribute_value(doc, *key))
            .set("elem", attribute_value(doc, *elem))
            .finish(),
        Some(DataType::User(id)) => Value::String(match &doc[*id].kind {
            EntityKind::MediaType(media) => media.identifier.clone(),
            _ => doc[*id].name.clone(),
        }),
        Some(DataType::Pending(name)) => Value::String(name.clone()),
    }
}

fn validation_fields(fields: &mut Fields, validation: &Validation) {
    if let Some(values) = &validation.values {
        fields.set("enum", Value::Array(values.iter().map(Value::from).collect()));
    }
    fields
        .text("format", validation.format.as_deref())
        .text("pattern", validation.pattern.as_deref());
    if let Some(minimum) = validation.minimum {
        fields.set("minimum", Value::Number(minimum));
    }
    if let Some(maximum) = validation.maximum {
        fields.set("maximum", Value::Number(maximum));
    }
    if let Some(length) = validation.min_length {
        fields.set("min_length", Value::Integer(i64::try_from(length).unwrap_or(i64::MAX)));
    }
    if let Some(length) = validation.max_length {
        fields.set("max_length", Value::Integer(i64::try_from(length).unwrap_or(i64::MAX)));
    }
    if !validation.required.is_empty() {
        fields.set("required", strings(&validation.required));
    }
}

fn attribute_fields(doc: &Document, attr: &AttributeDef) -> Fields {
    let mut fields = Fields::default();
    fields
        .set("type", type_value(doc, attr.ty.as_ref()))
        .text("description", attr.description.as_deref())
        .text("view", attr.view.as_deref());
    if let Some(children) = attr.children() {
        fields.set("attributes", Value::Object(named(doc, children, attribute_value)));
    }
    if let Some(default) = &attr.default {
        fields.set("default", Value::from(default));
    }
    if let Some(example) = &attr.example {
        fields.set("example", Value::from(example));
    }
    validation_fields(&mut fields, &attr.validation);
    fields.map("metadata", metadata_value(&attr.metadata));
    fields
}

fn attribute_value(doc: &Document, id: EntityId) -> Value {
    match doc[id].attribute() {
        Some(attr) => attribute_fields(doc, attr).finish(),
        None => Value::Null,
    }
}

fn optional_attribute(fields: &mut Fields, doc: &Document, key: &str, id: Option<EntityId>) {
    if let Some(id) = id {
        fields.set(key, attribute_value(doc, id));
    }
}

fn media_type_value(doc: &Document, id: EntityId) -> Value {
    let Some(media) = doc[id].as_media_type() else {
        return Value::Null;
    };
    let mut fields = attribute_fields(doc, &media.attribute);
    fields
        .text("identifier", Some(&media.identifier))
        .text("type_name", Some(&media.type_name));
    let views = media
        .views
        .iter()
        .map(|(name, view)| {
            let members = doc[*view]
                .attribute()
                .and_then(AttributeDef::children)
                .map(|members| strings(members.keys()))
                .unwrap_or(Value::Array(Vec::new()));
            (name.clone(), members)
        })
        .collect();
    fields.map("views", views);
    let links = media
        .links
        .iter()
        .map(|(name, link)| (name.clone(), Value::String(link.view.clone())))
        .collect();
    fields.map("links", links);
    fields.map("projections", named(doc, &media.projections, media_type_value));
    fields.finish()
}

fn media_value(media: Option<&MediaRef>, doc: &Document) -> Option<Value> {
    media.map(|media| match media {
        MediaRef::Entity(id) => type_value(doc, Some(&DataType::User(*id))),
        MediaRef::Identifier(identifier) => Value::String(identifier.clone()),
    })
}

fn route_value(route: &Route) -> Value {
    let mut fields = Fields::default();
    fields
        .text("method", Some(route.method.as_str()))
        .text("path", Some(&route.path))
        .text("full_path", route.full_path.as_deref());
    if !route.wildcards.is_empty() {
        fields.set("wildcards", strings(&route.wildcards));
    }
    fields.finish()
}

fn response_value(doc: &Document, id: EntityId) -> Value {
    let Some(response) = doc[id].as_response() else {
        return Value::Null;
    };
    let mut fields = Fields::default();
    if let Some(status) = response.status {
        fields.set("status", Value::Integer(i64::from(status)));
    }
    if let Some(media) = media_value(response.media.as_ref(), doc) {
        fields.set("media", media);
    }
    if let Some(ty) = &response.ty {
        fields.set("type", type_value(doc, Some(ty)));
    }
    fields
        .text("description", response.description.as_deref())
        .text("view", response.view.as_deref());
    optional_attribute(&mut fields, doc, "headers", response.headers);
    fields.map("metadata", metadata_value(&response.metadata));
    fields.finish()
}

fn action_value(doc: &Document, id: EntityId) -> Value {
    let Some(action) = doc[id].as_action() else {
        return Value::Null;
    };
    let mut fields = Fields::default();
    fields
        .text("description", action.description.as_deref())
        .set(
            "routes",
            Value::Array(action.routes.iter().map(route_value).collect()),
        );
    optional_attribute(&mut fields, doc, "params", action.params);
    optional_attribute(&mut fields, doc, "payload", action.payload);
    optional_attribute(&mut fields, doc, "headers", action.headers);
    fields
        .map("responses", named(doc, &action.responses, response_value))
        .map("errors", named(doc, &action.errors, attribute_value))
        .map("metadata", metadata_value(&action.metadata));
    if !action.traits.is_empty() {
        fields.set("traits", strings(&action.traits));
    }
    fields.finish()
}

fn resource_value(doc: &Document, id: EntityId) -> Value {
    let Some(resource) = doc[id].as_resource() else {
        return Value::Null;
    };
    let mut fields = Fields::default();
    fields
        .text("description", resource.description.as_deref())
        .text("base_path", resource.base_path.as_deref())
        .text("full_path", resource.full_path.as_deref())
        .text("parent", resource.parent.as_deref())
        .text("canonical_action", resource.canonical_action.as_deref())
        .text("default_view", resource.default_view.as_deref());
    if let Some(media) = media_value(resource.media.as_ref(), doc) {
        fields.set("media", media);
    }
    optional_attribute(&mut fields, doc, "params", resource.params);
    optional_attribute(&mut fields, doc, "headers", resource.headers);
    fields
        .map("actions", named(doc, &resource.actions, action_value))
        .map("responses", named(doc, &resource.responses, response_value))
        .map("errors", named(doc, &resource.errors, attribute_value))
        .map("metadata", metadata_value(&resource.metadata));
    if !resource.traits.is_empty() {
        fields.set("traits", strings(&resource.traits));
    }
    fields.finish()
}

fn api_value(doc: &Document, id: EntityId) -> Value {
    let Some(api) = doc[id].as_api() else {
        return Value::Null;
    };
    let mut fields = Fields::default();
    fields
        .text("name", Some(&doc[id].name))
        .text("title", api.title.as_deref())
        .text("description", api.description.as_deref())
        .text("version", api.version.as_deref())
        .text("base_path", api.base_path.as_deref());
    optional_attribute(&mut fields, doc, "params", api.params);
    optional_attribute(&mut fields, doc, "headers", api.headers);
    fields
        .map("responses", named(doc, &api.responses, response_value))
        .map("metadata", metadata_value(&api.metadata));
    if !api.traits.is_empty() {
        fields.set("traits", strings(&api.traits));
    }
    fields.finish()
}

pub(crate) fn to_value(doc: &Document) -> Value {
    let mut root = Fields::default();
    if let Some(api) = doc.api() {
        root.set("api", api_value(doc, api));
    }
    root.set(
        "types",
        Value::Object(
            doc.types()
                .map(|(name, id)| (name.to_string(), attribute_value(doc, id)))
                .collect(),
        ),
    )
    .set(
        "media_types",
        Value::Object(
            doc.media_types()
                .filter_map(|(_, id)| {
                    let identifier = doc[id].as_media_type()?.identifier.clone();
                    Some((identifier, media_type_value(doc, id)))
                })
                .collect(),
        ),
    )
    .set(
        "resources",
        Value::Object(
            doc.resources()
                .map(|(name, id)| (name.to_string(), resource_value(doc, id)))
                .collect(),
        ),
    );
    root.finish()
}
