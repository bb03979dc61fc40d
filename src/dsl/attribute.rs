use super::{Slot, ATTRIBUTE_LIKE};
use crate::args::Arg;
use crate::engine::Session;
use crate::error::DslError;
use crate::model::{AttributeDef, DataType, EntityId, EntityKind, EntityTag, Kind, Primitive};
use crate::resolver::TypeRef;
use crate::validate::{EXPECT_LENGTH, EXPECT_NUMBER, EXPECT_OBJECT, EXPECT_STRING};
use regex::Regex;
use serde_json::Value;

/// Formats understood by [`Session::format`].
pub const SUPPORTED_FORMATS: &[&str] = &[
    "cidr",
    "date-time",
    "email",
    "hostname",
    "ipv4",
    "ipv6",
    "ip",
    "mac",
    "regexp",
    "uri",
];

const ATTRIBUTE_CONTEXTS: &[EntityTag] = &[
    EntityTag::UserType,
    EntityTag::MediaType,
    EntityTag::Attribute,
    EntityTag::View,
    EntityTag::Api,
    EntityTag::Resource,
    EntityTag::Action,
    EntityTag::Response,
];

impl Session {
    /// Defines an attribute.
    ///
    /// Inside a type, media type or attribute this adds a child attribute;
    /// inside a view it selects an attribute of the media type; inside an
    /// API, resource or action it adds a parameter. Arguments follow the
    /// `(type?, description?, body?)` shape described on [`Arg`].
    #[track_caller]
    pub fn attribute(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        self.attribute_in("Attribute", Slot::Params, name, args)
    }

    #[track_caller]
    pub fn member(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        self.attribute_in("Member", Slot::Params, name, args)
    }

    #[track_caller]
    pub fn param(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        self.attribute_in("Param", Slot::Params, name, args)
    }

    /// Like [`Session::attribute`], but adds to the headers of an API,
    /// resource, action or response.
    #[track_caller]
    pub fn header(&mut self, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        self.attribute_in("Header", Slot::Headers, name, args)
    }

    #[track_caller]
    fn attribute_in(&mut self, dsl: &str, slot: Slot, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        let (owner, tag) = self.context_where(dsl, ATTRIBUTE_CONTEXTS)?;
        let parent = match tag {
            EntityTag::View => return self.select_member(owner, dsl, name, args),
            EntityTag::Response if slot == Slot::Params => {
                self.incompatible(dsl);
                return None;
            }
            EntityTag::Api | EntityTag::Resource | EntityTag::Action | EntityTag::Response => {
                let location = self.here();
                self.slot(owner, slot, location)?
            }
            _ => owner,
        };
        self.define_attribute(parent, dsl, name, args)
    }

    /// Adds the child attribute `name` to `parent`, which becomes an object
    /// if it has no type yet.
    #[track_caller]
    pub(crate) fn define_attribute(
        &mut self,
        parent: EntityId,
        dsl: &str,
        name: &str,
        args: Vec<Arg>,
    ) -> Option<EntityId> {
        let parsed = self.parse_attribute_args(dsl, args)?;
        let parent_type = self.doc[parent].attribute().and_then(|a| a.ty.clone());
        match parent_type {
            None => self.set_type(parent, DataType::object()),
            Some(DataType::Object(children)) => {
                if children.contains_key(name) {
                    self.record(DslError::DefinedTwice {
                        kind: "attribute".to_string(),
                        name: name.to_string(),
                    });
                    return None;
                }
            }
            Some(other) => {
                let kind = self.doc.kind_of(&other);
                self.record(DslError::InvalidValue {
                    dsl: dsl.to_string(),
                    message: format!("cannot define child attributes on attribute of type {kind}"),
                });
                return None;
            }
        }

        let location = self.here();
        let id = self.doc.alloc(
            name,
            Some(parent),
            location,
            EntityKind::Attribute(AttributeDef {
                description: parsed.description,
                ..AttributeDef::default()
            }),
        );
        if let Some(reference) = parsed.ty {
            let ty = self
                .resolve_type_ref(reference, id, dsl)
                .unwrap_or(DataType::Primitive(Primitive::Any));
            self.set_type(id, ty);
        }
        if let Some(DataType::Object(children)) =
            self.doc[parent].attribute_mut().and_then(|a| a.ty.as_mut())
        {
            children.insert(name.to_string(), id);
        }
        if let Some(body) = parsed.body {
            self.execute(id, body);
        }
        Some(id)
    }

    /// Selects the media type attribute `name` in the view being defined.
    #[track_caller]
    fn select_member(&mut self, view: EntityId, dsl: &str, name: &str, args: Vec<Arg>) -> Option<EntityId> {
        let parsed = self.parse_attribute_args(dsl, args)?;
        if let Some(ty) = parsed.ty {
            self.record(DslError::InvalidArgument {
                dsl: dsl.to_string(),
                expected: "func()".to_string(),
                actual: format!("type {ty}"),
            });
            return None;
        }
        let selected = self.doc[view]
            .attribute()
            .and_then(AttributeDef::children)
            .is_some_and(|members| members.contains_key(name));
        if selected {
            self.record(DslError::DefinedTwice {
                kind: "attribute".to_string(),
                name: name.to_string(),
            });
            return None;
        }
        let location = self.here();
        let id = self.doc.alloc(
            name,
            Some(view),
            location,
            EntityKind::Attribute(AttributeDef::default()),
        );
        if let Some(DataType::Object(members)) =
            self.doc[view].attribute_mut().and_then(|a| a.ty.as_mut())
        {
            members.insert(name.to_string(), id);
        }
        if let Some(body) = parsed.body {
            self.execute(id, body);
        }
        Some(id)
    }

    #[track_caller]
    fn validation_target(&mut self, dsl: &str) -> Option<(EntityId, Kind)> {
        let (id, _) = self.context_where(dsl, ATTRIBUTE_LIKE)?;
        Some((id, self.doc.attribute_kind(id)))
    }

    fn attribute_mut(&mut self, id: EntityId) -> Option<&mut AttributeDef> {
        self.doc[id].attribute_mut()
    }

    /// Marks child attributes as required. Applies to objects only.
    #[track_caller]
    pub fn required(&mut self, names: &[&str]) {
        let Some((id, kind)) = self.validation_target("Required") else {
            return;
        };
        if !self.check_kind("Required", kind, |k| k == Kind::Object, EXPECT_OBJECT) {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            for name in names {
                attr.validation.add_required(*name);
            }
        }
    }

    #[track_caller]
    pub fn default_value(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let Some((id, kind)) = self.validation_target("Default") else {
            return;
        };
        if !kind.accepts(&value) {
            self.record(DslError::InvalidValue {
                dsl: "Default".to_string(),
                message: format!("value {value} is incompatible with attribute of type {kind}"),
            });
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.default = Some(value);
        }
    }

    #[track_caller]
    pub fn example(&mut self, value: impl Into<Value>) {
        let value = value.into();
        let Some((id, kind)) = self.validation_target("Example") else {
            return;
        };
        if !kind.accepts(&value) {
            self.record(DslError::InvalidValue {
                dsl: "Example".to_string(),
                message: format!("value {value} is incompatible with attribute of type {kind}"),
            });
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.example = Some(value);
        }
    }

    /// Restricts the attribute to the given values.
    #[track_caller]
    pub fn enum_values<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let Some((id, kind)) = self.validation_target("Enum") else {
            return;
        };
        let mut valid = true;
        for value in values.iter().filter(|v| !kind.accepts(v)) {
            self.record(DslError::InvalidValue {
                dsl: "Enum".to_string(),
                message: format!("value {value} is incompatible with attribute of type {kind}"),
            });
            valid = false;
        }
        if !valid {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.validation.values = Some(values);
        }
    }

    /// Requires string values to follow one of [`SUPPORTED_FORMATS`].
    #[track_caller]
    pub fn format(&mut self, format: &str) {
        let Some((id, kind)) = self.validation_target("Format") else {
            return;
        };
        if !SUPPORTED_FORMATS.contains(&format) {
            self.record(DslError::InvalidValue {
                dsl: "Format".to_string(),
                message: format!("unknown format {format:?}"),
            });
            return;
        }
        if !self.check_kind("Format", kind, Kind::is_string, EXPECT_STRING) {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.validation.format = Some(format.to_string());
        }
    }

    #[track_caller]
    pub fn pattern(&mut self, pattern: &str) {
        let Some((id, kind)) = self.validation_target("Pattern") else {
            return;
        };
        if let Err(err) = Regex::new(pattern) {
            self.record(DslError::InvalidValue {
                dsl: "Pattern".to_string(),
                message: format!("invalid pattern {pattern:?}: {err}"),
            });
            return;
        }
        if !self.check_kind("Pattern", kind, Kind::is_string, EXPECT_STRING) {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.validation.pattern = Some(pattern.to_string());
        }
    }

    /// Accepts a number or a string holding one.
    #[track_caller]
    pub fn minimum(&mut self, value: impl Into<Value>) {
        if let Some((id, number)) = self.numeric_rule("Minimum", value.into()) {
            if let Some(attr) = self.attribute_mut(id) {
                attr.validation.minimum = Some(number);
            }
        }
    }

    /// Accepts a number or a string holding one.
    #[track_caller]
    pub fn maximum(&mut self, value: impl Into<Value>) {
        if let Some((id, number)) = self.numeric_rule("Maximum", value.into()) {
            if let Some(attr) = self.attribute_mut(id) {
                attr.validation.maximum = Some(number);
            }
        }
    }

    #[track_caller]
    fn numeric_rule(&mut self, dsl: &str, value: Value) -> Option<(EntityId, f64)> {
        let (id, kind) = self.validation_target(dsl)?;
        if !self.check_kind(dsl, kind, Kind::is_numeric, EXPECT_NUMBER) {
            return None;
        }
        let number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if number.is_none() {
            self.record(DslError::InvalidValue {
                dsl: dsl.to_string(),
                message: format!("invalid number value {value}"),
            });
        }
        Some((id, number?))
    }

    #[track_caller]
    pub fn min_length(&mut self, length: usize) {
        let Some((id, kind)) = self.validation_target("MinLength") else {
            return;
        };
        if !self.check_kind("MinLength", kind, Kind::has_length, EXPECT_LENGTH) {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.validation.min_length = Some(length);
        }
    }

    #[track_caller]
    pub fn max_length(&mut self, length: usize) {
        let Some((id, kind)) = self.validation_target("MaxLength") else {
            return;
        };
        if !self.check_kind("MaxLength", kind, Kind::has_length, EXPECT_LENGTH) {
            return;
        }
        if let Some(attr) = self.attribute_mut(id) {
            attr.validation.max_length = Some(length);
        }
    }

    /// Names the type whose like-named attributes fill in the types,
    /// descriptions, defaults and validations the children leave out.
    #[track_caller]
    pub fn reference(&mut self, reference: impl Into<TypeRef>) {
        let Some((id, _)) = self.context_where("Reference", ATTRIBUTE_LIKE) else {
            return;
        };
        let reference = match reference.into() {
            r @ (TypeRef::Named(_) | TypeRef::Entity(_)) => self.resolve_type_ref(r, id, "Reference"),
            other => {
                self.record(DslError::InvalidArgument {
                    dsl: "Reference".to_string(),
                    expected: "type or type name".to_string(),
                    actual: format!("type {other}"),
                });
                None
            }
        };
        if let (Some(reference), Some(attr)) = (reference, self.attribute_mut(id)) {
            attr.reference = Some(reference);
        }
    }
}
