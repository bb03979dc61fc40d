use crate::error::SourceLocation;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::{self, Display};

/// Identity of an entity in a [`Document`](crate::registry::Document).
///
/// Identities are handed out before an entity's contents are built, which is
/// what lets definitions refer to each other regardless of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Integer,
    Number,
    String,
    DateTime,
    Uuid,
    Any,
    File,
}

impl Primitive {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::DateTime => "datetime",
            Primitive::Uuid => "uuid",
            Primitive::Any => "any",
            Primitive::File => "file",
        }
    }

    /// Whether `value` is a legal literal (default, example, enum value) for this primitive.
    #[must_use]
    pub fn is_compatible(self, value: &Value) -> bool {
        Kind::from(self).accepts(value)
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The shape of a type once user types have been followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Boolean,
    Integer,
    Number,
    String,
    DateTime,
    Uuid,
    Any,
    File,
    Object,
    Array,
    Map,
    /// Not known yet: missing, or a name that has not been resolved.
    Unknown,
}

impl Kind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::DateTime => "datetime",
            Kind::Uuid => "uuid",
            Kind::Any => "any",
            Kind::File => "file",
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Map => "map",
            Kind::Unknown => "unresolved",
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        self != Kind::Unknown
    }

    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(self, Kind::String | Kind::DateTime | Kind::Uuid)
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Integer | Kind::Number)
    }

    #[must_use]
    pub fn has_length(self) -> bool {
        self.is_string() || matches!(self, Kind::Array | Kind::Map)
    }

    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::Boolean => value.is_boolean(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::Number => value.is_number(),
            Kind::String | Kind::DateTime | Kind::Uuid | Kind::File => value.is_string(),
            Kind::Object | Kind::Map => value.is_object(),
            Kind::Array => value.is_array(),
            Kind::Any | Kind::Unknown => true,
        }
    }
}

impl From<Primitive> for Kind {
    fn from(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Boolean => Kind::Boolean,
            Primitive::Integer => Kind::Integer,
            Primitive::Number => Kind::Number,
            Primitive::String => Kind::String,
            Primitive::DateTime => Kind::DateTime,
            Primitive::Uuid => Kind::Uuid,
            Primitive::Any => Kind::Any,
            Primitive::File => Kind::File,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Primitive(Primitive),
    /// Ordered child attributes.
    Object(IndexMap<String, EntityId>),
    Array(EntityId),
    Map {
        key: EntityId,
        elem: EntityId,
    },
    /// A user type or media type, by identity.
    User(EntityId),
    /// A by-name reference that finalization has not resolved yet.
    Pending(String),
}

impl DataType {
    #[must_use]
    pub fn object() -> Self {
        DataType::Object(IndexMap::new())
    }
}

impl From<Primitive> for DataType {
    fn from(primitive: Primitive) -> Self {
        DataType::Primitive(primitive)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub values: Option<Vec<Value>>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub required: Vec<String>,
}

impl Validation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Validation::default()
    }

    pub fn add_required(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }

    /// Fills every rule this validation does not set from `base`.
    pub fn inherit(&mut self, base: &Validation) {
        if self.values.is_none() {
            self.values.clone_from(&base.values);
        }
        if self.format.is_none() {
            self.format.clone_from(&base.format);
        }
        if self.pattern.is_none() {
            self.pattern.clone_from(&base.pattern);
        }
        self.minimum = self.minimum.or(base.minimum);
        self.maximum = self.maximum.or(base.maximum);
        self.min_length = self.min_length.or(base.min_length);
        self.max_length = self.max_length.or(base.max_length);
        for name in &base.required {
            self.add_required(name.clone());
        }
    }
}

/// Free-form key to values annotations carried through to generators.
pub type Metadata = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDef {
    pub ty: Option<DataType>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub validation: Validation,
    pub metadata: Metadata,
    /// Type whose like-named attributes fill in what this one leaves out.
    pub reference: Option<DataType>,
    /// View used when this attribute's media type is rendered.
    pub view: Option<String>,
}

impl AttributeDef {
    #[must_use]
    pub fn with_type(ty: DataType) -> Self {
        AttributeDef {
            ty: Some(ty),
            ..AttributeDef::default()
        }
    }

    /// Child attributes when the type is an inline object.
    #[must_use]
    pub fn children(&self) -> Option<&IndexMap<String, EntityId>> {
        match &self.ty {
            Some(DataType::Object(children)) => Some(children),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTypeDef {
    pub attribute: AttributeDef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkDef {
    /// View of the linked media type used to render the link.
    pub view: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTypeDef {
    pub identifier: String,
    pub type_name: String,
    pub attribute: AttributeDef,
    pub views: IndexMap<String, EntityId>,
    pub links: IndexMap<String, LinkDef>,
    /// Projected media types keyed by view name.
    pub projections: IndexMap<String, EntityId>,
    /// Set on media types derived by projecting another one through a view.
    pub projected_from: Option<EntityId>,
}

/// A named selection of a media type's attributes.
///
/// The attribute is an object whose members carry no type of their own; they
/// name attributes of the media type and may override the view used for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDef {
    pub attribute: AttributeDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub full_path: Option<String>,
    pub wildcards: Vec<String>,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Route {
            method,
            path: path.into(),
            full_path: None,
            wildcards: Vec::new(),
        }
    }

    /// Paths starting with `//` ignore the resource and API base paths.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("//")
    }
}

/// Media of a resource or response: a media type entity, or an identifier
/// that names no media type in the design (e.g. `text/plain`).
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    Entity(EntityId),
    Identifier(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiDef {
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub base_path: Option<String>,
    pub params: Option<EntityId>,
    pub headers: Option<EntityId>,
    pub responses: IndexMap<String, EntityId>,
    pub traits: Vec<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceDef {
    pub description: Option<String>,
    pub base_path: Option<String>,
    pub parent: Option<String>,
    pub canonical_action: Option<String>,
    pub media: Option<MediaRef>,
    pub default_view: Option<String>,
    pub actions: IndexMap<String, EntityId>,
    pub responses: IndexMap<String, EntityId>,
    pub errors: IndexMap<String, EntityId>,
    pub params: Option<EntityId>,
    pub headers: Option<EntityId>,
    pub traits: Vec<String>,
    pub metadata: Metadata,
    pub full_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionDef {
    pub description: Option<String>,
    pub routes: Vec<Route>,
    pub params: Option<EntityId>,
    pub payload: Option<EntityId>,
    pub headers: Option<EntityId>,
    pub responses: IndexMap<String, EntityId>,
    pub errors: IndexMap<String, EntityId>,
    pub traits: Vec<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDef {
    pub status: Option<u16>,
    pub description: Option<String>,
    pub media: Option<MediaRef>,
    pub view: Option<String>,
    /// Body type given in the definition; takes precedence over the type of the media.
    pub ty: Option<DataType>,
    pub headers: Option<EntityId>,
    pub metadata: Metadata,
    /// Still exactly the built-in response it was copied from.
    pub standard: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Api(ApiDef),
    UserType(UserTypeDef),
    MediaType(MediaTypeDef),
    Resource(ResourceDef),
    Action(ActionDef),
    Response(ResponseDef),
    Attribute(AttributeDef),
    View(ViewDef),
}

/// Payload-free discriminant of [`EntityKind`], used for context dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Api,
    UserType,
    MediaType,
    Resource,
    Action,
    Response,
    Attribute,
    View,
}

impl EntityKind {
    #[must_use]
    pub fn tag(&self) -> EntityTag {
        match self {
            EntityKind::Api(_) => EntityTag::Api,
            EntityKind::UserType(_) => EntityTag::UserType,
            EntityKind::MediaType(_) => EntityTag::MediaType,
            EntityKind::Resource(_) => EntityTag::Resource,
            EntityKind::Action(_) => EntityTag::Action,
            EntityKind::Response(_) => EntityTag::Response,
            EntityKind::Attribute(_) => EntityTag::Attribute,
            EntityKind::View(_) => EntityTag::View,
        }
    }

    #[must_use]
    pub fn attribute(&self) -> Option<&AttributeDef> {
        match self {
            EntityKind::UserType(t) => Some(&t.attribute),
            EntityKind::MediaType(m) => Some(&m.attribute),
            EntityKind::Attribute(a) => Some(a),
            EntityKind::View(v) => Some(&v.attribute),
            _ => None,
        }
    }

    pub fn attribute_mut(&mut self) -> Option<&mut AttributeDef> {
        match self {
            EntityKind::UserType(t) => Some(&mut t.attribute),
            EntityKind::MediaType(m) => Some(&mut m.attribute),
            EntityKind::Attribute(a) => Some(a),
            EntityKind::View(v) => Some(&mut v.attribute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub parent: Option<EntityId>,
    pub location: SourceLocation,
    pub kind: EntityKind,
}

impl Entity {
    #[must_use]
    pub fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    #[must_use]
    pub fn attribute(&self) -> Option<&AttributeDef> {
        self.kind.attribute()
    }

    pub fn attribute_mut(&mut self) -> Option<&mut AttributeDef> {
        self.kind.attribute_mut()
    }

    #[must_use]
    pub fn as_media_type(&self) -> Option<&MediaTypeDef> {
        match &self.kind {
            EntityKind::MediaType(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_resource(&self) -> Option<&ResourceDef> {
        match &self.kind {
            EntityKind::Resource(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_action(&self) -> Option<&ActionDef> {
        match &self.kind {
            EntityKind::Action(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_response(&self) -> Option<&ResponseDef> {
        match &self.kind {
            EntityKind::Response(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_api(&self) -> Option<&ApiDef> {
        match &self.kind {
            EntityKind::Api(a) => Some(a),
            _ => None,
        }
    }
}
