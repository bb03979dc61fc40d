use crate::engine::Session;
use crate::error::DslError;
use crate::model::{EntityId, Primitive};
use crate::resolver::TypeRef;
use crate::step::Routine;
use std::fmt;

/// One positional argument of a builder that accepts mixed arguments.
///
/// Builders such as [`Session::attribute`] take a type, a description and
/// a nested body in flexible combinations; the [`args!`](crate::args!)
/// macro converts each expression into an `Arg`.
pub enum Arg {
    Type(TypeRef),
    Text(String),
    Body(Routine),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Type(t) => f.debug_tuple("Type").field(t).finish(),
            Arg::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Arg::Body(_) => f.write_str("Body(..)"),
        }
    }
}

impl Arg {
    fn describe(&self) -> String {
        match self {
            Arg::Type(t) => format!("type {t}"),
            Arg::Text(s) => format!("{s:?}"),
            Arg::Body(_) => "func()".to_string(),
        }
    }
}

impl From<TypeRef> for Arg {
    fn from(reference: TypeRef) -> Self {
        Arg::Type(reference)
    }
}

impl From<Primitive> for Arg {
    fn from(primitive: Primitive) -> Self {
        Arg::Type(TypeRef::Primitive(primitive))
    }
}

impl From<EntityId> for Arg {
    fn from(id: EntityId) -> Self {
        Arg::Type(TypeRef::Entity(id))
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Arg::Text(text.to_string())
    }
}

impl From<String> for Arg {
    fn from(text: String) -> Self {
        Arg::Text(text)
    }
}

/// Wraps a nested definition body as an argument.
pub fn body(routine: impl FnOnce(&mut Session) + 'static) -> Arg {
    Arg::Body(Box::new(routine))
}

/// Builds a `Vec<Arg>` from heterogeneous expressions.
///
/// ```ignore
/// s.attribute("name", args![Primitive::String, "The name", body(|s| s.min_length(1))]);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::args::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::args::Arg::from($arg)),+]
    };
}

#[derive(Default)]
pub(crate) struct AttributeArgs {
    pub ty: Option<TypeRef>,
    pub description: Option<String>,
    pub body: Option<Routine>,
}

#[derive(Default)]
pub(crate) struct ResponseArgs {
    pub ty: Option<TypeRef>,
    pub params: Vec<String>,
    pub body: Option<Routine>,
}

fn expected_attribute_arg(position: usize, arity: usize) -> &'static str {
    match (position, arity) {
        (0, 1) => "type, type name or func()",
        (0, _) => "type or type name",
        (1, 2) => "description or func()",
        (1, _) => "description",
        _ => "func()",
    }
}

impl Session {
    #[track_caller]
    fn invalid_argument(&mut self, dsl: &str, expected: &str, arg: &Arg) {
        self.record(DslError::InvalidArgument {
            dsl: dsl.to_string(),
            expected: expected.to_string(),
            actual: arg.describe(),
        });
    }

    /// Splits `(type?, description?, body?)` arguments.
    ///
    /// With one argument it is a type, a type name or a body; with two, a
    /// type followed by a description or a body; with three, a type, a
    /// description and a body. A string in type position names a type.
    #[track_caller]
    pub(crate) fn parse_attribute_args(&mut self, dsl: &str, args: Vec<Arg>) -> Option<AttributeArgs> {
        let arity = args.len();
        if arity > 3 {
            self.record(DslError::TooManyArguments {
                dsl: dsl.to_string(),
            });
            return None;
        }
        let mut parsed = AttributeArgs::default();
        let mut valid = true;
        for (position, arg) in args.into_iter().enumerate() {
            match (position, arity, arg) {
                (0, _, Arg::Type(t)) => parsed.ty = Some(t),
                (0, _, Arg::Text(name)) => parsed.ty = Some(TypeRef::Named(name)),
                (0, 1, Arg::Body(routine)) | (1, 2, Arg::Body(routine)) | (2, 3, Arg::Body(routine)) => {
                    parsed.body = Some(routine);
                }
                (1, 2 | 3, Arg::Text(description)) => parsed.description = Some(description),
                (position, arity, other) => {
                    self.invalid_argument(dsl, expected_attribute_arg(position, arity), &other);
                    valid = false;
                }
            }
        }
        valid.then_some(parsed)
    }

    /// Splits `(type?, template params..., body?)` arguments of a response.
    #[track_caller]
    pub(crate) fn parse_response_args(&mut self, dsl: &str, mut args: Vec<Arg>) -> Option<ResponseArgs> {
        let mut parsed = ResponseArgs::default();
        if matches!(args.last(), Some(Arg::Body(_))) {
            if let Some(Arg::Body(routine)) = args.pop() {
                parsed.body = Some(routine);
            }
        }
        let mut valid = true;
        for (position, arg) in args.into_iter().enumerate() {
            match (position, arg) {
                (0, Arg::Type(t)) => parsed.ty = Some(t),
                (_, Arg::Text(param)) => parsed.params.push(param),
                (_, other) => {
                    self.invalid_argument(dsl, "string template parameter", &other);
                    valid = false;
                }
            }
        }
        valid.then_some(parsed)
    }
}
