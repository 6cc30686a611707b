//! Shape module - wire-level structure of request and response types
//!
//! A [`Shape`] says what a value looks like once encoded: a primitive, a list,
//! a string-keyed map, or a named object with fields. Types describe
//! themselves by implementing [`Shaped`]; containers and primitives are
//! covered by the impls at the bottom of this module.
//!
//! # Example
//!
//! ```
//! use apiserve_domain::{Field, Shape, Shaped};
//!
//! #[derive(Default)]
//! struct SayHelloRequest {
//!     name: String,
//! }
//!
//! impl Shaped for SayHelloRequest {
//!     fn shape() -> Shape {
//!         Shape::object::<Self>("SayHelloRequest", || {
//!             vec![Field::new::<String>("name").required().description("Required Name")]
//!         })
//!     }
//! }
//!
//! assert!(SayHelloRequest::shape().is_object());
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// UTF-8 text
    String,
    /// Signed or unsigned integer of any width
    Integer,
    /// Floating point number
    Number,
    /// `true` / `false`
    Boolean,
}

impl Primitive {
    /// Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
        }
    }
}

/// Structure of a value on the wire
#[derive(Debug, Clone)]
pub enum Shape {
    /// Primitive scalar
    Primitive(Primitive),
    /// Ordered sequence of one element shape
    List(Box<Shape>),
    /// Keyed collection; only string keys can be described
    Map {
        /// Key shape
        key: Box<Shape>,
        /// Value shape
        value: Box<Shape>,
    },
    /// Named object with fields
    Object(ObjectShape),
    /// Kind with no wire representation (channels, callbacks, ...)
    Unsupported(&'static str),
}

impl Shape {
    /// Describe a named object whose fields are produced by `fields`.
    ///
    /// The field list is deferred so that self-referential types terminate;
    /// `T` supplies the origin identity used to detect name collisions.
    pub fn object<T: ?Sized + 'static>(name: &'static str, fields: fn() -> Vec<Field>) -> Self {
        Shape::Object(ObjectShape {
            name,
            origin: std::any::type_name::<T>(),
            fields,
            opaque: false,
        })
    }

    /// Describe an object whose contents are not declared (interface-like).
    pub fn opaque<T: ?Sized + 'static>(name: &'static str) -> Self {
        Shape::Object(ObjectShape {
            name,
            origin: std::any::type_name::<T>(),
            fields: Vec::new,
            opaque: true,
        })
    }

    /// List of `T`
    pub fn list_of<T: Shaped + ?Sized>() -> Self {
        Shape::List(Box::new(T::shape()))
    }

    /// Map from `K` to `V`
    pub fn map_of<K: Shaped + ?Sized, V: Shaped + ?Sized>() -> Self {
        Shape::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        }
    }

    /// Short kind name, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Primitive(p) => p.as_str(),
            Shape::List(_) => "list",
            Shape::Map { .. } => "map",
            Shape::Object(_) => "object",
            Shape::Unsupported(kind) => kind,
        }
    }

    /// Whether this shape is a named object
    pub fn is_object(&self) -> bool {
        matches!(self, Shape::Object(_))
    }

    /// Object details, if this is an object
    pub fn as_object(&self) -> Option<&ObjectShape> {
        match self {
            Shape::Object(object) => Some(object),
            _ => None,
        }
    }
}

/// A named object shape
#[derive(Debug, Clone, Copy)]
pub struct ObjectShape {
    /// Bare type name (e.g. `SayHelloRequest`)
    pub name: &'static str,
    /// Identity of the declaring type, unique per Rust type
    pub origin: &'static str,
    /// Deferred field list
    pub fields: fn() -> Vec<Field>,
    /// Interface-like object without declared fields
    pub opaque: bool,
}

impl ObjectShape {
    /// Produce the declared fields
    pub fn fields(&self) -> Vec<Field> {
        if self.opaque {
            return Vec::new();
        }
        (self.fields)()
    }
}

/// A field of an object shape, with its wire annotations
#[derive(Debug, Clone)]
pub struct Field {
    /// Identifier as declared in Rust
    pub ident: &'static str,
    /// Deferred shape of the field's type
    pub shape: fn() -> Shape,
    /// Explicit wire name; anything after a comma is an option and ignored
    pub rename: Option<&'static str>,
    /// Comma-separated validation rules, e.g. `"required,min=1"`
    pub validate: Option<&'static str>,
    /// Human-readable description
    pub description: Option<&'static str>,
    /// Embedded object whose fields are promoted into the parent
    pub embedded: bool,
    /// Excluded from the wire entirely
    pub skip: bool,
}

impl Field {
    /// Field of type `T`
    pub fn new<T: Shaped + ?Sized>(ident: &'static str) -> Self {
        Self {
            ident,
            shape: T::shape,
            rename: None,
            validate: None,
            description: None,
            embedded: false,
            skip: false,
        }
    }

    /// Embedded field of type `T`; its fields are flattened into the parent
    pub fn embed<T: Shaped + ?Sized>(ident: &'static str) -> Self {
        Self {
            embedded: true,
            ..Self::new::<T>(ident)
        }
    }

    /// Set the wire-name annotation (`"name"`, `"name,omitempty"`, `"-"`)
    pub fn rename(mut self, wire: &'static str) -> Self {
        self.rename = Some(wire);
        self
    }

    /// Set the validation annotation
    pub fn validate(mut self, rules: &'static str) -> Self {
        self.validate = Some(rules);
        self
    }

    /// Shorthand for `validate("required")`
    pub fn required(self) -> Self {
        self.validate("required")
    }

    /// Attach a description
    pub fn description(mut self, text: &'static str) -> Self {
        self.description = Some(text);
        self
    }

    /// Exclude the field from the wire
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Produce the field's shape
    pub fn shape(&self) -> Shape {
        (self.shape)()
    }

    /// Private-style fields (leading underscore) never reach the wire
    pub fn is_private(&self) -> bool {
        self.ident.starts_with('_')
    }

    /// Whether the validation annotation contains a `required` rule
    pub fn is_required(&self) -> bool {
        self.validate
            .map(|rules| rules.split(',').any(|rule| rule.trim() == "required"))
            .unwrap_or(false)
    }

    /// Name used on the wire, or `None` if the field is skipped.
    ///
    /// Defaults to the identifier with its first character lower-cased.
    pub fn wire_name(&self) -> Option<String> {
        if self.skip {
            return None;
        }
        let annotated = self
            .rename
            .and_then(|tag| tag.split(',').next())
            .unwrap_or("");
        match annotated {
            "-" => None,
            "" => Some(lower_first(self.ident)),
            name => Some(name.to_string()),
        }
    }
}

fn lower_first(ident: &str) -> String {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Types that can describe their wire shape.
///
/// The declared fields must match what serde writes: a field renamed with
/// `#[serde(rename = "..")]` needs the same name in [`Field::rename`], and a
/// `#[serde(flatten)]` field is declared with [`Field::embed`]. Method
/// registration rejects request and response types whose encoded default
/// value carries a key that no declared field names.
pub trait Shaped {
    /// The shape of values of this type
    fn shape() -> Shape;
}

macro_rules! primitive_shape {
    ($primitive:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Shaped for $ty {
                fn shape() -> Shape {
                    Shape::Primitive($primitive)
                }
            }
        )+
    };
}

primitive_shape!(Primitive::String => String, str, char);
primitive_shape!(Primitive::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
primitive_shape!(Primitive::Number => f32, f64);
primitive_shape!(Primitive::Boolean => bool);

// Pointer-like wrappers describe their pointee.
impl<T: Shaped + ?Sized> Shaped for &T {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped> Shaped for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped + ?Sized> Shaped for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped + ?Sized> Shaped for Arc<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped + ?Sized> Shaped for Rc<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped> Shaped for [T] {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<T: Shaped, const N: usize> Shaped for [T; N] {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<T: Shaped> Shaped for Vec<T> {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<T: Shaped> Shaped for VecDeque<T> {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<T: Shaped, S> Shaped for HashSet<T, S> {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<T: Shaped> Shaped for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::list_of::<T>()
    }
}

impl<K: Shaped, V: Shaped, S> Shaped for HashMap<K, V, S> {
    fn shape() -> Shape {
        Shape::map_of::<K, V>()
    }
}

impl<K: Shaped, V: Shaped> Shaped for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::map_of::<K, V>()
    }
}

impl<T> Shaped for std::sync::mpsc::Sender<T> {
    fn shape() -> Shape {
        Shape::Unsupported("channel")
    }
}

impl<T> Shaped for std::sync::mpsc::SyncSender<T> {
    fn shape() -> Shape {
        Shape::Unsupported("channel")
    }
}

impl<T> Shaped for std::sync::mpsc::Receiver<T> {
    fn shape() -> Shape {
        Shape::Unsupported("channel")
    }
}
