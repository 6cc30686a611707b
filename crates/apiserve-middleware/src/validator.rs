//! Request validation

use apiserve_domain::synthesizer::flatten_fields;
use apiserve_domain::{ApiError, SchemaError, Shape};
use apiserve_server::{CallContext, CallValues, Interceptor, Next, RequestParts};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Rule tag reported for missing required fields
pub const REQUIRED: &str = "required";

/// A single failed rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path from the request type to the field, e.g. `SayHelloRequest.name`
    pub namespace: String,
    /// Wire name of the field
    pub field: String,
    /// Failed rule
    pub tag: &'static str,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error:Field validation for '{}' failed on the '{}' tag",
            self.namespace, self.field, self.tag
        )
    }
}

/// Rejects unary requests whose `required` fields are missing or zero.
///
/// Stream calls pass through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

#[async_trait]
impl Interceptor for Validator {
    async fn intercept(
        &self,
        ctx: &CallContext,
        _parts: &RequestParts,
        values: &mut CallValues,
        next: Next<'_>,
    ) -> Result<(), ApiError> {
        if let Some(request) = values.request() {
            let value = request.to_json().map_err(ApiError::from_error)?;
            let violations = validate(&value, &request.describe()).map_err(ApiError::from_error)?;
            if !violations.is_empty() {
                debug!("{} rejected {} invalid field(s)", ctx.path(), violations.len());
                return Err(ApiError::bad_request(join(&violations)));
            }
        }
        next.run(ctx, values).await
    }
}

/// Check an encoded value against the rules declared on its shape
pub fn validate(value: &Value, shape: &Shape) -> Result<Vec<Violation>, SchemaError> {
    let mut violations = Vec::new();
    let root = match shape {
        Shape::Object(object) => object.name,
        _ => "",
    };
    walk(value, shape, root, &mut violations)?;
    Ok(violations)
}

fn walk(value: &Value, shape: &Shape, path: &str, out: &mut Vec<Violation>) -> Result<(), SchemaError> {
    match shape {
        Shape::Object(object) => {
            let Value::Object(map) = value else {
                return Ok(());
            };
            for field in flatten_fields(object)? {
                if field.is_private() {
                    continue;
                }
                let Some(wire) = field.wire_name() else {
                    continue;
                };
                let field_shape = field.shape();
                let child = map.get(&wire);
                let namespace = format!("{}.{}", path, wire);

                if field.is_required() && is_zero(child, &field_shape) {
                    out.push(Violation {
                        namespace,
                        field: wire,
                        tag: REQUIRED,
                    });
                    continue;
                }
                if let Some(child) = child {
                    walk(child, &field_shape, &namespace, out)?;
                }
            }
        }
        Shape::List(element) => {
            if let Value::Array(items) = value {
                for (i, item) in items.iter().enumerate() {
                    walk(item, element, &format!("{}[{}]", path, i), out)?;
                }
            }
        }
        Shape::Map { value: element, .. } => {
            if let Value::Object(entries) = value {
                for (key, item) in entries {
                    walk(item, element, &format!("{}[{}]", path, key), out)?;
                }
            }
        }
        Shape::Primitive(_) | Shape::Unsupported(_) => {}
    }
    Ok(())
}

/// Zero values: absent, null, false, 0, "" and empty lists or maps.
/// Objects are never zero.
fn is_zero(value: Option<&Value>, shape: &Shape) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(entries)) => matches!(shape, Shape::Map { .. }) && entries.is_empty(),
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiserve_domain::{Field, Shaped};
    use serde_json::json;
    use std::collections::HashMap;

    struct Address;

    impl Shaped for Address {
        fn shape() -> Shape {
            Shape::object::<Self>("Address", || vec![Field::new::<String>("city").required()])
        }
    }

    struct Audit;

    impl Shaped for Audit {
        fn shape() -> Shape {
            Shape::object::<Self>("Audit", || vec![Field::new::<String>("actor").required()])
        }
    }

    struct Signup;

    impl Shaped for Signup {
        fn shape() -> Shape {
            Shape::object::<Self>("Signup", || {
                vec![
                    Field::new::<String>("name").required(),
                    Field::new::<u32>("age"),
                    Field::new::<Vec<String>>("tags").required(),
                    Field::new::<Address>("home"),
                    Field::new::<Vec<Address>>("others"),
                    Field::new::<HashMap<String, Address>>("byLabel"),
                    Field::embed::<Audit>("audit"),
                    Field::new::<String>("_secret").required(),
                    Field::new::<String>("ignored").skip().required(),
                ]
            })
        }
    }

    fn keys(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.namespace.as_str()).collect()
    }

    #[test]
    fn test_valid_request() {
        let value = json!({
            "name": "bob",
            "tags": ["a"],
            "home": { "city": "Oslo" },
            "actor": "admin"
        });
        assert!(validate(&value, &Signup::shape()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_and_zero_fields() {
        let value = json!({ "name": "", "tags": [] });
        let violations = validate(&value, &Signup::shape()).unwrap();
        assert_eq!(keys(&violations), vec!["Signup.name", "Signup.tags", "Signup.actor"]);
        assert_eq!(
            violations[0].to_string(),
            "Key: 'Signup.name' Error:Field validation for 'name' failed on the 'required' tag"
        );
    }

    #[test]
    fn test_nested_objects_lists_and_maps() {
        let value = json!({
            "name": "bob",
            "tags": ["a"],
            "actor": "admin",
            "home": { "city": "" },
            "others": [{ "city": "Rome" }, {}],
            "byLabel": { "work": { "city": null } }
        });
        let violations = validate(&value, &Signup::shape()).unwrap();
        assert_eq!(
            keys(&violations),
            vec!["Signup.home.city", "Signup.others[1].city", "Signup.byLabel[work].city"]
        );
    }

    #[test]
    fn test_zero_values() {
        let string = Shape::Primitive(apiserve_domain::Primitive::String);
        let map = <HashMap<String, u8>>::shape();
        assert!(is_zero(None, &string));
        assert!(is_zero(Some(&json!(0)), &string));
        assert!(is_zero(Some(&json!(0.0)), &string));
        assert!(is_zero(Some(&json!(false)), &string));
        assert!(!is_zero(Some(&json!(-1)), &string));
        assert!(!is_zero(Some(&json!(true)), &string));
        assert!(is_zero(Some(&json!({})), &map));
        assert!(!is_zero(Some(&json!({})), &Address::shape()));
    }

    #[test]
    fn test_join_messages() {
        let violations = validate(&json!({}), &Address::shape()).unwrap();
        assert_eq!(
            join(&violations),
            "Key: 'Address.city' Error:Field validation for 'city' failed on the 'required' tag"
        );
    }
}
