use crate::config::EvalConfig;
use crate::engine::Session;
use crate::error::DesignError;
use crate::registry::Document;
use crate::serialization::{to_value, Value};
use serde::{Serialize, Serializer};
use std::path::Path;

/// A design that evaluated, finalized and validated without diagnostics.
///
/// Holds the finished [`Document`] and renders it for code generators.
#[derive(Debug)]
pub struct Design {
    document: Document,
}

impl Serialize for Design {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl Design {
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Snapshot of the design as a generic, serializable `Value`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        to_value(&self.document)
    }

    /// Renders the design as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Renders the design as YAML.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }
}

/// Evaluates the definitions registered by `define` with the default configuration.
///
/// # Errors
/// Returns [`DesignError::Design`] with every diagnostic recorded when the
/// design does not evaluate, finalize and validate cleanly.
pub fn evaluate(define: impl FnOnce(&mut Session)) -> Result<Design, DesignError> {
    evaluate_with(EvalConfig::default(), define)
}

/// Like [`evaluate`], with an explicit configuration.
///
/// # Errors
/// Returns [`DesignError::Design`] with every diagnostic recorded during the run.
pub fn evaluate_with(
    config: EvalConfig,
    define: impl FnOnce(&mut Session),
) -> Result<Design, DesignError> {
    let mut session = Session::with_config(config);
    define(&mut session);
    session.run()?;
    Ok(Design {
        document: session.into_document(),
    })
}

/// Like [`evaluate`], with the configuration loaded from a JSON or YAML file.
///
/// # Errors
/// Returns [`DesignError::Config`] when the file cannot be loaded and
/// [`DesignError::Design`] when the design is rejected.
pub fn evaluate_with_config_file(
    path: impl AsRef<Path>,
    define: impl FnOnce(&mut Session),
) -> Result<Design, DesignError> {
    let config = EvalConfig::load(path)?;
    evaluate_with(config, define)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::dsl::get;
    use crate::model::Primitive;

    #[test]
    fn test_simple_design_to_json() {
        let design = evaluate(|s| {
            s.api("cellar", |s| {
                s.title("Cellar");
                s.base_path("/cellar");
            });
            s.resource("bottle", |s| {
                s.base_path("/bottles");
                s.action("show", |s| {
                    s.routing([get("/:id")]);
                    s.params(|s| {
                        s.param("id", args![Primitive::Integer]);
                    });
                });
            });
        })
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&design.to_json().unwrap()).unwrap();
        assert_eq!(json["api"]["title"], "Cellar");
        assert_eq!(
            json["resources"]["bottle"]["actions"]["show"]["routes"][0]["full_path"],
            "/cellar/bottles/:id"
        );
        assert_eq!(
            json["resources"]["bottle"]["actions"]["show"]["params"]["attributes"]["id"]["type"],
            "integer"
        );
    }

    #[test]
    fn test_simple_design_to_yaml() {
        let design = evaluate(|s| {
            s.user_type("Bottle", |s| {
                s.attribute("name", args![Primitive::String]);
            });
        })
        .unwrap();
        let yaml = design.to_yaml().unwrap();
        assert!(yaml.contains("Bottle:"));
        assert!(yaml.contains("type: string"));
    }

    #[test]
    fn test_rejected_design() {
        let err = evaluate(|s| {
            s.user_type("T", |s| {
                s.attribute("x", args!["Missing"]);
            });
        })
        .unwrap_err();
        match err {
            DesignError::Design(diagnostics) => assert_eq!(diagnostics.error_count(), 1),
            other => panic!("expected design diagnostics, got {other:?}"),
        }
    }
}
