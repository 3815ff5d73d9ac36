//! Response templates for the parlance dialog engine.
//!
//! This crate provides:
//!
//! - **Expressions**: a sandboxed condition language over template variables
//! - **Text templates**: `{{ output | filter }}` and `{% if %}` markup
//! - **Template bank**: candidates per intent, loaded from YAML
//! - **Selection**: condition filtering plus random or least-recently-used choice

pub mod bank;
pub mod environment;
pub mod error;
pub mod expression;
pub mod loader;
pub mod pronoun;
pub mod render;
pub mod selector;
pub mod template;

pub use bank::{TemplateBank, TemplateProvider};
pub use environment::{DEFAULT_RECENCY, Layered, RecentIntents, TemplateEnvironment};
pub use error::{ExpressionError, TemplateError};
pub use expression::{Expr, Scope};
pub use loader::SelectiveTemplateLoader;
pub use render::{Filter, TextTemplate, capitalize, decapitalize, escape_markdown, render_str};
pub use selector::{LeastRecentlyUsed, RandomSelector, TemplateSelector};
pub use template::{Classification, ResponseTemplate};
