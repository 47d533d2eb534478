//! Embedded template loader
//!
//! The default equation template is loaded from `templates/eq_template.tex` at
//! compile time so a fresh database always has a "latest" template to seed.

/// Token replaced by the LaTeX fragment. It is a TeX comment, so an
/// unsubstituted template still compiles.
pub const PLACEHOLDER: &str = "%__REPLACEMENT__TEXT";

/// Default equation template - loaded from templates/eq_template.tex
const EQ_TEMPLATE: &str = include_str!("../../templates/eq_template.tex");

/// Body of the built-in equation template
pub fn default_template_body() -> &'static str {
    EQ_TEMPLATE
}
