//! Expression template helpers.
//!
//! Column expressions are plain SQL with `{{name}}` placeholders. A
//! placeholder names another column of the same table (or a relationship
//! path such as `{{country.name}}`); `{{}}` stands for the column's own base
//! expression inside a time-grain template.

/// Collect the placeholder names of a template, in order of appearance.
pub fn template_refs(template: &str) -> Vec<&str> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                refs.push(after[..end].trim());
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    refs
}

/// Replace every placeholder with the text returned by `resolve`.
///
/// An unterminated `{{` is copied through verbatim.
pub fn substitute<F, E>(template: &str, mut resolve: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&resolve(after[..end].trim())?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Substitute the anonymous `{{}}` placeholder with `expr`.
pub fn apply_grain_template(template: &str, expr: &str) -> String {
    template.replace("{{}}", expr)
}
