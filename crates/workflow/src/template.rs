//! Placeholder substitution for message templates.
//!
//! Syntax: `{{name}}` reads a workflow variable, `{{guest.field}}` the guest
//! profile and `{{system.field}}` the hostel constants. Dotted paths reach
//! into object values (`{{booking.unit}}`). A trailing `?` marks the
//! placeholder optional: it renders as an empty string when unbound.
//! Required placeholders without a value fail the whole render.
//!
//! The template is scanned once; substituted values are never re-expanded.

use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    chrono_tz::Tz,
    pelangi_config::SystemConfig,
    serde_json::Value,
    tracing::warn,
};

use crate::error::TemplateError;

pub type Variables = BTreeMap<String, Value>;

const GUEST_SCOPE: &str = "guest";
const SYSTEM_SCOPE: &str = "system";

/// Everything a template may read from.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub variables: &'a Variables,
    pub guest: &'a Variables,
    pub system: &'a Variables,
}

/// One `{{…}}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Path as written, without braces, whitespace or the `?` marker.
    pub path: String,
    pub optional: bool,
}

enum Segment<'t> {
    Literal(&'t str),
    Placeholder(Placeholder),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        let inner = after[..close].trim();
        let (path, optional) = match inner.strip_suffix('?') {
            Some(p) => (p.trim_end(), true),
            None => (inner, false),
        };
        if path.is_empty() || path.contains(char::is_whitespace) {
            // Not a placeholder; keep the braces as text.
            out.push(Segment::Literal(&rest[..open + 2]));
            rest = after;
            continue;
        }
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        out.push(Segment::Placeholder(Placeholder {
            path: path.to_string(),
            optional,
        }));
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

/// Placeholders in `template`, in order of appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    segments(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Render `template`, failing with every missing required placeholder.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut missing = Vec::new();
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(p) => match lookup(&p.path, ctx) {
                Some(value) => push_value(&mut out, value),
                None if p.optional => {},
                None if missing.contains(&p.path) => {},
                None => missing.push(p.path),
            },
        }
    }
    if missing.is_empty() {
        Ok(out)
    } else {
        Err(TemplateError::Unresolved { missing })
    }
}

fn lookup<'v>(path: &str, ctx: &TemplateContext<'v>) -> Option<&'v Value> {
    let (scope, path) = match path.split_once('.') {
        Some((GUEST_SCOPE, rest)) => (ctx.guest, rest),
        Some((SYSTEM_SCOPE, rest)) => (ctx.system, rest),
        _ => (ctx.variables, path),
    };
    resolve_path(scope, path)
}

/// Follow a dotted path into a variable map. `Null` counts as unbound.
#[must_use]
pub fn resolve_path<'v>(variables: &'v Variables, path: &str) -> Option<&'v Value> {
    let mut parts = path.split('.');
    let mut value = variables.get(parts.next()?)?;
    for part in parts {
        value = match value {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!value.is_null()).then_some(value)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {},
        other => out.push_str(&other.to_string()),
    }
}

/// `{{system.*}}` values: configured constants, `hostel_name`, `timezone`,
/// and `date` / `time` computed in the hostel timezone.
#[must_use]
pub fn system_variables(system: &SystemConfig, now: DateTime<Utc>) -> Variables {
    let tz: Tz = system.timezone.parse().unwrap_or_else(|_| {
        warn!(timezone = %system.timezone, "unknown timezone, using UTC");
        Tz::UTC
    });
    let local = now.with_timezone(&tz);

    let mut vars: Variables = system
        .constants
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    vars.insert("hostel_name".into(), Value::String(system.hostel_name.clone()));
    vars.insert("timezone".into(), Value::String(tz.name().to_string()));
    vars.insert(
        "date".into(),
        Value::String(local.format("%Y-%m-%d").to_string()),
    );
    vars.insert("time".into(), Value::String(local.format("%H:%M").to_string()));
    vars
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {chrono::TimeZone, rstest::rstest, serde_json::json};

    use super::*;

    fn vars(value: Value) -> Variables {
        serde_json::from_value(value).unwrap()
    }

    fn render_with(template: &str, variables: &Variables) -> Result<String, TemplateError> {
        let guest = vars(json!({ "key": "+60123456789", "name": "Aisyah" }));
        let system = vars(json!({ "hostel_name": "Pelangi" }));
        render(template, &TemplateContext {
            variables,
            guest: &guest,
            system: &system,
        })
    }

    #[rstest]
    #[case("Hi {{guest_name}}!", "Hi Ali!")]
    #[case("Hi {{ guest_name }}!", "Hi Ali!")]
    #[case("{{guest.name}} at {{system.hostel_name}}", "Aisyah at Pelangi")]
    #[case("units: {{available_units}}", "units: 3")]
    #[case("unit {{booking.unit}}", "unit C12")]
    #[case("first {{beds.0}}", "first A1")]
    #[case("note: {{note?}}.", "note: .")]
    #[case("no placeholders", "no placeholders")]
    #[case("empty {{}} stays", "empty {{}} stays")]
    #[case("open {{ forever", "open {{ forever")]
    #[case("{{a b}} is text", "{{a b}} is text")]
    fn renders(#[case] template: &str, #[case] expected: &str) {
        let variables = vars(json!({
            "guest_name": "Ali",
            "available_units": 3,
            "booking": { "unit": "C12" },
            "beds": ["A1", "A2"],
        }));
        assert_eq!(render_with(template, &variables).unwrap(), expected);
    }

    #[test]
    fn missing_required_placeholders_are_all_reported() {
        let err = render_with("{{a}} {{guest.age}} {{system.nope}}", &Variables::new()).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved {
            missing: vec!["a".into(), "guest.age".into(), "system.nope".into()],
        });
    }

    #[test]
    fn repeated_missing_placeholder_is_reported_once() {
        let err = render_with("{{a}} {{b}} {{a}}", &Variables::new()).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved {
            missing: vec!["a".into(), "b".into()],
        });
    }

    #[test]
    fn null_is_unbound() {
        let variables = vars(json!({ "x": null }));
        assert!(render_with("{{x}}", &variables).is_err());
        assert_eq!(render_with("[{{x?}}]", &variables).unwrap(), "[]");
    }

    #[test]
    fn values_are_not_re_expanded() {
        let variables = vars(json!({ "a": "{{b}}", "b": "nope" }));
        assert_eq!(render_with("{{a}}", &variables).unwrap(), "{{b}}");
    }

    #[test]
    fn rendered_output_has_no_unresolved_placeholders() {
        let template = "Thanks {{guest_name}}, your link: {{checkin_link}} ({{system.hostel_name}})";
        let variables = vars(json!({ "guest_name": "Ali", "checkin_link": "https://x/abc" }));
        let rendered = render_with(template, &variables).unwrap();
        assert!(placeholders(&rendered).is_empty(), "{rendered}");
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        let found = placeholders("{{a}} {{ guest.b? }} {{}}");
        assert_eq!(found, vec![
            Placeholder {
                path: "a".into(),
                optional: false,
            },
            Placeholder {
                path: "guest.b".into(),
                optional: true,
            },
        ]);
    }

    #[test]
    fn system_date_uses_hostel_timezone() {
        let system = SystemConfig {
            constants: [("wifi_password".to_string(), "pelangi123".to_string())].into(),
            ..SystemConfig::default()
        };
        // 20:30 UTC is 04:30 the next day in Kuala Lumpur.
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 20, 30, 0).unwrap();
        let vars = system_variables(&system, now);
        assert_eq!(vars["date"], "2026-03-15");
        assert_eq!(vars["time"], "04:30");
        assert_eq!(vars["wifi_password"], "pelangi123");
        assert_eq!(vars["timezone"], "Asia/Kuala_Lumpur");
    }

    #[test]
    fn bad_timezone_falls_back_to_utc() {
        let system = SystemConfig {
            timezone: "Mars/Olympus".into(),
            ..SystemConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 20, 30, 0).unwrap();
        assert_eq!(system_variables(&system, now)["date"], "2026-03-14");
    }
}
