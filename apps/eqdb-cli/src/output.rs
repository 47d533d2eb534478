//! Human and JSON rendering of command results

use equation_store::{Child, Group, MathObject};
use latex_engine::Template;
use serde::Serialize;

/// Writes results to stdout, as JSON when `--json` was given
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print `value` as JSON, or the text built by `text`
    pub fn emit<T, F>(&self, value: &T, text: F) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce() -> String,
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            let text = text();
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        Ok(())
    }
}

/// One line per object: id, name, type, image state, source
pub fn object_line(object: &MathObject) -> String {
    let state = if object.image_is_dirty { "dirty" } else { "ok" };
    format!(
        "{:>5}  {:<24} {:<14} {:<5}  {}",
        object.id, object.name, object.type_name, state, object.latex
    )
}

pub fn object_table(objects: &[MathObject]) -> String {
    objects.iter().map(object_line).collect::<Vec<_>>().join("\n")
}

/// Every column of one object, one per line
pub fn object_details(object: &MathObject) -> String {
    let mut lines = vec![
        format!("id:          {}", object.id),
        format!("kind:        {}", object.kind),
        format!("name:        {}", object.name),
        format!("latex:       {}", object.latex),
        format!("type:        {}", object.type_name),
        format!("dimensions:  {}", object.dimensions),
    ];
    if let Some(unit) = object.unit_id {
        lines.push(format!("unit:        {}", unit));
    }
    if let Some(notes) = &object.notes {
        lines.push(format!("notes:       {}", notes));
    }
    lines.push(format!(
        "template:    {}",
        object
            .template_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(match (&object.image, object.image_is_dirty) {
        (Some(image), false) => format!("image:       {} bytes", image.len()),
        _ => "image:       out of date".to_string(),
    });
    lines.push(format!(
        "created:     {} by {}",
        object.provenance.created_at, object.provenance.created_by
    ));
    if let (Some(at), Some(by)) = (&object.provenance.modified_at, &object.provenance.modified_by) {
        lines.push(format!("modified:    {} by {}", at, by));
    }
    lines.join("\n")
}

pub fn child_table(children: &[Child]) -> String {
    children
        .iter()
        .map(|child| {
            let mut line = format!("{:>3}. {}", child.association.insertion_order, object_line(&child.object));
            if let Some(path) = &child.association.code_file_path {
                line.push_str(&format!("  [{}]", path));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn group_table(groups: &[Group]) -> String {
    groups
        .iter()
        .map(|group| {
            format!(
                "{:>5}  {:<24} {}",
                group.id,
                group.name,
                group.notes.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn template_table(templates: &[Template]) -> String {
    templates
        .iter()
        .map(|t| {
            format!(
                "{:>5}  {}  {:<12} {} lines",
                t.id,
                t.created_at.format("%Y-%m-%d %H:%M:%S"),
                t.created_by,
                t.body.lines().count()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use equation_store::{MathKind, Provenance};
    use latex_engine::TemplateId;
    use pretty_assertions::assert_eq;

    fn object() -> MathObject {
        MathObject {
            id: 3,
            kind: MathKind::Equation,
            name: "Pythagoras".to_string(),
            latex: "a^2 + b^2 = c^2".to_string(),
            template_id: Some(TemplateId(1)),
            image: Some(vec![1, 2, 3]),
            compiled_at: None,
            image_is_dirty: false,
            notes: None,
            dimensions: 1,
            unit_id: None,
            type_name: "Unassigned".to_string(),
            provenance: Provenance {
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                created_by: "razor".to_string(),
                modified_at: None,
                modified_by: None,
            },
        }
    }

    #[test]
    fn test_object_line() {
        assert_eq!(
            object_line(&object()),
            "    3  Pythagoras               Unassigned     ok     a^2 + b^2 = c^2"
        );
    }

    #[test]
    fn test_object_details_mentions_image_state() {
        let mut obj = object();
        assert!(object_details(&obj).contains("image:       3 bytes"));

        obj.image_is_dirty = true;
        let details = object_details(&obj);
        assert!(details.contains("image:       out of date"));
        assert!(!details.contains("modified:"));
    }

    #[test]
    fn test_json_skips_image_bytes() {
        let json = serde_json::to_value(object()).unwrap();
        assert_eq!(json["name"], "Pythagoras");
        assert_eq!(json["template_id"], 1);
        assert_eq!(json["created_by"], "razor");
        assert!(json.get("image").is_none());
    }
}
