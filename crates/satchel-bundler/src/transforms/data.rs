//! Data files (XML, CSV, JSON) as `export default` modules.

use roxmltree::{Document, Node};
use satchel_config::DataFormat;
use serde_json::{Map, Value};

use super::{Payload, Transform, TransformContext};

pub struct DataTransform {
    format: DataFormat,
}

impl DataTransform {
    pub fn new(format: DataFormat) -> Self {
        Self { format }
    }
}

impl Transform for DataTransform {
    fn name(&self) -> &'static str {
        "data"
    }

    fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let text = payload.text()?;
        let value = match self.format {
            DataFormat::Xml => xml_to_json(text)?,
            DataFormat::Csv => Value::Array(
                csv_rows(text)
                    .into_iter()
                    .map(|row| Value::Array(row.iter().map(|cell| typed_cell(cell)).collect()))
                    .collect(),
            ),
            DataFormat::Json => serde_json::from_str(text)?,
        };

        let module = format!("export default {};\n", serde_json::to_string(&value)?);
        Ok(vec![Payload::new(payload.renamed("js"), module.into_bytes())])
    }
}

/// Convert an XML document to JSON: the root element keyed by name,
/// attributes under `$`, text under `_` and children grouped into arrays.
/// Elements with only text collapse to that string.
pub fn xml_to_json(text: &str) -> anyhow::Result<Value> {
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    let mut object = Map::new();
    object.insert(root.tag_name().name().to_string(), element_value(root));
    Ok(Value::Object(object))
}

fn element_value(node: Node<'_, '_>) -> Value {
    let mut attributes = Map::new();
    for attr in node.attributes() {
        attributes.insert(attr.name().to_string(), Value::String(attr.value().to_string()));
    }

    let mut text = String::new();
    let mut children: Vec<(String, Vec<Value>)> = Vec::new();
    for child in node.children() {
        if child.is_element() {
            let name = child.tag_name().name().to_string();
            let value = element_value(child);
            match children.iter_mut().find(|(n, _)| *n == name) {
                Some((_, values)) => values.push(value),
                None => children.push((name, vec![value])),
            }
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or(""));
        }
    }

    let has_text = !text.trim().is_empty();
    if attributes.is_empty() && children.is_empty() {
        return Value::String(if has_text { text } else { String::new() });
    }

    let mut object = Map::new();
    if !attributes.is_empty() {
        object.insert("$".to_string(), Value::Object(attributes));
    }
    if has_text {
        object.insert("_".to_string(), Value::String(text));
    }
    for (name, values) in children {
        object.insert(name, Value::Array(values));
    }
    Value::Object(object)
}

/// Split CSV text into rows of cells. Quoted cells may contain commas,
/// newlines and doubled quotes. Blank lines are skipped.
pub fn csv_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    cell.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                _ => cell.push(c),
            }
            continue;
        }

        match c {
            '"' if cell.is_empty() => quoted = true,
            ',' => row.push(std::mem::take(&mut cell)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut cell));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        push_row(&mut rows, row);
    }
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if !(row.len() == 1 && row[0].trim().is_empty()) {
        rows.push(row);
    }
}

/// Numbers and booleans become typed values, empty cells become null.
fn typed_cell(cell: &str) -> Value {
    match cell {
        "" => Value::Null,
        "true" | "TRUE" => Value::Bool(true),
        "false" | "FALSE" => Value::Bool(false),
        _ => cell
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && !cell.starts_with('+'))
            .and_then(|n| {
                if n.fract() == 0.0 && n.abs() < 9e15 {
                    Some(Value::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n).map(Value::Number)
                }
            })
            .unwrap_or_else(|| Value::String(cell.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn ctx() -> TransformContext {
        TransformContext {
            source: PathBuf::from("/src/data/x"),
            context_dir: PathBuf::from("/src"),
            source_maps: false,
        }
    }

    fn module(format: DataFormat, name: &str, text: &str) -> String {
        let out = DataTransform::new(format)
            .apply(Payload::new(name, text.as_bytes().to_vec()), &ctx())
            .unwrap();
        assert_eq!(out[0].extension(), "js");
        String::from_utf8(out[0].bytes.clone()).unwrap()
    }

    #[test]
    fn test_xml_shape() {
        let value = xml_to_json(
            r#"<note priority="high">
                 <to>Tove</to>
                 <to>Jani</to>
                 <body lang="en">Hello</body>
                 <empty/>
               </note>"#,
        )
        .unwrap();

        assert_eq!(
            value,
            json!({
                "note": {
                    "$": { "priority": "high" },
                    "to": ["Tove", "Jani"],
                    "body": [{ "$": { "lang": "en" }, "_": "Hello" }],
                    "empty": [""]
                }
            })
        );
    }

    #[test]
    fn test_csv_quotes_and_types() {
        let rows = csv_rows("name,notes\n\"Smith, J\",\"said \"\"hi\"\"\"\n\nx,\"a\nb\"\n");
        assert_eq!(
            rows,
            vec![
                vec!["name", "notes"],
                vec!["Smith, J", "said \"hi\""],
                vec!["x", "a\nb"],
            ]
        );

        let code = module(DataFormat::Csv, "t.csv", "a,1,2.5,true,\n");
        assert_eq!(code, "export default [[\"a\",1,2.5,true,null]];\n");
    }

    #[test]
    fn test_json_module() {
        let code = module(DataFormat::Json, "c.json", "{ \"a\": [1, 2] }");
        assert_eq!(code, "export default {\"a\":[1,2]};\n");
    }

    #[test]
    fn test_invalid_json_fails() {
        let result = DataTransform::new(DataFormat::Json)
            .apply(Payload::new("c.json", b"{".to_vec()), &ctx());
        assert!(result.is_err());
    }
}
