use thiserror::Error;

use crate::graph::node::{AttrValue, GraphDef, NodeDef, TensorLiteral};

/// Errors raised while parsing the compact graph text format used in tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextGraphError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

fn syntax(line: usize, message: impl Into<String>) -> TextGraphError {
    TextGraphError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parses one node per line:
///
/// ```text
/// name = Op(input, producer:1, ^control) @"/device:CPU:0" {T: "float", axis: 2}
/// ```
///
/// Blank lines and `#` comments are skipped. Attribute values are booleans,
/// integers, floats, quoted strings, `[..]` lists of integers or strings, or
/// `tensor<2x3>[..]` literals (one value splats across the shape).
///
/// # Example
/// ```
/// use fuse_rs::graph::parse_graph;
///
/// let graph = parse_graph(r#"
/// x = Parameter()
/// zero = Constant() {value: tensor<2x2>[0.0]}
/// relu = Maximum(x, zero)
/// "#).expect("valid graph");
/// assert_eq!(graph.nodes.len(), 3);
/// assert_eq!(graph.nodes[2].inputs, vec!["x", "zero"]);
/// ```
pub fn parse_graph(src: &str) -> Result<GraphDef, TextGraphError> {
    let mut nodes = Vec::new();
    for (index, raw) in src.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        nodes.push(parse_node(index + 1, line)?);
    }
    Ok(GraphDef::new(nodes))
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '-' | '.')
}

fn parse_node(line: usize, src: &str) -> Result<NodeDef, TextGraphError> {
    let (name, rest) = src
        .split_once('=')
        .ok_or_else(|| syntax(line, "nodes must be of the form `name = Op(...)`"))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(syntax(line, format!("invalid node name `{name}`")));
    }
    let rest = rest.trim();
    let op_len = rest.find(|ch: char| !is_name_char(ch)).unwrap_or(rest.len());
    let (op, rest) = rest.split_at(op_len);
    let rest = rest
        .strip_prefix('(')
        .ok_or_else(|| syntax(line, format!("missing `(` after `{op}`")))?;
    let close = rest
        .find(')')
        .ok_or_else(|| syntax(line, "missing `)` to close the input list"))?;
    let inputs: Vec<String> = rest[..close]
        .split(',')
        .map(str::trim)
        .filter(|input| !input.is_empty())
        .map(str::to_string)
        .collect();

    let mut node = NodeDef::new(name, op).with_inputs(inputs);
    let mut rest = rest[close + 1..].trim();

    if let Some(after) = rest.strip_prefix('@') {
        let (device, remainder) = parse_quoted(line, after.trim_start())?;
        node.device = device;
        rest = remainder.trim();
    }
    if let Some(body) = rest.strip_prefix('{') {
        let body = body
            .strip_suffix('}')
            .ok_or_else(|| syntax(line, "missing `}` to close the attribute list"))?;
        for entry in split_top_level(body) {
            let (key, value) = entry
                .split_once(':')
                .ok_or_else(|| syntax(line, format!("attribute `{entry}` must be `key: value`")))?;
            node.attrs
                .insert(key.trim().to_string(), parse_attr(line, value.trim())?);
        }
        rest = "";
    }
    if !rest.is_empty() {
        return Err(syntax(line, format!("unexpected trailing text `{rest}`")));
    }
    Ok(node)
}

fn parse_quoted(line: usize, src: &str) -> Result<(String, &str), TextGraphError> {
    let body = src
        .strip_prefix('"')
        .ok_or_else(|| syntax(line, "expected a quoted string"))?;
    let end = body
        .find('"')
        .ok_or_else(|| syntax(line, "unterminated string"))?;
    Ok((body[..end].to_string(), &body[end + 1..]))
}

/// Splits on commas that are not nested in brackets, angle brackets or quotes.
fn split_top_level(src: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (offset, ch) in src.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '[' | '<' if !quoted => depth += 1,
            ']' | '>' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => {
                parts.push(src[start..offset].trim());
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(src[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

fn parse_attr(line: usize, src: &str) -> Result<AttrValue, TextGraphError> {
    match src {
        "true" => return Ok(AttrValue::Bool(true)),
        "false" => return Ok(AttrValue::Bool(false)),
        _ => {}
    }
    if src.starts_with('"') {
        let (value, rest) = parse_quoted(line, src)?;
        if !rest.trim().is_empty() {
            return Err(syntax(line, format!("unexpected text after string `{src}`")));
        }
        return Ok(AttrValue::Str(value));
    }
    if let Some(tensor) = src.strip_prefix("tensor<") {
        return parse_tensor(line, tensor).map(AttrValue::Tensor);
    }
    if let Some(list) = src.strip_prefix('[') {
        let list = list
            .strip_suffix(']')
            .ok_or_else(|| syntax(line, format!("unterminated list `{src}`")))?;
        let items = split_top_level(list);
        if !items.is_empty() && items.iter().all(|item| item.starts_with('"')) {
            let strings = items
                .iter()
                .map(|item| parse_quoted(line, item).map(|(value, _)| value))
                .collect::<Result<_, _>>()?;
            return Ok(AttrValue::StrList(strings));
        }
        let ints = items
            .iter()
            .map(|item| {
                item.parse::<i64>()
                    .map_err(|_| syntax(line, format!("invalid integer `{item}` in list")))
            })
            .collect::<Result<_, _>>()?;
        return Ok(AttrValue::IntList(ints));
    }
    if let Ok(value) = src.parse::<i64>() {
        return Ok(AttrValue::Int(value));
    }
    if let Ok(value) = src.parse::<f64>() {
        return Ok(AttrValue::Float(value));
    }
    Err(syntax(line, format!("unsupported attribute value `{src}`")))
}

fn parse_tensor(line: usize, src: &str) -> Result<TensorLiteral, TextGraphError> {
    let (dims, rest) = src
        .split_once('>')
        .ok_or_else(|| syntax(line, "tensor literal must close its shape with `>`"))?;
    let dims = if dims.trim().is_empty() {
        Vec::new()
    } else {
        dims.split('x')
            .map(|dim| {
                dim.trim()
                    .parse::<usize>()
                    .map_err(|_| syntax(line, format!("invalid tensor dimension `{dim}`")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let values = rest
        .trim()
        .strip_prefix('[')
        .and_then(|body| body.strip_suffix(']'))
        .ok_or_else(|| syntax(line, "tensor literal values must be wrapped in `[...]`"))?;
    let values = split_top_level(values)
        .into_iter()
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|_| syntax(line, format!("invalid tensor value `{value}`")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let literal = TensorLiteral { dims, values };
    if literal.values.len() != 1 && literal.values.len() != literal.element_count() {
        return Err(syntax(
            line,
            format!(
                "tensor literal has {} values for {} elements",
                literal.values.len(),
                literal.element_count()
            ),
        ));
    }
    Ok(literal)
}

/// Parses graph text, panicking on malformed input. Intended for fixtures.
#[macro_export]
macro_rules! graph_def {
    ($src:expr) => {{
        $crate::graph::text::parse_graph($src).expect("failed to parse graph text")
    }};
}
